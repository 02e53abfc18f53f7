//! Ambient pieces shared by the sales agent crates: logging setup, the audit
//! trail contract and the lifecycle signals passed between host and services.

pub mod audit;
pub mod logging;

pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
