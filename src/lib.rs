pub mod controller;
pub mod replay;

pub use salesagent_common::tracing;
