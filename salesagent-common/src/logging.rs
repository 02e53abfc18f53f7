use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($msg:tt)+) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg)+)
    }};
}

/// Lifecycle and wiring chatter, TRACE unless a level is given.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:tt)+) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($msg)+)
    };

    ($($msg:tt)+) => {
        $crate::internal!(level = TRACE, $($msg)+)
    };
}

/// Traffic sent to a webhook receiver, in a span carrying the receiver URL.
#[macro_export]
macro_rules! outbound {
    (level = $level:ident, receiver = $receiver:expr, $($msg:tt)+) => {{
        let span = $crate::tracing::span!(
            $crate::tracing::Level::$level,
            "outbound",
            receiver = %$receiver
        );
        let _enter = span.enter();

        $crate::tracing::event!($crate::tracing::Level::$level, $($msg)+)
    }};

    (receiver = $receiver:expr, $($msg:tt)+) => {
        $crate::outbound!(level = TRACE, receiver = $receiver, $($msg)+)
    };
}

/// Install the global subscriber.
///
/// The level comes from `LOG_LEVEL`, defaulting to TRACE in debug builds and
/// INFO in release. Only events from `salesagent*` targets are emitted.
/// Calling this more than once leaves the first subscriber in place.
pub fn init() {
    let default = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    let level = std::env::var("LOG_LEVEL").map_or(default, |level| {
        LevelFilter::from_str(level.as_str()).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    });

    let _ = tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("salesagent")
                })),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init();
        init();
        crate::internal!("logging initialised twice");
    }

    #[test]
    fn macros_accept_structured_fields() {
        init();
        let url = "https://buyer.example.com/hook".to_string();
        crate::outbound!(receiver = url, bytes = 42, "POST");
        crate::outbound!(level = DEBUG, receiver = url, "POST {} ({} bytes)", url, 42);
        crate::internal!(level = INFO, media_buy_id = "mb_1", "Tracked");
    }
}
