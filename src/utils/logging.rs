//! Conditional, tagged logging macros.
//!
//! Every module that uses them defines two consts:
//! ```rust,ignore
//! const ENABLE_LOGS: bool = true;
//! const LOG_TAG: &str = "coordinator";
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("session started for {}", target);
//! // => "[coordinator] session started for Slack"
//! ```
//!
//! The key callback path never logs above debug; keep it that way, it runs on
//! the OS event thread.

/// Shared expansion for the level-specific macros below.
#[macro_export]
#[doc(hidden)]
macro_rules! __guard_log {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!("[{}] {}", LOG_TAG, format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::__guard_log!(debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::__guard_log!(info, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::__guard_log!(warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::__guard_log!(error, $($arg)*)
    };
}

/// Initialise `env_logger` from `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
