//! Conditional logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! Each module that uses these must define its own flag:
//! ```rust
//! const ENABLE_LOGS: bool = true;
//! ```
//! The macros are exported at the crate root:
//! ```rust,ignore
//! use crate::{log_error, log_info, log_warn};
//! ```

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
