//! Logging for the drivefs workspace
//!
//! Provides lightweight, configurable logging shared by every crate.
//!
//! Usage:
//! - Set DRIVEFS_LOG=off (default) - no logs
//! - Set DRIVEFS_LOG=info - filesystem operations (open, makedir, remove, ...)
//! - Set DRIVEFS_LOG=debug - backend queries, pagination, upload chunks

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable selecting the minimum log level.
pub const LOG_ENV: &str = "DRIVEFS_LOG";

static INIT: Once = Once::new();

/// Parse a DRIVEFS_LOG value into a minimum level. `None` disables logging.
fn parse_level(value: &str) -> Option<Option<emit::Level>> {
    match value {
        "off" => Some(None),
        "debug" => Some(Some(emit::Level::Debug)),
        "info" => Some(Some(emit::Level::Info)),
        "warn" => Some(Some(emit::Level::Warn)),
        "error" => Some(Some(emit::Level::Error)),
        _ => None,
    }
}

/// Initialize diagnostics based on the DRIVEFS_LOG environment variable
///
/// Safe to call more than once; only the first call configures the emitter.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());

        let level = match parse_level(&log_level) {
            Some(None) => return,
            Some(Some(level)) => level,
            None => {
                // Bootstrap warning, the emitter is not configured yet
                eprintln!("Warning: Unknown {LOG_ENV} value '{log_level}', using 'info'");
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime must outlive every emitting thread
        std::mem::forget(rt);
    });
}

/// Log basic operations (opens, directory changes, uploads)
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (queries, page counts, chunk progress)
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable problems (retries, discarded handles)
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort an operation
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("off"), Some(None));
        assert_eq!(parse_level("debug"), Some(Some(emit::Level::Debug)));
        assert_eq!(parse_level("error"), Some(Some(emit::Level::Error)));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_macros_compile() {
        info!("Test message");
        debug!("Debug message with {value}", value: 42);
        warn!("Warning message");
        error!("Error message");
    }
}
