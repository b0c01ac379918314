//! Structured logging utilities for vposix components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use vposix_config::log_fallback_debug;
//!
//! log_fallback_debug!("invocation finished", program = "ln", code = 0);
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const NATIVE: &'static str = "NATIVE";
    pub const FALLBACK: &'static str = "FALLBACK";
    pub const FACADE: &'static str = "FACADE";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// `-v` count to level: 0 = warn, 1 = info, 2 = debug, 3+ = trace
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

// === NATIVE logging macros ===

#[macro_export]
macro_rules! log_native_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "NATIVE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_native_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "NATIVE", $($key = $value,)* $msg)
    };
}

// === FALLBACK logging macros ===

#[macro_export]
macro_rules! log_fallback_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "FALLBACK", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_fallback_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "FALLBACK", $($key = $value,)* $msg)
    };
}

// === FACADE logging macros ===

#[macro_export]
macro_rules! log_facade_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "FACADE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_facade_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "FACADE", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
///
/// `VPOSIX_LOG`, then `RUST_LOG`, take precedence over `level`. Safe to
/// call more than once; later calls are ignored.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env("VPOSIX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_constants() {
        assert_eq!(Component::NATIVE, "NATIVE");
        assert_eq!(Component::FALLBACK, "FALLBACK");
        assert_eq!(Component::FACADE, "FACADE");
        assert_eq!(Component::CLI, "CLI");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Warn);
        assert_eq!(LogLevel::from_verbosity(2), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(9).as_filter(), "trace");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(LogLevel::Error);
        init_logging(LogLevel::Debug);
        log_facade_debug!("still fine", attempt = 2);
    }
}
