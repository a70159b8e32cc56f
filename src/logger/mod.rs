//! Structured logging for the dexsniper core
//!
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem debug control via --debug-<tag> flags
//! - Dual output: colored console + daily log file
//!
//! ## Usage
//!
//! ```rust
//! use dexsniper::logger::{self, LogTag};
//!
//! logger::error(LogTag::RpcPool, "All endpoints failed");
//! logger::info(LogTag::WsHub, "Hub started");
//! logger::debug(LogTag::CircuitBreaker, "Breaker half-open"); // Only if --debug-breaker
//! logger::verbose(LogTag::Rpc, "Raw response: ..."); // Only if --verbose
//! ```
//!
//! Call [`init`] once at startup, before services are started.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger from command-line arguments and open the log file
pub fn init() {
    config::init_from_args();
    file::init_file_logging();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (hidden only with --quiet)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when the matching `--debug-<tag>` flag is present, e.g.
/// `--debug-rpc-pool` for [`LogTag::RpcPool`].
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (only with --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending file writes; call during shutdown
pub fn flush() {
    file::flush_file_logging();
}
