/// Logger configuration derived from command-line flags
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Highest level shown for non-debug output
    pub min_level: LogLevel,
    /// Tags with `--debug-<key>` enabled
    pub debug_tags: HashSet<String>,
    /// When non-empty, only these tags are printed (errors excepted)
    pub enabled_tags: HashSet<String>,
    /// Mirror output to the daily log file
    pub file_logging: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            file_logging: true,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Build the logger configuration from the process arguments
///
/// Recognized flags: `--quiet`, `--verbose`, `--log-level <level>`,
/// `--debug-<tag>`, `--only-tags <a,b>` and `--no-log-file`.
pub fn init_from_args() {
    set_logger_config(config_from_args(&arguments::get_cmd_args()));
}

pub(crate) fn config_from_args(args: &[String]) -> LoggerConfig {
    let mut config = LoggerConfig::default();

    if args.iter().any(|a| a == "--quiet") {
        config.min_level = LogLevel::Warning;
    }
    if args.iter().any(|a| a == "--verbose") {
        config.min_level = LogLevel::Verbose;
    }
    if let Some(level) = value_after(args, "--log-level").and_then(|v| LogLevel::from_str(&v)) {
        config.min_level = level;
    }

    for arg in args {
        if let Some(key) = arg.strip_prefix("--debug-") {
            if !key.is_empty() {
                config.debug_tags.insert(key.to_lowercase());
            }
        }
    }

    if let Some(tags) = value_after(args, "--only-tags") {
        config.enabled_tags = tags
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
    }

    config.file_logging = !args.iter().any(|a| a == "--no-log-file");
    config
}

fn value_after(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.debug_tags.contains(&tag.to_debug_key()) || config.debug_tags.contains("all")
}
