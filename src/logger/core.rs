/// Central filtering for every log call
///
/// Rules, in order:
/// 1. Errors always pass
/// 2. Level must be within the configured threshold
/// 3. Debug needs the tag's --debug flag
/// 4. Verbose needs --verbose
/// 5. A non-empty enabled_tags set restricts output to those tags
use super::config::{get_logger_config, is_debug_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = get_logger_config();

    if level == LogLevel::Error {
        return true;
    }

    if level == LogLevel::Debug {
        return is_debug_enabled_for_tag(tag);
    }

    if level > config.min_level {
        return false;
    }

    if level == LogLevel::Verbose {
        return config.min_level == LogLevel::Verbose;
    }

    if !config.enabled_tags.is_empty() && !config.enabled_tags.contains(&tag.to_debug_key()) {
        return false;
    }

    true
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(&tag, level, message);
}
