//! Console formatting with ANSI colors and word wrapping, plus the plain file line
use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 8;
const BRACKET_SPACE_WIDTH: usize = 3;
const TOTAL_PREFIX_WIDTH: usize = TAG_WIDTH + LEVEL_WIDTH + BRACKET_SPACE_WIDTH * 2;

/// Maximum console line length before wrapping
const MAX_LINE_LENGTH: usize = 145;

pub fn format_and_log(tag: &LogTag, level: LogLevel, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();
    let prefix = format!("{} ", time).dimmed().to_string();
    let prefix_width = time.len() + 1;

    let base_line = format!("{}[{}] [{}] ", prefix, format_tag(tag), format_level(level));
    let available = MAX_LINE_LENGTH
        .checked_sub(TOTAL_PREFIX_WIDTH + prefix_width)
        .filter(|w| *w > 20)
        .unwrap_or(50);

    let chunks = wrap_text(message, available);
    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let tag_plain = tag.to_plain_string();
    let continuation = " ".repeat(prefix_width + TOTAL_PREFIX_WIDTH);

    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            print_stdout_safe(&format!("{}{}", base_line, chunk));
        } else {
            print_stdout_safe(&format!("{}{}", continuation, chunk));
        }
        write_to_file(&format!(
            "{} [{}] [{}] {}",
            timestamp,
            tag_plain,
            level.as_str(),
            chunk
        ));
    }
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Rpc => label.bright_cyan().bold(),
        LogTag::RpcPool => label.bright_blue().bold(),
        LogTag::CircuitBreaker => label.bright_red().bold(),
        LogTag::WsHub => label.bright_magenta().bold(),
        LogTag::Webserver => label.bright_green().bold(),
        LogTag::Test => label.blue().bold(),
        LogTag::Other(_) => label.white().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.yellow().bold(),
        LogLevel::Debug | LogLevel::Verbose => label.dimmed(),
        LogLevel::Info => label.white().bold(),
    }
}

/// Print to stdout, exiting quietly when the pipe is closed
fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message).and_then(|_| out.flush()) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
}

/// Wrap at word boundaries, keeping existing newlines; overlong words are split
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            lines.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();

            if word_len > max_width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(max_width) {
                    lines.push(piece.iter().collect());
                }
            } else if current.is_empty() {
                current = word.to_string();
            } else if current_len + 1 + word_len <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
