/// Daily log file output
///
/// Files are named `dexsniper_YYYY-MM-DD.log` under the logs directory. Writes
/// are dropped silently until [`init_file_logging`] has run, so tests and
/// library consumers never touch the filesystem.
use crate::paths;
use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

struct FileSink {
    date: String,
    writer: BufWriter<File>,
}

static FILE_SINK: Lazy<Mutex<Option<FileSink>>> = Lazy::new(|| Mutex::new(None));

fn open_for_today() -> Option<FileSink> {
    let date = Local::now().format("%Y-%m-%d").to_string();
    let dir = paths::get_logs_directory();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Failed to create logs directory {}: {}", dir.display(), e);
        return None;
    }

    let path = dir.join(format!("dexsniper_{}.log", date));
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(FileSink {
            date,
            writer: BufWriter::new(file),
        }),
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", path.display(), e);
            None
        }
    }
}

pub fn init_file_logging() {
    if !super::config::get_logger_config().file_logging {
        return;
    }
    *FILE_SINK.lock() = open_for_today();
}

pub fn write_to_file(line: &str) {
    let mut guard = FILE_SINK.lock();

    // Rotate at midnight
    let today = Local::now().format("%Y-%m-%d").to_string();
    let stale = matches!(guard.as_ref(), Some(sink) if sink.date != today);
    if stale {
        if let Some(sink) = guard.as_mut() {
            let _ = sink.writer.flush();
        }
        *guard = open_for_today();
    }

    if let Some(sink) = guard.as_mut() {
        let _ = writeln!(sink.writer, "{}", line);
    }
}

pub fn flush_file_logging() {
    if let Some(sink) = FILE_SINK.lock().as_mut() {
        let _ = sink.writer.flush();
    }
}
