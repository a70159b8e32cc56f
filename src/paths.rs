//! Centralized path resolution
//!
//! Base directory follows platform conventions:
//! - **macOS**: `~/Library/Application Support/DexSniper/`
//! - **Windows**: `%LOCALAPPDATA%\DexSniper\`
//! - **Linux**: `$XDG_DATA_HOME/DexSniper/` (fallback `~/.local/share/DexSniper/`)
//!
//! Setting `DEXSNIPER_HOME` overrides the platform location.
//!
//! ```text
//! DexSniper/
//! ├── data/
//! │   └── config.toml
//! └── logs/
//!     └── dexsniper_*.log
//! ```

use once_cell::sync::Lazy;
use std::path::PathBuf;

// =============================================================================
// BASE DIRECTORY RESOLUTION
// =============================================================================

static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
    const APP_DIR: &str = "DexSniper";

    if let Ok(home) = std::env::var("DEXSNIPER_HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(APP_DIR);
    }

    PathBuf::from(APP_DIR)
}

// =============================================================================
// ACCESSORS
// =============================================================================

pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

pub fn get_data_directory() -> PathBuf {
    BASE_DIRECTORY.join("data")
}

pub fn get_logs_directory() -> PathBuf {
    BASE_DIRECTORY.join("logs")
}

pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

/// Create base, data and logs directories if missing
pub fn ensure_all_directories() -> Result<(), String> {
    let dirs_to_create = [
        ("base", get_base_directory()),
        ("data", get_data_directory()),
        ("logs", get_logs_directory()),
    ];

    for (name, dir) in dirs_to_create {
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    dir.display(),
                    e
                )
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_and_logs_under_base() {
        let base = get_base_directory();
        assert!(get_data_directory().starts_with(&base));
        assert!(get_logs_directory().starts_with(&base));
    }

    #[test]
    fn test_config_path_in_data_dir() {
        let config = get_config_path();
        assert!(config.starts_with(get_data_directory()));
        assert_eq!(config.file_name().unwrap(), "config.toml");
    }
}
