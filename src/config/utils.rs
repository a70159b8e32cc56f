/// Configuration utilities: loading, environment overrides, validation and saving
///
/// The loaded [`Config`] is returned to the caller rather than stored in a
/// global; startup code hands it to `AppContext`, which owns the long-lived
/// pool and hub built from it.
use super::schemas::Config;
use crate::logger::{self, LogTag};
use crate::paths;
use crate::rpc::RpcMode;
use std::path::{Path, PathBuf};

/// Config path: `--config <path>` when given, else `<data dir>/config.toml`
pub fn resolve_config_path() -> PathBuf {
    crate::arguments::config_path_override()
        .map(PathBuf::from)
        .unwrap_or_else(paths::get_config_path)
}

/// Load the config file (defaults when missing), then apply process environment overrides
pub fn load_config() -> Result<Config, String> {
    let mut config = load_config_from_path(&resolve_config_path())?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

/// Parse a TOML config file; a missing file yields defaults
pub fn load_config_from_path(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let config = toml::from_str::<Config>(&contents)
        .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

    logger::info(
        LogTag::Config,
        &format!("Loaded configuration from {}", path.display()),
    );
    Ok(config)
}

/// Write the config back as pretty TOML, creating parent directories
pub fn save_config_to_path(config: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(path, contents)
        .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))
}

/// Apply environment overrides using `lookup` as the variable source
///
/// - `RPC_MODE`: "free" or "pro"
/// - `RPC_CHAINS`: comma-separated chain names to resolve in addition to the
///   chains already present in the file
/// - `<CHAIN>_RPC_URLS`: comma-separated endpoint list for a chain
/// - `<CHAIN>_RPC_URL`: single-endpoint fallback when no list is set
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("RPC_MODE") {
        match raw.parse::<RpcMode>() {
            Ok(mode) => config.rpc.mode = mode,
            Err(e) => logger::warning(LogTag::Config, &format!("Ignoring RPC_MODE: {}", e)),
        }
    }

    let mut chains: Vec<String> = config.rpc.chains.keys().cloned().collect();
    if let Some(extra) = lookup("RPC_CHAINS") {
        for name in split_list(&extra) {
            let name = name.to_lowercase();
            if !chains.contains(&name) {
                chains.push(name);
            }
        }
    }

    for chain in chains {
        let prefix = chain.to_uppercase().replace('-', "_");
        let urls = lookup(&format!("{}_RPC_URLS", prefix))
            .map(|v| split_list(&v))
            .filter(|list| !list.is_empty())
            .or_else(|| {
                lookup(&format!("{}_RPC_URL", prefix))
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .map(|v| vec![v])
            });

        if let Some(urls) = urls {
            logger::debug(
                LogTag::Config,
                &format!("Chain '{}' endpoints from environment: {}", chain, urls.len()),
            );
            config.rpc.chains.insert(chain, urls);
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Reject values that would make the pool or hub misbehave
pub fn validate_config(config: &Config) -> Result<(), String> {
    let rpc = &config.rpc;
    if rpc.breaker_failure_threshold == 0 {
        return Err("rpc.breaker_failure_threshold must be at least 1".to_string());
    }
    if rpc.breaker_open_duration_secs == 0 {
        return Err("rpc.breaker_open_duration_secs must be greater than zero".to_string());
    }
    if rpc.breaker_success_threshold == 0 {
        return Err("rpc.breaker_success_threshold must be at least 1".to_string());
    }
    for (chain, urls) in &rpc.chains {
        if urls.is_empty() {
            return Err(format!("rpc.chains.{} has no endpoints", chain));
        }
        for url in urls {
            url::Url::parse(url)
                .map_err(|e| format!("rpc.chains.{}: invalid URL '{}': {}", chain, url, e))?;
        }
    }

    let ws = &config.websocket;
    if ws.heartbeat_interval_secs == 0 || ws.cleanup_interval_secs == 0 {
        return Err("websocket intervals must be greater than zero".to_string());
    }
    if ws.heartbeat_timeout_secs == 0 {
        return Err("websocket.heartbeat_timeout_secs must be greater than zero".to_string());
    }
    if ws.send_timeout_secs == 0 {
        return Err("websocket.send_timeout_secs must be greater than zero".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.rpc.mode, RpcMode::Free);
        assert_eq!(config.websocket.heartbeat_interval_secs, 30);
        assert!(config.rpc.chains.is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_chains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.rpc.mode = RpcMode::Pro;
        config
            .rpc
            .chains
            .insert("base".to_string(), vec!["https://base.example.org".to_string()]);
        save_config_to_path(&config, &path).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.rpc.mode, RpcMode::Pro);
        assert_eq!(loaded.rpc.chains["base"], vec!["https://base.example.org"]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[websocket]\nsend_timeout_secs = 2\n").unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.websocket.send_timeout_secs, 2);
        assert_eq!(loaded.websocket.cleanup_interval_secs, 60);
        assert_eq!(loaded.webserver.port, 8080);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rpc\nmode = ").unwrap();
        assert!(load_config_from_path(&path).is_err());
    }

    #[test]
    fn test_env_url_list_beats_single_url() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("RPC_MODE", "pro"),
                ("RPC_CHAINS", "ethereum,bsc"),
                ("ETHEREUM_RPC_URLS", "https://a.example, https://b.example,"),
                ("ETHEREUM_RPC_URL", "https://ignored.example"),
                ("BSC_RPC_URL", "https://bsc.example"),
            ]),
        );

        assert_eq!(config.rpc.mode, RpcMode::Pro);
        assert_eq!(
            config.rpc.chains["ethereum"],
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.rpc.chains["bsc"], vec!["https://bsc.example"]);
    }

    #[test]
    fn test_env_overrides_configured_chain() {
        let mut config = Config::default();
        config
            .rpc
            .chains
            .insert("solana".to_string(), vec!["https://file.example".to_string()]);

        apply_env_overrides(&mut config, env(&[("SOLANA_RPC_URL", "https://env.example")]));
        assert_eq!(config.rpc.chains["solana"], vec!["https://env.example"]);
    }

    #[test]
    fn test_bad_mode_is_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, env(&[("RPC_MODE", "enterprise")]));
        assert_eq!(config.rpc.mode, RpcMode::Free);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        assert!(validate_config(&config).is_ok());

        config.rpc.chains.insert("eth".to_string(), vec![]);
        assert!(validate_config(&config).is_err());

        config.rpc.chains.insert("eth".to_string(), vec!["not a url".to_string()]);
        assert!(validate_config(&config).is_err());

        config.rpc.chains.clear();
        config.rpc.breaker_failure_threshold = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_heartbeat_timeout() {
        let mut config = Config::default();
        config.websocket.heartbeat_timeout_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("heartbeat_timeout_secs"));
    }
}
