/// Centralized command-line argument handling
///
/// Arguments are captured once into `CMD_ARGS`; binaries and tests may replace
/// them with [`set_cmd_args`]. Debug flag helpers are thin wrappers over
/// [`has_arg`].
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Copy of the current arguments (falls back to env::args if the mutex is poisoned)
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Value following `flag`, e.g. `--config path/to/config.toml`
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Explicit config file path, if given via `--config`
pub fn config_path_override() -> Option<String> {
    get_arg_value("--config")
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

pub fn is_debug_rpc_pool_enabled() -> bool {
    has_arg("--debug-rpc-pool")
}

pub fn is_debug_breaker_enabled() -> bool {
    has_arg("--debug-breaker")
}

pub fn is_debug_ws_hub_enabled() -> bool {
    has_arg("--debug-ws-hub")
}

pub fn is_debug_webserver_enabled() -> bool {
    has_arg("--debug-webserver")
}

/// Print the supported flags
pub fn print_help() {
    println!("dexsniper - multi-chain RPC pool and WebSocket hub");
    println!();
    println!("USAGE:");
    println!("    dexsniper [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>       Config file (default: <data dir>/config.toml)");
    println!("    --quiet               Only warnings and errors");
    println!("    --verbose             Enable verbose output");
    println!("    --log-level <level>   error | warning | info | debug | verbose");
    println!("    --only-tags <a,b>     Restrict output to the given tags");
    println!("    --no-log-file         Console output only");
    println!("    --debug-rpc-pool      Debug logs for the RPC pool");
    println!("    --debug-breaker       Debug logs for circuit breakers");
    println!("    --debug-ws-hub        Debug logs for the WebSocket hub");
    println!("    --debug-webserver     Debug logs for the HTTP server");
    println!("    --help                Show this message");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_value_lookup() {
        set_cmd_args(vec![
            "dexsniper".to_string(),
            "--config".to_string(),
            "/tmp/custom.toml".to_string(),
            "--debug-ws-hub".to_string(),
        ]);

        assert_eq!(config_path_override().as_deref(), Some("/tmp/custom.toml"));
        assert!(is_debug_ws_hub_enabled());
        assert!(!is_debug_rpc_pool_enabled());
        assert_eq!(get_arg_value("--debug-ws-hub"), None);
    }
}
