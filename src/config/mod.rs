//! Configuration system
//!
//! - `macros`: the `config_struct!` macro (struct + defaults in one declaration)
//! - `schemas`: every config section
//! - `utils`: TOML loading, environment overrides, validation, saving

#[macro_use]
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{Config, RpcConfig, WebSocketHubConfig, WebserverConfig};
pub use utils::{
    apply_env_overrides, load_config, load_config_from_path, resolve_config_path,
    save_config_to_path, validate_config,
};
