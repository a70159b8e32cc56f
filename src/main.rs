use anyhow::Context;
use dexsniper::{
    arguments::{has_arg, print_help},
    config::{load_config, resolve_config_path},
    context::AppContext,
    logger::{self, LogTag},
    paths,
    webserver::{start_server, AppState},
};
use std::sync::Arc;

/// Main entry point
///
/// Loads configuration, builds the RPC pool and WebSocket hub, serves the
/// hub endpoint and health views, and shuts everything down on Ctrl+C.
#[tokio::main]
async fn main() {
    // Check for help request first (before any other processing)
    if has_arg("--help") || has_arg("-h") {
        print_help();
        std::process::exit(0);
    }

    // Ensure all directories exist BEFORE logger initialization
    // (Logger needs logs directory to create log files)
    if let Err(e) = paths::ensure_all_directories() {
        eprintln!("Failed to create required directories: {}", e);
        std::process::exit(1);
    }

    logger::init();

    if let Err(e) = run().await {
        logger::error(LogTag::System, &format!("dexsniper failed: {:#}", e));
        logger::flush();
        std::process::exit(1);
    }

    logger::flush();
}

async fn run() -> anyhow::Result<()> {
    logger::info(LogTag::System, "dexsniper starting up...");

    dotenv::dotenv().ok();

    let config = load_config()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("loading {}", resolve_config_path().display()))?;
    logger::info(
        LogTag::Config,
        &format!(
            "Configuration loaded ({} chain(s), rpc mode {})",
            config.rpc.chains.len(),
            config.rpc.mode
        ),
    );

    let ctx = AppContext::from_config(config).map_err(anyhow::Error::msg)?;
    ctx.start();

    let mut server = if ctx.config.webserver.enabled {
        let state = Arc::new(AppState::from_context(&ctx));
        Some(tokio::spawn(start_server(state, ctx.shutdown.clone())))
    } else {
        logger::info(LogTag::Webserver, "Webserver disabled in config");
        None
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            logger::info(LogTag::System, "Shutdown requested");
        }
        Some(result) = async {
            match &mut server {
                Some(handle) => Some(handle.await),
                None => None,
            }
        } => {
            ctx.shutdown().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::msg(e)),
                Err(e) => Err(anyhow::Error::new(e).context("webserver task")),
            };
        }
    }

    ctx.shutdown().await;
    if let Some(handle) = server {
        handle
            .await
            .context("webserver task")?
            .map_err(anyhow::Error::msg)?;
    }

    logger::info(LogTag::System, "dexsniper stopped");
    Ok(())
}
