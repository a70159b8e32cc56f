use clap::Parser;
use dexsniper::config::WebserverConfig;
use dexsniper::rpc::{RpcMode, RpcPool};
use dexsniper::webserver::ws::{Channel, HealthConfig, MemorySocket, MessageType, WebSocketHub, WebSocketMessage};
use dexsniper::webserver::{start_server, AppState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Parser)]
#[command(name = "debug_ws_hub")]
#[command(about = "Simulate hub traffic with in-memory clients, or serve the real /ws endpoint", long_about = None)]
struct Args {
    /// Number of simulated clients
    #[arg(short, long, default_value = "5")]
    clients: usize,

    /// Make every Nth client fail on send (0 = never)
    #[arg(long, default_value = "0")]
    fail_every: usize,

    /// Broadcasts to send on the discovery channel
    #[arg(short, long, default_value = "3")]
    broadcasts: usize,

    /// Serve the real endpoint on this port instead of simulating
    #[arg(long)]
    serve: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("WebSocket Hub Debug Tool\n");
    println!("{}", "=".repeat(80));

    if let Some(port) = args.serve {
        return serve(port).await;
    }

    let hub = Arc::new(WebSocketHub::new(HealthConfig::default()));
    let mut sockets = Vec::new();
    for i in 0..args.clients {
        let id = format!("sim-{}", i + 1);
        let socket = MemorySocket::new();
        if !hub.connect_client(&id, socket.clone(), None).await {
            println!("{} failed to connect", id);
            continue;
        }
        hub.subscribe_to_channel(&id, Channel::Discovery).await;
        if args.fail_every > 0 && (i + 1) % args.fail_every == 0 {
            socket.set_failing(true);
        }
        sockets.push((id, socket));
    }

    println!("\n[BROADCASTS]\n");
    for n in 0..args.broadcasts {
        let message = WebSocketMessage::with_payload(
            MessageType::NewPair,
            Channel::Discovery,
            json!({ "pair": format!("0xdebug{:02}", n), "chain": "base" }),
        );
        let delivered = hub.broadcast_to_channel(Channel::Discovery, &message).await;
        println!("broadcast {} delivered to {} client(s)", n + 1, delivered);
    }

    println!("\n[CLIENTS]\n");
    for (id, socket) in &sockets {
        println!(
            "{}: {} frame(s), closed={}, reason={}",
            id,
            socket.sent().len(),
            socket.is_closed(),
            socket.close_reason().unwrap_or_else(|| "-".to_string())
        );
    }

    println!("\n{}", "=".repeat(80));
    println!("\n[STATS]");
    println!(
        "{}",
        serde_json::to_string_pretty(&hub.get_connection_stats().await)?
    );

    hub.stop().await;
    Ok(())
}

async fn serve(port: u16) -> anyhow::Result<()> {
    let pool = Arc::new(RpcPool::new(RpcMode::Free).map_err(anyhow::Error::msg)?);
    let hub = Arc::new(WebSocketHub::new(HealthConfig::default()));
    hub.start();

    let config = WebserverConfig {
        port,
        ..WebserverConfig::default()
    };
    let state = Arc::new(AppState::new(config, pool, hub.clone()));
    let shutdown = Arc::new(Notify::new());

    // Periodic system event so connected clients see traffic
    let ticker_hub = hub.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            let message = WebSocketMessage::with_payload(
                MessageType::SystemHealth,
                Channel::System,
                json!({ "source": "debug_ws_hub", "at": chrono::Utc::now().to_rfc3339() }),
            );
            ticker_hub.broadcast_to_channel(Channel::System, &message).await;
        }
    });

    println!("Serving ws://127.0.0.1:{}/ws (Ctrl+C to stop)", port);
    let server = tokio::spawn(start_server(state, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    shutdown.notify_one();
    ticker.abort();
    hub.stop().await;
    server.await?.map_err(anyhow::Error::msg)?;
    Ok(())
}
