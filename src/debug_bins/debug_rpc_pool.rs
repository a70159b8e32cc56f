use clap::Parser;
use dexsniper::config::load_config;
use dexsniper::rpc::{RpcMode, RpcPool};
use serde_json::Value;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "debug_rpc_pool")]
#[command(about = "Exercise the multi-chain RPC pool against live endpoints", long_about = None)]
struct Args {
    /// Chain to call
    #[arg(short, long, default_value = "ethereum")]
    chain: String,

    /// Endpoint URL (repeatable); without it the chain comes from the config file
    #[arg(short, long)]
    url: Vec<String>,

    /// Budget profile when using --url: free or pro
    #[arg(short, long, default_value = "free")]
    mode: String,

    /// JSON-RPC method
    #[arg(long, default_value = "eth_blockNumber")]
    method: String,

    /// JSON array of params
    #[arg(long, default_value = "[]")]
    params: String,

    /// Number of sequential calls
    #[arg(short = 'n', long, default_value = "3")]
    calls: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("RPC Pool Debug Tool\n");
    println!("{}", "=".repeat(80));

    let pool = if args.url.is_empty() {
        let config = load_config().map_err(anyhow::Error::msg)?;
        RpcPool::from_config(&config.rpc).map_err(anyhow::Error::msg)?
    } else {
        let mode: RpcMode = args.mode.parse().map_err(anyhow::Error::msg)?;
        let pool = RpcPool::new(mode).map_err(anyhow::Error::msg)?;
        pool.add_chain(&args.chain, &args.url);
        pool
    };

    let params: Vec<Value> = serde_json::from_str(&args.params)?;
    let budget = pool.budget();
    println!(
        "Mode: {} (timeout {:?}+{:?}, retries {}, max providers {})",
        pool.mode(),
        budget.connect_timeout,
        budget.read_timeout,
        budget.retries,
        budget.max_providers_per_call
    );
    println!("Chains: {}", pool.chains().join(", "));

    println!("\n[CALLS] {} x {} on {}\n", args.calls, args.method, args.chain);
    for i in 0..args.calls {
        let started = Instant::now();
        match pool
            .json_rpc(&args.chain, &args.method, params.clone(), None)
            .await
        {
            Ok(result) => println!(
                "{}. ok in {}ms: {}",
                i + 1,
                started.elapsed().as_millis(),
                result
            ),
            Err(e) => println!("{}. failed in {}ms: {}", i + 1, started.elapsed().as_millis(), e),
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("\n[HEALTH]");
    println!("{}", serde_json::to_string_pretty(&pool.health())?);

    pool.close().await;
    println!("\nDone at {}", chrono::Utc::now().to_rfc3339());
    Ok(())
}
