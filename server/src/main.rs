//! holders-server: HTTP API over the insurance holder records.
//!
//! Usage:
//!   holders-server --db holders.db --bind 0.0.0.0:3000
//!   holders-server --config server.json --seed-demo 200 --seed 42
//!   holders-server --db :memory: --seed-demo 50

use anyhow::Result;
use holders_core::{clock::SystemClock, config::AppConfig, pool::StorePool, service::HolderService};
use holders_server::router::build_router;
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = match string_arg(&args, "--config") {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    }
    .with_env_overrides();
    if let Some(db) = string_arg(&args, "--db") {
        config.database.url = db.to_string();
    }
    if let Some(bind) = string_arg(&args, "--bind") {
        config.server.bind_addr = bind.to_string();
    }
    config.validate()?;

    let seed_demo = parse_arg(&args, "--seed-demo", 0usize);
    let seed = parse_arg(&args, "--seed", 42u64);

    println!("holders-server");
    println!("  db:    {}", config.database.url);
    println!("  bind:  {}", config.server.bind_addr);
    println!();

    let pool = StorePool::open(&config.database.url, config.database.pool_size)?;
    let bind_addr = config.server.bind_addr.clone();
    let service = HolderService::new(pool, Arc::new(SystemClock), config);

    if seed_demo > 0 {
        let seeding = service.clone();
        let inserted =
            tokio::task::spawn_blocking(move || seeding.seed_demo(seed, seed_demo)).await??;
        println!("Seeded {inserted} demo holders (seed {seed})");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on {bind_addr}");
    axum::serve(listener, build_router(service)).await?;
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
