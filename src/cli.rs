use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};
use tracing::info;

use crate::{
    api::router,
    projections::run_drainer,
    simulate::{SimConfig, run_simulation},
    state::AppState,
    utils::shutdown_token,
};

/// CLI for the matching venue
#[derive(Parser)]
#[command(name = "venue-engine")]
#[command(version = "0.1", about = "A limit order book venue with a write-ahead log")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the log, then serve the HTTP API with a projection drainer
    Serve {
        /// Directory holding the durability log
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
        /// Projection drain interval in milliseconds
        #[arg(long, default_value_t = 100)]
        drain_interval_ms: u64,
        /// Max events folded per drain tick
        #[arg(long, default_value_t = 256)]
        drain_batch: usize,
    },
    /// Post randomized order flow against a running server
    Simulate {
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        api_base: String,
        /// Stop after this many seconds; runs until ctrl-c if omitted
        #[arg(long)]
        run_secs: Option<u64>,
        /// Poisson arrival rate (orders per second)
        #[arg(long, default_value_t = 10.0)]
        rate_hz: f64,
        /// Std deviation of the mid-price random walk
        #[arg(long, default_value_t = 0.5)]
        noise_sigma: f64,
        /// Mean order size
        #[arg(long, default_value_t = 5.0)]
        mean_qty: f64,
    },
    /// Rebuild the book from the log and print it
    Replay {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

async fn serve(
    data_dir: PathBuf,
    addr: String,
    drain_interval_ms: u64,
    drain_batch: usize,
) -> anyhow::Result<()> {
    let state = AppState::open(&data_dir)?;
    let token = shutdown_token();

    tokio::spawn(run_drainer(
        state.channel.clone(),
        state.projections.clone(),
        Duration::from_millis(drain_interval_ms),
        drain_batch,
        token.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;
    Ok(())
}

fn print_book(state: &AppState) {
    let engine = state.engine.lock().unwrap();
    let book = engine.book();
    println!("------ Order Book ------");
    println!("Asks (lowest first):");
    for (price, qty) in book.ask_levels() {
        println!("  {:>8} x {}", price, qty);
    }
    println!("Bids (highest first):");
    for (price, qty) in book.bid_levels() {
        println!("  {:>8} x {}", price, qty);
    }
    println!(
        "{} resting orders, {} log records",
        book.len(),
        engine.wal().len()
    );
    println!("------------------------");
}

pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            data_dir,
            addr,
            drain_interval_ms,
            drain_batch,
        } => serve(data_dir, addr, drain_interval_ms, drain_batch).await,
        Commands::Simulate {
            api_base,
            run_secs,
            rate_hz,
            noise_sigma,
            mean_qty,
        } => {
            let cfg = SimConfig {
                api_base,
                run_secs,
                rate_hz,
                noise_sigma,
                mean_qty,
            };
            run_simulation(cfg, shutdown_token()).await
        }
        Commands::Replay { data_dir } => {
            let state = AppState::open(&data_dir)?;
            print_book(&state);
            Ok(())
        }
    }
}
