//! Random order-flow generator for demos and load testing.
//!
//! Drives the HTTP surface the way real flow would: Poisson arrivals
//! (exponential inter-arrival times), a Gaussian random walk on the local
//! mid-price, heavy-tailed order sizes (`Exp1 * mean_qty`), and an occasional
//! cancel of one of its own recent orders so the cancellation path sees
//! traffic too. The generator owns id bookkeeping only for cancels — order
//! ids themselves are minted by the API.

use rand::Rng;
use rand_distr::{Distribution, Exp, Exp1, Normal};
use reqwest::Client;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;

const SPREAD: f64 = 1.0;
const CANCEL_PROBABILITY: f64 = 0.1;
const RECENT_IDS: usize = 64;

#[derive(Clone)]
pub struct SimConfig {
    pub api_base: String,
    pub run_secs: Option<u64>,
    pub rate_hz: f64,
    pub noise_sigma: f64,
    pub mean_qty: f64,
}

/// Post one randomized limit order; returns the assigned order id and the
/// number of trades it produced.
async fn send_one_order(
    client: &Client,
    api_base: &str,
    mid_price: f64,
    qty: u64,
) -> anyhow::Result<(String, usize)> {
    let (price, side) = if rand::rng().random_bool(0.5) {
        (mid_price - SPREAD, "BUY")
    } else {
        (mid_price + SPREAD, "SELL")
    };
    let resp = client
        .post(format!("{}/orders", api_base))
        .json(&json!({
            "side": side,
            "price": (price.max(1.0)) as u64,
            "qty": qty.max(1),
            "symbol": "BTC-USD",
        }))
        .send()
        .await?
        .error_for_status()?
        .json::<serde_json::Value>()
        .await?;

    let order_id = resp["order_id"].as_str().unwrap_or_default().to_string();
    let n_trades = resp["trades"].as_array().map(|t| t.len()).unwrap_or(0);
    Ok((order_id, n_trades))
}

/// Drive randomized flow against the engine until the time limit elapses or
/// `cancel_token` fires (e.g. on ctrl-c).
pub async fn run_simulation(cfg: SimConfig, cancel_token: CancellationToken) -> anyhow::Result<()> {
    let client = Client::new();
    let ia_dist = Exp::new(cfg.rate_hz).expect("rate_hz must be > 0");
    let drift = Normal::new(0.0, cfg.noise_sigma).expect("noise_sigma must be >= 0");
    let size_dist = Exp1;

    let mut mid_price = 100.0;
    let mut sent = 0u64;
    let mut filled = 0usize;
    let mut recent_ids: Vec<String> = Vec::with_capacity(RECENT_IDS);
    let start = Instant::now();

    loop {
        if let Some(max_secs) = cfg.run_secs {
            if start.elapsed().as_secs() >= max_secs {
                break;
            }
        }
        let wait_secs = ia_dist.sample(&mut rand::rng());
        let sleep_fut = sleep(Duration::from_secs_f64(wait_secs));
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("received shutdown, stopping simulation…");
                break;
            }
            _ = sleep_fut => {
                // Sometimes cancel one of our own resting orders instead.
                if !recent_ids.is_empty() && rand::rng().random_bool(CANCEL_PROBABILITY) {
                    let idx = rand::rng().random_range(0..recent_ids.len());
                    let id = recent_ids.swap_remove(idx);
                    client
                        .delete(format!("{}/orders/{}", cfg.api_base, id))
                        .send()
                        .await?
                        .error_for_status()?;
                    continue;
                }

                let raw: f64 = <Exp1 as Distribution<f64>>::sample(&size_dist, &mut rand::rng());
                let qty = (raw * cfg.mean_qty) as u64;
                mid_price += drift.sample(&mut rand::rng());

                let (order_id, n_trades) =
                    send_one_order(&client, &cfg.api_base, mid_price, qty).await?;
                sent += 1;
                filled += n_trades;
                if recent_ids.len() == RECENT_IDS {
                    recent_ids.remove(0);
                }
                recent_ids.push(order_id);

                println!(
                    "[{:.1}s] sent={} trades={} mid={:.2}",
                    start.elapsed().as_secs_f64(),
                    sent,
                    filled,
                    mid_price
                );
            }
        }
    }
    println!("--- done --- orders sent={} trades seen={}", sent, filled);
    Ok(())
}
