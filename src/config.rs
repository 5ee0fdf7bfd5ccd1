use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::auction::{Amount, DEFAULT_MIN_INCREMENT};

/// Runtime configuration, from flags or environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "gavel", about = "Real-time bidding engine for marketplace inventory")]
pub struct Config {
    /// Address the HTTP/WebSocket server listens on.
    #[arg(long, env = "GAVEL_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Postgres connection string. Without it, in-memory stores are used.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Minimum amount a new bid must exceed the current highest by.
    #[arg(long, env = "GAVEL_MIN_INCREMENT", default_value_t = DEFAULT_MIN_INCREMENT)]
    pub min_increment: Amount,

    /// Upper bound on waiting for a contended auction, in milliseconds.
    #[arg(long, env = "GAVEL_LOCK_TIMEOUT_MS", default_value_t = 3000)]
    pub lock_timeout_ms: u64,

    /// How often idle per-auction locks are evicted, in seconds.
    #[arg(long, env = "GAVEL_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
