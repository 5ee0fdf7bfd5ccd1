use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::debug;

use super::LoopService;
use crate::coordinator::Coordinator;

/// Periodically drops idle per-auction locks from the coordinator.
pub struct Sweeper {
    coordinator: Arc<Coordinator>,
    interval: Duration,
    last_sweep: Instant,
}

impl Sweeper {
    pub fn new(coordinator: Arc<Coordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
            last_sweep: Instant::now(),
        }
    }
}

impl LoopService for Sweeper {
    fn run_iteration(&mut self) -> Result<()> {
        // short tick so stop requests are noticed promptly
        std::thread::sleep(Duration::from_millis(100));

        if self.last_sweep.elapsed() >= self.interval {
            let evicted = self.coordinator.evict_idle_locks();
            if evicted > 0 {
                debug!(evicted, "evicted idle auction locks");
            }
            self.last_sweep = Instant::now();
        }
        Ok(())
    }
}
