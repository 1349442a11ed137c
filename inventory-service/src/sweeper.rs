use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use crate::service::InventoryService;

/// Periodically hands lapsed leases back to stock.
pub struct ExpirySweeper {
    service: InventoryService,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(service: InventoryService, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    /// One pass. Failures are logged; the next tick tries again.
    pub async fn sweep(&self) -> usize {
        match self.service.expire_all().await {
            Ok(released) => {
                info!("Expiry sweep released {} reservations", released.len());
                released.len()
            }
            Err(e) => {
                error!("Error releasing expired reservations: {}", e);
                0
            }
        }
    }
}
