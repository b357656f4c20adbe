//! Discovery driver (C7, spec §4.7): bounded, periodic routing-table probes.

use crate::egress::Egress;
use crate::error::HubError;
use alertme_protocol::ids::{BROADCAST_LONG, BROADCAST_SHORT};
use alertme_protocol::{Catalog, MessageParams};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Total discovery window (spec §4.7).
const DISCOVERY_WINDOW: Duration = Duration::from_secs(60);
/// Interval between broadcasts.
const DISCOVERY_TICK: Duration = Duration::from_secs(3);
/// `ceil(60 / 3)`.
const DISCOVERY_BROADCASTS: usize = 20;

/// Time-bounded, periodic broadcaster of `routing_table_request` frames.
///
/// At most one run may be active; a second `start_discovery` while one is in
/// flight fails with `HubError::AlreadyRunning` rather than silently
/// stacking two broadcast loops.
pub struct Discovery {
    egress: Arc<Egress>,
    catalog: Arc<Catalog>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Discovery {
    #[must_use]
    pub fn new(egress: Arc<Egress>, catalog: Arc<Catalog>) -> Self {
        Self {
            egress,
            catalog,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the bounded broadcast loop. Stops strictly after
    /// `DISCOVERY_WINDOW`, sending `DISCOVERY_BROADCASTS` frames roughly
    /// `DISCOVERY_TICK` apart (§8: "exactly ceil(60/3) ~= 20... over 60 +-
    /// eps seconds").
    pub fn start_discovery(&self) -> Result<(), HubError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HubError::AlreadyRunning);
        }

        let egress = self.egress.clone();
        let catalog = self.catalog.clone();
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            tracing::info!(broadcasts = DISCOVERY_BROADCASTS, window_secs = DISCOVERY_WINDOW.as_secs(), "discovery started");
            for i in 0..DISCOVERY_BROADCASTS {
                let frame = match catalog.get_message("routing_table_request", &MessageParams::default()) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::error!(error = %err, "routing_table_request missing from catalog");
                        break;
                    }
                };
                if let Err(err) = egress.send(frame, BROADCAST_LONG, BROADCAST_SHORT).await {
                    tracing::warn!(error = %err, "discovery broadcast failed");
                }
                if i + 1 < DISCOVERY_BROADCASTS {
                    tokio::time::sleep(DISCOVERY_TICK).await;
                }
            }
            running.store(false, Ordering::SeqCst);
            tracing::info!("discovery stopped");
        });

        *self.handle.lock().unwrap() = Some(task);
        Ok(())
    }

    /// Cancels an in-flight run immediately; a no-op if none is active.
    pub fn cancel(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egress::ModemHandle;
    use crate::registry::NodeRegistry;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn broadcasts_twenty_times_over_sixty_seconds() {
        let registry = Arc::new(NodeRegistry::new());
        let (tx, mut rx) = mpsc::channel(64);
        let egress = Arc::new(Egress::new(ModemHandle::new(tx), registry));
        let catalog = Arc::new(Catalog::new());
        let discovery = Discovery::new(egress, catalog);

        discovery.start_discovery().unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, DISCOVERY_BROADCASTS);
        assert!(!discovery.is_running());
    }

    #[tokio::test]
    async fn second_start_while_running_fails() {
        let registry = Arc::new(NodeRegistry::new());
        let (tx, _rx) = mpsc::channel(64);
        let egress = Arc::new(Egress::new(ModemHandle::new(tx), registry));
        let catalog = Arc::new(Catalog::new());
        let discovery = Discovery::new(egress, catalog);

        discovery.start_discovery().unwrap();
        assert!(matches!(discovery.start_discovery(), Err(HubError::AlreadyRunning)));
        discovery.cancel();
    }
}
