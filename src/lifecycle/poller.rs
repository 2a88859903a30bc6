use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use crate::data::order_api::OrderApi;
use crate::data::types::{Bid, OrderId};

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Bids(Vec<Bid>),
    Failed(String),
}

/// Handle to a running bid poller. Stopping (or dropping) it halts the loop
/// and aborts the task, so an in-flight request never reports back.
pub struct BidPoller {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BidPoller {
    /// Fetch immediately, then every `interval` after a success and every
    /// `retry` after a failure, until stopped.
    pub fn spawn(
        api: Arc<dyn OrderApi>,
        order_id: OrderId,
        interval: Duration,
        retry: Duration,
        events: mpsc::Sender<PollEvent>,
    ) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                let (event, delay) = match api.fetch_bids(&order_id).await {
                    Ok(bids) => (PollEvent::Bids(bids), interval),
                    Err(e) => {
                        warn!("Failed to fetch bids for order {}: {}", order_id, e);
                        (PollEvent::Failed(e.to_string()), retry)
                    }
                };

                if *stopped.borrow() || events.send(event).await.is_err() {
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stopped.changed() => break,
                }
            }
            debug!("Bid poller for order {} stopped", order_id);
        });

        Self { stop, task }
    }

    pub fn stop(&self) {
        let _ = self.stop.send(true);
        self.task.abort();
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for BidPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
