use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use swapdesk_provider::ExchangeProvider;
use swapdesk_types::{OrderStatus, StatusSnapshot, StatusTransition, SwapError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Polling cadence and escalation policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    /// Consecutive failed polls before a "temporarily unavailable" notice
    pub transient_failure_threshold: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            transient_failure_threshold: 3,
        }
    }
}

/// What a subscriber is told
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// A poll observed a status different from the last known one
    Changed {
        snapshot: StatusSnapshot,
        transition: StatusTransition,
    },
    /// Polls have kept failing; the last known status still stands and
    /// polling continues
    TemporarilyUnavailable {
        consecutive_failures: u32,
        error: SwapError,
    },
}

type UpdateFn = Arc<dyn Fn(StatusUpdate) + Send + Sync>;

/// Starts one polling task per tracked order
pub struct StatusTracker {
    provider: Arc<dyn ExchangeProvider>,
    config: TrackerConfig,
}

impl StatusTracker {
    pub fn new(provider: Arc<dyn ExchangeProvider>, config: TrackerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Poll `order_id` until a terminal status or until the returned
    /// subscription is cancelled or dropped. The first poll runs at once.
    pub fn subscribe<F>(&self, order_id: impl Into<String>, on_update: F) -> StatusSubscription
    where
        F: Fn(StatusUpdate) + Send + Sync + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(None);
        let history = Arc::new(Mutex::new(Vec::new()));

        let poller = Poller {
            provider: self.provider.clone(),
            order_id: order_id.into(),
            config: self.config.clone(),
            on_update: Arc::new(on_update),
            status_tx,
            history: history.clone(),
        };
        let handle = tokio::spawn(poller.run(cancel_rx));

        StatusSubscription {
            cancel: cancel_tx,
            status: status_rx,
            history,
            handle: Some(handle),
        }
    }
}

/// Handle to a running status poll; dropping it stops the poll
pub struct StatusSubscription {
    cancel: watch::Sender<bool>,
    status: watch::Receiver<Option<OrderStatus>>,
    history: Arc<Mutex<Vec<StatusTransition>>>,
    handle: Option<JoinHandle<Option<OrderStatus>>>,
}

impl StatusSubscription {
    /// Stop polling. No request is issued after this returns.
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    /// Last status observed by a successful poll
    pub fn latest_status(&self) -> Option<OrderStatus> {
        *self.status.borrow()
    }

    /// Every status change observed so far, oldest first
    pub async fn history(&self) -> Vec<StatusTransition> {
        self.history.lock().await.clone()
    }

    /// Whether the poll loop has ended
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the poll loop to reach a terminal status and return it
    pub async fn finished(mut self) -> Option<OrderStatus> {
        let handle = self.handle.take()?;
        match handle.await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "status poll task failed");
                self.latest_status()
            }
        }
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

struct Poller {
    provider: Arc<dyn ExchangeProvider>,
    order_id: String,
    config: TrackerConfig,
    on_update: UpdateFn,
    status_tx: watch::Sender<Option<OrderStatus>>,
    history: Arc<Mutex<Vec<StatusTransition>>>,
}

impl Poller {
    async fn run(self, mut cancel: watch::Receiver<bool>) -> Option<OrderStatus> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last: Option<OrderStatus> = None;
        let mut failures: u32 = 0;

        info!(order_id = %self.order_id, "status tracking started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.changed() => break,
            }

            let polled = tokio::select! {
                result = self.provider.exchange_status(&self.order_id) => result,
                _ = cancel.changed() => break,
            };

            match polled {
                Ok(snapshot) => {
                    failures = 0;
                    let status = snapshot.status;

                    if last != Some(status) {
                        self.observe(last, snapshot).await;
                        last = Some(status);
                    } else {
                        debug!(order_id = %self.order_id, status = %status, "status unchanged");
                    }

                    if status.is_terminal() {
                        info!(order_id = %self.order_id, status = %status, "terminal status, polling stopped");
                        return last;
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        order_id = %self.order_id,
                        consecutive_failures = failures,
                        transient = e.is_transient(),
                        error = %e,
                        "status poll failed, keeping last known status"
                    );

                    if failures == self.config.transient_failure_threshold {
                        error!(
                            order_id = %self.order_id,
                            consecutive_failures = failures,
                            "order status temporarily unavailable"
                        );
                        (self.on_update)(StatusUpdate::TemporarilyUnavailable {
                            consecutive_failures: failures,
                            error: SwapError::StatusPollTransientFailure(e.to_string()),
                        });
                    }
                }
            }
        }

        info!(order_id = %self.order_id, "status tracking cancelled");
        last
    }

    async fn observe(&self, previous: Option<OrderStatus>, snapshot: StatusSnapshot) {
        let transition = StatusTransition::observe(previous, snapshot.status, Utc::now());
        if transition.expected {
            info!(
                order_id = %self.order_id,
                from = ?previous,
                to = %snapshot.status,
                "order status changed"
            );
        } else {
            warn!(
                order_id = %self.order_id,
                from = ?previous,
                to = %snapshot.status,
                "unexpected order status transition"
            );
        }

        self.history.lock().await.push(transition.clone());
        self.status_tx.send_replace(Some(snapshot.status));
        (self.on_update)(StatusUpdate::Changed {
            snapshot,
            transition,
        });
    }
}
