//! Background comet poller.
//!
//! Runs the blocking `comet` long-poll on a dedicated tokio task and delivers
//! decoded events over a bounded channel. Transient failures (transport
//! errors and timeouts) are retried with exponential backoff; a successful
//! poll resets the attempt counter. Anything else, or running out of retries,
//! is delivered as the final item before the task ends.
//!
//! Cancelling drops the in-flight poll, which aborts its HTTP request, and
//! delivers [`NsoError::Cancelled`] if the channel has room for it.

use std::sync::Arc;

use nso_core::retry::backoff_delay;
use nso_core::{CometId, NsoError, Result, RetryConfig};
use nso_rpc::CometEvent;
use nso_settings::PollerSettings;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::comet::poll_comet;
use crate::session::Session;

/// Default capacity of the event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Poller behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct PollerConfig {
    /// Capacity of the event channel.
    pub channel_capacity: usize,
    /// Backoff for transient failures.
    pub retry: RetryConfig,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            retry: RetryConfig::default(),
        }
    }
}

impl From<&PollerSettings> for PollerConfig {
    fn from(settings: &PollerSettings) -> Self {
        Self {
            channel_capacity: settings.channel_capacity,
            retry: settings.retry.clone(),
        }
    }
}

/// Handle to a running poller task.
#[derive(Debug)]
pub struct PollerHandle {
    events: mpsc::Receiver<Result<CometEvent>>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PollerHandle {
    /// Next event, or `None` once the task has ended and the channel is
    /// drained. An `Err` item is always the last one.
    pub async fn recv(&mut self) -> Option<Result<CometEvent>> {
        self.events.recv().await
    }

    /// Token that stops the task when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the task has ended.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the task and wait for it to end.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "comet poller task failed");
        }
    }
}

/// Spawn a poller for `comet_id` on `session`.
///
/// The capacity is clamped to at least 1.
pub fn spawn_poller(session: Arc<Session>, comet_id: CometId, config: PollerConfig) -> PollerHandle {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let cancel = CancellationToken::new();
    let join = tokio::spawn(run_poller(
        session,
        comet_id,
        config.retry,
        tx,
        cancel.clone(),
    ));
    PollerHandle {
        events: rx,
        cancel,
        join,
    }
}

async fn run_poller(
    session: Arc<Session>,
    comet_id: CometId,
    retry: RetryConfig,
    tx: mpsc::Sender<Result<CometEvent>>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    debug!(%comet_id, "comet poller started");

    loop {
        let outcome = tokio::select! {
            () = cancel.cancelled() => return report_cancelled(&comet_id, &tx),
            () = tx.closed() => break,
            outcome = poll_comet(&session, &comet_id) => outcome,
        };

        match outcome {
            Ok(events) => {
                attempt = 0;
                for event in events {
                    tokio::select! {
                        () = cancel.cancelled() => return report_cancelled(&comet_id, &tx),
                        sent = tx.send(Ok(event)) => {
                            if sent.is_err() {
                                debug!(%comet_id, "event receiver dropped");
                                return;
                            }
                        }
                    }
                }
            }
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = backoff_delay(&retry, attempt);
                attempt += 1;
                warn!(
                    %comet_id,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "comet poll failed, retrying"
                );
                tokio::select! {
                    () = cancel.cancelled() => return report_cancelled(&comet_id, &tx),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                warn!(%comet_id, category = e.category(), error = %e, "comet poller giving up");
                let _ = tx.send(Err(e)).await;
                return;
            }
        }
    }

    debug!(%comet_id, "comet poller stopped");
}

fn report_cancelled(comet_id: &CometId, tx: &mpsc::Sender<Result<CometEvent>>) {
    debug!(%comet_id, "comet poller cancelled");
    let _ = tx.try_send(Err(NsoError::Cancelled));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
