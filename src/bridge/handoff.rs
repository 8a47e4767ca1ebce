//! Rendezvous between command producers and the collector's fetch.
//!
//! # Responsibilities
//! - Let one producer at a time offer a command for a bounded time
//! - Let exactly one fetch wait for it; a newer fetch cancels the older one
//! - Tell the producer whether its command was actually claimed
//!
//! # Design Decisions
//! - An offer travels with a oneshot claim sender; sending on it is the pickup
//! - Offers whose producer gave up stay in the slot until a fetch discards them
//! - Cancelling a fetch never blocks and is a no-op when nobody waits

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::{BridgeError, BridgeResult};
use crate::observability::metrics;

struct Offer {
    payload: String,
    claim: oneshot::Sender<()>,
}

/// Pickup deadlines for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupPolicy {
    /// Deadline while nothing has been picked up on this connection yet.
    pub short: Duration,
    /// Deadline once the collector is known to be polling.
    pub long: Duration,
}

impl Default for PickupPolicy {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(1),
            long: Duration::from_secs(30),
        }
    }
}

impl PickupPolicy {
    pub fn deadline(&self, recently_picked_up: bool) -> Duration {
        if recently_picked_up {
            self.long
        } else {
            self.short
        }
    }
}

/// Single-slot handoff shared by every connection.
pub struct CommandHandoff {
    offers_tx: mpsc::Sender<Offer>,
    offers_rx: tokio::sync::Mutex<mpsc::Receiver<Offer>>,
    /// Cancels the fetch currently waiting, if any.
    waiter: Mutex<Option<oneshot::Sender<()>>>,
}

impl std::fmt::Debug for CommandHandoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandoff").finish_non_exhaustive()
    }
}

impl Default for CommandHandoff {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandoff {
    pub fn new() -> Self {
        let (offers_tx, offers_rx) = mpsc::channel(1);
        Self {
            offers_tx,
            offers_rx: tokio::sync::Mutex::new(offers_rx),
            waiter: Mutex::new(None),
        }
    }

    fn lock_waiter(&self) -> MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.waiter.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Offer `payload` until a fetch claims it or `deadline` passes.
    ///
    /// Returns whether the payload was claimed.
    pub async fn offer(&self, payload: String, deadline: Duration) -> bool {
        let (claim, claimed) = oneshot::channel();
        let attempt = async {
            if self.offers_tx.send(Offer { payload, claim }).await.is_err() {
                return false;
            }
            claimed.await.is_ok()
        };
        tokio::time::timeout(deadline, attempt).await.unwrap_or(false)
    }

    /// Wait for the next offered payload.
    ///
    /// Resolves with `Superseded` when another fetch starts, and with
    /// `FetchTimeout` when nothing is claimed within `timeout`.
    pub async fn fetch(&self, timeout: Duration) -> BridgeResult<String> {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Some(previous) = self.lock_waiter().replace(cancel_tx) {
            let _ = previous.send(());
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel_rx => Err(BridgeError::Superseded),
            payload = self.claim_next() => Ok(payload),
            _ = tokio::time::sleep(timeout) => Err(BridgeError::FetchTimeout(timeout)),
        };

        metrics::record_fetch_outcome(match &outcome {
            Ok(_) => "delivered",
            Err(BridgeError::Superseded) => "superseded",
            Err(_) => "timeout",
        });
        outcome
    }

    async fn claim_next(&self) -> String {
        let mut offers = self.offers_rx.lock().await;
        loop {
            match offers.recv().await {
                Some(offer) => {
                    if offer.claim.send(()).is_ok() {
                        return offer.payload;
                    }
                    tracing::debug!("Discarding command whose pickup deadline passed");
                }
                None => return std::future::pending().await,
            }
        }
    }
}
