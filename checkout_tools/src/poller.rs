//! A bounded, cancellable confirmation poller.
//!
//! After a customer starts a payment whose confirmation arrives asynchronously (a PromptPay QR code, a bank redirect),
//! the checkout asks the payment server whether the payment has been confirmed yet. The poller checks once straight
//! away and then once per interval, until the payment is confirmed, the attempts run out, or it is cancelled.
//!
//! ```text
//!   Idle ──► Polling ──► Confirmed
//!               │  └───► Exhausted
//!               └──────► Cancelled
//! ```
//!
//! Only one check is ever in flight. A failed check counts as "no answer this tick". Cancelling, either with
//! [`PollerHandle::cancel`] or by dropping the handle, stops the timer and abandons any check in progress.
use std::{future::Future, sync::Arc, time::Duration};

use log::*;
use payment_reconciler::{db_types::PaymentStatus, status_objects::StatusQuery};
use storefront_server::data_objects::PaymentStatusResponse;
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

#[derive(Debug, Clone, Error)]
pub enum StatusCheckError {
    #[error("Could not reach the payment server. {0}")]
    Transport(String),
    #[error("The payment server answered with status {status}. {message}")]
    Server { status: u16, message: String },
    #[error("Could not read the payment server's answer. {0}")]
    InvalidResponse(String),
}

/// One status check against the payment server.
pub trait StatusCheck: Send + Sync + 'static {
    fn check(
        &self,
        query: &StatusQuery,
    ) -> impl Future<Output = Result<PaymentStatusResponse, StatusCheckError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Total number of checks, including the first, immediate one.
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(3), max_attempts: 40 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling { attempts: u32 },
    Confirmed,
    Exhausted,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollState::Confirmed | PollState::Exhausted | PollState::Cancelled)
    }

    pub fn attempts(&self) -> Option<u32> {
        match self {
            PollState::Polling { attempts } => Some(*attempts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Confirmed { attempts: u32, response: PaymentStatusResponse },
    /// Not confirmed within the allowed checks. The payment may still be confirmed later.
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl PollOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Confirmed { attempts, .. } => *attempts,
            PollOutcome::Exhausted { attempts } => *attempts,
            PollOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, PollOutcome::Confirmed { .. })
    }
}

pub struct ConfirmationPoller<S> {
    source: Arc<S>,
    config: PollerConfig,
}

impl<S: StatusCheck> ConfirmationPoller<S> {
    pub fn new(source: S, config: PollerConfig) -> Self {
        Self { source: Arc::new(source), config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Starts polling for `query` on a background task. Must be called from within a tokio runtime.
    pub fn start(&self, query: StatusQuery) -> PollerHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(PollState::Idle);
        let source = Arc::clone(&self.source);
        let config = self.config;
        let task = tokio::spawn(run_poller(source, query, config, cancel_rx, state_tx));
        PollerHandle { cancel: cancel_tx, state: state_rx, task: Some(task) }
    }
}

/// Owns a running poller. Dropping the handle cancels the poller.
pub struct PollerHandle {
    cancel: watch::Sender<bool>,
    state: watch::Receiver<PollState>,
    task: Option<JoinHandle<PollOutcome>>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// A receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    /// Waits for the poller to reach a terminal state.
    pub async fn wait(mut self) -> PollOutcome {
        let attempts = self.state().attempts().unwrap_or_default();
        let Some(task) = self.task.take() else {
            return PollOutcome::Cancelled { attempts };
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("⏱️ The poller task failed. {e}");
                PollOutcome::Cancelled { attempts: self.state().attempts().unwrap_or(attempts) }
            },
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

async fn run_poller<S: StatusCheck>(
    source: Arc<S>,
    query: StatusQuery,
    config: PollerConfig,
    mut cancel: watch::Receiver<bool>,
    state: watch::Sender<PollState>,
) -> PollOutcome {
    let mut timer = interval(config.interval);
    // A slow check pushes the next one back rather than causing a burst
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts = 0;
    loop {
        if attempts >= config.max_attempts {
            info!("⏱️ No confirmation for {query:?} after {attempts} checks");
            state.send_replace(PollState::Exhausted);
            return PollOutcome::Exhausted { attempts };
        }
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            _ = timer.tick() => {},
        }
        attempts += 1;
        state.send_replace(PollState::Polling { attempts });
        trace!("⏱️ Status check {attempts}/{} for {query:?}", config.max_attempts);
        let result = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break,
            result = source.check(&query) => result,
        };
        match result {
            Ok(response) if response.status == PaymentStatus::Confirmed => {
                info!("⏱️ {query:?} confirmed after {attempts} checks");
                state.send_replace(PollState::Confirmed);
                return PollOutcome::Confirmed { attempts, response };
            },
            Ok(response) => debug!("⏱️ {query:?} is still {:?}", response.status),
            Err(e) => debug!("⏱️ No answer for {query:?} this time. {e}"),
        }
    }
    debug!("⏱️ Polling for {query:?} cancelled after {attempts} checks");
    state.send_replace(PollState::Cancelled);
    PollOutcome::Cancelled { attempts }
}

/// Resolves once cancellation is requested, or once the handle has gone away.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|c| *c).await;
}
