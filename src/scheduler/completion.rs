// src/scheduler/completion.rs

//! Broadcast-once completion signal.
//!
//! One [`Completion`] per executor, any number of [`Waiter`]s. Resolving
//! publishes the same terminal status to every waiter, including waiters
//! that subscribe or start waiting afterwards.

use futures::future::try_join_all;
use tokio::sync::watch;

use crate::errors::{ExecError, Status};

#[derive(Debug)]
pub struct Completion {
    tx: watch::Sender<Option<Status>>,
}

#[derive(Debug, Clone)]
pub struct Waiter {
    rx: watch::Receiver<Option<Status>>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn waiter(&self) -> Waiter {
        Waiter {
            rx: self.tx.subscribe(),
        }
    }

    /// Publish the terminal status. Consumes the completion, so it can only
    /// happen once.
    pub fn resolve(self, status: Status) {
        self.tx.send_replace(Some(status));
    }
}

impl Waiter {
    /// Wait for the terminal status.
    ///
    /// A completion dropped without being resolved reports an internal
    /// error instead of hanging.
    pub async fn wait(mut self) -> Status {
        match self.rx.wait_for(Option::is_some).await {
            Ok(resolved) => match resolved.as_ref() {
                Some(status) => status.clone(),
                None => Err(dropped()),
            },
            Err(_) => Err(dropped()),
        }
    }
}

fn dropped() -> ExecError {
    ExecError::Internal("completion dropped before it was resolved".to_string())
}

/// Wait until every waiter succeeded, or return the first failure observed.
///
/// Arrival order does not matter; the first failure short-circuits the
/// remaining waits.
pub async fn wait_all(waiters: Vec<Waiter>) -> Status {
    if waiters.is_empty() {
        return Ok(());
    }
    try_join_all(waiters.into_iter().map(Waiter::wait))
        .await
        .map(|_| ())
}
