use std::{future::Future, time::Duration};

use pgmon_common::error::{PgmonError, Result};
use tokio::{
    sync::watch,
    time::{Instant, sleep_until},
};

/// Bounds every database await of one collector call.
///
/// A context ends either when its deadline passes or when the paired
/// [`CancelHandle`] fires. Clones share the same deadline and cancel signal.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every [`QueryContext`] derived from it.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl QueryContext {
    /// A context that never ends on its own.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// Tightens the deadline; an earlier existing deadline wins.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        self.cancel = Some(receiver);
        (self, CancelHandle { sender })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reports why the context has already ended, if it has.
    pub fn err(&self) -> Option<PgmonError> {
        if self.cancel.as_ref().is_some_and(|receiver| *receiver.borrow()) {
            return Some(PgmonError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(PgmonError::DeadlineExceeded);
        }
        None
    }

    /// Drives `future` unless the context ends first, in which case the
    /// future is dropped and the context error returned.
    pub async fn run<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            () = self.cancelled() => Err(PgmonError::Cancelled),
            () = self.deadline_elapsed() => Err(PgmonError::DeadlineExceeded),
            result = future => result,
        }
    }

    async fn cancelled(&self) {
        let Some(receiver) = self.cancel.as_ref() else {
            return std::future::pending().await;
        };

        let mut receiver = receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // handle dropped without cancelling
            std::future::pending::<()>().await;
        }
    }

    async fn deadline_elapsed(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
