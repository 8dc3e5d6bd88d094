//! Live query subscriptions
//!
//! Every write publishes a [`Change`] on the shared [`ChangeFeed`]. A
//! [`Subscription`] re-runs its query whenever a relevant change arrives and
//! exposes the latest snapshot. Dropping the subscription stops the listener.

use futures::Stream;
use std::future::Future;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::registration::error::RegistrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Events,
    Registrations(String),
    Messages,
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn publish(&self, change: Change) {
        // No receivers just means nobody is listening right now
        let _ = self.sender.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Subscription<T> {
    receiver: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// Runs `query` once for the initial snapshot, then again after every change
    /// accepted by `relevant`. A failing query yields `T::default()`.
    pub(crate) async fn start<Q, Fut, R>(
        label: &'static str,
        feed: &ChangeFeed,
        relevant: R,
        query: Q,
    ) -> Self
    where
        Q: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RegistrationError>> + Send + 'static,
        R: Fn(&Change) -> bool + Send + 'static,
    {
        // Subscribe before the first query so no write slips between them
        let mut changes = feed.subscribe();
        let initial = load(label, &query).await;
        let (sender, receiver) = watch::channel(initial);

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) if relevant(&change) => {}
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("{} listener lagged by {} changes, refreshing", label, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }

                let snapshot = load(label, &query).await;
                if sender.send(snapshot).is_err() {
                    break;
                }
            }
        });

        Self { receiver, task }
    }

    /// Latest snapshot without waiting.
    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot. `None` once the listener has stopped.
    pub async fn next_snapshot(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Current snapshot followed by every later one.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold((self, true), |(mut sub, first)| async move {
            if first {
                let snapshot = sub.receiver.borrow_and_update().clone();
                return Some((snapshot, (sub, false)));
            }
            let snapshot = sub.next_snapshot().await?;
            Some((snapshot, (sub, false)))
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn load<T, Q, Fut>(label: &'static str, query: &Q) -> T
where
    T: Default,
    Q: Fn() -> Fut,
    Fut: Future<Output = Result<T, RegistrationError>>,
{
    match query().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("{} listener error: {}", label, e);
            T::default()
        }
    }
}
