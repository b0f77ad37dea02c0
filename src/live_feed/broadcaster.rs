//! Observer registry and broadcast.
//!
//! Each observer owns an unbounded channel; the transport side (a WebSocket
//! writer task) drains it at its own pace, so a broadcast never waits on a slow
//! client. A send fails only once the observer's receiving end is gone, and that
//! observer is then removed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error, trace};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::types::LiveEvent;
use crate::data_capture::types::RequestSummary;

pub type ObserverId = u64;

#[derive(Default)]
pub struct LiveFeed {
    observers: Mutex<HashMap<ObserverId, UnboundedSender<String>>>,
    next_observer: AtomicU64,
}

impl LiveFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn observers(&self) -> MutexGuard<'_, HashMap<ObserverId, UnboundedSender<String>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new observer. It only sees captures broadcast from now on.
    pub fn subscribe(&self) -> (ObserverId, UnboundedReceiver<String>) {
        let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let count = {
            let mut observers = self.observers();
            observers.insert(id, tx);
            observers.len()
        };
        debug!("Observer {} connected ({} total)", id, count);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        if self.observers().remove(&id).is_some() {
            debug!("Observer {} disconnected", id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers().len()
    }

    /// Sends a `new_request` event for `summary` to every observer.
    ///
    /// Returns the number of observers reached. Failed observers are removed after
    /// the pass over the snapshot completes.
    pub fn broadcast(&self, summary: &RequestSummary) -> usize {
        let message = match serde_json::to_string(&LiveEvent::NewRequest(summary.clone())) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to encode live event for request {}: {}", summary.id, e);
                return 0;
            }
        };

        let snapshot: Vec<(ObserverId, UnboundedSender<String>)> = self
            .observers()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut failed = Vec::new();
        for (id, tx) in &snapshot {
            if tx.send(message.clone()).is_err() {
                failed.push(*id);
            }
        }

        if !failed.is_empty() {
            let mut observers = self.observers();
            for id in &failed {
                observers.remove(id);
                debug!("Dropped observer {} after failed delivery", id);
            }
        }

        let delivered = snapshot.len() - failed.len();
        trace!("Request {} delivered to {} observer(s)", summary.id, delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u64) -> RequestSummary {
        RequestSummary {
            id,
            method: String::from("POST"),
            path: String::from("/inbound"),
            ts: 10.0,
            ip: String::new(),
            content_length: 5,
        }
    }

    fn event_id(message: &str) -> u64 {
        let value: serde_json::Value = serde_json::from_str(message).unwrap();
        assert_eq!(value["type"], "new_request");
        value["data"]["id"].as_u64().unwrap()
    }

    #[test]
    fn broadcast_reaches_every_observer_in_order() {
        let feed = LiveFeed::new();
        let (_, mut first) = feed.subscribe();
        let (_, mut second) = feed.subscribe();

        assert_eq!(feed.broadcast(&summary(1)), 2);
        assert_eq!(feed.broadcast(&summary(2)), 2);

        for rx in [&mut first, &mut second] {
            assert_eq!(event_id(&rx.try_recv().unwrap()), 1);
            assert_eq!(event_id(&rx.try_recv().unwrap()), 2);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn late_observer_gets_no_backlog() {
        let feed = LiveFeed::new();
        feed.broadcast(&summary(1));

        let (_, mut rx) = feed.subscribe();
        assert!(rx.try_recv().is_err());

        feed.broadcast(&summary(2));
        assert_eq!(event_id(&rx.try_recv().unwrap()), 2);
    }

    #[test]
    fn failed_observer_is_dropped_without_affecting_others() {
        let feed = LiveFeed::new();
        let (_, gone) = feed.subscribe();
        let (_, mut alive) = feed.subscribe();
        drop(gone);

        assert_eq!(feed.broadcast(&summary(7)), 1);
        assert_eq!(feed.observer_count(), 1);
        assert_eq!(event_id(&alive.try_recv().unwrap()), 7);
    }

    #[test]
    fn unsubscribe_removes_observer() {
        let feed = LiveFeed::new();
        let (id, _rx) = feed.subscribe();
        assert_eq!(feed.observer_count(), 1);

        feed.unsubscribe(id);
        feed.unsubscribe(id);
        assert_eq!(feed.observer_count(), 0);
        assert_eq!(feed.broadcast(&summary(1)), 0);
    }
}
