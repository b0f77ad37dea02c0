//! In-memory retention store for captured requests.
//!
//! Records are kept in insertion order, which is also id order. All state sits
//! behind a single mutex: id allocation and the push happen under one lock so
//! two concurrent captures can never share an id or land out of order. Pruning
//! is a separate store operation run after each append.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::debug;

use crate::data_capture::record_builder::epoch_seconds;
use crate::data_capture::types::{CapturedRequest, RequestSummary};
use crate::error_handling::types::StoreError;

/// Count and age limits applied by [`RequestStore::prune`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    /// Maximum age in seconds; `<= 0` disables
    pub retention_seconds: i64,
    /// Maximum number of records; `<= 0` disables
    pub max_requests: i64,
}

impl RetentionPolicy {
    pub fn new(retention_seconds: i64, max_requests: i64) -> Self {
        Self {
            retention_seconds,
            max_requests,
        }
    }

    fn window(&self) -> Option<f64> {
        (self.retention_seconds > 0).then(|| self.retention_seconds as f64)
    }

    fn capacity(&self) -> Option<usize> {
        usize::try_from(self.max_requests).ok().filter(|max| *max > 0)
    }
}

struct StoreState {
    requests: Vec<Arc<CapturedRequest>>,
    next_id: u64,
}

pub struct RequestStore {
    state: Mutex<StoreState>,
    policy: RetentionPolicy,
}

impl RequestStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            state: Mutex::new(StoreState {
                requests: Vec::new(),
                next_id: 1,
            }),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    // Store operations never leave the state half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates the next id, builds the record with it and appends it to the tail.
    ///
    /// `build` runs while the store is locked and must not block.
    pub fn append_with<F>(&self, build: F) -> Arc<CapturedRequest>
    where
        F: FnOnce(u64) -> CapturedRequest,
    {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let record = Arc::new(build(id));
        state.requests.push(Arc::clone(&record));
        record
    }

    pub fn get(&self, id: u64) -> Result<Arc<CapturedRequest>, StoreError> {
        self.lock()
            .requests
            .iter()
            .find(|request| request.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Raw reconstruction of record `id`.
    pub fn raw(&self, id: u64) -> Result<Vec<u8>, StoreError> {
        let request = self.get(id)?;
        request.raw.clone().ok_or(StoreError::RawUnavailable(id))
    }

    /// Summaries, most recently captured first.
    pub fn list(&self) -> Vec<RequestSummary> {
        self.lock()
            .requests
            .iter()
            .rev()
            .map(|request| RequestSummary::from(request.as_ref()))
            .collect()
    }

    pub fn delete(&self, id: u64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let position = state
            .requests
            .iter()
            .position(|request| request.id == id)
            .ok_or(StoreError::NotFound(id))?;
        state.requests.remove(position);
        Ok(())
    }

    /// Removes every record. Ids keep counting from where they were.
    pub fn delete_all(&self) -> usize {
        let mut state = self.lock();
        let removed = state.requests.len();
        state.requests.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies the retention policy at the current time, returning the number evicted.
    pub fn prune(&self) -> usize {
        self.prune_at(epoch_seconds(Utc::now()))
    }

    /// Applies the retention policy as of `now` (seconds since the epoch).
    ///
    /// Age eviction runs first, then the count limit keeps the newest records by
    /// timestamp. Running it twice with the same `now` changes nothing the second time.
    pub fn prune_at(&self, now: f64) -> usize {
        let mut state = self.lock();
        let before = state.requests.len();

        if let Some(window) = self.policy.window() {
            state.requests.retain(|request| now - request.ts <= window);
        }

        if let Some(max) = self.policy.capacity() {
            if state.requests.len() > max {
                let mut by_age: Vec<(f64, u64)> = state
                    .requests
                    .iter()
                    .map(|request| (request.ts, request.id))
                    .collect();
                by_age.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
                let keep: HashSet<u64> = by_age.into_iter().take(max).map(|(_, id)| id).collect();
                state.requests.retain(|request| keep.contains(&request.id));
            }
        }

        let evicted = before - state.requests.len();
        if evicted > 0 {
            debug!(
                "Pruned {} request(s), {} remaining",
                evicted,
                state.requests.len()
            );
        }
        evicted
    }
}
