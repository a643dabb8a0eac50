//! Keyed cache of server data with interval revalidation.
//!
//! Each key moves `Idle -> Fetching -> Settled | Failed -> Fetching ...`. At most
//! one request per key is outstanding; callers that revalidate while a fetch is
//! running wait on that fetch instead of issuing another. Responses are applied
//! in completion order with no sequence token, so a slow response can land
//! after a fresher one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::filter::QueryKey;

pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;
pub type Fetcher<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("no live subscription for {0}")]
    UnknownKey(QueryKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Settled,
    Failed,
}

/// Point-in-time view of one key. `data` survives failed refreshes.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<String>,
    pub is_validating: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Bumped every time a fetch settles, successful or not.
    pub version: u64,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_validating: false,
            last_fetched_at: None,
            version: 0,
        }
    }
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_validating: self.is_validating,
            last_fetched_at: self.last_fetched_at,
            version: self.version,
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn phase(&self) -> Phase {
        if self.is_validating {
            Phase::Fetching
        } else if self.error.is_some() {
            Phase::Failed
        } else if self.data.is_some() {
            Phase::Settled
        } else {
            Phase::Idle
        }
    }
}

struct InFlight {
    id: u64,
    done: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

struct Slot<T> {
    entry: CacheEntry<T>,
    fetcher: Fetcher<T>,
    inflight: Option<InFlight>,
    subscribers: usize,
    timer: Option<JoinHandle<()>>,
}

struct Inner<T> {
    slots: HashMap<QueryKey, Slot<T>>,
    next_fetch_id: u64,
}

pub struct QuerySynchronizer<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for QuerySynchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for QuerySynchronizer<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Send + Sync + 'static> QuerySynchronizer<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_fetch_id: 0,
            })),
        }
    }

    /// Registers interest in `key`. The first subscriber installs the fetcher and
    /// the revalidation timer; a fetch starts right away when nothing is cached.
    /// Dropping the last `Subscription` cancels the timer and any running fetch.
    pub fn subscribe(
        &self,
        key: QueryKey,
        fetcher: Fetcher<T>,
        interval: Duration,
    ) -> Subscription<T> {
        let mut inner = lock(&self.inner);
        let needs_fetch = match inner.slots.get_mut(&key) {
            Some(slot) => {
                slot.subscribers += 1;
                slot.entry.data.is_none() && slot.inflight.is_none()
            }
            None => {
                debug!(%key, interval_ms = interval.as_millis() as u64, "subscribed");
                let timer = self.spawn_timer(key, interval);
                inner.slots.insert(
                    key,
                    Slot {
                        entry: CacheEntry::default(),
                        fetcher,
                        inflight: None,
                        subscribers: 1,
                        timer: Some(timer),
                    },
                );
                true
            }
        };
        if needs_fetch {
            self.attach_or_start(&mut inner, key);
        }
        drop(inner);

        Subscription {
            sync: self.clone(),
            key,
        }
    }

    /// Forces a refresh of `key` and waits for it to settle. Joins the running
    /// fetch when there is one.
    pub async fn revalidate(&self, key: QueryKey) -> Result<CacheEntry<T>, SyncError> {
        let mut done = {
            let mut inner = lock(&self.inner);
            self.attach_or_start(&mut inner, key)
                .ok_or(SyncError::UnknownKey(key))?
        };

        loop {
            let settled = *done.borrow();
            if settled || done.changed().await.is_err() {
                break;
            }
        }

        self.snapshot(key).ok_or(SyncError::UnknownKey(key))
    }

    pub fn snapshot(&self, key: QueryKey) -> Option<CacheEntry<T>> {
        lock(&self.inner)
            .slots
            .get(&key)
            .map(|slot| slot.entry.clone())
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        lock(&self.inner).slots.keys().copied().collect()
    }

    fn attach_or_start(
        &self,
        inner: &mut Inner<T>,
        key: QueryKey,
    ) -> Option<watch::Receiver<bool>> {
        let fetch_id = inner.next_fetch_id;
        let slot = inner.slots.get_mut(&key)?;
        if let Some(inflight) = &slot.inflight {
            debug!(%key, "joining in-flight fetch");
            return Some(inflight.done.clone());
        }

        let (tx, rx) = watch::channel(false);
        let fetch = (slot.fetcher)();
        let shared = Arc::clone(&self.inner);
        debug!(%key, fetch_id, "fetch started");
        let task = tokio::spawn(async move {
            let result = fetch.await;
            settle(&shared, key, fetch_id, result);
            let _ = tx.send(true);
        });

        slot.entry.is_validating = true;
        slot.inflight = Some(InFlight {
            id: fetch_id,
            done: rx.clone(),
            task,
        });
        inner.next_fetch_id += 1;
        Some(rx)
    }

    fn spawn_timer(&self, key: QueryKey, interval: Duration) -> JoinHandle<()> {
        let sync = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = sync.revalidate(key).await {
                    debug!(%key, error = %e, "timer stopped");
                    break;
                }
            }
        })
    }

    fn release(&self, key: QueryKey) {
        let mut inner = lock(&self.inner);
        let Some(slot) = inner.slots.get_mut(&key) else {
            return;
        };
        slot.subscribers = slot.subscribers.saturating_sub(1);
        if slot.subscribers > 0 {
            return;
        }
        if let Some(slot) = inner.slots.remove(&key) {
            if let Some(timer) = slot.timer {
                timer.abort();
            }
            if let Some(inflight) = slot.inflight {
                inflight.task.abort();
            }
            debug!(%key, "released");
        }
    }
}

fn settle<T>(
    inner: &Mutex<Inner<T>>,
    key: QueryKey,
    fetch_id: u64,
    result: Result<T, ApiError>,
) {
    let mut inner = lock(inner);
    let Some(slot) = inner.slots.get_mut(&key) else {
        debug!(%key, fetch_id, "dropping response for released key");
        return;
    };

    if slot.inflight.as_ref().map(|f| f.id) == Some(fetch_id) {
        slot.inflight = None;
        slot.entry.is_validating = false;
    }
    slot.entry.version += 1;

    match result {
        Ok(data) => {
            slot.entry.data = Some(Arc::new(data));
            slot.entry.error = None;
            slot.entry.last_fetched_at = Some(Utc::now());
            debug!(%key, fetch_id, "fetch settled");
        }
        Err(e) => {
            warn!(%key, fetch_id, error = %e, "fetch failed, keeping previous data");
            slot.entry.error = Some(e.to_string());
        }
    }
}

/// Keeps a key alive while held.
pub struct Subscription<T: Send + Sync + 'static> {
    sync: QuerySynchronizer<T>,
    key: QueryKey,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub fn key(&self) -> QueryKey {
        self.key
    }

    pub fn snapshot(&self) -> CacheEntry<T> {
        self.sync.snapshot(self.key).unwrap_or_default()
    }

    pub async fn revalidate(&self) -> Result<CacheEntry<T>, SyncError> {
        self.sync.revalidate(self.key).await
    }
}

impl<T: Send + Sync + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.sync.release(self.key);
    }
}
