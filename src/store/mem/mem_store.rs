//! In-process hierarchical store with native prefix watches.
//!
//! Writes are dispatched to matching watchers while the write lock is held, so every
//! watcher observes mutations in exactly the order they were applied. Watcher channels
//! are unbounded: a slow watcher never blocks a writer.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;
use tracing::trace;

use crate::store::KvStore;
use crate::store::NativeWatchStream;
use crate::store::StoreEntry;
use crate::store::StoreEvent;
use crate::store::StoreEventKind;
use crate::store::WatchBatch;
use crate::Result;
use crate::StoreError;

/// Internal watcher state
#[derive(Debug)]
struct MemWatcher {
    prefix: String,
    sender: mpsc::UnboundedSender<Result<WatchBatch>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Bytes>>,

    /// Active watches by id
    watchers: DashMap<u64, MemWatcher>,

    next_watch_id: AtomicU64,

    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one key and notifies matching watchers
    pub fn put_value(
        &self,
        path: &str,
        value: impl Into<Bytes>,
    ) {
        self.apply_batch(vec![StoreEvent {
            kind: StoreEventKind::Put,
            path: path.to_string(),
            value: value.into(),
        }]);
    }

    /// Deletes one key; returns whether it existed. Watchers are only notified for
    /// keys that existed.
    pub fn delete(
        &self,
        path: &str,
    ) -> bool {
        let existed = self.data.read().contains_key(path);
        if existed {
            self.apply_batch(vec![StoreEvent {
                kind: StoreEventKind::Delete,
                path: path.to_string(),
                value: Bytes::new(),
            }]);
        }
        existed
    }

    /// Writes several keys as one revision: watchers receive them in a single batch.
    pub fn put_batch<K, V>(
        &self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) where
        K: Into<String>,
        V: Into<Bytes>,
    {
        let events = entries
            .into_iter()
            .map(|(path, value)| StoreEvent {
                kind: StoreEventKind::Put,
                path: path.into(),
                value: value.into(),
            })
            .collect();
        self.apply_batch(events);
    }

    /// Simulates a server-side watch cancellation: every watcher receives one cancelled
    /// batch, then its stream ends.
    pub fn cancel_watches(
        &self,
        reason: &str,
    ) {
        self.drain_watchers(|| {
            Ok(WatchBatch {
                events: vec![],
                canceled: Some(reason.to_string()),
            })
        });
    }

    /// Simulates a transport fault on every open watch stream
    pub fn fail_watches(
        &self,
        reason: &str,
    ) {
        self.drain_watchers(|| Err(StoreError::Transport(reason.to_string()).into()));
    }

    /// Ends every watch stream normally
    pub fn close_watches(&self) {
        self.watchers.clear();
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_batch(
        &self,
        events: Vec<StoreEvent>,
    ) {
        if events.is_empty() {
            return;
        }

        let mut data = self.data.write();
        for event in &events {
            match event.kind {
                StoreEventKind::Put => {
                    data.insert(event.path.clone(), event.value.clone());
                }
                StoreEventKind::Delete => {
                    data.remove(&event.path);
                }
            }
        }

        // Dispatch under the write lock to keep store order across writers
        self.watchers.retain(|id, watcher| {
            let matching: Vec<StoreEvent> = events
                .iter()
                .filter(|e| e.path.starts_with(&watcher.prefix))
                .cloned()
                .collect();
            if matching.is_empty() {
                return true;
            }
            let delivered = watcher
                .sender
                .send(Ok(WatchBatch {
                    events: matching,
                    canceled: None,
                }))
                .is_ok();
            if !delivered {
                trace!(watch_id = id, "Dropping watcher with closed stream");
            }
            delivered
        });
        drop(data);
    }

    fn drain_watchers(
        &self,
        last: impl Fn() -> Result<WatchBatch>,
    ) {
        let ids: Vec<u64> = self.watchers.iter().map(|w| *w.key()).collect();
        for id in ids {
            if let Some((_, watcher)) = self.watchers.remove(&id) {
                let _ = watcher.sender.send(last());
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed.into());
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(
        &self,
        path: &str,
    ) -> Result<Option<StoreEntry>> {
        self.ensure_open()?;
        let data = self.data.read();
        Ok(data.get(path).map(|value| StoreEntry {
            path: path.to_string(),
            value: value.clone(),
        }))
    }

    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<StoreEntry>> {
        self.ensure_open()?;
        let data = self.data.read();
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, value)| StoreEntry {
                path: path.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn put(
        &self,
        path: &str,
        value: Bytes,
    ) -> Result<()> {
        self.ensure_open()?;
        self.put_value(path, value);
        Ok(())
    }

    async fn watch_prefix(
        &self,
        prefix: &str,
    ) -> Result<NativeWatchStream> {
        self.ensure_open()?;
        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.watchers.insert(
            id,
            MemWatcher {
                prefix: prefix.to_string(),
                sender,
            },
        );
        debug!(watch_id = id, prefix, "Memory store watch registered");

        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.watchers.clear();
            debug!("Memory store closed");
        }
    }
}
