//! Key-value store client boundary
//!
//! The watch engine never talks to a store directly; it goes through [`KvStore`], the
//! narrow surface every store technology has to provide:
//!
//! - single-key read (`get`) and prefix read (`get_prefix`)
//! - single-key write (`put`)
//! - a prefix watch yielding batches of native events, cancellable by dropping the stream
//! - `close`
//!
//! Adapters:
//! - [`MemoryStore`] - in-process store with native watch support, always available
//! - `EtcdStore` - etcd v3 through `etcd-client` (feature `etcd`)

mod mem;
pub use mem::*;

#[cfg(feature = "etcd")]
mod etcd;
#[cfg(feature = "etcd")]
pub use etcd::*;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::Result;

/// Raw entry as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub path: String,
    pub value: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    Put,
    Delete,
}

/// One native mutation notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub kind: StoreEventKind,
    pub path: String,
    /// Empty for deletions
    pub value: Bytes,
}

/// One response of a native watch stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchBatch {
    /// Events in store order
    pub events: Vec<StoreEvent>,
    /// Set when the store cancelled the watch; carries the server's reason
    pub canceled: Option<String>,
}

/// Native watch stream. Ends normally when the store closes the watch; an `Err` item is a
/// transport fault.
pub type NativeWatchStream = BoxStream<'static, Result<WatchBatch>>;

#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Exact-key read; `None` when the key does not exist
    async fn get(
        &self,
        path: &str,
    ) -> Result<Option<StoreEntry>>;

    /// All entries whose path starts with `prefix`, in key order
    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<StoreEntry>>;

    async fn put(
        &self,
        path: &str,
        value: Bytes,
    ) -> Result<()>;

    /// Opens one watch over every key starting with `prefix`
    async fn watch_prefix(
        &self,
        prefix: &str,
    ) -> Result<NativeWatchStream>;

    /// Releases the client connection. Later requests fail with `StoreError::Closed`.
    async fn close(&self);
}
