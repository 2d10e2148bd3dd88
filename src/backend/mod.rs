//! Watch Backend
//!
//! Root-scoped view of a key-value store used by the configuration engine:
//!
//! ```text
//!  ┌──────────────┐  get/list/set   ┌─────────────┐
//!  │ ConfigWatcher│ ──────────────▶ │   Backend   │ ──▶ KvStore (etcd, memory, ...)
//!  │  (consumer)  │ ◀────────────── │             │ ◀── native watch stream
//!  └──────────────┘   ChangeStream  └──────┬──────┘
//!                                          │ spawns one task per watch
//!                                          ▼
//!                                    ┌───────────┐
//!                                    │ WatchTask │ translate + forward, in order
//!                                    └───────────┘
//! ```
//!
//! The output stream is closed exactly once, when the watch task exits. `close()` cancels
//! the task and joins it before releasing the store client, so no event is delivered
//! after `close()` returns.

mod change_stream;
mod store_backend;
mod watch_task;

pub use change_stream::*;
pub use store_backend::*;

#[cfg(test)]
mod store_backend_test;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::Key;
use crate::Pair;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Fetches exactly one key at `root/key`.
    ///
    /// Fails with `StoreError::NotFound` when the store has no such key.
    async fn get(
        &self,
        key: &Key,
    ) -> Result<Pair>;

    /// Fetches every entry under `root/key`.
    ///
    /// Each result keeps the queried group and takes the basename of the raw path as its
    /// name. Fails with `StoreError::NotFound` when the prefix is empty.
    async fn list(
        &self,
        key: &Key,
    ) -> Result<Vec<Pair>>;

    /// Writes one key at `root/key`
    async fn set(
        &self,
        key: &Key,
        value: Bytes,
    ) -> Result<()>;

    /// Opens one prefix watch over `root_path` and returns its change stream.
    async fn watch(
        &self,
        root_path: &str,
    ) -> Result<ChangeStream>;

    /// Stops the watch task, waits for it, then closes the store client.
    ///
    /// Safe to call repeatedly and when `watch` was never called.
    async fn close(&self);

    fn root_key(&self) -> &str;

    fn separator(&self) -> char;
}
