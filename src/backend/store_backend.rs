use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::watch_task::WatchTask;
use super::Backend;
use super::ChangeStream;
use crate::key::basename;
use crate::store::KvStore;
use crate::Key;
use crate::Pair;
use crate::Result;
use crate::StoreError;
use crate::SyncConfig;
use crate::WatchError;

/// Handle on the running watch task
struct WatchSession {
    cancel: CancellationToken,
    active: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// [`Backend`] over any [`KvStore`] client.
///
/// Holds at most one watch session at a time. A session whose task has delivered its
/// terminal event (or otherwise stopped) may be replaced by a new `watch()` call.
pub struct StoreBackend<S: KvStore> {
    store: Arc<S>,
    root: String,
    separator: char,
    request_timeout: Duration,
    event_buffer_size: usize,

    /// Parent of every session token; cancelled once by `close()`
    shutdown: CancellationToken,

    session: Mutex<Option<WatchSession>>,
}

impl<S: KvStore> std::fmt::Debug for StoreBackend<S> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StoreBackend")
            .field("root", &self.root)
            .field("separator", &self.separator)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish_non_exhaustive()
    }
}

impl<S: KvStore> StoreBackend<S> {
    pub fn new(
        store: Arc<S>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            store,
            root: config.store.root.clone(),
            separator: config.store.separator_char(),
            request_timeout: config.store.request_timeout(),
            event_buffer_size: config.watch.event_buffer_size,
            shutdown: CancellationToken::new(),
            session: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn path_of(
        &self,
        key: &Key,
    ) -> String {
        key.join(&self.root, self.separator)
    }

    /// Runs one store request under the request deadline, aborting on `close()`.
    async fn request<T>(
        &self,
        path: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(StoreError::Closed.into()),
            res = tokio::time::timeout(self.request_timeout, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(StoreError::Timeout {
                    path: path.to_string(),
                    duration: self.request_timeout,
                }
                .into()),
            },
        }
    }
}

#[async_trait]
impl<S: KvStore> Backend for StoreBackend<S> {
    async fn get(
        &self,
        key: &Key,
    ) -> Result<Pair> {
        let path = self.path_of(key);
        match self.request(&path, self.store.get(&path)).await? {
            Some(entry) => Ok(Pair::new(key.clone(), entry.value)),
            None => Err(StoreError::NotFound(path).into()),
        }
    }

    async fn list(
        &self,
        key: &Key,
    ) -> Result<Vec<Pair>> {
        let mut prefix = self.path_of(key);
        // "/cfg/endpoints" must not also match "/cfg/endpoints-old/..."
        if key.name.is_empty() {
            prefix.push(self.separator);
        }

        let entries = self.request(&prefix, self.store.get_prefix(&prefix)).await?;
        if entries.is_empty() {
            return Err(StoreError::NotFound(prefix).into());
        }

        Ok(entries
            .into_iter()
            .map(|entry| {
                let name = basename(&entry.path, self.separator);
                Pair::new(Key::member(key.group.clone(), name), entry.value)
            })
            .collect())
    }

    async fn set(
        &self,
        key: &Key,
        value: Bytes,
    ) -> Result<()> {
        let path = self.path_of(key);
        self.request(&path, self.store.put(&path, value)).await?;
        debug!(%path, "Key written");
        Ok(())
    }

    async fn watch(
        &self,
        root_path: &str,
    ) -> Result<ChangeStream> {
        if self.shutdown.is_cancelled() {
            return Err(StoreError::Closed.into());
        }

        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            if previous.active.load(Ordering::SeqCst) {
                *session = Some(previous);
                return Err(WatchError::AlreadyWatching(root_path.to_string()).into());
            }
            // Previous task is on its way out; make sure it is gone
            previous.cancel.cancel();
            if let Err(e) = previous.handle.await {
                warn!(error = %e, "Previous watch task did not exit cleanly");
            }
        }

        let prefix = format!(
            "{}{}",
            root_path.trim_end_matches(self.separator),
            self.separator
        );
        let native = self.request(&prefix, self.store.watch_prefix(&prefix)).await?;

        let (sender, receiver) = mpsc::channel(self.event_buffer_size);
        let cancel = self.shutdown.child_token();
        let active = Arc::new(AtomicBool::new(true));
        let handle = WatchTask {
            root: root_path.to_string(),
            separator: self.separator,
            native,
            sender,
            cancel: cancel.clone(),
            active: active.clone(),
        }
        .spawn();

        *session = Some(WatchSession {
            cancel,
            active,
            handle,
        });
        info!(%prefix, "Watch session opened");

        Ok(ChangeStream::new(receiver))
    }

    async fn close(&self) {
        self.shutdown.cancel();

        if let Some(session) = self.session.lock().await.take() {
            session.cancel.cancel();
            if let Err(e) = session.handle.await {
                warn!(error = %e, "Watch task did not exit cleanly");
            }
            info!(root = %self.root, "Watch session closed");
        }

        self.store.close().await;
    }

    fn root_key(&self) -> &str {
        &self.root
    }

    fn separator(&self) -> char {
        self.separator
    }
}
