use std::sync::Arc;

use config::ConfigError;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::load_staged;
use super::FoldOutcome;
use super::GatePolicy;
use super::LiveConfig;
use super::Stager;
use super::WatchNotice;
use crate::constants::NOTICE_CHANNEL_CAPACITY;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::Backend;
use crate::ChangeEvent;
use crate::ChangeStream;
use crate::Error;
use crate::Key;
use crate::Options;
use crate::ReconnectPolicy;
use crate::Result;
use crate::Schema;
use crate::WatchConfig;
use crate::WatchError;

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps a [`LiveConfig`] in sync with a backend.
///
/// ```ignore
/// let watcher = ConfigWatcher::load(backend, schema, config.watch).await?;
/// watcher.start().await?;
/// let live = watcher.live();
/// println!("{}", live.load().string("name"));
/// ```
pub struct ConfigWatcher<B: Backend> {
    backend: Arc<B>,
    schema: Arc<Schema>,
    config: WatchConfig,
    live: LiveConfig,
    notices: broadcast::Sender<WatchNotice>,
    session: Mutex<Option<Session>>,
}

impl<B: Backend> std::fmt::Debug for ConfigWatcher<B> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("root", &self.backend.root_key())
            .field("schema", &self.schema)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> ConfigWatcher<B> {
    /// Reads every declared option and publishes the result as the initial live
    /// configuration. Options missing from the store keep their defaults.
    pub async fn load(
        backend: Arc<B>,
        schema: Schema,
        config: WatchConfig,
    ) -> Result<Self> {
        ensure_gate_declared(&schema, &config.gate_policy())?;
        let staged = load_staged(backend.as_ref(), &schema).await?;
        let options = schema.apply(&staged)?;
        info!(root = %backend.root_key(), "Initial configuration loaded");

        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Ok(Self {
            backend,
            schema: Arc::new(schema),
            config,
            live: LiveConfig::new(options),
            notices,
            session: Mutex::new(None),
        })
    }

    pub fn live(&self) -> LiveConfig {
        self.live.clone()
    }

    /// Current live snapshot
    pub fn options(&self) -> Arc<Options> {
        self.live.load()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Subscribes to commit/reject/termination notices
    pub fn notices(&self) -> broadcast::Receiver<WatchNotice> {
        self.notices.subscribe()
    }

    /// Opens the watch and starts applying changes in the background.
    ///
    /// Fails if the watch cannot be opened or a session is already running.
    pub async fn start(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            return Err(WatchError::AlreadyWatching(self.backend.root_key().to_string()).into());
        }

        let root = self.backend.root_key().to_string();
        let stream = self.backend.watch(&root).await?;

        let cancel = CancellationToken::new();
        let task = WatchLoop {
            backend: self.backend.clone(),
            schema: self.schema.clone(),
            stager: Stager::new(
                self.schema.clone(),
                self.config.gate_policy(),
                self.live.clone(),
            ),
            reconnect: self.config.reconnect.clone(),
            notices: self.notices.clone(),
            cancel: cancel.clone(),
            root,
        };
        let handle = tokio::spawn(task.run(stream));

        *session = Some(Session { cancel, handle });
        Ok(())
    }

    /// Stops applying changes and waits for the background task. The backend stays
    /// open; close it separately.
    pub async fn stop(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.cancel.cancel();
            if let Err(e) = session.handle.await {
                warn!(error = %e, "Config watch task did not exit cleanly");
            }
            debug!("Config watch stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }
}

/// How one watch session ended
enum SessionEnd {
    /// `ConfigWatcher::stop`
    Stopped,
    /// Stream ended without a terminal event
    Closed,
    /// Terminal event carrying its reason
    Failed(String),
}

/// A gate that names no declared scalar would never fire.
fn ensure_gate_declared(
    schema: &Schema,
    gate: &GatePolicy,
) -> Result<()> {
    let Some(name) = gate.gate_name() else {
        return Ok(());
    };
    match schema.get(name) {
        Some(rule) if !rule.is_group() => Ok(()),
        _ => Err(ConfigError::Message(format!(
            "gate key '{name}' is not a declared scalar option"
        ))
        .into()),
    }
}

/// Consumer task of one `ConfigWatcher::start`
struct WatchLoop<B: Backend> {
    backend: Arc<B>,
    schema: Arc<Schema>,
    stager: Stager,
    reconnect: ReconnectPolicy,
    notices: broadcast::Sender<WatchNotice>,
    cancel: CancellationToken,
    root: String,
}

impl<B: Backend> WatchLoop<B> {
    async fn run(
        mut self,
        mut stream: ChangeStream,
    ) {
        debug!(root = %self.root, "Config watch started");

        loop {
            let reason = match self.consume(&mut stream).await {
                SessionEnd::Stopped => return,
                SessionEnd::Closed => {
                    info!(root = %self.root, "Config watch stream closed");
                    self.notify(WatchNotice::Ended);
                    return;
                }
                SessionEnd::Failed(reason) => reason,
            };
            drop(stream);

            if !self.reconnect.enabled {
                error!(root = %self.root, %reason, "Config watch terminated");
                self.notify(WatchNotice::Terminated { reason });
                return;
            }

            warn!(root = %self.root, %reason, "Config watch lost, reconnecting");
            stream = match self.resubscribe().await {
                Ok(stream) => stream,
                Err(Error::Watch(WatchError::Canceled { .. })) if self.cancel.is_cancelled() => {
                    return;
                }
                Err(e) => {
                    error!(root = %self.root, error = %e, "Config watch could not be resumed");
                    self.notify(WatchNotice::Terminated {
                        reason: e.to_string(),
                    });
                    return;
                }
            };
        }
    }

    /// Applies events until the session ends
    async fn consume(
        &mut self,
        stream: &mut ChangeStream,
    ) -> SessionEnd {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionEnd::Stopped,
                event = stream.recv() => event,
            };

            match event {
                None => return SessionEnd::Closed,
                Some(ChangeEvent { err: Some(e), .. }) => return SessionEnd::Failed(e.to_string()),
                Some(event) => self.apply(&event),
            }
        }
    }

    fn apply(
        &mut self,
        event: &ChangeEvent,
    ) {
        trace!(key = %event.key, deleted = event.deleted, "Change event");
        match self.stager.fold(event) {
            FoldOutcome::Committed(options) => {
                let version = self.stager.version_of(&options);
                info!(key = %event.key, ?version, "Config committed");
                self.notify(WatchNotice::Committed { version });
            }
            FoldOutcome::Rejected(e) => {
                warn!(key = %event.key, error = %e, "Config commit rejected");
                self.notify(WatchNotice::Rejected {
                    key: event.key.clone(),
                    reason: e.to_string(),
                });
            }
            FoldOutcome::Staged | FoldOutcome::Ignored => {}
        }
    }

    /// Re-opens the watch with backoff, then re-reads every option since events may
    /// have been missed while disconnected.
    async fn resubscribe(&mut self) -> Result<ChangeStream> {
        let policy = self.reconnect.backoff;
        let backend = &self.backend;
        let root = &self.root;
        let schema = &self.schema;

        let stream = task_with_timeout_and_exponential_backoff(
            || backend.watch(root),
            policy,
            &self.cancel,
        )
        .await?;
        let fresh = task_with_timeout_and_exponential_backoff(
            || load_staged(backend.as_ref(), schema),
            policy,
            &self.cancel,
        )
        .await?;
        info!(root = %self.root, "Config watch resumed");

        match self.stager.resync(fresh) {
            FoldOutcome::Committed(options) => {
                let version = self.stager.version_of(&options);
                info!(?version, "Config committed after resync");
                self.notify(WatchNotice::Committed { version });
            }
            FoldOutcome::Rejected(e) => {
                warn!(error = %e, "Config commit after resync rejected");
                // Immediate commits have no gate; report against the empty key
                let key = self
                    .stager
                    .gate()
                    .gate_name()
                    .map(Key::scalar)
                    .unwrap_or_default();
                self.notify(WatchNotice::Rejected {
                    key,
                    reason: e.to_string(),
                });
            }
            FoldOutcome::Staged | FoldOutcome::Ignored => {}
        }
        self.notify(WatchNotice::Resynced);

        Ok(stream)
    }

    fn notify(
        &self,
        notice: WatchNotice,
    ) {
        // No subscribers is fine
        let _ = self.notices.send(notice);
    }
}
