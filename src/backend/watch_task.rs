use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::store::NativeWatchStream;
use crate::store::StoreEvent;
use crate::store::StoreEventKind;
use crate::ChangeEvent;
use crate::Key;
use crate::WatchError;

/// Pump between one native watch stream and one `ChangeStream`.
///
/// Exits on the first of: local cancellation, consumer gone, native stream end, native
/// cancellation or transport fault. The last two produce exactly one terminal event.
pub(crate) struct WatchTask {
    pub(crate) root: String,
    pub(crate) separator: char,
    pub(crate) native: NativeWatchStream,
    pub(crate) sender: mpsc::Sender<ChangeEvent>,
    pub(crate) cancel: CancellationToken,

    /// Cleared before the terminal event is sent, so a consumer reacting to it may
    /// open a new watch right away.
    pub(crate) active: Arc<AtomicBool>,
}

impl WatchTask {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        debug!(root = %self.root, "Watch task started");

        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(root = %self.root, "Watch task canceled locally");
                    break;
                }
                _ = self.sender.closed() => {
                    debug!(root = %self.root, "Change stream dropped by consumer");
                    break;
                }
                item = self.native.next() => item,
            };

            match item {
                None => {
                    debug!(root = %self.root, "Native watch stream ended");
                    break;
                }
                Some(Err(e)) => {
                    warn!(root = %self.root, error = %e, "Native watch stream failed");
                    self.terminate(WatchError::Transport(e.to_string())).await;
                    break;
                }
                Some(Ok(batch)) => {
                    trace!(events = batch.events.len(), "Native watch batch");
                    if !self.forward(batch.events).await {
                        break;
                    }
                    if let Some(reason) = batch.canceled {
                        warn!(root = %self.root, %reason, "Watch canceled by store");
                        self.terminate(WatchError::Canceled { reason }).await;
                        break;
                    }
                }
            }
        }

        self.active.store(false, Ordering::SeqCst);
        debug!(root = %self.root, "Watch task stopped");
    }

    /// Forwards one native batch in order; false when the task must stop.
    async fn forward(
        &mut self,
        events: Vec<StoreEvent>,
    ) -> bool {
        for native in events {
            let event = self.translate(native);
            if !self.send(event).await {
                return false;
            }
        }
        true
    }

    fn translate(
        &self,
        native: StoreEvent,
    ) -> ChangeEvent {
        let key = Key::parse_from_path(&native.path, &self.root, self.separator);
        if key.is_invalid() {
            warn!(path = %native.path, "Store path does not map to a key");
        }

        match native.kind {
            StoreEventKind::Put => ChangeEvent::put(key, native.value),
            StoreEventKind::Delete => ChangeEvent::delete(key),
        }
    }

    async fn terminate(
        &mut self,
        err: WatchError,
    ) {
        self.active.store(false, Ordering::SeqCst);
        self.send(ChangeEvent::error(err)).await;
    }

    async fn send(
        &mut self,
        event: ChangeEvent,
    ) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            res = self.sender.send(event) => {
                if res.is_err() {
                    debug!(root = %self.root, "Change stream dropped by consumer");
                }
                res.is_ok()
            }
        }
    }
}
