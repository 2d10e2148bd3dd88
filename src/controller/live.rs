use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::Options;

/// Shared handle on the live configuration.
///
/// Cloning is cheap; every clone observes the same cell. Readers get whole snapshots
/// and are never blocked by a commit.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    inner: Arc<ArcSwap<Options>>,
}

impl LiveConfig {
    pub fn new(initial: Options) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<Options> {
        self.inner.load_full()
    }

    pub(crate) fn store(
        &self,
        options: Arc<Options>,
    ) {
        self.inner.store(options);
    }
}
