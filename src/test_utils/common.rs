use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

use crate::MemoryStore;
use crate::StoreBackend;
use crate::SyncConfig;

static LOGGER_INIT: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    Lazy::force(&LOGGER_INIT);
}

/// Settings rooted at `/cfg` with a small event buffer
pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.store.root = "/cfg".to_string();
    config.watch.event_buffer_size = 8;
    config.watch.reconnect.backoff.base_delay_ms = 10;
    config.watch.reconnect.backoff.max_delay_ms = 50;
    config
}

/// Memory store plus a backend over it, sharing `config`
pub fn memory_backend(config: &SyncConfig) -> (Arc<MemoryStore>, Arc<StoreBackend<MemoryStore>>) {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(StoreBackend::new(store.clone(), config));
    (store, backend)
}
