use std::sync::Arc;
use std::time::Duration;

use confsync::ConfigRule;
use confsync::MemoryStore;
use confsync::Schema;
use confsync::StoreBackend;
use confsync::SyncConfig;
use confsync::WatchNotice;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    once_cell::sync::Lazy::force(&LOGGER_INIT);
}

pub const WAIT: Duration = Duration::from_secs(1);

pub fn settings() -> SyncConfig {
    let mut settings = SyncConfig::default();
    settings.store.root = "/args-config".to_string();
    settings
}

pub fn memory_backend(settings: &SyncConfig) -> (Arc<MemoryStore>, Arc<StoreBackend<MemoryStore>>) {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(StoreBackend::new(store.clone(), settings));
    (store, backend)
}

pub fn user_schema() -> Schema {
    Schema::new()
        .rule(ConfigRule::scalar("name"))
        .rule(ConfigRule::scalar("age").int())
        .rule(ConfigRule::scalar("sex"))
        .rule(ConfigRule::scalar("config-version").int().default("0"))
        .rule(ConfigRule::group("endpoints"))
}

pub async fn next_notice(notices: &mut broadcast::Receiver<WatchNotice>) -> WatchNotice {
    tokio::time::timeout(WAIT, notices.recv())
        .await
        .expect("no notice within deadline")
        .expect("notice channel closed")
}
