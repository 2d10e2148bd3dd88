//! etcd v3 adapter
//!
//! `etcd_client::Client` is cheap to clone (it shares one gRPC channel), and every
//! request method takes `&mut self`, so each call works on its own clone.

use async_trait::async_trait;
use bytes::Bytes;
use etcd_client::Client;
use etcd_client::ConnectOptions;
use etcd_client::EventType;
use etcd_client::GetOptions;
use etcd_client::WatchOptions;
use etcd_client::WatchResponse;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;

use crate::store::KvStore;
use crate::store::NativeWatchStream;
use crate::store::StoreEntry;
use crate::store::StoreEvent;
use crate::store::StoreEventKind;
use crate::store::WatchBatch;
use crate::Result;
use crate::StoreConfig;
use crate::StoreError;

pub struct EtcdStore {
    /// None once closed
    client: Mutex<Option<Client>>,
}

impl EtcdStore {
    /// Connects to the configured endpoints
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = ConnectOptions::new()
            .with_connect_timeout(config.connect_timeout())
            .with_timeout(config.request_timeout());

        let client = Client::connect(&config.endpoints, Some(options))
            .await
            .map_err(transport)?;
        info!(endpoints = ?config.endpoints, "Connected to etcd");

        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client: Mutex::new(Some(client)),
        }
    }

    fn client(&self) -> Result<Client> {
        self.client.lock().clone().ok_or_else(|| StoreError::Closed.into())
    }
}

fn transport(e: etcd_client::Error) -> crate::Error {
    StoreError::Transport(e.to_string()).into()
}

fn to_batch(resp: &WatchResponse) -> WatchBatch {
    let events = resp
        .events()
        .iter()
        .filter_map(|event| {
            let kv = event.kv()?;
            let kind = match event.event_type() {
                EventType::Put => StoreEventKind::Put,
                EventType::Delete => StoreEventKind::Delete,
            };
            Some(StoreEvent {
                kind,
                path: String::from_utf8_lossy(kv.key()).into_owned(),
                value: Bytes::copy_from_slice(kv.value()),
            })
        })
        .collect();

    WatchBatch {
        events,
        canceled: resp.canceled().then(|| resp.cancel_reason().to_string()),
    }
}

#[async_trait]
impl KvStore for EtcdStore {
    async fn get(
        &self,
        path: &str,
    ) -> Result<Option<StoreEntry>> {
        let mut client = self.client()?;
        let resp = client.get(path, None).await.map_err(transport)?;

        Ok(resp.kvs().first().map(|kv| StoreEntry {
            path: String::from_utf8_lossy(kv.key()).into_owned(),
            value: Bytes::copy_from_slice(kv.value()),
        }))
    }

    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<StoreEntry>> {
        let mut client = self.client()?;
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .map_err(transport)?;

        Ok(resp
            .kvs()
            .iter()
            .map(|kv| StoreEntry {
                path: String::from_utf8_lossy(kv.key()).into_owned(),
                value: Bytes::copy_from_slice(kv.value()),
            })
            .collect())
    }

    async fn put(
        &self,
        path: &str,
        value: Bytes,
    ) -> Result<()> {
        let mut client = self.client()?;
        client.put(path, value.to_vec(), None).await.map_err(transport)?;
        Ok(())
    }

    async fn watch_prefix(
        &self,
        prefix: &str,
    ) -> Result<NativeWatchStream> {
        let mut client = self.client()?;
        let (watcher, watch_stream) = client
            .watch(prefix, Some(WatchOptions::new().with_prefix()))
            .await
            .map_err(transport)?;
        debug!(prefix, watch_id = watcher.watch_id(), "etcd watch opened");

        // The watcher handle travels with the stream so the watch lives exactly as long
        let native = stream::unfold(Some((watcher, watch_stream)), |state| async move {
            let (watcher, mut watch_stream) = state?;
            match watch_stream.message().await {
                Ok(Some(resp)) => Some((Ok(to_batch(&resp)), Some((watcher, watch_stream)))),
                Ok(None) => None,
                Err(e) => Some((Err(transport(e)), None)),
            }
        });

        Ok(native.boxed())
    }

    async fn close(&self) {
        if self.client.lock().take().is_some() {
            debug!("etcd client released");
        }
    }
}
