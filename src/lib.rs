//! # confsync
//!
//! Keeps a running process's configuration in sync with a hierarchical key-value store.
//!
//! Remote changes are folded into a *staged* copy of the configuration and published to
//! the *live* configuration atomically, only when a designated gate key (by default
//! `config-version`) changes. Writers update any number of keys, then bump the version:
//!
//! ```text
//! $ confsync set name "James Dean"
//! $ confsync set age 12
//! $ confsync set config-version 2     <- readers see name and age change together
//! ```
//!
//! ## Key Types
//!
//! - [`Backend`] - root-scoped get/list/set/watch over a store, with [`StoreBackend`]
//!   adapting any [`KvStore`] ([`MemoryStore`], and `EtcdStore` with the `etcd` feature)
//! - [`Schema`] / [`ConfigRule`] - declared options, validated by [`Schema::apply`]
//! - [`ConfigWatcher`] - initial load, then watch, stage and gated commit
//! - [`LiveConfig`] - lock-free handle on the current [`Options`] snapshot
//!
//! ## Example
//!
//! ```ignore
//! let config = SyncConfig::new()?.validate()?;
//! let backend = Arc::new(StoreBackend::new(Arc::new(MemoryStore::new()), &config));
//! let schema = Schema::new()
//!     .rule(ConfigRule::scalar("name"))
//!     .rule(ConfigRule::scalar("config-version").int().default("0"));
//!
//! let watcher = ConfigWatcher::load(backend, schema, config.watch).await?;
//! watcher.start().await?;
//! let name = watcher.live().load().string("name");
//! ```

mod backend;
mod config;
pub mod constants;
mod controller;
mod errors;
mod event;
pub mod http;
mod key;
mod options;
pub mod store;
mod utils;

pub use backend::*;
pub use config::*;
pub use controller::*;
pub use errors::*;
pub use event::*;
pub use key::*;
pub use options::*;
pub use store::KvStore;
pub use store::MemoryStore;

#[cfg(feature = "etcd")]
pub use store::EtcdStore;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;

/// Crate version, reported by the binary
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
