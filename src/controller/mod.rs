//! Apply/Gate Controller
//!
//! Folds change events into a staged copy of the configuration and publishes it to the
//! live cell only when the gate key changes:
//!
//! ```text
//!  ChangeStream ──▶ Stager::fold ──(not gate)──▶ staged only
//!                        │
//!                      (gate)
//!                        ▼
//!                  Schema::apply ──Ok──▶ LiveConfig::store ──▶ staged = copy of live
//!                        │
//!                       Err ──▶ live untouched, WatchNotice::Rejected
//! ```
//!
//! Readers of [`LiveConfig`] never observe a partially applied batch.

mod gate;
mod live;
mod loader;
mod notice;
mod stager;
mod watcher;

pub use gate::*;
pub use live::*;
pub use loader::*;
pub use notice::*;
pub use stager::*;
pub use watcher::*;

#[cfg(test)]
mod stager_test;
