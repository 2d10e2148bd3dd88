use bytes::Bytes;

use crate::Key;
use crate::WatchError;

/// Normalized unit of one store mutation, or of one terminal stream error.
///
/// A terminal event has `err` set and every other field zero-valued; nothing follows it
/// on the same stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: Key,
    pub value: Bytes,
    pub deleted: bool,
    pub err: Option<WatchError>,
}

impl ChangeEvent {
    pub fn put(
        key: Key,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            key,
            value: value.into(),
            deleted: false,
            err: None,
        }
    }

    pub fn delete(key: Key) -> Self {
        Self {
            key,
            value: Bytes::new(),
            deleted: true,
            err: None,
        }
    }

    pub fn error(err: WatchError) -> Self {
        Self {
            err: Some(err),
            ..Default::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.err.is_some()
    }
}
