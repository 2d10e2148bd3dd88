use crate::Key;

/// Outcome reports of a running [`ConfigWatcher`](crate::ConfigWatcher)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchNotice {
    /// Staged values were published; `version` is the gate value, if gated
    Committed { version: Option<String> },

    /// Gate fired but the staged values failed validation; live is unchanged
    Rejected { key: Key, reason: String },

    /// The watch session failed and will not be resumed
    Terminated { reason: String },

    /// The change stream closed without error, e.g. the backend was closed
    Ended,

    /// A new watch session replaced a failed one and staged values were re-read
    Resynced,
}
