//! Declared configuration options and their two representations:
//!
//! - [`StagedConfig`]: raw bytes per slot, folded from change events, never validated
//! - [`Options`]: typed, validated, immutable snapshot published as the live configuration
//!
//! [`Schema::apply`] is the only way from the first to the second.

mod schema;
mod snapshot;
mod staged;

pub use schema::*;
pub use snapshot::*;
pub use staged::*;
