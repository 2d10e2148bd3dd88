// -
// Store layout

/// Default path delimiter for store keys
pub const DEFAULT_SEPARATOR: char = '/';

/// Default root namespace for configuration entries
pub const DEFAULT_ROOT: &str = "/confsync";

/// Default name of the commit gate key
pub const DEFAULT_GATE_KEY: &str = "config-version";

// -
// Lenient key parsing sentinels

pub const INVALID_KEY_NAME: &str = "invalid-key";
pub const INVALID_KEY_GROUP: &str = "invalid-group";

// -
// Settings

/// Environment variable prefix for settings overrides (`CONFSYNC__STORE__ROOT=...`)
pub(crate) const ENV_PREFIX: &str = "CONFSYNC";
pub(crate) const ENV_SEPARATOR: &str = "__";
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Capacity of the notice broadcast channel
pub(crate) const NOTICE_CHANNEL_CAPACITY: usize = 64;
