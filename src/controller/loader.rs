use tracing::debug;
use tracing::warn;

use crate::Backend;
use crate::Result;
use crate::RuleKind;
use crate::Schema;
use crate::StagedConfig;

/// Bulk-reads every declared option from the backend.
///
/// A scalar or group missing from the store is logged and left to its default; any
/// other error is returned.
pub async fn load_staged<B: Backend + ?Sized>(
    backend: &B,
    schema: &Schema,
) -> Result<StagedConfig> {
    let mut staged = StagedConfig::new();

    for rule in schema.rules() {
        let key = rule.key();
        let loaded = match rule.kind {
            RuleKind::Scalar(_) => backend.get(&key).await.map(|pair| vec![pair]),
            RuleKind::Group => backend.list(&key).await,
        };

        match loaded {
            Ok(pairs) => {
                debug!(option = %rule.name, entries = pairs.len(), "Option loaded");
                for pair in pairs {
                    staged.insert(pair.key, pair.value);
                }
            }
            Err(e) if e.is_not_found() => {
                warn!(option = %rule.name, "{}", e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(staged)
}
