use crate::constants::DEFAULT_GATE_KEY;
use crate::Key;

/// Decides which events commit the staged configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatePolicy {
    /// Commit when the named scalar changes; every other event only stages
    OnKey(String),
    /// Commit on every event
    Immediate,
}

impl Default for GatePolicy {
    fn default() -> Self {
        GatePolicy::OnKey(DEFAULT_GATE_KEY.to_string())
    }
}

impl GatePolicy {
    pub fn is_gate(
        &self,
        key: &Key,
    ) -> bool {
        match self {
            GatePolicy::OnKey(name) => key.is_scalar() && key.name == *name,
            GatePolicy::Immediate => true,
        }
    }

    pub fn gate_name(&self) -> Option<&str> {
        match self {
            GatePolicy::OnKey(name) => Some(name),
            GatePolicy::Immediate => None,
        }
    }
}
