use std::sync::Arc;

use tracing::debug;
use tracing::trace;

use super::GatePolicy;
use super::LiveConfig;
use crate::ChangeEvent;
use crate::Error;
use crate::Options;
use crate::Schema;
use crate::StagedConfig;

/// Result of folding one event
#[derive(Debug)]
pub enum FoldOutcome {
    /// Not a declared slot, or a terminal event
    Ignored,
    /// Staged only; live unchanged
    Staged,
    /// Gate fired and the staged values are now live
    Committed(Arc<Options>),
    /// Gate fired but validation failed; live unchanged, staged keeps the attempt
    Rejected(Error),
}

/// Staging state machine, free of any I/O.
///
/// Owns the staged copy; the only side effect is the swap into [`LiveConfig`] on a
/// successful commit.
#[derive(Debug)]
pub struct Stager {
    schema: Arc<Schema>,
    gate: GatePolicy,
    live: LiveConfig,
    staged: StagedConfig,
}

impl Stager {
    /// Starts from a deep copy of the current live values
    pub fn new(
        schema: Arc<Schema>,
        gate: GatePolicy,
        live: LiveConfig,
    ) -> Self {
        let staged = live.load().to_staged();
        Self {
            schema,
            gate,
            live,
            staged,
        }
    }

    pub fn staged(&self) -> &StagedConfig {
        &self.staged
    }

    pub fn gate(&self) -> &GatePolicy {
        &self.gate
    }

    pub fn fold(
        &mut self,
        event: &ChangeEvent,
    ) -> FoldOutcome {
        if event.is_terminal() {
            return FoldOutcome::Ignored;
        }
        if !self.schema.is_declared(&event.key) {
            debug!(key = %event.key, "Ignoring change to undeclared key");
            return FoldOutcome::Ignored;
        }

        self.staged.from_change_event(event);

        if !self.gate.is_gate(&event.key) {
            trace!(key = %event.key, "Change staged");
            return FoldOutcome::Staged;
        }
        self.commit()
    }

    /// Validates the staged values and, if they pass, makes them live.
    pub fn commit(&mut self) -> FoldOutcome {
        match self.schema.apply(&self.staged) {
            Ok(options) => {
                let options = Arc::new(options);
                self.live.store(options.clone());
                self.staged = options.to_staged();
                FoldOutcome::Committed(options)
            }
            Err(e) => FoldOutcome::Rejected(e),
        }
    }

    /// Replaces the staged values with a fresh read of the store.
    ///
    /// Commits only if the fresh gate value differs from the live one, so a batch that
    /// was half written while the watch was down stays staged until its gate arrives.
    pub fn resync(
        &mut self,
        fresh: StagedConfig,
    ) -> FoldOutcome {
        let live = self.live.load().to_staged();
        let changed = match self.gate.gate_name() {
            Some(gate) => fresh.scalar(gate) != live.scalar(gate),
            None => fresh != live,
        };

        self.staged = fresh;
        if changed {
            self.commit()
        } else {
            FoldOutcome::Staged
        }
    }

    /// Gate value of a snapshot, as reported in commit notices
    pub fn version_of(
        &self,
        options: &Options,
    ) -> Option<String> {
        self.gate.gate_name().map(|gate| options.string(gate))
    }
}
