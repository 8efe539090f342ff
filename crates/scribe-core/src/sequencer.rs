//! # Step Sequencer
//!
//! Tracks demo progress as a cursor over [`Stage::ALL`] and keeps the
//! session's [`FeatureFlags`] in step with it.
//!
//! The sequencer is a closed, total state machine:
//! - states are the cursor values `0..=4`, initial state `0`
//! - `advance` moves `n -> n + 1` only while `n < 4`
//! - `retreat` moves `n -> n - 1` only while `n > 0`
//!
//! Crossing a boundary is a silent no-op, never an error.
//!
//! One sequencer belongs to exactly one session. Callers sharing one across
//! tasks must hold a single lock around each `advance`/`retreat`.

use crate::{
    FeatureConfig, FeatureFlags, SeedPolicy, Stage,
    stage::LAST_STAGE_INDEX,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// STEP SEQUENCER
// =============================================================================

/// Demo progress cursor plus the feature flags derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSequencer {
    stage: Stage,
    flags: FeatureFlags,
    /// True while the flags still carry a configured hint that has not yet
    /// been overwritten by a transition.
    seeded: bool,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSequencer {
    /// Start at stage 0 with every feature off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: Stage::FIRST,
            flags: FeatureFlags::for_stage(Stage::FIRST),
            seeded: false,
        }
    }

    /// Start from configuration, applying its [`SeedPolicy`].
    #[must_use]
    pub fn from_config(config: &FeatureConfig) -> Self {
        match config.seed_policy {
            SeedPolicy::Align => {
                let stage = config.prefix_stage();
                Self {
                    stage,
                    flags: FeatureFlags::for_stage(stage),
                    seeded: false,
                }
            }
            SeedPolicy::Hint => {
                let flags = FeatureFlags::from_config(config);
                Self {
                    stage: Stage::FIRST,
                    seeded: flags != FeatureFlags::for_stage(Stage::FIRST),
                    flags,
                }
            }
        }
    }

    /// Move to the next stage. Returns `false` (and changes nothing) at the last stage.
    pub fn advance(&mut self) -> bool {
        match self.stage.next() {
            Some(next) => {
                self.transition(next);
                true
            }
            None => false,
        }
    }

    /// Move to the previous stage. Returns `false` (and changes nothing) at stage 0.
    pub fn retreat(&mut self) -> bool {
        match self.stage.previous() {
            Some(previous) => {
                self.transition(previous);
                true
            }
            None => false,
        }
    }

    /// Return to stage 0 and recompute flags.
    pub fn reset(&mut self) {
        self.transition(Stage::FIRST);
    }

    fn transition(&mut self, stage: Stage) {
        self.stage = stage;
        self.flags.recompute(stage);
        self.seeded = false;
    }

    /// Label of the current stage.
    #[must_use]
    pub fn current_label(&self) -> &'static str {
        self.stage.label()
    }

    /// Whether `advance` would move the cursor.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.cursor() < LAST_STAGE_INDEX
    }

    /// Whether `retreat` would move the cursor.
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.cursor() > 0
    }

    /// Current cursor value, always in `0..=4`.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.stage.index()
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    /// Whether the flags still show a configured hint (see [`SeedPolicy::Hint`]).
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Capture the observable state for display.
    #[must_use]
    pub fn snapshot(&self) -> SequencerSnapshot {
        SequencerSnapshot {
            cursor: self.cursor(),
            stage: self.stage,
            label: self.current_label().to_string(),
            has_next: self.has_next(),
            has_previous: self.has_previous(),
            features: self.flags,
            seeded: self.seeded,
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Serializable view of a sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerSnapshot {
    pub cursor: usize,
    pub stage: Stage,
    pub label: String,
    pub has_next: bool,
    pub has_previous: bool,
    pub features: FeatureFlags,
    pub seeded: bool,
}

// =============================================================================
// TESTS
// =============================================================================
