//! # scribe-core
//!
//! The demo sequencing model for Scribe - THE LOGIC.
//!
//! A Scribe demo walks a user through five fixed stages, each unlocking one
//! more AI-assisted authoring feature. This crate owns:
//! - `stage` → the ordered stage list and labels
//! - `features` → the feature gate derived from the stage cursor
//! - `sequencer` → the per-session cursor with advance/retreat
//! - `post` → the blog post draft and its validation rules
//! - `text` → prompt construction and HTML-to-speech text cleanup
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Every sequencer operation is total: boundary moves are no-ops, not errors
//! - Flags are recomputed from the cursor on every transition

// =============================================================================
// MODULES
// =============================================================================

pub mod features;
pub mod post;
pub mod sequencer;
pub mod stage;
pub mod text;
pub mod types;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use features::{Feature, FeatureConfig, FeatureFlags, SeedPolicy};
pub use post::{BlogPost, MAX_TITLE_LENGTH, validate_content, validate_title};
pub use sequencer::{SequencerSnapshot, StepSequencer};
pub use stage::{STAGE_COUNT, Stage};
pub use types::ScribeError;
