//! # Demo Stages
//!
//! The fixed, ordered list of stages a Scribe demo walks through.
//!
//! | Index | Stage | Label | Unlocks |
//! |-------|-------|-------|---------|
//! | 0 | BasicEditor | Basic Blog Editor | nothing |
//! | 1 | ContentGeneration | Content Generation | standardGeneration |
//! | 2 | StreamingContent | Streaming Content | streamingGeneration |
//! | 3 | ImageGeneration | Image Generation | imageGeneration |
//! | 4 | TextToSpeech | Text-to-Speech | speechGeneration |
//!
//! Stages are immutable and compiled into the binary.

use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE COUNT
// =============================================================================

/// Number of demo stages.
pub const STAGE_COUNT: usize = 5;

/// Highest valid cursor value.
pub const LAST_STAGE_INDEX: usize = STAGE_COUNT - 1;

// =============================================================================
// STAGE ENUM
// =============================================================================

/// A demo stage. Ordering follows the demo progression.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 0: plain editor, no AI features.
    #[default]
    BasicEditor,
    /// 1: one-shot content generation.
    ContentGeneration,
    /// 2: token-streamed content generation.
    StreamingContent,
    /// 3: header image generation.
    ImageGeneration,
    /// 4: text-to-speech narration.
    TextToSpeech,
}

impl Stage {
    /// All stages in demo order.
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::BasicEditor,
        Stage::ContentGeneration,
        Stage::StreamingContent,
        Stage::ImageGeneration,
        Stage::TextToSpeech,
    ];

    /// The stage every session starts in.
    pub const FIRST: Stage = Stage::BasicEditor;

    /// The final stage.
    pub const LAST: Stage = Stage::TextToSpeech;

    /// Get the human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Stage::BasicEditor => "Basic Blog Editor",
            Stage::ContentGeneration => "Content Generation",
            Stage::StreamingContent => "Streaming Content",
            Stage::ImageGeneration => "Image Generation",
            Stage::TextToSpeech => "Text-to-Speech",
        }
    }

    /// Get the cursor index of this stage (0..=4).
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Stage::BasicEditor => 0,
            Stage::ContentGeneration => 1,
            Stage::StreamingContent => 2,
            Stage::ImageGeneration => 3,
            Stage::TextToSpeech => 4,
        }
    }

    /// Look up a stage by cursor index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Stage> {
        Self::ALL.get(index).copied()
    }

    /// Get the next stage, if any.
    #[must_use]
    pub fn next(&self) -> Option<Stage> {
        Self::from_index(self.index().saturating_add(1))
    }

    /// Get the previous stage, if any.
    #[must_use]
    pub fn previous(&self) -> Option<Stage> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Check if this is the final stage.
    #[must_use]
    pub fn is_last(&self) -> bool {
        matches!(self, Stage::TextToSpeech)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// TESTS
// =============================================================================
