//! # Feature Gate
//!
//! The four AI capabilities a demo session can unlock, and the flag set that
//! records which of them are currently on.
//!
//! Flags come from two sources:
//! - [`FeatureFlags::from_config`] seeds them once from configuration.
//! - [`FeatureFlags::for_stage`] derives them from the sequencer cursor.
//!
//! After any sequencer transition the derived value wins: feature `i` is on
//! iff `cursor >= i + 1`, so enabled flags always form a prefix.

use crate::Stage;
use serde::{Deserialize, Serialize};

// =============================================================================
// FEATURE ENUM
// =============================================================================

/// An AI capability gated by demo progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    StandardGeneration,
    StreamingGeneration,
    ImageGeneration,
    SpeechGeneration,
}

impl Feature {
    /// All features in unlock order.
    pub const ALL: [Feature; 4] = [
        Feature::StandardGeneration,
        Feature::StreamingGeneration,
        Feature::ImageGeneration,
        Feature::SpeechGeneration,
    ];

    /// The stage at which this feature switches on.
    #[must_use]
    pub fn required_stage(&self) -> Stage {
        match self {
            Feature::StandardGeneration => Stage::ContentGeneration,
            Feature::StreamingGeneration => Stage::StreamingContent,
            Feature::ImageGeneration => Stage::ImageGeneration,
            Feature::SpeechGeneration => Stage::TextToSpeech,
        }
    }

    /// Wire name, as used in JSON responses.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Feature::StandardGeneration => "standardGeneration",
            Feature::StreamingGeneration => "streamingGeneration",
            Feature::ImageGeneration => "imageGeneration",
            Feature::SpeechGeneration => "speechGeneration",
        }
    }

    /// Get a description of this feature.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Feature::StandardGeneration => "Generate a full blog post from its title",
            Feature::StreamingGeneration => "Stream a blog post token by token as it is written",
            Feature::ImageGeneration => "Generate a header image from the title and content",
            Feature::SpeechGeneration => "Narrate the blog content as MP3 audio",
        }
    }

    /// Check whether a stage has unlocked this feature.
    #[must_use]
    pub fn is_unlocked_at(&self, stage: Stage) -> bool {
        stage >= self.required_stage()
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// CONFIGURATION SEED
// =============================================================================

/// How configured flags interact with the sequencer cursor at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Move the starting cursor to the end of the enabled prefix and derive
    /// flags from it, so cursor and flags agree from the start.
    #[default]
    Align,
    /// Start at stage 0 but show the configured flags verbatim until the
    /// first transition overwrites them.
    Hint,
}

/// The four configured booleans, read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub enable_standard_content_generation: bool,
    pub enable_streaming_content_generation: bool,
    pub enable_image_generation: bool,
    pub enable_speech_generation: bool,
    pub seed_policy: SeedPolicy,
}

impl FeatureConfig {
    /// Configured value for one feature.
    #[must_use]
    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::StandardGeneration => self.enable_standard_content_generation,
            Feature::StreamingGeneration => self.enable_streaming_content_generation,
            Feature::ImageGeneration => self.enable_image_generation,
            Feature::SpeechGeneration => self.enable_speech_generation,
        }
    }

    /// The last stage reachable through a contiguous run of enabled flags.
    ///
    /// `standard + streaming` gives `StreamingContent`; `image` alone gives
    /// `BasicEditor` because the run is broken at `standard`.
    #[must_use]
    pub fn prefix_stage(&self) -> Stage {
        Feature::ALL
            .iter()
            .take_while(|f| self.get(**f))
            .last()
            .map(|f| f.required_stage())
            .unwrap_or(Stage::FIRST)
    }

    /// Whether the enabled flags form a prefix of the unlock order.
    #[must_use]
    pub fn is_prefix(&self) -> bool {
        FeatureFlags::from_config(self) == FeatureFlags::for_stage(self.prefix_stage())
    }
}

// =============================================================================
// FEATURE FLAG SET
// =============================================================================

/// Which capabilities are currently unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub standard_generation: bool,
    pub streaming_generation: bool,
    pub image_generation: bool,
    pub speech_generation: bool,
}

impl FeatureFlags {
    /// All features off.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Seed flags from configuration. Does not involve the cursor.
    #[must_use]
    pub fn from_config(config: &FeatureConfig) -> Self {
        Self {
            standard_generation: config.enable_standard_content_generation,
            streaming_generation: config.enable_streaming_content_generation,
            image_generation: config.enable_image_generation,
            speech_generation: config.enable_speech_generation,
        }
    }

    /// Derive flags from a stage. Pure; feature `i` is on iff `stage >= i + 1`.
    #[must_use]
    pub fn for_stage(stage: Stage) -> Self {
        Self {
            standard_generation: Feature::StandardGeneration.is_unlocked_at(stage),
            streaming_generation: Feature::StreamingGeneration.is_unlocked_at(stage),
            image_generation: Feature::ImageGeneration.is_unlocked_at(stage),
            speech_generation: Feature::SpeechGeneration.is_unlocked_at(stage),
        }
    }

    /// Overwrite these flags in place with the values derived from `stage`.
    pub fn recompute(&mut self, stage: Stage) {
        *self = Self::for_stage(stage);
    }

    /// Check a single feature.
    #[must_use]
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::StandardGeneration => self.standard_generation,
            Feature::StreamingGeneration => self.streaming_generation,
            Feature::ImageGeneration => self.image_generation,
            Feature::SpeechGeneration => self.speech_generation,
        }
    }

    /// Iterate over the enabled features in unlock order.
    pub fn enabled(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|f| self.is_enabled(*f))
    }
}

// =============================================================================
// TESTS
// =============================================================================
