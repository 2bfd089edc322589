//! Pipeline stage kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage failure affects the owning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure ends the job.
    Fatal,
    /// Failures degrade the output; the pipeline continues.
    Tolerated,
}

/// The stages of the generation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Text generation of the video concept.
    Ideation,
    /// Text generation of per-scene descriptions.
    Scripting,
    /// One video clip per scene.
    ClipSynthesis,
    /// One sound track per clip.
    AudioSynthesis,
    /// Stitching clips and sound into the final video.
    Composition,
}

impl StageKind {
    /// All stages in execution order.
    pub const ALL: [Self; 5] = [
        Self::Ideation,
        Self::Scripting,
        Self::ClipSynthesis,
        Self::AudioSynthesis,
        Self::Composition,
    ];

    /// Returns the failure policy for this stage.
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            Self::AudioSynthesis => FailurePolicy::Tolerated,
            _ => FailurePolicy::Fatal,
        }
    }

    /// Progress text shown to observers while the stage runs.
    #[must_use]
    pub fn progress_message(&self) -> &'static str {
        match self {
            Self::Ideation => "Generating creative video idea...",
            Self::Scripting => "Creating detailed video scenes...",
            Self::ClipSynthesis => "Generating video clips (this may take several minutes)...",
            Self::AudioSynthesis => "Generating ASMR sounds...",
            Self::Composition => "Merging video clips into final video...",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ideation => write!(f, "ideation"),
            Self::Scripting => write!(f, "scripting"),
            Self::ClipSynthesis => write!(f, "clip_synthesis"),
            Self::AudioSynthesis => write!(f, "audio_synthesis"),
            Self::Composition => write!(f, "composition"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_audio_is_tolerated() {
        for kind in StageKind::ALL {
            let expected = if kind == StageKind::AudioSynthesis {
                FailurePolicy::Tolerated
            } else {
                FailurePolicy::Fatal
            };
            assert_eq!(kind.failure_policy(), expected, "{kind}");
        }
    }

    #[test]
    fn test_stage_order() {
        let mut sorted = StageKind::ALL;
        sorted.sort();
        assert_eq!(sorted, StageKind::ALL);
    }

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::ClipSynthesis.to_string(), "clip_synthesis");
        let json = serde_json::to_string(&StageKind::AudioSynthesis).unwrap();
        assert_eq!(json, r#""audio_synthesis""#);
    }
}
