//! Canonical subtitle data model shared by every acquisition path.

use serde::{Deserialize, Serialize};

/// A single bilingual subtitle line.
/// Sequences of these are always numbered `1..=N` without gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    /// 1-based position in the sequence.
    pub index: u32,
    /// Start offset formatted as `HH:MM:SS,mmm`.
    #[serde(rename = "startTime")]
    pub start_time: String,
    /// End offset formatted as `HH:MM:SS,mmm`.
    #[serde(rename = "endTime")]
    pub end_time: String,
    /// Original-language transcription.
    pub original: String,
    /// Target-language translation.
    pub translation: String,
}
