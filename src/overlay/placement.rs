//! Jingle placement model and offset computation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a jingle is placed relative to the main track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JinglePosition {
    Start,
    Middle,
    End,
    /// Two placements of the same jingle: one at the start, one at the end.
    StartEnd,
}

impl JinglePosition {
    pub const ALL: [JinglePosition; 4] = [
        JinglePosition::Start,
        JinglePosition::Middle,
        JinglePosition::End,
        JinglePosition::StartEnd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
            Self::StartEnd => "start-end",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(Self::Start),
            "middle" => Some(Self::Middle),
            "end" => Some(Self::End),
            "start-end" | "start_end" => Some(Self::StartEnd),
            _ => None,
        }
    }
}

impl Default for JinglePosition {
    fn default() -> Self {
        Self::Start
    }
}

/// One requested jingle overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct MixEntry {
    pub jingle_id: String,
    pub jingle_path: PathBuf,
    pub position: JinglePosition,
    /// Linear gain in [0, 1].
    pub volume: f32,
}

/// Ordered list of jingle overlays to apply to a main track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixSpec {
    pub entries: Vec<MixEntry>,
}

impl MixSpec {
    pub fn new(entries: Vec<MixEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct jingles referenced by the spec.
    pub fn distinct_jingles(&self) -> usize {
        let mut ids: Vec<&str> = self.entries.iter().map(|e| e.jingle_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

/// A single concrete overlay instance after position expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub jingle_id: String,
    pub jingle_path: PathBuf,
    pub volume: f32,
    pub offset_ms: u64,
    pub jingle_duration_ms: u64,
}

impl Placement {
    pub fn end_ms(&self) -> u64 {
        self.offset_ms + self.jingle_duration_ms
    }
}

pub fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

/// Offsets in milliseconds at which a jingle starts for the given position.
///
/// `start-end` yields two offsets; every other position yields one.
pub fn placement_offsets_ms(position: JinglePosition, main_ms: u64, jingle_ms: u64) -> Vec<u64> {
    let tail = main_ms.saturating_sub(jingle_ms);
    match position {
        JinglePosition::Start => vec![0],
        JinglePosition::Middle => vec![tail / 2],
        JinglePosition::End => vec![tail],
        JinglePosition::StartEnd => vec![0, tail],
    }
}

/// Expand a spec into concrete placements, given the measured durations.
///
/// `jingle_durations_ms` is indexed like `spec.entries`.
pub fn expand_placements(
    spec: &MixSpec,
    main_ms: u64,
    jingle_durations_ms: &[u64],
) -> Vec<Placement> {
    spec.entries
        .iter()
        .zip(jingle_durations_ms.iter())
        .flat_map(|(entry, &jingle_ms)| {
            placement_offsets_ms(entry.position, main_ms, jingle_ms)
                .into_iter()
                .map(move |offset_ms| Placement {
                    jingle_id: entry.jingle_id.clone(),
                    jingle_path: entry.jingle_path.clone(),
                    volume: entry.volume,
                    offset_ms,
                    jingle_duration_ms: jingle_ms,
                })
        })
        .collect()
}

/// Duration of the mixed output under longest-input semantics.
pub fn expected_mix_duration_ms(main_ms: u64, placements: &[Placement]) -> u64 {
    placements
        .iter()
        .map(Placement::end_ms)
        .fold(main_ms, u64::max)
}
