use serde::{Deserialize, Serialize};

/// A single note with timing in seconds.
///
/// For notes inside a [`Bar`], `start` is bar-relative. For notes on a
/// [`Track`], `start` is absolute within the recording. Motif extraction
/// re-bases track notes to window-relative time when it emits a motif.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch, 0-127
    pub pitch: u8,
    /// MIDI velocity, 0-127
    pub velocity: u8,
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

/// One bar of performance data as delivered by the bar source.
/// Bars are write-once: nothing downstream mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub bar_index: usize,
    /// Notes with bar-relative start times
    pub notes: Vec<Note>,
    #[serde(default)]
    pub time_signature: TimeSignature,
    pub bpm: f64,
    pub start_sec: f64,
    pub end_sec: f64,
}

impl Bar {
    pub fn duration_secs(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }
}

/// The inbound bar-source contract: an ordered bar sequence for one source
/// recording, tagged with tenant/file identifiers. When `error` is set the
/// upstream extraction failed and every core stage passes the failure
/// through rather than fabricating output from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarSet {
    pub tenant_id: String,
    pub file_id: String,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub total_bars: usize,
    pub bars: Vec<Bar>,
}

/// A named instrument track within a recording.
/// Track notes carry absolute start times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub instrument_index: usize,
    #[serde(default)]
    pub is_percussion: bool,
    pub notes: Vec<Note>,
}

/// An embedded text marker on the recording timeline. Markers whose text
/// begins with a reserved label prefix double as bar-label annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marker {
    pub time: f64,
    pub text: String,
}

/// A whole source recording, already parsed by the upstream loader:
/// instrument tracks plus timeline markers. Input to motif extraction and
/// marker-based label propagation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performance {
    pub source_file: String,
    /// File tempo; values <= 0 fall back to 120 bpm downstream
    pub bpm: f64,
    /// Total duration in seconds
    pub duration: f64,
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub markers: Vec<Marker>,
}
