pub mod catalog;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{Note, Performance};
use crate::UNLABELED;

/// Tempo assumed when a recording reports none.
pub const FALLBACK_BPM: f64 = 120.0;

/// Extraction parameters. Defaults suit 4/4 material: a one-bar window,
/// at least three notes to call something a motif, and a cap that stops a
/// pathological dump from flooding the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractParams {
    pub bar_length_beats: f64,
    pub min_notes: usize,
    pub max_motifs: usize,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            bar_length_beats: 4.0,
            min_notes: 3,
            max_motifs: 100,
        }
    }
}

/// A short, independently addressable musical fragment: one bar-length
/// window of one instrument track, with notes re-based to window-relative
/// time and descriptive metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Motif {
    pub id: String,
    pub source_file: String,
    pub instrument_index: usize,
    pub bar_index: usize,
    /// Truncated hash of the ordered pitch sequence — the dedup key
    pub pitch_pattern_hash: String,
    pub notes: Vec<Note>,

    pub note_count: usize,
    pub pitch_range: u8,
    pub avg_velocity: u32,
    /// Notes per second over the window
    pub note_density: f64,
    pub duration: f64,
    pub lowest_pitch: u8,
    pub highest_pitch: u8,

    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub label_description: String,
    #[serde(default)]
    pub is_labeled: bool,
}

fn default_label() -> String {
    UNLABELED.to_string()
}

/// Slice a recording's non-percussion tracks into single-bar motifs.
///
/// A bar-length window slides across the full duration of each track;
/// windows with at least `min_notes` notes emit a motif until `max_motifs`
/// have been emitted for the whole file. Motifs are then deduplicated by
/// pitch pattern, first occurrence winning — melodically identical but
/// differently voiced fragments collapse to one.
pub fn extract_motifs(perf: &Performance, params: &ExtractParams) -> Vec<Motif> {
    let bpm = if perf.bpm > 0.0 { perf.bpm } else { FALLBACK_BPM };
    let bar_secs = params.bar_length_beats * 60.0 / bpm;
    if bar_secs <= 0.0 || perf.duration <= 0.0 {
        return vec![];
    }

    let mut emitted = Vec::new();

    'tracks: for track in &perf.tracks {
        if track.is_percussion {
            log::debug!("{}: skipping percussion track {:?}", perf.source_file, track.name);
            continue;
        }

        let mut bar_index = 0;
        let mut window_start = 0.0;
        while window_start < perf.duration {
            let window_end = window_start + bar_secs;
            let mut window_notes: Vec<Note> = track
                .notes
                .iter()
                .filter(|n| n.start >= window_start && n.start < window_end)
                .cloned()
                .collect();

            if window_notes.len() >= params.min_notes {
                window_notes.sort_by(|a, b| {
                    a.start
                        .partial_cmp(&b.start)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.pitch.cmp(&b.pitch))
                });
                for n in &mut window_notes {
                    n.start -= window_start;
                }
                emitted.push(build_motif(
                    &perf.source_file,
                    track.instrument_index,
                    bar_index,
                    window_notes,
                    bar_secs,
                ));
                if emitted.len() >= params.max_motifs {
                    log::info!(
                        "{}: motif cap {} reached, stopping extraction",
                        perf.source_file,
                        params.max_motifs
                    );
                    break 'tracks;
                }
            }

            bar_index += 1;
            window_start = bar_index as f64 * bar_secs;
        }
    }

    // Dedup by pitch pattern across the whole file, first occurrence wins
    let mut seen: HashSet<String> = HashSet::new();
    let before = emitted.len();
    let motifs: Vec<Motif> = emitted
        .into_iter()
        .filter(|m| seen.insert(m.pitch_pattern_hash.clone()))
        .collect();
    if motifs.len() < before {
        log::debug!(
            "{}: dropped {} duplicate pitch patterns",
            perf.source_file,
            before - motifs.len()
        );
    }
    motifs
}

fn build_motif(
    source_file: &str,
    instrument_index: usize,
    bar_index: usize,
    notes: Vec<Note>,
    duration: f64,
) -> Motif {
    let note_count = notes.len();
    let lowest_pitch = notes.iter().map(|n| n.pitch).min().unwrap_or(0);
    let highest_pitch = notes.iter().map(|n| n.pitch).max().unwrap_or(0);
    let avg_velocity = if note_count > 0 {
        (notes.iter().map(|n| n.velocity as f64).sum::<f64>() / note_count as f64).round() as u32
    } else {
        0
    };

    let pitch_pattern_hash = pitch_pattern_hash(&notes);
    let id = truncated_sha256(&format!(
        "{source_file}|{instrument_index}|{bar_index}|{pitch_pattern_hash}"
    ));

    Motif {
        id,
        source_file: source_file.to_string(),
        instrument_index,
        bar_index,
        pitch_pattern_hash,
        note_count,
        pitch_range: highest_pitch - lowest_pitch,
        avg_velocity,
        note_density: note_count as f64 / duration,
        duration,
        lowest_pitch,
        highest_pitch,
        notes,
        label: UNLABELED.to_string(),
        label_description: String::new(),
        is_labeled: false,
    }
}

/// Truncated hash of the ordered pitch sequence within the window.
/// Voicing (velocity, exact timing) is deliberately excluded.
fn pitch_pattern_hash(notes: &[Note]) -> String {
    let pattern = notes
        .iter()
        .map(|n| n.pitch.to_string())
        .collect::<Vec<_>>()
        .join(",");
    truncated_sha256(&pattern)
}

fn truncated_sha256(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Bucket motifs into overlapping descriptive categories by independent
/// thresholds. A motif may land in any number of lists.
pub fn categorize(motifs: &[Motif]) -> BTreeMap<String, Vec<String>> {
    let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut put = |name: &str, id: &str| {
        categories
            .entry(name.to_string())
            .or_default()
            .push(id.to_string());
    };

    for m in motifs {
        let avg_pitch = if m.note_count > 0 {
            m.notes.iter().map(|n| n.pitch as f64).sum::<f64>() / m.note_count as f64
        } else {
            0.0
        };

        if avg_pitch < 60.0 {
            put("low_pitch", &m.id);
        }
        if avg_pitch > 72.0 {
            put("high_pitch", &m.id);
        }
        if m.note_density > 2.0 {
            put("dense", &m.id);
        }
        if m.note_density < 0.5 {
            put("sparse", &m.id);
        }
        if m.pitch_range > 12 {
            put("wide_range", &m.id);
        }
        if m.pitch_range < 5 {
            put("narrow_range", &m.id);
        }
        if m.avg_velocity < 50 {
            put("soft", &m.id);
        }
        if m.avg_velocity > 100 {
            put("loud", &m.id);
        }
    }

    categories
}
