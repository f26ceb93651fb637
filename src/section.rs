use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::model::{Bar, BarSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    NoteOn,
    NoteOff,
}

/// One NOTE_ON/NOTE_OFF event, timed relative to the section start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub pitch: u8,
    pub velocity: u8,
    pub time: f64,
}

/// A fixed-size group of consecutive bars reduced to an ordered token
/// sequence. The content hash covers the token sequence only — never the
/// section's position in the piece — so identical musical content always
/// hashes identically wherever it occurs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub section_index: usize,
    pub token_sequence: Vec<Token>,
    /// Bars in the group that contained at least one note
    pub bars_covered: usize,
    pub content_hash: String,
    pub note_count: usize,
    pub avg_pitch: f64,
    pub avg_velocity: f64,
    pub avg_bpm: f64,
    pub pitch_range: u8,
    pub duration: f64,
}

/// Tokenizer output for one source file: every retained (deduplicated)
/// section plus formation counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionCatalog {
    pub tenant_id: String,
    pub file_id: String,
    pub section_size: usize,
    /// Groups formed, including duplicates
    pub total_sections: usize,
    /// Groups retained after content-hash dedup (== sections.len())
    pub unique_sections: usize,
    pub sections: Vec<Section>,
}

/// Group bars into fixed-size sections, tokenize, hash, and deduplicate.
///
/// The final group, if shorter than `section_size`, is retained and padded
/// positionally — padding positions contribute no tokens and don't count
/// toward `bars_covered`. Dedup keeps the first occurrence of each content
/// hash in piece order.
pub fn tokenize_sections(input: &BarSet, section_size: usize) -> Result<SectionCatalog> {
    if input.error {
        return Err(CoreError::Upstream {
            tenant_id: input.tenant_id.clone(),
            file_id: input.file_id.clone(),
            message: input
                .error_message
                .clone()
                .unwrap_or_else(|| "bar source reported an error".to_string()),
        });
    }
    if input.bars.is_empty() {
        return Err(CoreError::EmptyInput {
            tenant_id: input.tenant_id.clone(),
            file_id: input.file_id.clone(),
        });
    }

    let section_size = section_size.max(1);
    let mut sections = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut total_sections = 0;

    for (section_index, group) in input.bars.chunks(section_size).enumerate() {
        total_sections += 1;
        let section = build_section(section_index, group);

        if seen.insert(section.content_hash.clone()) {
            sections.push(section);
        } else {
            log::debug!(
                "{}/{}: section {} duplicates an earlier section, dropped",
                input.tenant_id,
                input.file_id,
                section_index
            );
        }
    }

    Ok(SectionCatalog {
        tenant_id: input.tenant_id.clone(),
        file_id: input.file_id.clone(),
        section_size,
        total_sections,
        unique_sections: sections.len(),
        sections,
    })
}

fn build_section(section_index: usize, group: &[Bar]) -> Section {
    let group_start = group.first().map(|b| b.start_sec).unwrap_or(0.0);
    let group_end = group.last().map(|b| b.end_sec).unwrap_or(group_start);

    let mut tokens = Vec::new();
    let mut bars_covered = 0;
    let mut note_count = 0;
    let mut pitch_sum = 0.0;
    let mut velocity_sum = 0.0;
    let mut pitch_min = u8::MAX;
    let mut pitch_max = u8::MIN;

    for bar in group {
        if !bar.notes.is_empty() {
            bars_covered += 1;
        }
        let bar_offset = bar.start_sec - group_start;
        for note in &bar.notes {
            let on_time = bar_offset + note.start;
            tokens.push(Token {
                kind: TokenKind::NoteOn,
                pitch: note.pitch,
                velocity: note.velocity,
                time: on_time,
            });
            tokens.push(Token {
                kind: TokenKind::NoteOff,
                pitch: note.pitch,
                velocity: 0,
                time: on_time + note.duration,
            });
            note_count += 1;
            pitch_sum += note.pitch as f64;
            velocity_sum += note.velocity as f64;
            pitch_min = pitch_min.min(note.pitch);
            pitch_max = pitch_max.max(note.pitch);
        }
    }

    // Order by time, pitch as tie-break, NOTE_ON before NOTE_OFF last
    tokens.sort_by(|a, b| {
        a.time
            .partial_cmp(&b.time)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.pitch.cmp(&b.pitch))
            .then(kind_rank(a.kind).cmp(&kind_rank(b.kind)))
    });

    let avg_bpm = if group.is_empty() {
        0.0
    } else {
        group.iter().map(|b| b.bpm).sum::<f64>() / group.len() as f64
    };

    Section {
        section_index,
        content_hash: content_hash(&tokens),
        bars_covered,
        note_count,
        avg_pitch: if note_count > 0 {
            pitch_sum / note_count as f64
        } else {
            0.0
        },
        avg_velocity: if note_count > 0 {
            velocity_sum / note_count as f64
        } else {
            0.0
        },
        avg_bpm,
        pitch_range: if note_count > 0 { pitch_max - pitch_min } else { 0 },
        duration: (group_end - group_start).max(0.0),
        token_sequence: tokens,
    }
}

fn kind_rank(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::NoteOn => 0,
        TokenKind::NoteOff => 1,
    }
}

/// Canonical serialization of a token sequence fed into Sha256.
/// Stable field order and fixed numeric formatting keep the hash
/// position-independent and platform-independent.
fn content_hash(tokens: &[Token]) -> String {
    let mut canonical = String::with_capacity(tokens.len() * 20);
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 {
            canonical.push(';');
        }
        let kind = match t.kind {
            TokenKind::NoteOn => "ON",
            TokenKind::NoteOff => "OFF",
        };
        canonical.push_str(&format!("{kind}|{}|{}|{:.6}", t.pitch, t.velocity, t.time));
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bar, Note, TimeSignature};

    fn note(pitch: u8, velocity: u8, start: f64, duration: f64) -> Note {
        Note {
            pitch,
            velocity,
            start,
            duration,
        }
    }

    fn bar(bar_index: usize, start_sec: f64, notes: Vec<Note>) -> Bar {
        Bar {
            bar_index,
            notes,
            time_signature: TimeSignature::default(),
            bpm: 120.0,
            start_sec,
            end_sec: start_sec + 2.0,
        }
    }

    fn barset(bars: Vec<Bar>) -> BarSet {
        BarSet {
            tenant_id: "tenant-a".to_string(),
            file_id: "file-1".to_string(),
            error: false,
            error_message: None,
            total_bars: bars.len(),
            bars,
        }
    }

    /// One section's worth of bars with a fixed riff, starting at `t0`.
    fn riff_group(first_index: usize, t0: f64) -> Vec<Bar> {
        (0..4)
            .map(|i| {
                bar(
                    first_index + i,
                    t0 + i as f64 * 2.0,
                    vec![note(60, 90, 0.0, 0.5), note(64, 85, 0.5, 0.5)],
                )
            })
            .collect()
    }

    #[test]
    fn identical_content_at_different_positions_hashes_identically() {
        let mut bars = riff_group(0, 0.0);
        bars.extend(riff_group(4, 8.0));
        let catalog = tokenize_sections(&barset(bars), 4).unwrap();

        assert_eq!(catalog.total_sections, 2);
        assert_eq!(catalog.unique_sections, 1, "duplicate section should be dropped");
        assert_eq!(catalog.sections.len(), 1);
        // The retained section is the first occurrence
        assert_eq!(catalog.sections[0].section_index, 0);
    }

    #[test]
    fn distinct_content_is_retained() {
        let mut bars = riff_group(0, 0.0);
        bars.extend(
            (0..4).map(|i| bar(4 + i, 8.0 + i as f64 * 2.0, vec![note(72, 100, 0.0, 1.0)])),
        );
        let catalog = tokenize_sections(&barset(bars), 4).unwrap();

        assert_eq!(catalog.total_sections, 2);
        assert_eq!(catalog.unique_sections, 2);
        assert_ne!(
            catalog.sections[0].content_hash,
            catalog.sections[1].content_hash
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = tokenize_sections(&barset(vec![]), 4).unwrap_err();
        match err {
            CoreError::EmptyInput { tenant_id, file_id } => {
                assert_eq!(tenant_id, "tenant-a");
                assert_eq!(file_id, "file-1");
            }
            other => panic!("expected EmptyInput, got {other:?}"),
        }
    }

    #[test]
    fn upstream_error_passes_through_with_identifiers() {
        let mut bs = barset(riff_group(0, 0.0));
        bs.error = true;
        bs.error_message = Some("container truncated".to_string());

        let err = tokenize_sections(&bs, 4).unwrap_err();
        match err {
            CoreError::Upstream {
                tenant_id,
                file_id,
                message,
            } => {
                assert_eq!(tenant_id, "tenant-a");
                assert_eq!(file_id, "file-1");
                assert_eq!(message, "container truncated");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[test]
    fn short_final_group_is_retained() {
        let mut bars = riff_group(0, 0.0);
        bars.push(bar(4, 8.0, vec![note(67, 70, 0.0, 1.0)]));
        bars.push(bar(5, 10.0, vec![]));
        let catalog = tokenize_sections(&barset(bars), 4).unwrap();

        assert_eq!(catalog.total_sections, 2);
        let tail = catalog
            .sections
            .iter()
            .find(|s| s.section_index == 1)
            .expect("final short group should be kept");
        // Two real bars in the group, one silent
        assert_eq!(tail.bars_covered, 1);
        assert_eq!(tail.note_count, 1);
    }

    #[test]
    fn silent_bars_contribute_no_tokens_but_occupy_positions() {
        let bars = vec![
            bar(0, 0.0, vec![note(60, 80, 0.0, 0.5)]),
            bar(1, 2.0, vec![]),
            bar(2, 4.0, vec![note(62, 80, 0.0, 0.5)]),
            bar(3, 6.0, vec![]),
        ];
        let catalog = tokenize_sections(&barset(bars), 4).unwrap();
        let s = &catalog.sections[0];

        assert_eq!(s.bars_covered, 2);
        assert_eq!(s.token_sequence.len(), 4, "2 notes -> 4 tokens");
        // The silent bars still stretch the section's span
        assert!(s.duration >= 8.0 - f64::EPSILON);
    }

    #[test]
    fn tokens_are_ordered_by_time_then_pitch() {
        // Two simultaneous notes: higher pitch listed first in the input
        let bars = vec![bar(
            0,
            0.0,
            vec![note(67, 80, 0.0, 1.0), note(60, 80, 0.0, 1.0)],
        )];
        let catalog = tokenize_sections(&barset(bars), 4).unwrap();
        let tokens = &catalog.sections[0].token_sequence;

        assert_eq!(tokens[0].pitch, 60);
        assert_eq!(tokens[0].kind, TokenKind::NoteOn);
        assert_eq!(tokens[1].pitch, 67);
        assert_eq!(tokens[1].kind, TokenKind::NoteOn);
    }

    #[test]
    fn all_silent_section_still_emitted_with_hash() {
        let bars = vec![bar(0, 0.0, vec![]), bar(1, 2.0, vec![])];
        let catalog = tokenize_sections(&barset(bars), 4).unwrap();

        assert_eq!(catalog.unique_sections, 1);
        let s = &catalog.sections[0];
        assert!(s.token_sequence.is_empty());
        assert_eq!(s.bars_covered, 0);
        assert!(!s.content_hash.is_empty());
    }

    #[test]
    fn token_count_matches_unique_sections() {
        let mut bars = riff_group(0, 0.0);
        bars.extend(riff_group(4, 8.0));
        bars.extend(
            (0..4).map(|i| bar(8 + i, 16.0 + i as f64 * 2.0, vec![note(48, 60, 0.0, 0.25)])),
        );
        let catalog = tokenize_sections(&barset(bars), 4).unwrap();

        assert_eq!(catalog.total_sections, 3);
        assert_eq!(catalog.unique_sections, 2);
        assert_eq!(catalog.sections.len(), catalog.unique_sections);
    }
}
