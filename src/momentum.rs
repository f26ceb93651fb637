use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::section::{Section, SectionCatalog, TokenKind};

/// Coarse sentiment classification derived from tempo, loudness, and
/// pitch-contour signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Positive,
    Negative,
    Neutral,
}

impl Momentum {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Momentum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-section classification with the component values that produced it,
/// kept for auditability. Recomputed whenever parameters change — nothing
/// here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumResult {
    pub section_id: usize,
    pub label: Momentum,
    pub score: f64,
    pub tempo_norm: f64,
    pub velocity_norm: f64,
    pub pitch_slope_norm: f64,
}

/// Distribution summary over a batch of classification results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumSummary {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub dominant: Momentum,
    /// True iff more than one distinct label appears
    pub momentum_variance: bool,
    pub mean_score: f64,
}

// Fixed component weights: tempo and velocity carry the score, pitch
// contour breaks ties between equally loud/fast sections.
const TEMPO_WEIGHT: f64 = 0.4;
const VELOCITY_WEIGHT: f64 = 0.4;
const SLOPE_WEIGHT: f64 = 0.2;

const POSITIVE_THRESHOLD: f64 = 0.65;
const NEGATIVE_THRESHOLD: f64 = 0.35;

/// Classify every retained section in the catalog.
/// Every section receives a label, including all-silent ones.
pub fn classify_sections(catalog: &SectionCatalog) -> Result<Vec<MomentumResult>> {
    if catalog.sections.is_empty() {
        return Err(CoreError::EmptyInput {
            tenant_id: catalog.tenant_id.clone(),
            file_id: catalog.file_id.clone(),
        });
    }
    Ok(catalog.sections.iter().map(classify_section).collect())
}

/// Classify a single section from its aggregates and token sequence.
pub fn classify_section(section: &Section) -> MomentumResult {
    let tempo_norm = ((section.avg_bpm - 60.0) / 100.0).clamp(0.0, 1.0);
    let velocity_norm = (section.avg_velocity / 100.0).clamp(0.0, 1.0);

    let pitches: Vec<f64> = section
        .token_sequence
        .iter()
        .filter(|t| t.kind == TokenKind::NoteOn)
        .map(|t| t.pitch as f64)
        .collect();
    let slope = pitch_slope(&pitches);
    let pitch_slope_norm = normalize_slope(slope);

    let score = weighted_score(tempo_norm, velocity_norm, pitch_slope_norm);

    MomentumResult {
        section_id: section.section_index,
        label: label_for_score(score),
        score,
        tempo_norm,
        velocity_norm,
        pitch_slope_norm,
    }
}

/// Least-squares slope of pitch values over their 0-based time-order index.
/// Fewer than two points yields exactly 0.0.
pub fn pitch_slope(pitches: &[f64]) -> f64 {
    let n = pitches.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = pitches.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in pitches.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Map a raw slope onto [0, 1] with 0.5 as the flat anchor.
/// A slope of ±12 semitones per note saturates the scale.
pub fn normalize_slope(slope: f64) -> f64 {
    (0.5 + (slope / 12.0) * 0.5).clamp(0.0, 1.0)
}

pub fn weighted_score(tempo_norm: f64, velocity_norm: f64, pitch_slope_norm: f64) -> f64 {
    TEMPO_WEIGHT * tempo_norm + VELOCITY_WEIGHT * velocity_norm + SLOPE_WEIGHT * pitch_slope_norm
}

/// Boundary scores (exactly 0.35 or 0.65) classify as neutral.
fn label_for_score(score: f64) -> Momentum {
    if score > POSITIVE_THRESHOLD {
        Momentum::Positive
    } else if score < NEGATIVE_THRESHOLD {
        Momentum::Negative
    } else {
        Momentum::Neutral
    }
}

/// Distribution analysis over a batch of results: label counts, the
/// dominant label, whether the piece moves between labels at all, and the
/// mean score.
pub fn summarize(results: &[MomentumResult]) -> MomentumSummary {
    let positive = results.iter().filter(|r| r.label == Momentum::Positive).count();
    let negative = results.iter().filter(|r| r.label == Momentum::Negative).count();
    let neutral = results.iter().filter(|r| r.label == Momentum::Neutral).count();

    let dominant = [
        (Momentum::Positive, positive),
        (Momentum::Negative, negative),
        (Momentum::Neutral, neutral),
    ]
    .iter()
    .max_by_key(|(_, count)| *count)
    .map(|(label, _)| *label)
    .unwrap_or(Momentum::Neutral);

    let distinct = [positive, negative, neutral]
        .iter()
        .filter(|&&c| c > 0)
        .count();

    let mean_score = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
    };

    MomentumSummary {
        positive,
        negative,
        neutral,
        dominant,
        momentum_variance: distinct > 1,
        mean_score,
    }
}
