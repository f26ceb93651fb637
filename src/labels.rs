use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Bar, Performance};
use crate::motif::catalog::Catalog;
use crate::{LABEL_MARKER_PREFIXES, UNLABELED};

/// An externally supplied per-bar label, from a manual CSV row or an
/// embedded marker event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarLabel {
    pub bar_index: usize,
    pub label: String,
    pub description: String,
}

/// A bar with its merged label state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledBar {
    pub bar_index: usize,
    pub label: String,
    pub label_description: String,
    pub is_labeled: bool,
}

/// Result of merging external labels onto a bar collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarLabelMerge {
    pub bars: Vec<LabeledBar>,
    pub labeled: usize,
    pub total: usize,
    pub training_ready: bool,
}

/// Result of projecting bar labels onto the motif catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationResult {
    /// Motifs from the labeled source file that received a label
    pub labeled: usize,
    /// Motifs from the labeled source file that were touched at all
    pub touched: usize,
    pub coverage_percent: f64,
    pub training_ready: bool,
}

/// Parse a manual label file: `bar_index,label,description` rows, comment
/// rows prefixed `#` skipped. Descriptions may contain commas — only the
/// first two fields are split off. A non-numeric first field (e.g. a header
/// row) is skipped with a debug log.
pub fn parse_label_csv(text: &str) -> Vec<BarLabel> {
    let mut labels = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.splitn(3, ',');
        let index_field = fields.next().unwrap_or("").trim();
        let bar_index = match index_field.parse::<usize>() {
            Ok(i) => i,
            Err(_) => {
                log::debug!("label csv line {}: non-numeric bar index {index_field:?}, skipped", lineno + 1);
                continue;
            }
        };
        let label = fields.next().unwrap_or("").trim().to_string();
        if label.is_empty() {
            log::warn!("label csv line {}: empty label, skipped", lineno + 1);
            continue;
        }
        let description = fields.next().unwrap_or("").trim().to_string();
        labels.push(BarLabel {
            bar_index,
            label,
            description,
        });
    }
    labels
}

/// Extract bar labels from embedded marker events. A marker participates
/// when its text starts with a reserved label prefix; the text splits on
/// the first `:` into label and description, and the marker time maps to
/// the bar whose span contains it.
pub fn labels_from_markers(perf: &Performance, bar_secs: f64) -> Vec<BarLabel> {
    if bar_secs <= 0.0 {
        return vec![];
    }
    let mut labels = Vec::new();
    for marker in &perf.markers {
        let text = marker.text.trim();
        if !LABEL_MARKER_PREFIXES.iter().any(|p| text.starts_with(p)) {
            continue;
        }
        let (label, description) = match text.split_once(':') {
            Some((l, d)) => (l.trim().to_string(), d.trim().to_string()),
            None => (text.to_string(), String::new()),
        };
        let bar_index = (marker.time / bar_secs).floor() as usize;
        labels.push(BarLabel {
            bar_index,
            label,
            description,
        });
    }
    labels
}

/// Merge external labels onto a bar collection. Bars without a matching
/// entry come out UNLABELED. When a bar index appears more than once in the
/// label source, the last entry wins.
pub fn apply_bar_labels(bars: &[Bar], labels: &[BarLabel]) -> BarLabelMerge {
    let by_index: BTreeMap<usize, &BarLabel> =
        labels.iter().map(|l| (l.bar_index, l)).collect();

    let mut labeled = 0;
    let merged: Vec<LabeledBar> = bars
        .iter()
        .map(|bar| match by_index.get(&bar.bar_index) {
            Some(l) => {
                labeled += 1;
                LabeledBar {
                    bar_index: bar.bar_index,
                    label: l.label.clone(),
                    label_description: l.description.clone(),
                    is_labeled: true,
                }
            }
            None => LabeledBar {
                bar_index: bar.bar_index,
                label: UNLABELED.to_string(),
                label_description: String::new(),
                is_labeled: false,
            },
        })
        .collect();

    BarLabelMerge {
        total: merged.len(),
        labeled,
        training_ready: labeled > 0,
        bars: merged,
    }
}

/// Project bar-level labels onto the catalog for one source file.
///
/// Motifs from `source_file` whose bar index has a label entry get that
/// label; the file's remaining motifs are reset to UNLABELED. Motifs from
/// other files are untouched. This is a pure merge — it never invents
/// labels and never removes catalog entries. Training metadata is
/// recomputed over the whole catalog afterwards.
pub fn propagate_to_catalog(
    catalog: &mut Catalog,
    source_file: &str,
    labels: &[BarLabel],
) -> PropagationResult {
    let by_index: BTreeMap<usize, &BarLabel> =
        labels.iter().map(|l| (l.bar_index, l)).collect();

    let mut touched = 0;
    let mut labeled = 0;
    for motif in &mut catalog.motifs {
        if motif.source_file != source_file {
            continue;
        }
        touched += 1;
        match by_index.get(&motif.bar_index) {
            Some(l) => {
                motif.label = l.label.clone();
                motif.label_description = l.description.clone();
                motif.is_labeled = true;
                labeled += 1;
            }
            None => {
                motif.label = UNLABELED.to_string();
                motif.label_description = String::new();
                motif.is_labeled = false;
            }
        }
    }

    catalog.rebuild_indexes();

    log::info!(
        "{source_file}: labeled {labeled}/{touched} motifs, catalog coverage {:.1}%",
        catalog.training_metadata.coverage_percent
    );

    PropagationResult {
        labeled,
        touched,
        coverage_percent: catalog.training_metadata.coverage_percent,
        training_ready: catalog.training_metadata.training_ready,
    }
}
