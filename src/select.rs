use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::model::Note;
use crate::motif::catalog::Catalog;
use crate::motif::Motif;
use crate::rules::{decide_label_from_metrics, RuleSet};

/// Id prefix marking synthetic placeholder motifs, so callers can detect
/// degraded-mode output.
pub const FALLBACK_ID_PREFIX: &str = "fallback-";

/// Decide a label from the metrics vector and draw `count` matching motifs
/// from the catalog.
///
/// Selection is deterministic per (tenant, label, catalog state): the same
/// inputs always yield the same ordered list, while different tenants
/// usually diverge. Scarcity degrades gracefully — first to unlabeled
/// motifs, then to differently-labeled ones, finally to synthetic
/// placeholders tagged with [`FALLBACK_ID_PREFIX`].
pub fn select_motifs_by_label(
    metrics: &HashMap<String, f64>,
    mode: &str,
    tenant_id: &str,
    count: usize,
    catalog: &Catalog,
    rules: &RuleSet,
) -> Result<Vec<Motif>> {
    let label = decide_label_from_metrics(metrics, mode, rules)?;
    Ok(sample_catalog(&label, tenant_id, count, catalog))
}

/// Draw `count` motifs for an already-decided label.
pub fn sample_catalog(label: &str, tenant_id: &str, count: usize, catalog: &Catalog) -> Vec<Motif> {
    if catalog.motifs.is_empty() {
        log::warn!(
            "catalog is empty, serving {count} synthetic {label} motifs to {tenant_id}"
        );
        return synthetic_fallback(label, count);
    }

    let mut rng = StdRng::seed_from_u64(selection_seed(tenant_id, label));

    let mut primary: Vec<&Motif> = Vec::new();
    let mut unlabeled: Vec<&Motif> = Vec::new();
    let mut other: Vec<&Motif> = Vec::new();
    for m in &catalog.motifs {
        if m.label == label {
            primary.push(m);
        } else if !m.is_labeled {
            unlabeled.push(m);
        } else {
            other.push(m);
        }
    }

    // One seeded stream shuffles every pool; pool preference order is
    // primary, then unlabeled, then differently-labeled.
    primary.shuffle(&mut rng);
    unlabeled.shuffle(&mut rng);
    other.shuffle(&mut rng);

    let mut selected: Vec<Motif> = primary
        .into_iter()
        .chain(unlabeled)
        .chain(other)
        .take(count)
        .cloned()
        .collect();

    if selected.len() < count {
        let missing = count - selected.len();
        log::warn!(
            "catalog exhausted at {} motifs for {label}, padding {missing} synthetic entries",
            selected.len()
        );
        selected.extend(synthetic_fallback(label, missing));
    }

    selected
}

/// Stable selection seed: first 8 bytes of Sha256 over tenant and label.
/// Including the label makes selections for different decided labels
/// diverge for the same tenant.
fn selection_seed(tenant_id: &str, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update(b":");
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Synthetic placeholder motifs for degraded-mode operation. The id prefix
/// is the degraded marker; the label is still populated so downstream
/// rendering never sees a missing label.
fn synthetic_fallback(label: &str, count: usize) -> Vec<Motif> {
    (0..count)
        .map(|i| Motif {
            id: format!("{FALLBACK_ID_PREFIX}{label}-{i}"),
            source_file: String::new(),
            instrument_index: 0,
            bar_index: 0,
            pitch_pattern_hash: String::new(),
            notes: Vec::<Note>::new(),
            note_count: 0,
            pitch_range: 0,
            avg_velocity: 0,
            note_density: 0.0,
            duration: 0.0,
            lowest_pitch: 0,
            highest_pitch: 0,
            label: label.to_string(),
            label_description: String::new(),
            is_labeled: false,
        })
        .collect()
}
