use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::motif::catalog::Catalog;
use crate::UNLABELED;

/// Label coverage over a catalog, used by deployment validators to decide
/// whether there is enough labeled material to train on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStats {
    pub total_motifs: usize,
    pub labeled_motifs: usize,
    pub coverage_percent: f64,
    /// Counts per label, UNLABELED included
    pub label_distribution: BTreeMap<String, usize>,
    pub training_ready: bool,
}

/// Pure read over the catalog — no side effects, no persistence.
pub fn training_stats(catalog: &Catalog) -> TrainingStats {
    let total_motifs = catalog.motifs.len();
    let labeled_motifs = catalog
        .motifs
        .iter()
        .filter(|m| m.label != UNLABELED)
        .count();

    let mut label_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for m in &catalog.motifs {
        *label_distribution.entry(m.label.clone()).or_default() += 1;
    }

    let coverage_percent = if total_motifs > 0 {
        labeled_motifs as f64 / total_motifs as f64 * 100.0
    } else {
        0.0
    };

    TrainingStats {
        total_motifs,
        labeled_motifs,
        coverage_percent,
        label_distribution,
        training_ready: labeled_motifs > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Note;
    use crate::motif::Motif;

    fn motif(id: &str, label: &str) -> Motif {
        Motif {
            id: id.to_string(),
            source_file: "take1.mid".to_string(),
            instrument_index: 0,
            bar_index: 0,
            pitch_pattern_hash: id.to_string(),
            notes: vec![Note {
                pitch: 60,
                velocity: 80,
                start: 0.0,
                duration: 0.4,
            }],
            note_count: 1,
            pitch_range: 0,
            avg_velocity: 80,
            note_density: 0.5,
            duration: 2.0,
            lowest_pitch: 60,
            highest_pitch: 60,
            label: label.to_string(),
            label_description: String::new(),
            is_labeled: label != UNLABELED,
        }
    }

    fn catalog_with(motifs: Vec<Motif>) -> Catalog {
        let mut c = Catalog::new();
        c.motifs = motifs;
        c.total_motifs = c.motifs.len();
        c
    }

    #[test]
    fn six_motifs_one_unlabeled() {
        let catalog = catalog_with(vec![
            motif("m1", "MOMENTUM_POS"),
            motif("m2", "MOMENTUM_POS"),
            motif("m3", "MOMENTUM_NEG"),
            motif("m4", "STEADY"),
            motif("m5", "STEADY"),
            motif("m6", UNLABELED),
        ]);
        let stats = training_stats(&catalog);

        assert_eq!(stats.total_motifs, 6);
        assert_eq!(stats.labeled_motifs, 5);
        assert!((stats.coverage_percent - 83.333333).abs() < 1e-3);
        assert!(stats.training_ready);
        assert_eq!(stats.label_distribution["MOMENTUM_POS"], 2);
        assert_eq!(stats.label_distribution["STEADY"], 2);
        assert_eq!(stats.label_distribution[UNLABELED], 1);
    }

    #[test]
    fn empty_catalog_is_not_training_ready() {
        let stats = training_stats(&Catalog::new());
        assert_eq!(stats.total_motifs, 0);
        assert_eq!(stats.coverage_percent, 0.0);
        assert!(!stats.training_ready);
        assert!(stats.label_distribution.is_empty());
    }

    #[test]
    fn all_unlabeled_is_not_training_ready() {
        let catalog = catalog_with(vec![motif("m1", UNLABELED), motif("m2", UNLABELED)]);
        let stats = training_stats(&catalog);
        assert_eq!(stats.labeled_motifs, 0);
        assert!(!stats.training_ready);
    }
}
