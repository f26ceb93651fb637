use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::motif::{categorize, Motif};

pub const CATALOG_VERSION: u32 = 1;

/// Label coverage bookkeeping stored inside the catalog, refreshed by
/// label propagation and motif merges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub labeled_count: usize,
    pub total_count: usize,
    pub coverage_percent: f64,
    pub label_distribution: BTreeMap<String, usize>,
    pub training_ready: bool,
}

/// The persisted motif collection: motifs, derived category indexes, and
/// training coverage metadata. Treated as a value — read whole, mutated,
/// written whole. Callers serialize concurrent writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    pub total_motifs: usize,
    pub processed_files: Vec<String>,
    pub motifs: Vec<Motif>,
    pub categories: BTreeMap<String, Vec<String>>,
    pub training_metadata: TrainingMetadata,
    pub updated_at: DateTime<Utc>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            version: CATALOG_VERSION,
            total_motifs: 0,
            processed_files: Vec::new(),
            motifs: Vec::new(),
            categories: BTreeMap::new(),
            training_metadata: TrainingMetadata::default(),
            updated_at: Utc::now(),
        }
    }

    /// Append newly extracted motifs for one source file, skipping ids the
    /// catalog already holds, and rebuild the derived indexes.
    /// Returns the number of motifs actually added.
    pub fn merge_motifs(&mut self, source_file: &str, new_motifs: Vec<Motif>) -> usize {
        let mut added = 0;
        for motif in new_motifs {
            if self.motifs.iter().any(|m| m.id == motif.id) {
                log::debug!("catalog already holds motif {}, skipping", motif.id);
                continue;
            }
            self.motifs.push(motif);
            added += 1;
        }

        if !self.processed_files.iter().any(|f| f == source_file) {
            self.processed_files.push(source_file.to_string());
        }

        self.rebuild_indexes();
        added
    }

    /// Recompute every derived field from the motif list.
    pub fn rebuild_indexes(&mut self) {
        self.total_motifs = self.motifs.len();
        self.categories = categorize(&self.motifs);
        let stats = crate::stats::training_stats(self);
        self.training_metadata = TrainingMetadata {
            labeled_count: stats.labeled_motifs,
            total_count: stats.total_motifs,
            coverage_percent: stats.coverage_percent,
            label_distribution: stats.label_distribution,
            training_ready: stats.training_ready,
        };
        self.updated_at = Utc::now();
    }

    /// Read a whole catalog document. A missing file yields a fresh catalog.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no catalog at {}, starting fresh", path.display());
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&contents)?;
        log::debug!(
            "loaded catalog: {} motifs across {} files",
            catalog.total_motifs,
            catalog.processed_files.len()
        );
        Ok(catalog)
    }

    /// Rewrite the whole catalog document.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Note;
    use crate::UNLABELED;

    fn motif(id: &str, pattern: &str, bar_index: usize) -> Motif {
        Motif {
            id: id.to_string(),
            source_file: "take1.mid".to_string(),
            instrument_index: 0,
            bar_index,
            pitch_pattern_hash: pattern.to_string(),
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
            label: UNLABELED.to_string(),
            label_description: String::new(),
            is_labeled: false,
        }
    }

    #[test]
    fn merge_skips_known_ids() {
        let mut catalog = Catalog::new();
        let added = catalog.merge_motifs("take1.mid", vec![motif("m1", "p1", 0), motif("m2", "p2", 1)]);
        assert_eq!(added, 2);

        let added = catalog.merge_motifs("take1.mid", vec![motif("m1", "p1", 0), motif("m3", "p3", 2)]);
        assert_eq!(added, 1);
        assert_eq!(catalog.total_motifs, 3);
        assert_eq!(catalog.processed_files, vec!["take1.mid".to_string()]);
    }

    #[test]
    fn merge_refreshes_training_metadata() {
        let mut catalog = Catalog::new();
        let mut labeled = motif("m1", "p1", 0);
        labeled.label = "MOMENTUM_POS".to_string();
        labeled.is_labeled = true;
        catalog.merge_motifs("take1.mid", vec![labeled, motif("m2", "p2", 1)]);

        let meta = &catalog.training_metadata;
        assert_eq!(meta.total_count, 2);
        assert_eq!(meta.labeled_count, 1);
        assert!((meta.coverage_percent - 50.0).abs() < 1e-9);
        assert!(meta.training_ready);
        assert_eq!(meta.label_distribution["MOMENTUM_POS"], 1);
        assert_eq!(meta.label_distribution[UNLABELED], 1);
    }

    #[test]
    fn round_trips_through_json() {
        let mut catalog = Catalog::new();
        catalog.merge_motifs("take1.mid", vec![motif("m1", "p1", 0)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        catalog.save(&path).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded.version, CATALOG_VERSION);
        assert_eq!(loaded.total_motifs, 1);
        assert_eq!(loaded.motifs[0].id, "m1");
        assert_eq!(loaded.motifs[0].label, UNLABELED);
    }

    #[test]
    fn missing_file_loads_fresh_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(catalog.total_motifs, 0);
        assert!(catalog.motifs.is_empty());
    }
}
