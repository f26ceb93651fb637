use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bars per section for tokenization.
    pub section_size: usize,
    /// Window length in beats for motif extraction.
    pub bar_length_beats: f64,
    /// Minimum notes in a window to emit a motif.
    pub min_notes: usize,
    /// Cap on motifs emitted per source file.
    pub max_motifs: usize,
    /// Custom catalog path (overrides XDG default).
    pub catalog_path: Option<PathBuf>,
    /// Default rule file used by `select` when none is given.
    pub rules_path: Option<PathBuf>,
    /// Number of parallel workers for batch extraction. 0 = auto-detect
    /// (cores / 2, min 1).
    pub workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            section_size: crate::DEFAULT_SECTION_SIZE,
            bar_length_beats: 4.0,
            min_notes: 3,
            max_motifs: 100,
            catalog_path: None,
            rules_path: None,
            workers: 0,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/riffbank/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Extraction parameters from the configured defaults.
    pub fn extract_params(&self) -> crate::motif::ExtractParams {
        crate::motif::ExtractParams {
            bar_length_beats: self.bar_length_beats,
            min_notes: self.min_notes,
            max_motifs: self.max_motifs,
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default catalog path using XDG data directory.
pub fn default_catalog_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("catalog.json")
    } else {
        // Fallback: current directory
        PathBuf::from("catalog.json")
    }
}
