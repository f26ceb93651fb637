pub mod batch;
pub mod config;
pub mod error;
pub mod labels;
pub mod model;
pub mod momentum;
pub mod motif;
pub mod rules;
pub mod section;
pub mod select;
pub mod stats;

/// File extension for performance dump files
pub const DUMP_EXTENSION: &str = "json";

/// Application name for XDG paths
pub const APP_NAME: &str = "riffbank";

/// Default number of bars per section
pub const DEFAULT_SECTION_SIZE: usize = 4;

/// Label given to bars and motifs no external label source covers
pub const UNLABELED: &str = "UNLABELED";

/// Marker text beginning with one of these prefixes is treated as an
/// embedded bar-label annotation rather than ordinary timeline text.
pub const LABEL_MARKER_PREFIXES: &[&str] = &["MOMENTUM_", "STEADY", "VOLATILE_", "DECAY_"];
