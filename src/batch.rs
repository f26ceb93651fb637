use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::Result;
use crate::model::Performance;
use crate::motif::catalog::Catalog;
use crate::motif::{extract_motifs, ExtractParams, Motif};
use crate::DUMP_EXTENSION;

pub struct BatchResult {
    pub files_processed: usize,
    pub files_failed: usize,
    pub motifs_added: usize,
}

/// Extract motifs from every performance dump under `dir` and merge them
/// into the catalog.
///
/// A file that fails to load or parse is logged and contributes nothing;
/// it never aborts the rest of the batch.
pub fn extract_directory(
    dir: &Path,
    params: &ExtractParams,
    catalog: &mut Catalog,
    jobs: usize,
) -> Result<BatchResult> {
    // First pass: collect dump files, sorted for deterministic ordering
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| x.eq_ignore_ascii_case(DUMP_EXTENSION))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({eta} remaining)")
            .unwrap()
            .progress_chars("=>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .expect("failed to build worker pool");

    let extracted: Vec<Option<(PathBuf, Vec<Motif>)>> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let result = load_and_extract(path, params);
                pb.inc(1);
                match result {
                    Ok(motifs) => Some((path.clone(), motifs)),
                    Err(e) => {
                        log::warn!("Failed to process {}: {e}", path.display());
                        None
                    }
                }
            })
            .collect()
    });

    pb.finish_with_message("done");

    let mut result = BatchResult {
        files_processed: 0,
        files_failed: 0,
        motifs_added: 0,
    };
    for entry in extracted {
        match entry {
            Some((path, motifs)) => {
                result.files_processed += 1;
                let source = path.to_string_lossy().to_string();
                result.motifs_added += catalog.merge_motifs(&source, motifs);
            }
            None => result.files_failed += 1,
        }
    }

    log::info!(
        "batch extract: {} files, {} failed, {} motifs added",
        result.files_processed,
        result.files_failed,
        result.motifs_added
    );
    Ok(result)
}

fn load_and_extract(path: &Path, params: &ExtractParams) -> Result<Vec<Motif>> {
    let contents = std::fs::read_to_string(path)?;
    let perf: Performance = serde_json::from_str(&contents)?;
    Ok(extract_motifs(&perf, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Note, Track};
    use std::io::Write;

    fn write_dump(dir: &Path, name: &str, perf: &Performance) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(serde_json::to_string(perf).unwrap().as_bytes())
            .unwrap();
    }

    fn simple_perf(source_file: &str, base_pitch: u8) -> Performance {
        Performance {
            source_file: source_file.to_string(),
            bpm: 120.0,
            duration: 2.0,
            tracks: vec![Track {
                name: "keys".to_string(),
                instrument_index: 0,
                is_percussion: false,
                notes: (0..3)
                    .map(|i| Note {
                        pitch: base_pitch + i,
                        velocity: 80,
                        start: i as f64 * 0.5,
                        duration: 0.4,
                    })
                    .collect(),
            }],
            markers: vec![],
        }
    }

    #[test]
    fn bad_files_are_isolated_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "good.json", &simple_perf("good.mid", 60));
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let mut catalog = Catalog::new();
        let result =
            extract_directory(dir.path(), &ExtractParams::default(), &mut catalog, 1).unwrap();

        assert_eq!(result.files_processed, 1);
        assert_eq!(result.files_failed, 1);
        assert_eq!(result.motifs_added, 1);
        assert_eq!(catalog.total_motifs, 1);
    }

    #[test]
    fn non_dump_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "a.json", &simple_perf("a.mid", 60));
        std::fs::write(dir.path().join("notes.txt"), "irrelevant").unwrap();

        let mut catalog = Catalog::new();
        let result =
            extract_directory(dir.path(), &ExtractParams::default(), &mut catalog, 1).unwrap();

        assert_eq!(result.files_processed, 1);
        assert_eq!(result.files_failed, 0);
    }

    #[test]
    fn repeated_runs_do_not_duplicate_motifs() {
        let dir = tempfile::tempdir().unwrap();
        write_dump(dir.path(), "a.json", &simple_perf("a.mid", 60));

        let mut catalog = Catalog::new();
        extract_directory(dir.path(), &ExtractParams::default(), &mut catalog, 1).unwrap();
        let result =
            extract_directory(dir.path(), &ExtractParams::default(), &mut catalog, 1).unwrap();

        assert_eq!(result.motifs_added, 0, "same ids merge to nothing");
        assert_eq!(catalog.total_motifs, 1);
    }
}
