use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use riffbank::model::{BarSet, Performance};
use riffbank::motif::catalog::Catalog;
use riffbank::rules::RuleSet;

#[derive(Parser)]
#[command(name = "riffbank", version, about = "Motif catalog engine — tokenize, classify, select")]
struct Cli {
    /// Path to the catalog file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize a bar dump into deduplicated sections
    Tokenize {
        /// Bar dump file (JSON)
        input: PathBuf,

        /// Bars per section
        #[arg(long, default_value = "4")]
        section_size: usize,
    },

    /// Classify momentum over a bar dump's sections
    Momentum {
        /// Bar dump file (JSON)
        input: PathBuf,

        /// Bars per section
        #[arg(long, default_value = "4")]
        section_size: usize,
    },

    /// Extract motifs from performance dumps into the catalog
    Extract {
        /// Performance dump files or directories
        paths: Vec<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Minimum notes in a window to emit a motif
        #[arg(long)]
        min_notes: Option<usize>,

        /// Cap on motifs per source file
        #[arg(long)]
        max_motifs: Option<usize>,
    },

    /// Merge external bar labels and propagate them onto the catalog
    Label {
        /// Performance dump the labels belong to
        input: PathBuf,

        /// Manual label file (bar_index,label,description)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Read embedded markers from the performance dump instead
        #[arg(long)]
        markers: bool,
    },

    /// Decide a label from metrics and select matching motifs
    Select {
        /// Rule file (YAML)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Metrics vector as JSON, e.g. '{"ctr":0.8,"clicks":0.7}'
        #[arg(long)]
        metrics: String,

        /// Mode tag passed to rule evaluation
        #[arg(long, default_value = "serp")]
        mode: String,

        /// Tenant identifier seeding the selection
        #[arg(long)]
        tenant: String,

        /// Number of motifs to select
        #[arg(short = 'n', long, default_value = "4")]
        count: usize,
    },

    /// Show catalog label coverage statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = riffbank::config::AppConfig::load();

    // Resolve catalog path: CLI > config > XDG default
    let catalog_path = cli
        .catalog
        .or(config.catalog_path.clone())
        .unwrap_or_else(riffbank::config::default_catalog_path);
    log::info!("Catalog: {}", catalog_path.display());

    match cli.command {
        Commands::Tokenize { input, section_size } => {
            let bars = load_barset(&input)?;
            let sections = riffbank::section::tokenize_sections(&bars, section_size)
                .context("Tokenization failed")?;
            println!(
                "{}/{}: {} sections formed, {} unique",
                sections.tenant_id,
                sections.file_id,
                sections.total_sections,
                sections.unique_sections
            );
            println!("{}", serde_json::to_string_pretty(&sections)?);
        }

        Commands::Momentum { input, section_size } => {
            let bars = load_barset(&input)?;
            let sections = riffbank::section::tokenize_sections(&bars, section_size)
                .context("Tokenization failed")?;
            let results = riffbank::momentum::classify_sections(&sections)
                .context("Classification failed")?;
            let summary = riffbank::momentum::summarize(&results);

            println!("{}", serde_json::to_string_pretty(&results)?);
            println!(
                "{} sections: {} positive, {} negative, {} neutral (dominant {}, mean score {:.3})",
                results.len(),
                summary.positive,
                summary.negative,
                summary.neutral,
                summary.dominant,
                summary.mean_score
            );
        }

        Commands::Extract { paths, jobs, min_notes, max_motifs } => {
            if paths.is_empty() {
                anyhow::bail!("No dump files or directories given.");
            }
            let mut params = config.extract_params();
            if let Some(n) = min_notes {
                params.min_notes = n;
            }
            if let Some(n) = max_motifs {
                params.max_motifs = n;
            }
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };

            let mut catalog = Catalog::load(&catalog_path).context("Failed to load catalog")?;
            let mut processed = 0;
            let mut failed = 0;
            let mut added = 0;

            for path in &paths {
                if path.is_dir() {
                    let result =
                        riffbank::batch::extract_directory(path, &params, &mut catalog, workers)
                            .context("Batch extraction failed")?;
                    processed += result.files_processed;
                    failed += result.files_failed;
                    added += result.motifs_added;
                } else {
                    match load_performance(path) {
                        Ok(perf) => {
                            let motifs = riffbank::motif::extract_motifs(&perf, &params);
                            added += catalog
                                .merge_motifs(&path.to_string_lossy(), motifs);
                            processed += 1;
                        }
                        Err(e) => {
                            log::warn!("Failed to process {}: {e}", path.display());
                            failed += 1;
                        }
                    }
                }
            }

            catalog.save(&catalog_path).context("Failed to save catalog")?;
            println!(
                "Extract complete: {processed} files, {failed} failed, {added} motifs added ({} total)",
                catalog.total_motifs
            );
        }

        Commands::Label { input, csv, markers } => {
            let perf = load_performance(&input)?;
            // Motifs are keyed by the recording's own source_file, not the
            // dump path it arrived in
            let source_file = perf.source_file.clone();

            let bar_labels = if let Some(csv_path) = csv {
                let text = std::fs::read_to_string(&csv_path)
                    .with_context(|| format!("Failed to read {}", csv_path.display()))?;
                riffbank::labels::parse_label_csv(&text)
            } else if markers {
                let bpm = if perf.bpm > 0.0 { perf.bpm } else { 120.0 };
                let bar_secs = config.bar_length_beats * 60.0 / bpm;
                riffbank::labels::labels_from_markers(&perf, bar_secs)
            } else {
                anyhow::bail!("Pass --csv <file> or --markers.");
            };

            if bar_labels.is_empty() {
                println!("No labels found in the source; catalog unchanged.");
                return Ok(());
            }

            let mut catalog = Catalog::load(&catalog_path).context("Failed to load catalog")?;
            let result =
                riffbank::labels::propagate_to_catalog(&mut catalog, &source_file, &bar_labels);
            catalog.save(&catalog_path).context("Failed to save catalog")?;

            println!(
                "Labeled {}/{} motifs from {}; coverage {:.1}%, training_ready={}",
                result.labeled,
                result.touched,
                source_file,
                result.coverage_percent,
                result.training_ready
            );
        }

        Commands::Select { rules, metrics, mode, tenant, count } => {
            let rules_path = rules
                .or(config.rules_path.clone())
                .ok_or_else(|| anyhow::anyhow!("Pass --rules or set rules_path in config."))?;
            // Rule sets are reloaded fresh on every decision call
            let rule_set = RuleSet::load(&rules_path)
                .with_context(|| format!("Failed to load rules from {}", rules_path.display()))?;

            let metrics: HashMap<String, f64> =
                serde_json::from_str(&metrics).context("Metrics must be a JSON object of numbers")?;

            let catalog = Catalog::load(&catalog_path).context("Failed to load catalog")?;
            let selected = riffbank::select::select_motifs_by_label(
                &metrics, &mode, &tenant, count, &catalog, &rule_set,
            )
            .context("Selection failed")?;

            let degraded = selected
                .iter()
                .filter(|m| m.id.starts_with(riffbank::select::FALLBACK_ID_PREFIX))
                .count();
            if degraded > 0 {
                log::warn!("{degraded}/{count} selections are synthetic placeholders");
            }
            println!("{}", serde_json::to_string_pretty(&selected)?);
        }

        Commands::Stats => {
            let catalog = Catalog::load(&catalog_path).context("Failed to load catalog")?;
            let stats = riffbank::stats::training_stats(&catalog);

            println!("Catalog: {}", catalog_path.display());
            println!("  motifs:         {}", stats.total_motifs);
            println!("  labeled:        {}", stats.labeled_motifs);
            println!("  coverage:       {:.1}%", stats.coverage_percent);
            println!("  training ready: {}", stats.training_ready);
            if !stats.label_distribution.is_empty() {
                println!("  distribution:");
                for (label, count) in &stats.label_distribution {
                    println!("    {label:<16} {count}");
                }
            }
        }
    }

    Ok(())
}

fn load_barset(path: &PathBuf) -> Result<BarSet> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse bar dump {}", path.display()))
}

fn load_performance(path: &PathBuf) -> Result<Performance> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse performance dump {}", path.display()))
}
