//! # CLI Module
//!
//! A thin manual smoke-test harness for the core crate, not itself part of
//! the engine, just a runnable entry point onto `core::pipeline::scan`.
//!
//! ## Usage
//! ```bash
//! # Scan a directory for duplicates
//! photo-dedup scan ~/Photos
//!
//! # With a custom threshold
//! photo-dedup scan ~/Photos --threshold 5
//!
//! # JSON output
//! photo-dedup scan ~/Photos --output json
//! ```

use duplicate_photo_cleaner::core::model::{
    GroupKind, GroupingMode, LshMode, ScanOptions, ScanResult,
};
use duplicate_photo_cleaner::core::pipeline::{new_cancel_token, scan, CacheOps};
use duplicate_photo_cleaner::error::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

/// Duplicate Photo Cleaner - Find duplicates without fear
#[derive(Parser, Debug)]
#[command(name = "photo-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a directory for duplicate and near-duplicate photos
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Perceptual distance cutoff, 0-64 (lower = stricter)
        #[arg(short, long, default_value = "8")]
        threshold: u32,

        /// Which grouping stages to run
        #[arg(short, long, value_enum, default_value = "both")]
        mode: Mode,

        /// Don't recurse into subdirectories
        #[arg(long)]
        no_recursive: bool,

        /// Skip the persistent analysis cache
        #[arg(long)]
        no_cache: bool,

        /// Worker threads for the analysis driver
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        output: OutputFormat,
    },
    /// Inspect or maintain the persistent analysis cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Cache database path (defaults to `~/.duplicate_finder_cache.db`)
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print entry count and size on disk
    Stats,
    /// Drop all cached entries
    Clear,
    /// Remove entries whose file no longer exists
    CleanupMissing,
    /// Remove entries not accessed in `max_age_days`
    CleanupStale {
        #[arg(long, default_value = "90")]
        max_age_days: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    ExactOnly,
    PerceptualOnly,
    Both,
}

impl From<Mode> for GroupingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::ExactOnly => GroupingMode::ExactOnly,
            Mode::PerceptualOnly => GroupingMode::PerceptualOnly,
            Mode::Both => GroupingMode::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output: one duplicate path per line
    Minimal,
}

/// Run the CLI.
pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            threshold,
            mode,
            no_recursive,
            no_cache,
            workers,
            output,
        } => run_scan(path, threshold, mode, no_recursive, no_cache, workers, output),
        Commands::Cache { action, cache } => run_cache(action, cache),
    }
}

fn run_scan(
    path: PathBuf,
    threshold: u32,
    mode: Mode,
    no_recursive: bool,
    no_cache: bool,
    workers: usize,
    output: OutputFormat,
) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(output, OutputFormat::Pretty);

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Duplicate Photo Cleaner").bold().cyan(),
            style(format!("scanning {}", path.display())).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let progress = if pretty {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let cancel_token = new_cancel_token();
    let progress_cb = progress.clone().map(|pb| {
        Arc::new(move |p: duplicate_photo_cleaner::core::model::DriverProgress| {
            pb.set_length(p.found as u64);
            pb.set_position((p.analyzed + p.errors) as u64);
            pb.set_message(format!(
                "{:.1}/s, {} cache hits",
                p.rate_per_sec, p.cache_hits
            ));
        }) as Arc<dyn Fn(duplicate_photo_cleaner::core::model::DriverProgress) + Send + Sync>
    });

    let options = ScanOptions {
        recursive: !no_recursive,
        threshold,
        mode: mode.into(),
        lsh_mode: LshMode::Auto,
        use_cache: !no_cache,
        workers: workers.max(1),
        progress_cb,
        cancel_token: Some(cancel_token),
    };

    let result = scan(&path, &options)?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    match output {
        OutputFormat::Pretty => print_pretty_results(&term, &result),
        OutputFormat::Json => print_json_results(&result),
        OutputFormat::Minimal => print_minimal_results(&result),
    }

    Ok(())
}

fn run_cache(action: CacheAction, cache_path: Option<PathBuf>) -> Result<()> {
    let ops = match cache_path {
        Some(path) => CacheOps::open(&path)?,
        None => CacheOps::open_default()?,
    };

    match action {
        CacheAction::Stats => {
            let stats = ops.stats()?;
            println!("path: {}", stats.path.display());
            println!("entries: {}", stats.total_entries);
            println!("bytes on disk: {}", format_bytes(stats.bytes_on_disk));
        }
        CacheAction::Clear => {
            ops.clear()?;
            println!("cache cleared");
        }
        CacheAction::CleanupMissing => {
            let removed = ops.cleanup_missing()?;
            println!("removed {removed} entries for missing files");
        }
        CacheAction::CleanupStale { max_age_days } => {
            let removed = ops.cleanup_stale(max_age_days)?;
            println!("removed {removed} stale entries (older than {max_age_days} days)");
        }
    }

    Ok(())
}

fn print_pretty_results(term: &Term, result: &ScanResult) {
    term.write_line("").ok();
    if result.partial {
        term.write_line(&format!("{} Scan cancelled, showing partial results", style("!").yellow().bold())).ok();
    } else {
        term.write_line(&format!("{} Scan complete", style("✓").green().bold())).ok();
    }
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} photos analyzed, {} errors",
        style(result.records.len()).cyan(),
        style(result.errors.len()).cyan(),
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicate groups found",
        style(result.groups.len()).cyan()
    ))
    .ok();

    let duplicate_count: usize = result.groups.iter().map(|g| g.members.len() - 1).sum();
    term.write_line(&format!("  {} duplicate photos", style(duplicate_count).cyan())).ok();

    let savings: u64 = result.groups.iter().map(|g| g.potential_savings_bytes).sum();
    term.write_line(&format!(
        "  {} potential space savings",
        style(format_bytes(savings)).yellow()
    ))
    .ok();

    if result.cache_hits > 0 {
        term.write_line(&format!("  {} cache hits", style(result.cache_hits).dim())).ok();
    }
    if result.cache_degraded {
        term.write_line(&format!(
            "  {} cache degraded for this scan, results are uncached",
            style("warning:").red()
        ))
        .ok();
    }

    term.write_line("").ok();

    if result.groups.is_empty() {
        term.write_line(&format!("  {} No duplicates found!", style("done").green())).ok();
    } else {
        term.write_line(&format!("{}", style("Duplicate Groups:").bold().underlined())).ok();
        term.write_line("").ok();

        for (i, group) in result.groups.iter().enumerate() {
            term.write_line(&format!(
                "  {} {} ({} photos, {})",
                style(format!("Group {}:", i + 1)).bold(),
                style(group_kind_label(group.kind)).yellow(),
                group.members.len(),
                format_bytes(group.potential_savings_bytes)
            ))
            .ok();

            let best = group.best();
            for member in &group.members {
                let marker = if member.path == best.path {
                    style("*").green().to_string()
                } else {
                    style("o").dim().to_string()
                };
                term.write_line(&format!("    {} {}", marker, member.path.display())).ok();
            }
            term.write_line("").ok();
        }
    }

    term.write_line(&format!(
        "{}",
        style("No files were moved, linked, or deleted. Review before taking action.").dim()
    ))
    .ok();
}

fn group_kind_label(kind: GroupKind) -> &'static str {
    match kind {
        GroupKind::Exact => "exact",
        GroupKind::Perceptual => "perceptual",
    }
}

fn print_json_results(result: &ScanResult) {
    println!("{}", serde_json::to_string_pretty(result).unwrap());
}

fn print_minimal_results(result: &ScanResult) {
    for group in &result.groups {
        let best = group.best();
        for member in &group.members {
            if member.path != best.path {
                println!("{}", member.path.display());
            }
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}
