// docusync command line interface
// Thin wrapper over the library: analyze, sync, dedup, duplicates

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use docusync::audit::MemoryAuditSink;
use docusync::catalog::{CatalogStore, ScanEngine};
use docusync::config::ScanConfig;
use docusync::dedup::{DedupEngine, DedupReport, DedupScope};
use docusync::reconcile::{ProgressSnapshot, ReconcileEngine, ReconciliationResult};
use docusync::resolve::{ResolutionExecutor, ResolveStrategy};

#[derive(Parser)]
#[command(name = "docusync", about = "Folder reconciliation for document libraries", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two folders and report what differs
    Analyze {
        folder_a: PathBuf,
        folder_b: PathBuf,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
        /// Index every file instead of the document extension allow-list
        #[arg(long)]
        all_files: bool,
    },
    /// Reconcile two folders with a resolution strategy
    Sync {
        folder_a: PathBuf,
        folder_b: PathBuf,
        /// keep_both, keep_newest or keep_largest
        #[arg(long, default_value = "keep_both")]
        strategy: String,
        /// Execute the plan (default is a dry run)
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        all_files: bool,
    },
    /// Delete redundant conflict copies, keeping the newest per group
    Dedup {
        folder_a: PathBuf,
        folder_b: PathBuf,
        /// a, b or both
        #[arg(long, default_value = "both")]
        scope: String,
        /// Execute deletions (default lists candidates only)
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        all_files: bool,
    },
    /// List files with identical content within one folder
    Duplicates {
        folder: PathBuf,
        /// Preferred location to keep files in when estimating savings
        #[arg(long)]
        keep: Option<PathBuf>,
        /// Hash files on multiple threads
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        all_files: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { folder_a, folder_b, json, all_files } => {
            let catalog = CatalogStore::new();
            let analysis = run_analysis(&catalog, &folder_a, &folder_b, scan_config(all_files))?;
            if json {
                println!("{}", analysis.to_json()?);
            } else {
                analysis.display();
            }
        }
        Commands::Sync { folder_a, folder_b, strategy, apply, all_files } => {
            // Strategy parsing fails before any scan or mutation starts
            let strategy: ResolveStrategy = strategy.parse()?;
            let catalog = CatalogStore::new();
            let analysis = run_analysis(&catalog, &folder_a, &folder_b, scan_config(all_files))?;

            let executor = ResolutionExecutor::new();
            let plan = executor.build_plan(&analysis, strategy);

            if plan.is_empty() {
                println!("{}", "Folders are already synchronized.".green());
                return Ok(());
            }

            println!(
                "\n{} {} copies, {} ({})",
                "Plan:".cyan().bold(),
                plan.copies.len(),
                format_size(plan.total_bytes(), BINARY),
                strategy.description()
            );
            for copy in &plan.copies {
                println!("  {} -> {}", copy.source.display(), copy.target.display());
            }

            if !apply {
                println!("\n{}", "Dry run - no files were copied.".yellow());
                println!("Use --apply to perform the synchronization.");
                return Ok(());
            }

            let audit = MemoryAuditSink::new();
            let outcome = executor.execute(&plan, &catalog, &audit);

            println!(
                "\n{} copied {}, skipped {}, failed {} ({})",
                "Done:".green().bold(),
                outcome.copied,
                outcome.skipped,
                outcome.failed,
                format_size(outcome.bytes_copied, BINARY)
            );
            for item in outcome.errors() {
                println!(
                    "  {} {}: {}",
                    "error".red(),
                    item.target.display(),
                    item.detail.as_deref().unwrap_or("unknown")
                );
            }
        }
        Commands::Dedup { folder_a, folder_b, scope, apply, all_files } => {
            let scope = parse_scope(&scope)?;
            let catalog = CatalogStore::new();
            let analysis = run_analysis(&catalog, &folder_a, &folder_b, scan_config(all_files))?;

            if analysis.conflicts.is_empty() {
                println!("{}", "No conflicting duplicates found.".green());
                return Ok(());
            }

            println!("\n{}", "Conflict groups:".cyan().bold());
            for group in &analysis.conflicts {
                println!(
                    "  {} ({} A-side, {} B-side)",
                    group.name,
                    group.a_side.len(),
                    group.b_side.len()
                );
            }

            if !apply {
                println!("\n{}", "Listing only - no files were deleted.".yellow());
                println!("Use --apply to keep the newest copy per group and delete the rest.");
                return Ok(());
            }

            let audit = MemoryAuditSink::new();
            let report = DedupEngine::new().eliminate_conflicts(&analysis, scope, &catalog, &audit);
            print_dedup_report(&report);
        }
        Commands::Duplicates { folder, keep, parallel, all_files } => {
            let mut config = scan_config(all_files);
            config.parallel = parallel;

            let catalog = CatalogStore::new();
            let scan = ScanEngine::with_config(config).with_progress_bar(true);
            let stats = scan.index_tree(&folder, &catalog)?;
            println!(
                "Indexed {} files ({}), {} failed",
                stats.files_indexed,
                format_size(stats.total_bytes, BINARY),
                stats.files_failed
            );

            let engine = DedupEngine::new();
            let groups = engine.find_duplicates(&catalog, &folder);

            if groups.is_empty() {
                println!("{}", "No duplicates found!".green());
                return Ok(());
            }

            let redundant: usize = groups.iter().map(|g| g.count - 1).sum();
            println!(
                "\n{}",
                format!(
                    "Found {} redundant files across {} duplicate groups",
                    redundant,
                    groups.len()
                )
                .yellow()
            );
            for group in groups.iter().take(20) {
                println!("  MD5 {} ({} files)", group.hash, group.count);
                for record in &group.records {
                    println!(
                        "    {} ({})",
                        record.path.display(),
                        format_size(record.size, BINARY)
                    );
                }
            }
            if groups.len() > 20 {
                println!("  ... and {} more groups", groups.len() - 20);
            }

            if let Some(keep) = keep {
                let savings = DedupEngine::space_savings(&groups, &keep);
                println!(
                    "\nDeleting duplicates outside {} would save {}",
                    keep.display(),
                    format_size(savings, BINARY).green()
                );
            }
        }
    }

    Ok(())
}

fn scan_config(all_files: bool) -> ScanConfig {
    if all_files {
        ScanConfig::all_files()
    } else {
        ScanConfig::default()
    }
}

fn parse_scope(s: &str) -> Result<DedupScope> {
    match s.to_lowercase().as_str() {
        "a" => Ok(DedupScope::SideA),
        "b" => Ok(DedupScope::SideB),
        "both" => Ok(DedupScope::Both),
        other => anyhow::bail!("unknown scope '{}': use a, b or both", other),
    }
}

fn run_analysis(
    catalog: &CatalogStore,
    folder_a: &Path,
    folder_b: &Path,
    config: ScanConfig,
) -> Result<ReconciliationResult> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}").unwrap());

    let spinner_clone = spinner.clone();
    let engine = ReconcileEngine::new()
        .with_scan_config(config)
        .with_progress_callback(move |snapshot: ProgressSnapshot| {
            spinner_clone.set_message(format!(
                "{}: {} (indexed {}, equal {}, needs sync {})",
                snapshot.phase,
                snapshot.current_file,
                snapshot.indexed,
                snapshot.equals,
                snapshot.needs_sync
            ));
            spinner_clone.tick();
        });

    let analysis = engine.analyze(catalog, folder_a, folder_b)?;
    spinner.finish_and_clear();
    Ok(analysis)
}

fn print_dedup_report(report: &DedupReport) {
    println!(
        "\n{} kept {}, deleted {}, failed {} ({} freed)",
        "Done:".green().bold(),
        report.stats.kept,
        report.stats.deleted,
        report.stats.failed,
        format_size(report.stats.bytes_freed, BINARY)
    );
    for warning in &report.warnings {
        println!("  {} {}", "warning".yellow(), warning);
    }
    for error in &report.errors {
        println!("  {} {}", "error".red(), error);
    }
}
