//! Deliter - legacy mod package converter
//!
//! Usage:
//!   deliter convert                  # Convert every package in ./BepInEx/plugins
//!   deliter convert --dry-run        # Report what would be converted
//!   deliter preview Mod.deli         # Show the project.yaml for one archive

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deliter_core::orchestration::{
    ConvertOptions, Converter, PackageOutcome, PackageReport, RunReport, default_host_paths,
};
use deliter_core::project::HostPaths;
use deliter_core::registry::{Registry, load_registry};

/// Registry file name looked up inside the plugins directory
const REGISTRY_FILE: &str = "deliter.toml";

#[derive(Parser)]
#[command(name = "deliter")]
#[command(about = "Converts legacy mod packages into project.yaml packages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every package below the plugins directory
    Convert {
        /// Directory holding one subdirectory per installed package
        #[arg(long, default_value = "BepInEx/plugins")]
        plugins_dir: PathBuf,

        /// Registry file (defaults to deliter.toml inside the plugins directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Plugins directory written to each package's config.yaml
        #[arg(long)]
        host_plugins_dir: Option<PathBuf>,

        /// Config directory written to each package's config.yaml
        #[arg(long)]
        host_config_dir: Option<PathBuf>,

        /// Number of worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Translate and report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the project document one archive would produce
    Preview {
        /// Legacy archive to translate
        archive: PathBuf,

        /// Registry file
        #[arg(long, default_value = REGISTRY_FILE)]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
    /// Only show failures (non-zero exit if any package failed)
    Quiet,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deliter=info,deliter_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            plugins_dir,
            config,
            host_plugins_dir,
            host_config_dir,
            jobs,
            dry_run,
            format,
        } => {
            let config = config.unwrap_or_else(|| plugins_dir.join(REGISTRY_FILE));
            let defaults = default_host_paths(&plugins_dir, &config);
            let host_paths = HostPaths {
                plugins: host_plugins_dir.unwrap_or(defaults.plugins),
                config: host_config_dir.unwrap_or(defaults.config),
            };
            run_convert(&plugins_dir, &config, host_paths, jobs, dry_run, format)?;
        }
        Commands::Preview { archive, config } => {
            run_preview(&archive, &config)?;
        }
    }

    Ok(())
}

fn load(config: &Path) -> Result<Registry> {
    let registry = load_registry(config)?;
    tracing::debug!(
        "Loaded {} plugins from {}",
        registry.plugin_count(),
        config.display()
    );
    Ok(registry)
}

fn run_convert(
    plugins_dir: &Path,
    config: &Path,
    host_paths: HostPaths,
    jobs: Option<usize>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    // A broken registry aborts before any package is touched
    let registry = load(config)?;

    let options = ConvertOptions::new(host_paths)
        .with_dry_run(dry_run)
        .with_jobs(jobs);
    let converter = Converter::new(registry, options);

    let report = converter
        .run(plugins_dir)
        .with_context(|| format!("Failed to convert packages in {}", plugins_dir.display()))?;

    match format {
        OutputFormat::Table => print_table(&report, dry_run),
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Quiet => {
            let exit_code = print_quiet(&report);
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn run_preview(archive: &Path, config: &Path) -> Result<()> {
    let registry = load(config)?;
    let host_paths = default_host_paths(archive.parent().unwrap_or(Path::new(".")), config);
    let converter = Converter::new(registry, ConvertOptions::new(host_paths));

    let preview = converter
        .preview(archive)
        .with_context(|| format!("Failed to translate {}", archive.display()))?;

    println!("# project.yaml");
    let yaml = deliter_core::project::to_yaml(&preview.result.document)
        .context("Failed to render project document")?;
    print!("{yaml}");

    if preview.result.fully_converted {
        println!("\n# Fully converted; the archive would be deleted.");
    } else {
        println!("\n# Leftover manifest.json");
        println!(
            "{}",
            deliter_core::manifest::manifest_to_json(&preview.leftover)?
        );
        for reference in &preview.result.left_behind {
            println!("#   {}", reference);
        }
    }

    Ok(())
}

fn print_table(report: &RunReport, dry_run: bool) {
    if dry_run {
        println!("Dry run: nothing was written.");
        println!();
    }

    if report.packages.is_empty() {
        println!("No packages found.");
        return;
    }

    println!("  {:<30} {:<10} Details", "Package", "Status");
    println!("  {}", "-".repeat(70));

    for package in &report.packages {
        let (status, details) = describe(package);
        println!("  {:<30} {:<10} {}", truncate(&package.name, 30), status, details);
    }

    println!();
    let summary = &report.summary;
    println!(
        "Summary: {} converted, {} partial, {} skipped, {} failed",
        summary.converted, summary.partial, summary.skipped, summary.failed
    );
}

fn describe(package: &PackageReport) -> (&'static str, String) {
    match &package.outcome {
        PackageOutcome::Skipped(reason) => ("skipped", reason.to_string()),
        PackageOutcome::Failed(err) => ("FAILED", err.to_string()),
        PackageOutcome::Converted(summary) if summary.fully_converted => (
            "done",
            format!("{} resources written", summary.resources.written),
        ),
        PackageOutcome::Converted(summary) => (
            "partial",
            format!(
                "{} declarations left behind, {} resources written",
                summary.left_behind.len(),
                summary.resources.written
            ),
        ),
    }
}

fn print_json(report: &RunReport) -> Result<()> {
    let packages: Vec<_> = report
        .packages
        .iter()
        .map(|package| {
            let outcome = match &package.outcome {
                PackageOutcome::Skipped(reason) => serde_json::json!({
                    "status": "skipped",
                    "skip": reason,
                }),
                PackageOutcome::Failed(err) => serde_json::json!({
                    "status": "failed",
                    "error": err.to_string(),
                }),
                PackageOutcome::Converted(summary) => serde_json::json!({
                    "status": if summary.fully_converted { "converted" } else { "partial" },
                    "left_behind": summary
                        .left_behind
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>(),
                    "resources": summary.resources,
                    "backed_up": summary.backed_up,
                    "dry_run": summary.dry_run,
                }),
            };
            serde_json::json!({
                "name": package.name,
                "path": package.path,
                "outcome": outcome,
            })
        })
        .collect();

    // Wrap in versioned output
    let output = serde_json::json!({
        "schema_version": 1,
        "packages": packages,
        "summary": report.summary,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_quiet(report: &RunReport) -> i32 {
    for package in &report.packages {
        if let PackageOutcome::Failed(err) = &package.outcome {
            println!("{}: {}", package.name, err);
        }
    }

    if report.has_failures() { 1 } else { 0 }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
