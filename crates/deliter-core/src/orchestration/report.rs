//! Per-package outcomes and run summaries.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::ConvertError;
use crate::extract::ExtractionStats;
use crate::translate::UnknownReference;

/// Why a directory was not converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "count")]
pub enum SkipReason {
    /// No manifest.json at the directory root
    NotAPackage,
    /// The package name matches the registry's ignore list
    Ignored,
    /// No legacy archive in the package
    NoArchive,
    /// More than one legacy archive; which one to convert is ambiguous
    MultipleArchives(usize),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotAPackage => write!(f, "not a package"),
            SkipReason::Ignored => write!(f, "ignored"),
            SkipReason::NoArchive => write!(f, "no legacy archive"),
            SkipReason::MultipleArchives(count) => write!(f, "{count} legacy archives"),
        }
    }
}

/// Details of a package that went through translation
#[derive(Debug, Clone, Default)]
pub struct ConversionSummary {
    /// Whether every declaration was translated
    pub fully_converted: bool,
    /// Declarations kept in the archive for a later run
    pub left_behind: Vec<UnknownReference>,
    /// Resource extraction counters (zero for dry runs)
    pub resources: ExtractionStats,
    /// Whether a backup copy was written during this run
    pub backed_up: bool,
    /// True when nothing was written to disk
    pub dry_run: bool,
}

/// Terminal state of one package
#[derive(Debug)]
pub enum PackageOutcome {
    Skipped(SkipReason),
    Converted(ConversionSummary),
    Failed(ConvertError),
}

impl PackageOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PackageOutcome::Failed(_))
    }
}

/// Outcome of one package, by directory
#[derive(Debug)]
pub struct PackageReport {
    pub name: String,
    pub path: PathBuf,
    pub outcome: PackageOutcome,
}

/// Totals across a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Archives fully converted and deleted
    pub converted: usize,
    /// Archives converted in part and rewritten with leftovers
    pub partial: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    pub packages: Vec<PackageReport>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(packages: Vec<PackageReport>) -> Self {
        let mut summary = RunSummary::default();
        for package in &packages {
            match &package.outcome {
                PackageOutcome::Skipped(_) => summary.skipped += 1,
                PackageOutcome::Failed(_) => summary.failed += 1,
                PackageOutcome::Converted(details) if details.fully_converted => {
                    summary.converted += 1
                }
                PackageOutcome::Converted(_) => summary.partial += 1,
            }
        }
        Self { packages, summary }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn get(&self, name: &str) -> Option<&PackageReport> {
        self.packages.iter().find(|package| package.name == name)
    }
}
