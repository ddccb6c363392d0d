//! Package conversion driver.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::archive::LegacyArchive;
use crate::error::ConvertError;
use crate::manifest::manifest_to_json;
use crate::node::Node;
use crate::package::{
    RESOURCES_DIR, discover_packages, find_legacy_archives, is_package, package_name,
};
use crate::project::{self, HostPaths, ProjectSnapshot};
use crate::registry::Registry;
use crate::translate::{ConversionResult, Translator};

use super::report::{ConversionSummary, PackageOutcome, PackageReport, RunReport, SkipReason};

/// Options for a conversion run
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directories exposed through each package's config.yaml
    pub host_paths: HostPaths,
    /// Translate and report without writing anything
    pub dry_run: bool,
    /// Worker count; defaults to rayon's global pool
    pub jobs: Option<usize>,
}

impl ConvertOptions {
    pub fn new(host_paths: HostPaths) -> Self {
        Self {
            host_paths,
            dry_run: false,
            jobs: None,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }
}

/// Translation of a single archive, for previews
#[derive(Debug)]
pub struct Preview {
    pub result: ConversionResult,
    /// The manifest as it would be written back into the archive
    pub leftover: Node,
}

/// Converts every package below a plugins directory
#[derive(Debug)]
pub struct Converter {
    registry: Registry,
    options: ConvertOptions,
}

impl Converter {
    pub fn new(registry: Registry, options: ConvertOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Process every package below `plugins_dir`.
    ///
    /// Only failing to list the directory (or to start the worker pool) is
    /// an error; per-package failures are recorded in the report.
    pub fn run(&self, plugins_dir: &Path) -> Result<RunReport, ConvertError> {
        let packages = discover_packages(plugins_dir)?;
        info!(
            "Found {} candidate packages in {}",
            packages.len(),
            plugins_dir.display()
        );

        let process_all = || -> Vec<PackageReport> {
            packages
                .par_iter()
                .map(|dir| PackageReport {
                    name: package_name(dir),
                    path: dir.clone(),
                    outcome: self.process(dir),
                })
                .collect()
        };

        let reports = match self.options.jobs {
            Some(jobs) => rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()?
                .install(process_all),
            None => process_all(),
        };

        Ok(RunReport::new(reports))
    }

    /// Process one package directory, never failing.
    pub fn process(&self, dir: &Path) -> PackageOutcome {
        let name = package_name(dir);

        match self.try_process(dir, &name) {
            Ok(PackageOutcome::Converted(summary)) => {
                if summary.fully_converted {
                    info!(package = %name, "Converted package");
                } else {
                    info!(
                        package = %name,
                        left_behind = summary.left_behind.len(),
                        "Partially converted package; leftovers kept in the archive"
                    );
                }
                PackageOutcome::Converted(summary)
            }
            Ok(outcome) => outcome,
            Err(err) => {
                error!(package = %name, "Failed to convert package: {err}");
                PackageOutcome::Failed(err)
            }
        }
    }

    fn try_process(&self, dir: &Path, name: &str) -> Result<PackageOutcome, ConvertError> {
        if !is_package(dir) {
            return Ok(PackageOutcome::Skipped(SkipReason::NotAPackage));
        }

        if self.registry.is_ignored(name) {
            return Ok(PackageOutcome::Skipped(SkipReason::Ignored));
        }

        let archive_path = match find_legacy_archives(dir)?.as_slice() {
            [] => return Ok(PackageOutcome::Skipped(SkipReason::NoArchive)),
            [single] => single.clone(),
            many => {
                warn!(
                    package = %name,
                    "Found {} legacy archives; refusing to guess which to convert",
                    many.len()
                );
                return Ok(PackageOutcome::Skipped(SkipReason::MultipleArchives(
                    many.len(),
                )));
            }
        };

        let mut archive = LegacyArchive::open(&archive_path)?;
        let mut manifest = archive.read_manifest()?;
        let result = Translator::new(&self.registry).translate(&mut manifest)?;

        for reference in &result.left_behind {
            info!(package = %name, "Left behind: {reference}");
        }

        if self.options.dry_run {
            return Ok(PackageOutcome::Converted(ConversionSummary {
                fully_converted: result.fully_converted,
                left_behind: result.left_behind,
                dry_run: true,
                ..Default::default()
            }));
        }

        // A schema mismatch fails here, before anything is written
        let document = project::merge_project(dir, result.document)?;

        // Stage the archive change before touching the package
        let backed_up = archive.backup_once()?;
        let staged = if result.fully_converted {
            None
        } else {
            Some(archive.stage_rewrite(&manifest_to_json(&manifest)?)?)
        };

        let snapshot = ProjectSnapshot::take(dir)?;
        let resources = archive.extract_to(&dir.join(RESOURCES_DIR))?;
        project::write_host_config(dir, &self.options.host_paths)?;
        project::write_project(dir, &document)?;

        let finalized = match staged {
            Some(staged) => {
                drop(archive);
                staged.commit()
            }
            None => archive.delete(),
        };

        // The archive still holds every declaration, so the project must too
        if let Err(err) = finalized {
            if let Err(restore_err) = snapshot.restore() {
                error!(package = %name, "Failed to restore {}: {restore_err}", project::PROJECT_FILE);
            }
            return Err(err);
        }

        Ok(PackageOutcome::Converted(ConversionSummary {
            fully_converted: result.fully_converted,
            left_behind: result.left_behind,
            resources,
            backed_up,
            dry_run: false,
        }))
    }

    /// Translate a single archive without touching disk.
    pub fn preview(&self, archive_path: &Path) -> Result<Preview, ConvertError> {
        let mut archive = LegacyArchive::open(archive_path)?;
        let mut leftover = archive.read_manifest()?;
        let result = Translator::new(&self.registry).translate(&mut leftover)?;
        Ok(Preview { result, leftover })
    }
}

/// Default host paths: the plugins directory and the registry file's directory.
pub fn default_host_paths(plugins_dir: &Path, registry_file: &Path) -> HostPaths {
    let config = registry_file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    HostPaths {
        plugins: plugins_dir.to_path_buf(),
        config,
    }
}
