//! Package discovery
//!
//! A package is a directory directly below the plugins directory that has a
//! `manifest.json` at its root. Convertible packages additionally hold
//! exactly one legacy archive.

use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::LEGACY_EXTENSION;
use crate::error::ConvertError;
use crate::manifest::MANIFEST_FILE;

/// Directory (inside the package) resources are extracted to
pub const RESOURCES_DIR: &str = "resources";

/// List the immediate subdirectories of `plugins_dir`, sorted by name.
pub fn discover_packages(plugins_dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let entries = fs::read_dir(plugins_dir).map_err(ConvertError::io(plugins_dir))?;

    let mut packages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(ConvertError::io(plugins_dir))?;
        let path = entry.path();
        if path.is_dir() {
            packages.push(path);
        }
    }
    packages.sort();
    Ok(packages)
}

/// Whether a directory carries a package manifest at its root.
pub fn is_package(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file()
}

/// The package's directory name.
pub fn package_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

/// Legacy archives directly inside a package, sorted by name.
pub fn find_legacy_archives(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let entries = fs::read_dir(dir).map_err(ConvertError::io(dir))?;

    let mut archives = Vec::new();
    for entry in entries {
        let path = entry.map_err(ConvertError::io(dir))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == LEGACY_EXTENSION) {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}
