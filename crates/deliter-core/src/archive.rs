//! Legacy archive handling
//!
//! Wraps a `.deli` zip archive: reading its manifest, extracting its
//! resources, and the finalizing steps of a conversion (one-time backup,
//! manifest rewrite for partial conversions, deletion for complete ones).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

use crate::error::ConvertError;
use crate::extract::{ExtractionStats, extract_resources};
use crate::manifest::{MANIFEST_FILE, read_manifest};
use crate::node::Node;

/// File extension of legacy mod archives
pub const LEGACY_EXTENSION: &str = "deli";

/// Suffix appended to an archive's file name for its backup copy
pub const BACKUP_SUFFIX: &str = ".bak";

/// Path of the backup copy of `archive`.
pub fn backup_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// An open legacy archive
#[derive(Debug)]
pub struct LegacyArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl LegacyArchive {
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        let file = File::open(path).map_err(ConvertError::io(path))?;
        let archive = ZipArchive::new(file)?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the archive's root manifest.
    pub fn read_manifest(&mut self) -> Result<Node, ConvertError> {
        read_manifest(&mut self.archive)
    }

    /// Extract all resources below `dest`.
    pub fn extract_to(&mut self, dest: &Path) -> Result<ExtractionStats, ConvertError> {
        extract_resources(&mut self.archive, dest)
    }

    /// Copy the archive to its backup path unless a backup already exists.
    ///
    /// Returns whether a backup was written.
    pub fn backup_once(&self) -> Result<bool, ConvertError> {
        let backup = backup_path(&self.path);
        if backup.exists() {
            debug!(backup = %backup.display(), "Backup already present");
            return Ok(false);
        }

        fs::copy(&self.path, &backup).map_err(ConvertError::io(&backup))?;
        debug!(backup = %backup.display(), "Backed up legacy archive");
        Ok(true)
    }

    /// Replace the archive's manifest with `manifest_json`, keeping every
    /// other entry byte-for-byte.
    pub fn rewrite_manifest(mut self, manifest_json: &str) -> Result<(), ConvertError> {
        let staged = self.stage_rewrite(manifest_json)?;
        // Release the original before replacing it
        drop(self);
        staged.commit()
    }

    /// Write the rewritten archive next to the original without replacing it.
    ///
    /// Nothing changes on disk until [`StagedRewrite::commit`]; dropping the
    /// staged rewrite removes the temporary file.
    pub fn stage_rewrite(&mut self, manifest_json: &str) -> Result<StagedRewrite, ConvertError> {
        let staged = StagedRewrite {
            tmp: sibling_temp_path(&self.path),
            target: self.path.clone(),
        };

        let file = File::create(&staged.tmp).map_err(ConvertError::io(&staged.tmp))?;
        let mut writer = zip::ZipWriter::new(file);

        for i in 0..self.archive.len() {
            let entry = self.archive.by_index_raw(i)?;
            if entry.name() == MANIFEST_FILE {
                continue;
            }
            writer.raw_copy_file(entry)?;
        }

        writer.start_file(MANIFEST_FILE, SimpleFileOptions::default())?;
        writer
            .write_all(manifest_json.as_bytes())
            .map_err(ConvertError::io(&staged.tmp))?;
        writer.finish()?;

        Ok(staged)
    }

    /// Delete the archive from disk.
    pub fn delete(self) -> Result<(), ConvertError> {
        let Self { path, archive } = self;
        drop(archive);
        fs::remove_file(&path).map_err(ConvertError::io(&path))?;
        debug!(archive = %path.display(), "Deleted fully converted legacy archive");
        Ok(())
    }
}

/// A rewritten archive waiting to replace the original
#[derive(Debug)]
pub struct StagedRewrite {
    tmp: PathBuf,
    target: PathBuf,
}

impl StagedRewrite {
    /// Move the rewritten archive over the original.
    pub fn commit(self) -> Result<(), ConvertError> {
        fs::rename(&self.tmp, &self.target).map_err(ConvertError::io(&self.target))?;
        debug!(archive = %self.target.display(), "Rewrote legacy archive with leftover manifest");
        Ok(())
    }
}

impl Drop for StagedRewrite {
    fn drop(&mut self) {
        if self.tmp.is_file()
            && let Err(err) = fs::remove_file(&self.tmp)
        {
            warn!(path = %self.tmp.display(), "Failed to remove staged archive: {err}");
        }
    }
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
