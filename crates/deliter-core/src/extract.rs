//! Resource extraction
//!
//! Copies archive entries into a package's resource directory. Extraction
//! is incremental: a file already on disk is only overwritten when the
//! archive entry is newer, and written files take the entry's timestamp so
//! a repeated run finds everything up to date.

use std::fs;
use std::io::{self, Read, Seek};
use std::path::Path;
use std::time::SystemTime;

use chrono::{Local, NaiveDate, TimeZone};
use filetime::FileTime;
use serde::Serialize;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::ConvertError;
use crate::manifest::MANIFEST_FILE;

/// Counters for one extraction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Files created or overwritten
    pub written: usize,
    /// Files left alone because the copy on disk is at least as new
    pub up_to_date: usize,
    /// Entries not extracted (root manifest, unsafe paths)
    pub skipped: usize,
}

/// Extract every entry of `archive` below `dest`.
pub fn extract_resources<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    dest: &Path,
) -> Result<ExtractionStats, ConvertError> {
    if dest.exists() && !dest.is_dir() {
        return Err(ConvertError::ArchiveStructure(format!(
            "resource destination {} exists and is not a directory",
            dest.display()
        )));
    }

    extract_entries(archive, dest).map_err(|source| ConvertError::ResourceExtractionFailed {
        destination: dest.to_path_buf(),
        source,
    })
}

fn extract_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    dest: &Path,
) -> io::Result<ExtractionStats> {
    fs::create_dir_all(dest)?;
    let mut stats = ExtractionStats::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        // Sanitize the entry path to prevent path traversal
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry with an unsafe path");
            stats.skipped += 1;
            continue;
        };
        let outpath = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if relative.file_name().is_some_and(|name| name == MANIFEST_FILE) {
            if relative.parent().is_none_or(|p| p.as_os_str().is_empty()) {
                stats.skipped += 1;
                continue;
            }
            warn!(
                entry = entry.name(),
                "Archive contains a nested {MANIFEST_FILE}; loaders scanning the resource tree may mistake it for a package manifest"
            );
        }

        let modified = entry.last_modified().and_then(entry_time);

        if outpath.is_file() {
            let on_disk = fs::metadata(&outpath)?.modified()?;
            if modified.is_some_and(|entry_time| entry_time <= on_disk) {
                stats.up_to_date += 1;
                continue;
            }
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = fs::File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;
        drop(outfile);

        if let Some(entry_time) = modified {
            filetime::set_file_mtime(&outpath, FileTime::from_system_time(entry_time))?;
        }

        debug!(path = %outpath.display(), "Extracted resource");
        stats.written += 1;
    }

    // Earlier tooling extracted the root manifest too; it is stale now
    let stale = dest.join(MANIFEST_FILE);
    if stale.is_file() {
        fs::remove_file(&stale)?;
        debug!(path = %stale.display(), "Removed stale extracted manifest");
    }

    Ok(stats)
}

/// Convert an entry's MS-DOS timestamp (local time) into a system time.
fn entry_time(time: zip::DateTime) -> Option<SystemTime> {
    let date = NaiveDate::from_ymd_opt(
        i32::from(time.year()),
        u32::from(time.month()),
        u32::from(time.day()),
    )?;
    let naive = date.and_hms_opt(
        u32::from(time.hour()),
        u32::from(time.minute()),
        u32::from(time.second()),
    )?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(local.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn timestamp(year: u16) -> zip::DateTime {
        zip::DateTime::from_date_and_time(year, 6, 1, 12, 0, 0).expect("valid timestamp")
    }

    /// Create a zip archive in memory; every entry gets the same timestamp
    fn create_test_zip(entries: &[(&str, &str)], year: u16) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored)
                .last_modified_time(timestamp(year));

            for (name, content) in entries {
                if name.ends_with('/') {
                    zip.add_directory(*name, options)
                        .expect("Failed to add dir");
                } else {
                    zip.start_file(*name, options)
                        .expect("Failed to start file");
                    zip.write_all(content.as_bytes()).expect("Failed to write");
                }
            }

            zip.finish().expect("Failed to finish zip");
        }
        buf.into_inner()
    }

    fn open(data: Vec<u8>) -> ZipArchive<std::io::Cursor<Vec<u8>>> {
        ZipArchive::new(std::io::Cursor::new(data)).expect("valid zip")
    }

    // =========================================================================
    // Extraction Tests
    // =========================================================================

    #[test]
    fn extract_writes_files_and_directories() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("resources");
        let mut archive = open(create_test_zip(
            &[
                ("manifest.json", "{}"),
                ("empty/", ""),
                ("items/gun.dll", "binary"),
            ],
            2020,
        ));

        let stats = extract_resources(&mut archive, &dest).expect("Extraction should succeed");

        assert_eq!(stats.written, 1);
        assert_eq!(stats.skipped, 1);
        assert!(dest.join("empty").is_dir());
        assert_eq!(
            fs::read_to_string(dest.join("items/gun.dll")).unwrap(),
            "binary"
        );
        assert!(!dest.join("manifest.json").exists());
    }

    #[test]
    fn extract_keeps_nested_manifest() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("resources");
        let mut archive = open(create_test_zip(&[("sub/manifest.json", "{}")], 2020));

        let stats = extract_resources(&mut archive, &dest).unwrap();

        assert_eq!(stats.written, 1);
        assert!(dest.join("sub/manifest.json").is_file());
    }

    #[test]
    fn second_extraction_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("resources");
        let data = create_test_zip(&[("a.txt", "a"), ("dir/b.txt", "b")], 2020);

        let first = extract_resources(&mut open(data.clone()), &dest).unwrap();
        assert_eq!(first.written, 2);

        let second = extract_resources(&mut open(data), &dest).unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.up_to_date, 2);
    }

    #[test]
    fn newer_entry_overwrites_older_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("resources");
        fs::create_dir_all(&dest).unwrap();
        let target = dest.join("a.txt");
        fs::write(&target, "old").unwrap();
        filetime::set_file_mtime(&target, FileTime::from_unix_time(631_152_000, 0)).unwrap(); // 1990

        let stats =
            extract_resources(&mut open(create_test_zip(&[("a.txt", "new")], 2020)), &dest)
                .unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn older_entry_does_not_clobber_newer_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("resources");
        fs::create_dir_all(&dest).unwrap();
        let target = dest.join("a.txt");
        fs::write(&target, "edited").unwrap();

        let stats =
            extract_resources(&mut open(create_test_zip(&[("a.txt", "archived")], 2000)), &dest)
                .unwrap();

        assert_eq!(stats.written, 0);
        assert_eq!(stats.up_to_date, 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "edited");
    }

    #[test]
    fn stale_root_manifest_is_removed() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("resources");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("manifest.json"), "{}").unwrap();

        extract_resources(&mut open(create_test_zip(&[("a.txt", "a")], 2020)), &dest).unwrap();

        assert!(!dest.join("manifest.json").exists());
    }

    #[test]
    fn destination_file_conflict_is_structure_error() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("resources");
        fs::write(&dest, "not a directory").unwrap();

        let err = extract_resources(&mut open(create_test_zip(&[("a.txt", "a")], 2020)), &dest)
            .unwrap_err();
        assert!(matches!(err, ConvertError::ArchiveStructure(_)));
    }

    #[test]
    fn io_failure_is_wrapped() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("resources");
        fs::create_dir_all(dest.join("a.txt")).unwrap();

        let err = extract_resources(&mut open(create_test_zip(&[("a.txt", "a")], 2020)), &dest)
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::ResourceExtractionFailed { .. }
        ));
    }

    #[test]
    fn entry_time_converts_dos_timestamp() {
        let time = entry_time(timestamp(2020)).expect("valid time");
        let local: chrono::DateTime<Local> = time.into();
        assert_eq!(local.format("%Y-%m-%d %H:%M:%S").to_string(), "2020-06-01 12:00:00");
    }
}
