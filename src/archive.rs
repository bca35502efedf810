//! Zip extraction into an image root and nested-archive bundling.
//!
//! Extraction overwrites existing paths, so an archive extracted later wins
//! on name collisions. Manifest entries (`*.MF`) are never materialized.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{io_error, zip_error, AssemblyError, IoContext, Result};
use crate::files::{copy_stream, COPY_BUFFER_SIZE};

const MANIFEST_SUFFIX: &str = ".MF";

/// True when an entry name is a manifest that must not leak into an image.
pub fn is_manifest_entry(name: &str) -> bool {
    name.to_ascii_uppercase().ends_with(MANIFEST_SUFFIX)
}

/// Extract every entry of `archive` below `destination`.
///
/// Returns the number of files written (directories and skipped manifests
/// are not counted). Nothing is rolled back on failure.
pub fn extract(archive: &Path, destination: &Path) -> Result<usize> {
    let file =
        File::open(archive).io_context(|| format!("opening archive '{}'", archive.display()))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(archive, e))?;

    fs::create_dir_all(destination)
        .io_context(|| format!("creating directory '{}'", destination.display()))?;

    let mut written = 0usize;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| zip_error(archive, e))?;
        let name = entry.name().to_string();
        let relative = entry.enclosed_name().ok_or_else(|| {
            io_error(
                format!("extracting '{}'", archive.display()),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("entry '{}' escapes the destination directory", name),
                ),
            )
        })?;
        let target = destination.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .io_context(|| format!("creating directory '{}'", target.display()))?;
            continue;
        }
        if is_manifest_entry(&name) {
            debug!("[archive] skipping manifest entry '{}'", name);
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("creating directory '{}'", parent.display()))?;
        }
        let out = File::create(&target)
            .io_context(|| format!("creating '{}'", target.display()))?;
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, out);
        copy_stream(&mut entry, &mut writer).io_context(|| {
            format!(
                "extracting '{}' from '{}'",
                name,
                archive.display()
            )
        })?;
        writer
            .flush()
            .io_context(|| format!("flushing '{}'", target.display()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode((mode & 0o7777) | 0o200))
                .io_context(|| format!("setting permissions on '{}'", target.display()))?;
        }
        written += 1;
    }

    Ok(written)
}

/// Bundle `members` as top-level entries of a new archive at `archive`.
///
/// Entry names are the members' file names, in the order given. Members are
/// stored uncompressed; they are archives already.
pub fn write_nested_archive(members: &[PathBuf], archive: &Path) -> Result<()> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent)
            .io_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    let out = File::create(archive)
        .io_context(|| format!("creating archive '{}'", archive.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for member in members {
        let entry_name = member
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AssemblyError::config(format!(
                    "cannot bundle '{}': file name is not valid UTF-8",
                    member.display()
                ))
            })?;
        zip.start_file(entry_name, options)
            .map_err(|e| zip_error(archive, e))?;
        let input = File::open(member)
            .io_context(|| format!("opening '{}'", member.display()))?;
        let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, input);
        copy_stream(&mut reader, &mut zip).io_context(|| {
            format!(
                "adding '{}' to '{}'",
                member.display(),
                archive.display()
            )
        })?;
    }

    let mut inner = zip.finish().map_err(|e| zip_error(archive, e))?;
    inner
        .flush()
        .io_context(|| format!("flushing archive '{}'", archive.display()))?;
    Ok(())
}
