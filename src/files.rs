//! File copy and delete primitives used by every install step.
//!
//! Copies stream through a fixed-size buffer so memory use does not depend
//! on artifact size. There is no atomic replace: an interrupted copy can
//! leave a partially written destination.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{AssemblyError, IoContext, Result};

/// Buffer size for streaming copies and archive extraction.
pub const COPY_BUFFER_SIZE: usize = 2048;

/// Stream `reader` into `writer` through a [`COPY_BUFFER_SIZE`] buffer.
///
/// Returns the number of bytes copied.
pub fn copy_stream<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> std::io::Result<u64> {
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// Copy one file, creating the destination's parent directories first.
pub fn copy_file(source: &Path, destination: &Path) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .io_context(|| format!("creating directory '{}'", parent.display()))?;
    }

    let input = File::open(source).io_context(|| format!("opening '{}'", source.display()))?;
    let output = File::create(destination)
        .io_context(|| format!("creating '{}'", destination.display()))?;

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, input);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, output);
    let copied = copy_stream(&mut reader, &mut writer).io_context(|| {
        format!(
            "copying '{}' to '{}'",
            source.display(),
            destination.display()
        )
    })?;
    writer
        .flush()
        .io_context(|| format!("flushing '{}'", destination.display()))?;
    Ok(copied)
}

/// Copy `source` into `directory`, keeping its file name.
pub fn copy_into(source: &Path, directory: &Path) -> Result<u64> {
    let file_name = source.file_name().ok_or_else(|| {
        AssemblyError::config(format!("'{}' has no file name", source.display()))
    })?;
    copy_file(source, &directory.join(file_name))
}

/// Delete a file, or a directory and everything below it.
///
/// Fails when `path` does not exist.
pub fn force_delete(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).io_context(|| format!("reading '{}'", path.display()))?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
            .io_context(|| format!("removing directory '{}'", path.display()))
    } else {
        fs::remove_file(path).io_context(|| format!("removing '{}'", path.display()))
    }
}

/// Create `path` and its parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).io_context(|| format!("creating directory '{}'", path.display()))
}
