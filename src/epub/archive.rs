//! Moving archive entries between a ZIP container and a staging directory.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Entry that must be stored uncompressed for EPUB readers to sniff the format.
const MIMETYPE: &str = "mimetype";

/// Upper bound on the buffer reserved up front for one entry.
const MAX_RESERVE: u64 = 1 << 20;

/// Initial buffer size for an entry declaring `size` uncompressed bytes. The
/// header value is untrusted, so the reservation is capped.
fn reserve_hint(size: u64) -> usize {
    size.min(MAX_RESERVE) as usize
}

/// Extract every entry of `archive` below `root`, preserving relative paths.
///
/// Returns the names of the written files in archive order. Entries whose
/// names would land outside `root` are skipped.
pub fn extract_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    root: &Path,
) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(Error::ArchiveCorrupt)?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let target = root.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        let mut data = Vec::with_capacity(reserve_hint(entry.size()));
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::ArchiveCorrupt(ZipError::Io(e)))?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &data)?;

        debug!(entry = entry.name(), bytes = data.len(), "extracted");
        names.push(entry_name(&relative));
    }

    Ok(names)
}

/// Whether `path` names an HTML or XHTML content document.
///
/// The suffix test is case-sensitive.
pub fn is_content_document(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".html") || name.ends_with(".xhtml"))
}

/// All content documents below `root`, in path order.
pub fn content_documents(root: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_content_document(entry.path()) {
            documents.push(entry.into_path());
        }
    }
    Ok(documents)
}

/// Write every file below `root` into a new ZIP container on `writer`.
///
/// Files named in `order` come first, in that order; anything else found
/// below `root` follows in path order. Every entry is deflated except
/// `mimetype`, which is stored.
pub fn write_archive<W: Write + Seek>(root: &Path, order: &[String], writer: W) -> Result<()> {
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        files.push((entry_name(relative), entry.into_path()));
    }
    // Stable: unlisted files keep their path order after the listed ones.
    files.sort_by_key(|(name, _)| {
        position
            .get(name.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });

    let options_stored =
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(BufWriter::new(writer));
    for (name, path) in files {
        let options = if name == MIMETYPE {
            options_stored
        } else {
            options_deflate
        };
        let data = fs::read(&path)?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&data)?;
        debug!(entry = name.as_str(), bytes = data.len(), "packed");
    }

    let mut buffered = zip.finish()?;
    buffered.flush()?;
    Ok(())
}

/// Forward-slash entry name for a path relative to the staging root.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
