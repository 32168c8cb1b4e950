//! The conversion pipeline: extract, rewrite, patch, repackage.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::epub::{WorkDir, content_documents, extract_archive, patch_manifest, write_archive};
use crate::error::{Error, Result};
use crate::transform::html::MarkupRewriter;

/// Where Google Docs places the package document in its EPUB export.
pub const DEFAULT_MANIFEST_PATH: &str = "GoogleDoc/package.opf";

/// Options for a single [`convert`] run.
///
/// # Example
///
/// ```
/// use rtl_epub::ConvertOptions;
///
/// let options = ConvertOptions::new()
///     .with_work_dir("temp_epub")
///     .with_clean_after(false);
/// assert!(options.clean_before);
/// ```
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Remove an existing fixed working directory before extracting.
    pub clean_before: bool,
    /// Remove the working directory after a successful run. It is always
    /// removed when the run fails.
    pub clean_after: bool,
    /// Fixed staging directory. `None` stages in a fresh temporary directory,
    /// which keeps concurrent runs apart.
    pub work_dir: Option<PathBuf>,
    /// Location of the package document inside the archive.
    pub manifest_path: PathBuf,
    pub rewriter: MarkupRewriter,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            clean_before: true,
            clean_after: true,
            work_dir: None,
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            rewriter: MarkupRewriter::default(),
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clean_before(mut self, clean: bool) -> Self {
        self.clean_before = clean;
        self
    }

    pub fn with_clean_after(mut self, clean: bool) -> Self {
        self.clean_after = clean;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_rewriter(mut self, rewriter: MarkupRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }
}

/// Convert the EPUB at `input` to a right-to-left layout.
///
/// The result is written to `output`, or over `input` when `output` is
/// `None`. The destination is only replaced once the new archive has been
/// written completely; on error it is left untouched. Returns the path that
/// was written.
///
/// # Errors
///
/// - [`Error::InputNotFound`] if `input` is not a file
/// - [`Error::ArchiveCorrupt`] if `input` is not a readable ZIP container
/// - [`Error::ManifestMissing`] if the archive has no package document at
///   [`ConvertOptions::manifest_path`], or that path is absolute or climbs out
///   of the archive with `..`
/// - [`Error::ManifestMalformed`] if the package document is not well-formed XML
pub fn convert(input: &Path, output: Option<&Path>, options: &ConvertOptions) -> Result<PathBuf> {
    let output = output.unwrap_or(input).to_path_buf();

    if !is_archive_relative(&options.manifest_path) {
        return Err(Error::ManifestMissing(options.manifest_path.clone()));
    }

    if !input.is_file() {
        return Err(Error::InputNotFound(input.to_path_buf()));
    }
    let file = File::open(input).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::InputNotFound(input.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(Error::ArchiveCorrupt)?;

    info!(input = %input.display(), output = %output.display(), "converting");

    let work = match &options.work_dir {
        Some(dir) => WorkDir::fixed(dir, options.clean_before)?,
        None => WorkDir::scratch()?,
    };
    debug!(path = %work.path().display(), "staging archive");

    let order = extract_archive(&mut archive, work.path())?;
    drop(archive);

    rewrite_documents(work.path(), &options.rewriter)?;
    patch_manifest_file(work.path(), &options.manifest_path)?;
    write_output(work.path(), &order, input, &output)?;

    work.finish(options.clean_after);
    info!(output = %output.display(), "conversion complete");
    Ok(output)
}

/// Whether `path` can only name something inside the archive root.
fn is_archive_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some()
        && components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Rewrite every content document below `root` in place.
fn rewrite_documents(root: &Path, rewriter: &MarkupRewriter) -> Result<()> {
    for path in content_documents(root)? {
        let bytes = fs::read(&path)?;
        let Ok(html) = String::from_utf8(bytes) else {
            warn!(path = %path.display(), "content document is not UTF-8; left unchanged");
            continue;
        };
        fs::write(&path, rewriter.rewrite(&html))?;
        debug!(path = %path.display(), "rewrote content document");
    }
    Ok(())
}

fn patch_manifest_file(root: &Path, manifest_path: &Path) -> Result<()> {
    let path = root.join(manifest_path);
    if !path.is_file() {
        return Err(Error::ManifestMissing(manifest_path.to_path_buf()));
    }

    let opf = String::from_utf8(fs::read(&path)?)
        .map_err(|e| Error::ManifestMalformed(format!("not UTF-8: {e}")))?;
    fs::write(&path, patch_manifest(&opf)?)?;
    debug!(path = %path.display(), "patched package document");
    Ok(())
}

/// Pack `root` into a temporary file beside `output`, then move it into place.
fn write_output(root: &Path, order: &[String], input: &Path, output: &Path) -> Result<()> {
    let parent = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let staged = NamedTempFile::new_in(parent)?;
    write_archive(root, order, staged.as_file())?;
    staged.as_file().sync_all()?;
    fs::set_permissions(staged.path(), fs::metadata(input)?.permissions())?;
    staged.persist(output).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConvertOptions::default();
        assert!(options.clean_before);
        assert!(options.clean_after);
        assert!(options.work_dir.is_none());
        assert_eq!(options.manifest_path, Path::new("GoogleDoc/package.opf"));
        assert_eq!(options.rewriter, MarkupRewriter::default());
    }

    #[test]
    fn test_archive_relative_manifest_paths() {
        assert!(is_archive_relative(Path::new("GoogleDoc/package.opf")));
        assert!(is_archive_relative(Path::new("./content.opf")));
        assert!(!is_archive_relative(Path::new("")));
        assert!(!is_archive_relative(Path::new("/etc/package.opf")));
        assert!(!is_archive_relative(Path::new("../package.opf")));
        assert!(!is_archive_relative(Path::new("GoogleDoc/../../package.opf")));
    }

    #[test]
    fn test_missing_input() {
        let err = convert(
            Path::new("/nonexistent/book.epub"),
            None,
            &ConvertOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }
}
