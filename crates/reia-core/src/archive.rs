//! Zip archive construction for backups

use reia_scanner::ExclusionSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};
use zip::write::FileOptions;
use zip::ZipWriter;

/// Errors during archive creation
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Source directory not found: {0}")]
    MissingSource(PathBuf),

    #[error("Archive already closed")]
    Closed,
}

/// An archive being written
///
/// Entries are deflated. An archive that is dropped without [`close`]
/// being called is treated as abandoned and its file is removed.
///
/// [`close`]: ArchiveBuilder::close
pub struct ArchiveBuilder {
    path: PathBuf,
    zip: Option<ZipWriter<File>>,
    options: FileOptions,
    max_file_size: u64,
}

impl ArchiveBuilder {
    /// Create the archive file at `path`
    ///
    /// Files of `max_file_size` bytes or more are skipped by
    /// [`add_directory`](Self::add_directory).
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn open(path: &Path, max_file_size: u64) -> Result<Self, ArchiveError> {
        let file = File::create(path)?;
        tracing::debug!(path = %path.display(), "archive opened");
        Ok(Self {
            path: path.to_path_buf(),
            zip: Some(ZipWriter::new(file)),
            options: FileOptions::default().compression_method(zip::CompressionMethod::Deflated),
            max_file_size,
        })
    }

    /// Path of the archive on disk
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut ZipWriter<File>, ArchiveError> {
        self.zip.as_mut().ok_or(ArchiveError::Closed)
    }

    /// Add a directory tree under `prefix` inside the archive
    ///
    /// Directories are written before their contents so empty ones
    /// survive. Excluded directories are pruned with their whole subtree.
    /// Symlinks are not followed. Returns the number of files added;
    /// directory entries and skipped oversized files are not counted.
    ///
    /// # Errors
    /// Returns an error if the source is missing or any entry fails to
    /// read or write
    pub fn add_directory(
        &mut self,
        source: &Path,
        prefix: &str,
        exclusions: &ExclusionSet,
    ) -> Result<usize, ArchiveError> {
        let source = source
            .canonicalize()
            .map_err(|_| ArchiveError::MissingSource(source.to_path_buf()))?;
        let max_file_size = self.max_file_size;
        let options = self.options;
        let mut added = 0;

        for entry in walk(&source, prefix, exclusions) {
            let (entry, name) = entry?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                self.writer()?.add_directory(name, options)?;
            } else if file_type.is_file() {
                let size = entry.metadata()?.len();
                if size >= max_file_size {
                    tracing::debug!(
                        file = %entry.path().display(),
                        size,
                        "skipping oversized file"
                    );
                    continue;
                }
                let mut file = File::open(entry.path())?;
                let zip = self.writer()?;
                zip.start_file(name, options)?;
                io::copy(&mut file, zip)?;
                added += 1;
            }
        }

        tracing::debug!(source = %source.display(), prefix, added, "directory archived");
        Ok(added)
    }

    /// Add a file whose content is held in memory
    ///
    /// # Errors
    /// Returns an error if the entry cannot be written
    pub fn add_virtual_file(&mut self, name: &str, content: &[u8]) -> Result<(), ArchiveError> {
        let options = self.options;
        let zip = self.writer()?;
        zip.start_file(name, options)?;
        zip.write_all(content)?;
        Ok(())
    }

    /// Add a single file from disk under `archive_name`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or written
    pub fn add_file(&mut self, source: &Path, archive_name: &str) -> Result<(), ArchiveError> {
        let mut file = File::open(source)?;
        let options = self.options;
        let zip = self.writer()?;
        zip.start_file(archive_name, options)?;
        io::copy(&mut file, zip)?;
        Ok(())
    }

    /// Finalize the archive and return its size in bytes
    ///
    /// # Errors
    /// Returns an error if finalizing fails; the partial file is removed
    pub fn close(mut self) -> Result<u64, ArchiveError> {
        let Some(mut zip) = self.zip.take() else {
            return Err(ArchiveError::Closed);
        };

        let result = zip
            .finish()
            .map_err(ArchiveError::from)
            .and_then(|mut file| file.flush().map_err(ArchiveError::from))
            .and_then(|()| Ok(fs::metadata(&self.path)?.len()));

        if result.is_err() {
            remove_partial(&self.path);
        }
        result
    }

    /// Abandon the archive and remove its file
    pub fn abort(self) {
        drop(self);
    }
}

impl Drop for ArchiveBuilder {
    fn drop(&mut self) {
        if let Some(zip) = self.zip.take() {
            drop(zip);
            remove_partial(&self.path);
        }
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "partial archive removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial archive");
        }
    }
}

/// Total size and count of the files `add_directory` would archive
///
/// A missing source measures as empty.
///
/// # Errors
/// Returns an error if the walk fails
pub fn measure_directory(
    source: &Path,
    prefix: &str,
    exclusions: &ExclusionSet,
    max_file_size: u64,
) -> Result<(u64, usize), ArchiveError> {
    let Ok(source) = source.canonicalize() else {
        return Ok((0, 0));
    };

    let mut bytes = 0;
    let mut files = 0;
    for entry in walk(&source, prefix, exclusions) {
        let (entry, _) = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata()?.len();
        if size < max_file_size {
            bytes += size;
            files += 1;
        }
    }
    Ok((bytes, files))
}

/// Walk `source` in parent-first order, yielding entries with their
/// archive names and pruning excluded subtrees
fn walk<'a>(
    source: &'a Path,
    prefix: &'a str,
    exclusions: &'a ExclusionSet,
) -> impl Iterator<Item = Result<(DirEntry, String), walkdir::Error>> + 'a {
    WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            if exclusions.is_excluded_path(entry.path()) {
                return false;
            }
            let name = archive_name(prefix, source, entry.path());
            !exclusions.is_excluded(&name, entry.file_type().is_dir())
        })
        .map(move |entry| {
            entry.map(|entry| {
                let name = archive_name(prefix, source, entry.path());
                (entry, name)
            })
        })
}

/// `/`-separated name of `path` inside the archive
fn archive_name(prefix: &str, source: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(source).unwrap_or(path);
    let relative: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    format!("{prefix}{}", relative.join("/"))
}
