//! Packaging a mirrored directory tree into a deflate-compressed ZIP archive.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::contract::{ArchiveResult, Archiver};
use crate::error::ArchiveError;

const COPY_BUFFER: usize = 64 * 1024;

/// Archiver used by the CLI: ZIP with deflate, entries in lexicographic path order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

#[async_trait]
impl Archiver for ZipArchiver {
    async fn archive(&self, source: &Path, dest: &Path) -> Result<ArchiveResult, ArchiveError> {
        let (source, dest) = (source.to_path_buf(), dest.to_path_buf());
        let fallback = dest.clone();
        tokio::task::spawn_blocking(move || archive_dir(&source, &dest))
            .await
            .unwrap_or_else(|e| {
                error!(error = ?e, "Archive task did not complete");
                Err(ArchiveError::write_failed(
                    fallback,
                    io::Error::new(io::ErrorKind::Other, e.to_string()),
                ))
            })
    }
}

/// `a/b/c.html` regardless of platform separator.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every regular file below `source`, sorted, paired with its entry name.
fn collect_files(source: &Path, dest: &Path) -> Result<Vec<(PathBuf, String)>, ArchiveError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            error!(error = %e, path = %path.display(), "Failed to walk archive source");
            ArchiveError::source_unreadable(path, io::Error::from(e))
        })?;
        if !entry.file_type().is_file() || entry.path() == dest {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let name = entry_name(relative);
        files.push((entry.into_path(), name));
    }
    Ok(files)
}

/// Copy one file into the current entry, keeping read and write failures apart.
fn copy_entry<W: Write>(path: &Path, dest: &Path, writer: &mut W) -> Result<u64, ArchiveError> {
    let mut input = File::open(path).map_err(|e| ArchiveError::source_unreadable(path, e))?;
    let mut buf = vec![0u8; COPY_BUFFER];
    let mut copied = 0u64;
    loop {
        let read = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::source_unreadable(path, e)),
        };
        writer
            .write_all(&buf[..read])
            .map_err(|e| ArchiveError::write_failed(dest, e))?;
        copied += read as u64;
    }
    Ok(copied)
}

/// Archive `source` into `dest`.
///
/// The archive is assembled in a temporary file next to `dest` and renamed
/// into place only once complete; on any failure nothing is left at `dest`.
pub fn archive_dir(source: &Path, dest: &Path) -> Result<ArchiveResult, ArchiveError> {
    info!(source = %source.display(), dest = %dest.display(), "Creating ZIP archive");

    let meta = fs::metadata(source).map_err(|e| {
        error!(error = ?e, source = %source.display(), "Archive source is not accessible");
        ArchiveError::source_unreadable(source, e)
    })?;
    if !meta.is_dir() {
        return Err(ArchiveError::source_unreadable(
            source,
            io::Error::new(io::ErrorKind::InvalidInput, "archive source is not a directory"),
        ));
    }

    let files = collect_files(source, dest)?;

    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| ArchiveError::write_failed(dest, e))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".archive-")
        .suffix(".zip.part")
        .tempfile_in(parent)
        .map_err(|e| {
            error!(error = ?e, dir = %parent.display(), "Cannot create temporary archive");
            ArchiveError::write_failed(dest, e)
        })?;

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut file_count = 0u64;
    let mut total_size = 0u64;
    {
        let mut zip = ZipWriter::new(temp.as_file_mut());
        for (path, name) in &files {
            zip.start_file(name.as_str(), options)
                .map_err(|e| ArchiveError::write_failed(dest, io::Error::from(e)))?;
            total_size += copy_entry(path, dest, &mut zip)?;
            file_count += 1;
            debug!(entry = %name, "Added archive entry");
        }
        zip.finish()
            .map_err(|e| ArchiveError::write_failed(dest, io::Error::from(e)))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| ArchiveError::write_failed(dest, e))?;

    temp.persist(dest).map_err(|e| {
        error!(error = ?e.error, dest = %dest.display(), "Cannot move archive into place");
        ArchiveError::write_failed(dest, e.error)
    })?;

    let archive_size = fs::metadata(dest)
        .map_err(|e| ArchiveError::write_failed(dest, e))?
        .len();
    let result = ArchiveResult::new(dest.to_path_buf(), archive_size, file_count, total_size);

    info!(
        archive = %dest.display(),
        files = result.file_count,
        total_size = result.total_size,
        archive_size = result.archive_size,
        compression_ratio = result.compression_ratio,
        "ZIP archive created"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn entry_names_use_forward_slashes() {
        let rel: PathBuf = ["assets", "css", "site.css"].iter().collect();
        assert_eq!(entry_name(&rel), "assets/css/site.css");
    }

    #[test]
    fn files_are_collected_in_lexicographic_order() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::write(root.join("c.txt"), "c").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b/inner/z.txt"), "z").unwrap();
        fs::write(root.join("b/a.txt"), "ba").unwrap();

        let files = collect_files(root, &root.join("never.zip")).unwrap();
        let names: Vec<&str> = files.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b/a.txt", "b/inner/z.txt", "c.txt"]);
    }

    #[test]
    fn destination_inside_source_is_not_archived_into_itself() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("index.html"), "<html></html>").unwrap();
        let dest = tmp.path().join("self.zip");

        archive_dir(tmp.path(), &dest).unwrap();
        let second = archive_dir(tmp.path(), &dest).unwrap();

        assert_eq!(second.file_count, 1);
    }
}
