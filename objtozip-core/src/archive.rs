//! Staging names, archive keys and zip compression.
//!
//! Archive naming works on base names only: `logs/2024/app.log` is staged as `app.log`
//! and re-uploaded as `app.zip`, at the bucket root. Two keys that share a base name
//! in different prefixes therefore map to the same archive key.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A zip archive produced by [`compress_to_zip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedArchive {
    pub archive_path: PathBuf,
    /// Key to upload the archive under.
    pub archive_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("'{0}' has no usable file name")]
    InvalidSource(PathBuf),
    #[error("cannot read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write archive '{path}': {source}")]
    Write {
        path: PathBuf,
        source: zip::result::ZipError,
    },
}

/// The part of an object key after its last `/`, or `None` when that part is empty
/// or a relative directory reference (`.`, `..`).
pub fn object_base_name(key: &str) -> Option<&str> {
    key.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

/// Archive key for an object key: its base name with the extension replaced by `.zip`.
pub fn archive_key_for(key: &str) -> Option<String> {
    object_base_name(key).map(zip_name)
}

fn zip_name(file_name: &str) -> String {
    format!("{}.zip", file_stem(file_name))
}

/// File name without its last extension. Leading dots do not start an extension.
fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) if file_name[..dot].chars().any(|c| c != '.') => &file_name[..dot],
        _ => file_name,
    }
}

/// Compresses `source` into `<stem>.zip` next to it.
///
/// The archive holds a single deflated entry named after the source's base name. It is
/// written to a `.partial` file first and renamed into place, so a failure never leaves
/// a truncated archive behind, and a source that already ends in `.zip` is only replaced
/// once it has been fully read.
pub fn compress_to_zip(source: &Path) -> Result<CompressedArchive, CompressError> {
    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| CompressError::InvalidSource(source.to_path_buf()))?;
    let archive_key = zip_name(file_name);
    let archive_path = source.with_file_name(&archive_key);
    let partial_path = source.with_file_name(format!("{archive_key}.partial"));

    let input = File::open(source).map_err(|e| CompressError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    debug!(source = %source.display(), archive = %archive_path.display(), "Writing zip archive");

    if let Err(e) = write_single_entry(input, file_name, &partial_path) {
        let _ = fs::remove_file(&partial_path);
        return Err(e);
    }
    if let Err(e) = fs::rename(&partial_path, &archive_path) {
        let _ = fs::remove_file(&partial_path);
        return Err(CompressError::Write {
            path: archive_path,
            source: e.into(),
        });
    }

    info!(
        source = %source.display(),
        archive = %archive_path.display(),
        "File compressed"
    );
    Ok(CompressedArchive {
        archive_path,
        archive_key,
    })
}

fn write_single_entry(mut input: File, entry_name: &str, path: &Path) -> Result<(), CompressError> {
    let write_err = |source: zip::result::ZipError| CompressError::Write {
        path: path.to_path_buf(),
        source,
    };

    let size = input
        .metadata()
        .map_err(|e| write_err(e.into()))?
        .len();
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(size > u64::from(u32::MAX));

    let output = File::create(path).map_err(|e| write_err(e.into()))?;
    let mut zip = ZipWriter::new(output);
    zip.start_file(entry_name, options).map_err(write_err)?;
    io::copy(&mut input, &mut zip).map_err(|e| write_err(e.into()))?;
    let output = zip.finish().map_err(write_err)?;
    output.sync_all().map_err(|e| write_err(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn base_name_is_text_after_last_slash() {
        assert_eq!(object_base_name("a/file.txt"), Some("file.txt"));
        assert_eq!(object_base_name("file.txt"), Some("file.txt"));
        assert_eq!(object_base_name("a/b/"), None);
        assert_eq!(object_base_name("a/.."), None);
        assert_eq!(object_base_name(""), None);
    }

    #[test]
    fn archive_key_replaces_extension() {
        assert_eq!(archive_key_for("a/file.txt").as_deref(), Some("file.zip"));
        assert_eq!(
            archive_key_for("dir/archive.tar.gz").as_deref(),
            Some("archive.tar.zip")
        );
        assert_eq!(archive_key_for("README").as_deref(), Some("README.zip"));
        assert_eq!(archive_key_for(".bashrc").as_deref(), Some(".bashrc.zip"));
        assert_eq!(archive_key_for("dir/"), None);
    }

    #[test]
    fn archive_holds_one_entry_with_original_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("report.csv");
        let content = b"id,value\n1,hello\n2,world\n".repeat(64);
        fs::write(&source, &content).unwrap();

        let archive = compress_to_zip(&source).unwrap();
        assert_eq!(archive.archive_key, "report.zip");
        assert_eq!(archive.archive_path, dir.path().join("report.zip"));
        assert!(!dir.path().join("report.zip.partial").exists());

        let mut zip = zip::ZipArchive::new(File::open(&archive.archive_path).unwrap()).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        assert_eq!(entry.name(), "report.csv");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut unpacked = Vec::new();
        entry.read_to_end(&mut unpacked).unwrap();
        assert_eq!(unpacked, content);
    }

    #[test]
    fn missing_source_leaves_no_archive() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("nonexistent_file.txt");

        let err = compress_to_zip(&source).unwrap_err();
        assert!(matches!(err, CompressError::Read { .. }));
        assert!(!dir.path().join("nonexistent_file.zip").exists());
        assert!(!dir.path().join("nonexistent_file.zip.partial").exists());
    }

    #[test]
    fn source_with_zip_extension_is_replaced_by_its_archive() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("notes.zip");
        fs::write(&source, b"plain text with a misleading extension").unwrap();

        let archive = compress_to_zip(&source).unwrap();
        assert_eq!(archive.archive_path, source);

        let mut zip = zip::ZipArchive::new(File::open(&source).unwrap()).unwrap();
        let mut entry = zip.by_name("notes.zip").unwrap();
        let mut unpacked = String::new();
        entry.read_to_string(&mut unpacked).unwrap();
        assert_eq!(unpacked, "plain text with a misleading extension");
    }
}
