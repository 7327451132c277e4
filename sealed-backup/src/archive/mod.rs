//! Packing a directory tree into a zip archive and back.
//!
//! Entry names are relative to the packed root and always use `/` as the
//! separator. Directories get their own entry (with a trailing `/`) so that
//! empty directories survive a round trip.

use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::fs::metadata::{apply_permissions, FileMetadata};
use crate::fs::walker::{walk_tree, WalkOptions};
use crate::utils::errors::ArchiveError;

/// Compression applied to archive entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Stored,
    Zstd,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::Deflate => CompressionMethod::Deflated,
            Compression::Stored => CompressionMethod::Stored,
            Compression::Zstd => CompressionMethod::Zstd,
        }
    }
}

/// Counts gathered while packing
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
}

/// Build the archive entry name for a path relative to the packed root.
fn entry_name(relative: &Path) -> Result<String, ArchiveError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part
                .to_str()
                .ok_or_else(|| ArchiveError::NonUtf8Path(relative.to_path_buf()))?;
            parts.push(part);
        }
    }
    Ok(parts.join("/"))
}

/// Pack every entry below `root` into `writer`.
///
/// `exclude` names a path inside the tree to leave out, typically the archive
/// file being written.
pub fn pack<W: Write + Seek>(
    root: &Path,
    writer: W,
    exclude: Option<&Path>,
    compression: Compression,
) -> Result<(W, PackStats), ArchiveError> {
    let options = WalkOptions {
        follow_links: false,
        include_dirs: true,
        exclude: exclude.map(Path::to_path_buf).into_iter().collect(),
    };
    let entries = walk_tree(root, &options)?;

    let mut zip = ZipWriter::new(writer);
    let mut stats = PackStats::default();

    for entry in entries {
        let name = entry_name(&entry.relative_path)?;
        let metadata = FileMetadata::from_path(&entry.path)?;

        let mut file_options = FileOptions::default().compression_method(compression.method());
        if let Some(mode) = metadata.permissions {
            file_options = file_options.unix_permissions(mode);
        }

        if entry.is_dir {
            zip.add_directory(format!("{}/", name), file_options)?;
            stats.dirs += 1;
        } else {
            let file_options = file_options.large_file(entry.size >= u32::MAX as u64);
            zip.start_file(name, file_options)?;
            let mut source = File::open(&entry.path)?;
            stats.bytes += io::copy(&mut source, &mut zip)?;
            stats.files += 1;
        }
    }

    let writer = zip.finish()?;
    Ok((writer, stats))
}

/// Pack `root` into a new archive file at `archive_path`. The archive may live
/// inside `root`; it is excluded from its own contents.
pub fn pack_to_file(
    root: &Path,
    archive_path: &Path,
    compression: Compression,
) -> Result<PackStats, ArchiveError> {
    let file = File::create(archive_path)?;
    let (file, stats) = pack(root, file, Some(archive_path), compression)?;
    file.sync_all()?;

    debug!(
        root = %root.display(),
        archive = %archive_path.display(),
        files = stats.files,
        dirs = stats.dirs,
        bytes = stats.bytes,
        "packed tree"
    );
    Ok(stats)
}

/// Resolve an entry name to a path below `destination`, refusing names that
/// would escape it.
fn entry_destination(
    destination: &Path,
    name: &str,
    enclosed: Option<&Path>,
) -> Result<PathBuf, ArchiveError> {
    enclosed
        .map(|relative| destination.join(relative))
        .ok_or_else(|| ArchiveError::UnsafeEntry(name.to_string()))
}

/// Extract an archive into `destination`.
///
/// Directories are created first, then files are written. Permission bits are
/// restored when the archive carries them.
pub fn unpack<R: Read + Seek>(reader: R, destination: &Path) -> Result<PackStats, ArchiveError> {
    let mut archive = ZipArchive::new(reader)?;
    let mut stats = PackStats::default();

    fs::create_dir_all(destination)?;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if !entry.is_dir() {
            continue;
        }
        let path = entry_destination(destination, entry.name(), entry.enclosed_name())?;
        fs::create_dir_all(&path)?;
        stats.dirs += 1;
    }

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let path = entry_destination(destination, entry.name(), entry.enclosed_name())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut output = File::create(&path)?;
        stats.bytes += io::copy(&mut entry, &mut output)?;
        stats.files += 1;

        if let Some(mode) = entry.unix_mode() {
            apply_permissions(&path, mode)?;
        }
    }

    Ok(stats)
}

/// Extract the archive file at `archive_path` into `destination`.
pub fn unpack_file(archive_path: &Path, destination: &Path) -> Result<PackStats, ArchiveError> {
    let file = File::open(archive_path)?;
    let stats = unpack(file, destination)?;

    debug!(
        archive = %archive_path.display(),
        destination = %destination.display(),
        files = stats.files,
        dirs = stats.dirs,
        "unpacked archive"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn pack_to_bytes(root: &Path, compression: Compression) -> Result<Vec<u8>, ArchiveError> {
        let (cursor, _) = pack(root, Cursor::new(Vec::new()), None, compression)?;
        Ok(cursor.into_inner())
    }

    /// Relative path → Some(contents) for files, None for directories.
    fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
        let options = WalkOptions {
            include_dirs: true,
            ..Default::default()
        };
        walk_tree(root, &options)
            .unwrap()
            .into_iter()
            .map(|e| {
                let name = entry_name(&e.relative_path).unwrap();
                let contents = if e.is_dir { None } else { Some(fs::read(&e.path).unwrap()) };
                (name, contents)
            })
            .collect()
    }

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("a.txt"), b"hello").unwrap();
        fs::write(root.join("sub/b.txt"), b"world").unwrap();
        fs::write(root.join("sub/deeper/zero.bin"), b"").unwrap();
        fs::write(root.join("sub/ñandú-日本.txt"), "non-ascii".as_bytes()).unwrap();
    }

    #[test]
    fn test_roundtrip_preserves_tree() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        sample_tree(source.path());

        let bytes = pack_to_bytes(source.path(), Compression::Deflate).unwrap();
        unpack(Cursor::new(bytes), target.path()).unwrap();

        assert_eq!(snapshot(source.path()), snapshot(target.path()));
        assert!(target.path().join("empty").is_dir());
    }

    #[test]
    fn test_roundtrip_every_compression() {
        for compression in [Compression::Deflate, Compression::Stored, Compression::Zstd] {
            let source = TempDir::new().unwrap();
            let target = TempDir::new().unwrap();
            sample_tree(source.path());

            let bytes = pack_to_bytes(source.path(), compression).unwrap();
            unpack(Cursor::new(bytes), target.path()).unwrap();

            assert_eq!(snapshot(source.path()), snapshot(target.path()), "{:?}", compression);
        }
    }

    #[test]
    fn test_pack_to_file_excludes_itself() {
        let dir = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::write(dir.path().join("data.txt"), b"payload").unwrap();
        let archive_path = dir.path().join("backup.zip");

        let stats = pack_to_file(dir.path(), &archive_path, Compression::Deflate).unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.bytes, 7);

        unpack_file(&archive_path, target.path()).unwrap();
        assert_eq!(fs::read(target.path().join("data.txt")).unwrap(), b"payload");
        assert!(!target.path().join("backup.zip").exists());
    }

    #[test]
    fn test_directory_entries_have_trailing_slash() {
        let source = TempDir::new().unwrap();
        fs::create_dir(source.path().join("empty")).unwrap();

        let bytes = pack_to_bytes(source.path(), Compression::Deflate).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        let entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "empty/");
        assert!(entry.is_dir());
    }

    #[test]
    fn test_pack_is_deterministic_in_order() {
        let source = TempDir::new().unwrap();
        sample_tree(source.path());

        let names = |bytes: Vec<u8>| {
            let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
            (0..archive.len())
                .map(|i| archive.by_index(i).unwrap().name().to_string())
                .collect::<Vec<_>>()
        };
        let first = names(pack_to_bytes(source.path(), Compression::Deflate).unwrap());
        let second = names(pack_to_bytes(source.path(), Compression::Deflate).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    #[cfg(unix)]
    fn test_permissions_survive_roundtrip() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let script = source.path().join("run.sh");
        fs::write(&script, b"#!/bin/sh\n").unwrap();
        apply_permissions(&script, 0o750).unwrap();

        let bytes = pack_to_bytes(source.path(), Compression::Deflate).unwrap();
        unpack(Cursor::new(bytes), target.path()).unwrap();

        let restored = FileMetadata::from_path(&target.path().join("run.sh")).unwrap();
        assert_eq!(restored.permissions, Some(0o750));
    }

    #[test]
    fn test_rejects_escaping_entry() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("../evil.txt", FileOptions::default()).unwrap();
        zip.write_all(b"nope").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let target = TempDir::new().unwrap();
        let err = unpack(Cursor::new(bytes), target.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsafeEntry(_)));
    }

    #[test]
    fn test_garbage_is_zip_error() {
        let target = TempDir::new().unwrap();
        let err = unpack(Cursor::new(vec![0u8; 64]), target.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::Zip(_)));
    }
}
