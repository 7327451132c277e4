//! Directory traversal for staging and archiving.
//!
//! Entries come back in a stable order (sorted by file name at every level)
//! so that packing the same tree twice yields the same entry sequence.

use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Report directories as entries, not only files
    pub include_dirs: bool,

    /// Absolute paths to leave out of the result
    pub exclude: Vec<PathBuf>,
}

/// An entry discovered while walking a tree
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// Full path to the entry
    pub path: PathBuf,

    /// Path relative to the walk root
    pub relative_path: PathBuf,

    /// File size in bytes (0 for directories)
    pub size: u64,

    /// Is this a directory?
    pub is_dir: bool,
}

impl TreeEntry {
    /// Build an entry from a DirEntry.
    ///
    /// When links are followed walkdir has already resolved the entry (and
    /// fails on broken links and loops). Otherwise a link to a file is read
    /// as that file; links to directories and broken links are skipped with
    /// a warning.
    fn from_entry(entry: &DirEntry, root: &Path, follow_links: bool) -> std::io::Result<Option<Self>> {
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        let metadata = if entry.path_is_symlink() && !follow_links {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_dir() => {
                    warn!(path = %path.display(), "skipping symlink to directory");
                    return Ok(None);
                }
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping broken symlink");
                    return Ok(None);
                }
            }
        } else {
            entry.metadata()?
        };

        let (size, is_dir) = if metadata.is_dir() {
            (0, true)
        } else {
            (metadata.len(), false)
        };

        Ok(Some(Self {
            path,
            relative_path,
            size,
            is_dir,
        }))
    }
}

/// Walk a directory tree, returning every entry below `root` (the root itself
/// is never reported).
///
/// # Example
/// ```no_run
/// use sealed_backup::fs::walker::{walk_tree, WalkOptions};
/// use std::path::Path;
///
/// let entries = walk_tree(Path::new("/data"), &WalkOptions::default()).unwrap();
/// println!("Found {} files", entries.len());
/// ```
pub fn walk_tree(root: &Path, options: &WalkOptions) -> std::io::Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .min_depth(1)
        .sort_by_file_name();

    let mut iter = walker.into_iter();
    while let Some(entry) = iter.next() {
        let entry = entry?;

        if options.exclude.iter().any(|p| p == entry.path()) {
            if entry.file_type().is_dir() {
                iter.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_dir() && !options.include_dirs {
            continue;
        }

        if let Some(tree_entry) = TreeEntry::from_entry(&entry, root, options.follow_links)? {
            entries.push(tree_entry);
        }
    }

    Ok(entries)
}

/// True if `dir` has no entries at all.
pub fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
    Ok(std::fs::read_dir(dir)?.next().is_none())
}
