//! Storage tree traversal
//!
//! Walks the download root the engine writes into. Nothing is cached between
//! calls; every listing reflects the tree as it is right now.

use crate::error::RtdlError;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::{error, info, warn};

/// A regular file found under the storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    /// Modification time in millis since the epoch
    pub mtime_ms: i64,
    pub size_bytes: u64,
}

/// Result of walking a tree: files in traversal order and every subdirectory
#[derive(Debug, Default)]
pub struct TreeListing {
    pub files: Vec<StoredFile>,
    /// Directories below the root, parents before their children
    pub dirs: Vec<PathBuf>,
}

/// Recursively list every regular file below `root`
///
/// Unreadable directories and entries are logged and skipped. A missing root
/// yields an empty listing.
pub async fn walk(root: &Path) -> TreeListing {
    let mut listing = TreeListing::default();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if dir != root || e.kind() != std::io::ErrorKind::NotFound {
                    error!("Error reading directory {}: {}", dir.display(), e);
                }
                continue;
            }
        };

        let mut subdirs = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Error listing {}: {}", dir.display(), e);
                    break;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_file() {
                match stored_file(&path).await {
                    Ok(file) => listing.files.push(file),
                    Err(e) => warn!("Skipping {}: {}", path.display(), e),
                }
            }
        }

        // Reverse so the stack pops subdirectories in listing order
        for sub in subdirs.into_iter().rev() {
            listing.dirs.push(sub.clone());
            stack.push(sub);
        }
    }

    listing
}

/// List every regular file below `root`
pub async fn list_files(root: &Path) -> Vec<StoredFile> {
    walk(root).await.files
}

async fn stored_file(path: &Path) -> Result<StoredFile, RtdlError> {
    let metadata = fs::metadata(path).await.map_err(|e| RtdlError::fs(path, e))?;
    let modified = metadata.modified().map_err(|e| RtdlError::fs(path, e))?;
    let mtime_ms = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    };

    Ok(StoredFile {
        path: path.to_path_buf(),
        mtime_ms,
        size_bytes: metadata.len(),
    })
}

/// Total size in bytes of every file below `root`; 0 when it does not exist
pub async fn directory_size(root: &Path) -> u64 {
    list_files(root).await.iter().map(|f| f.size_bytes).sum()
}

/// Remove every directory below `root` that is (or becomes) empty
///
/// Children are handled before their parents so nested empty chains collapse
/// in one pass. `root` itself is never removed. Returns the number of
/// directories removed.
pub async fn prune_empty_dirs(root: &Path) -> usize {
    let listing = walk(root).await;
    let mut removed = 0;

    for dir in listing.dirs.iter().rev() {
        if dir == root {
            continue;
        }
        match is_empty_dir(dir).await {
            Ok(true) => match fs::remove_dir(dir).await {
                Ok(()) => {
                    info!("Removed empty folder: {}", dir.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove folder {}: {}", dir.display(), e),
            },
            Ok(false) => {}
            Err(e) => warn!("Error removing empty folders from {}: {}", dir.display(), e),
        }
    }

    removed
}

async fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    #[tokio::test]
    async fn test_walk_finds_nested_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        stdfs::create_dir_all(root.join("a/b/c")).unwrap();
        stdfs::write(root.join("top.txt"), b"1").unwrap();
        stdfs::write(root.join("a/b/c/deep.bin"), b"12345").unwrap();

        let listing = walk(root).await;
        assert_eq!(listing.files.len(), 2);
        assert_eq!(listing.dirs.len(), 3);
        assert_eq!(directory_size(root).await, 6);
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let listing = walk(&tmp.path().join("nope")).await;
        assert!(listing.files.is_empty());
        assert_eq!(directory_size(&tmp.path().join("nope")).await, 0);
    }

    #[tokio::test]
    async fn test_prune_collapses_empty_chains_but_keeps_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        stdfs::create_dir_all(root.join("user/20240101/sub")).unwrap();
        stdfs::create_dir_all(root.join("keep/here")).unwrap();
        stdfs::write(root.join("keep/here/file"), b"x").unwrap();

        let removed = prune_empty_dirs(root).await;
        assert_eq!(removed, 3);
        assert!(!root.join("user").exists());
        assert!(root.join("keep/here/file").exists());

        stdfs::remove_dir_all(root.join("keep")).unwrap();
        assert_eq!(prune_empty_dirs(root).await, 0);
        assert!(root.exists());
    }
}
