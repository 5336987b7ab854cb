//! Directory tree fingerprinting.
//!
//! A fingerprint hashes the relative path, modification time and size of
//! every file in a tree. It changes whenever a file is added, removed,
//! resized or touched, without reading any file contents. Directories
//! themselves are not part of the digest.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ignore::WalkBuilder;
use sha1::{Digest, Sha1};

use crate::error::WatchError;

/// Path, modification time and size of one file in a tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStamp {
    /// Path relative to the tree root, `/`-separated.
    pub path: String,
    /// Modification time in nanoseconds since the Unix epoch.
    pub mtime_nanos: i128,
    /// Size in bytes.
    pub size: u64,
}

/// A directory tree the watcher can poll.
///
/// Implemented by [`FsTree`] for directories on disk. Embedding applications
/// can provide their own (e.g., an overlay of several roots).
pub trait FileTree: Send + Sync + 'static {
    /// Stamp every file in the tree, in a stable order.
    ///
    /// Directories are not listed.
    fn stamps(&self) -> Result<Vec<FileStamp>, WatchError>;
}

/// [`FileTree`] backed by a directory on disk.
#[derive(Clone, Debug)]
pub struct FsTree {
    root: PathBuf,
}

impl FsTree {
    /// Create a tree rooted at `root`.
    ///
    /// The directory is not opened until the first scan.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileTree for FsTree {
    fn stamps(&self) -> Result<Vec<FileStamp>, WatchError> {
        // No hidden-file or .gitignore filtering.
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a: &OsStr, b: &OsStr| a.cmp(b))
            .build();

        let mut stamps = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| WatchError::Walk {
                path: self.root.clone(),
                source,
            })?;

            // The root is a directory even when reached through a symlink.
            if entry.depth() == 0 || entry.file_type().is_none_or(|t| t.is_dir()) {
                continue;
            }

            let metadata = entry.metadata().map_err(|source| WatchError::Walk {
                path: self.root.clone(),
                source,
            })?;
            let modified = metadata
                .modified()
                .map_err(|source| WatchError::Metadata {
                    path: entry.path().to_path_buf(),
                    source,
                })?;

            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            stamps.push(FileStamp {
                path: slash_path(relative),
                mtime_nanos: unix_nanos(modified),
                size: metadata.len(),
            });
        }

        Ok(stamps)
    }
}

/// Hex-encoded digest of a tree's file stamps.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of `tree`.
pub fn fingerprint<T: FileTree + ?Sized>(tree: &T) -> Result<Fingerprint, WatchError> {
    let mut hasher = Sha1::new();
    for stamp in tree.stamps()? {
        hasher.update(format!("{}:{}:{};", stamp.path, stamp.mtime_nanos, stamp.size).as_bytes());
    }
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Join path components with `/` regardless of platform.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Nanoseconds since the Unix epoch, negative for earlier times.
fn unix_nanos(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i128::try_from(after.as_nanos()).unwrap_or(i128::MAX),
        Err(before) => i128::try_from(before.duration().as_nanos()).map_or(i128::MIN, |n| -n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{self, File};
    use std::time::Duration;

    fn create_test_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "abc").unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body {}").unwrap();
        dir
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_stamps_lists_files_sorted_with_relative_paths() {
        let dir = create_test_dir();
        fs::write(dir.path().join("b.txt"), "hello").unwrap();

        let stamps = FsTree::new(dir.path()).stamps().unwrap();
        let paths: Vec<_> = stamps.iter().map(|s| s.path.as_str()).collect();

        assert_eq!(paths, vec!["a.txt", "b.txt", "css/site.css"]);
        assert_eq!(stamps[0].size, 3);
        assert_eq!(stamps[1].size, 5);
    }

    #[test]
    fn test_stamps_includes_hidden_files() {
        let dir = create_test_dir();
        fs::write(dir.path().join(".env"), "X=1").unwrap();

        let stamps = FsTree::new(dir.path()).stamps().unwrap();

        assert!(stamps.iter().any(|s| s.path == ".env"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_root_is_not_stamped() {
        let dir = create_test_dir();
        let link_parent = tempfile::tempdir().unwrap();
        let link = link_parent.path().join("site");
        std::os::unix::fs::symlink(dir.path(), &link).unwrap();

        let stamps = FsTree::new(&link).stamps().unwrap();
        let paths: Vec<_> = stamps.iter().map(|s| s.path.as_str()).collect();

        assert_eq!(paths, vec!["a.txt", "css/site.css"]);
    }

    #[test]
    fn test_stamps_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let tree = FsTree::new(dir.path().join("missing"));

        let err = tree.stamps().unwrap_err();

        assert!(matches!(err, WatchError::Walk { .. }), "got {err:?}");
    }

    #[test]
    fn test_fingerprint_is_hex_sha1() {
        let dir = create_test_dir();

        let fp = fingerprint(&FsTree::new(dir.path())).unwrap();

        assert_eq!(fp.as_str().len(), 40);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp.to_string(), fp.as_str());
    }

    #[test]
    fn test_fingerprint_stable_for_unchanged_tree() {
        let dir = create_test_dir();
        let tree = FsTree::new(dir.path());

        assert_eq!(fingerprint(&tree).unwrap(), fingerprint(&tree).unwrap());
    }

    #[test]
    fn test_fingerprint_changes_when_file_added() {
        let dir = create_test_dir();
        let tree = FsTree::new(dir.path());
        let before = fingerprint(&tree).unwrap();

        fs::write(dir.path().join("new.txt"), "").unwrap();

        assert_ne!(before, fingerprint(&tree).unwrap());
    }

    #[test]
    fn test_fingerprint_changes_when_file_removed() {
        let dir = create_test_dir();
        let tree = FsTree::new(dir.path());
        let before = fingerprint(&tree).unwrap();

        fs::remove_file(dir.path().join("css/site.css")).unwrap();

        assert_ne!(before, fingerprint(&tree).unwrap());
    }

    #[test]
    fn test_fingerprint_changes_when_file_resized() {
        let dir = create_test_dir();
        let path = dir.path().join("a.txt");
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        let tree = FsTree::new(dir.path());
        let before = fingerprint(&tree).unwrap();

        fs::write(&path, "abcde").unwrap();
        set_mtime(&path, mtime);

        assert_ne!(before, fingerprint(&tree).unwrap());
    }

    #[test]
    fn test_fingerprint_changes_when_mtime_changes() {
        let dir = create_test_dir();
        let path = dir.path().join("a.txt");
        let tree = FsTree::new(dir.path());
        set_mtime(&path, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let before = fingerprint(&tree).unwrap();

        set_mtime(&path, UNIX_EPOCH + Duration::from_secs(1_700_000_001));

        assert_ne!(before, fingerprint(&tree).unwrap());
    }

    #[test]
    fn test_fingerprint_changes_when_file_moved() {
        let dir = create_test_dir();
        let tree = FsTree::new(dir.path());
        let before = fingerprint(&tree).unwrap();

        fs::rename(dir.path().join("a.txt"), dir.path().join("z.txt")).unwrap();

        assert_ne!(before, fingerprint(&tree).unwrap());
    }

    #[test]
    fn test_fingerprint_ignores_empty_directories() {
        let dir = create_test_dir();
        let tree = FsTree::new(dir.path());
        let before = fingerprint(&tree).unwrap();

        fs::create_dir(dir.path().join("empty")).unwrap();

        assert_eq!(before, fingerprint(&tree).unwrap());
    }

    #[test]
    fn test_fingerprint_ignores_file_contents() {
        let dir = create_test_dir();
        let path = dir.path().join("a.txt");
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        let tree = FsTree::new(dir.path());
        let before = fingerprint(&tree).unwrap();

        fs::write(&path, "xyz").unwrap();
        set_mtime(&path, mtime);

        assert_eq!(before, fingerprint(&tree).unwrap());
    }

    #[test]
    fn test_unix_nanos_before_epoch_is_negative() {
        let before = UNIX_EPOCH - Duration::from_nanos(5);

        assert_eq!(unix_nanos(before), -5);
        assert_eq!(unix_nanos(UNIX_EPOCH + Duration::from_nanos(7)), 7);
    }

    #[test]
    fn test_slash_path_joins_components() {
        let path: PathBuf = ["css", "themes", "dark.css"].iter().collect();

        assert_eq!(slash_path(&path), "css/themes/dark.css");
    }
}
