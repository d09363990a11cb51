//! Read-only filesystem abstraction the static handler resolves against.
//!
//! Paths are `/`-delimited and absolute within the store (`/www/index.htm`).
//! On the devices this crate targets a stat is the expensive operation, so
//! [`MemoryFs`] counts probes and opens to make that cost observable.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

/// A read-only hierarchical store.
pub trait FileSystem: Send + Sync {
    /// Whether a readable file exists at `path`. Directories do not count.
    fn exists(&self, path: &str) -> bool;

    /// Opens `path` for a streaming read.
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;
}

// ── DiskFs ───────────────────────────────────────────────────────────────────

/// A [`FileSystem`] backed by a directory on the host.
///
/// `/a/b.txt` maps to `<root>/a/b.txt`. Paths that would climb out of the
/// root are treated as absent.
#[derive(Clone, Debug)]
pub struct DiskFs {
    root: PathBuf,
}

impl DiskFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn host_path(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl FileSystem for DiskFs {
    fn exists(&self, path: &str) -> bool {
        self.host_path(path).is_some_and(|p| p.is_file())
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let host = self.host_path(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "path escapes root"))?;
        Ok(Box::new(std::fs::File::open(host)?))
    }
}

// ── MemoryFs ─────────────────────────────────────────────────────────────────

/// An in-memory [`FileSystem`], for assets compiled into the binary.
///
/// ```rust
/// use kestrel::{FileSystem, MemoryFs};
///
/// let fs = MemoryFs::new()
///     .with_file("/www/index.htm", b"<h1>hi</h1>".to_vec())
///     .with_file("/www/app.js.gz", vec![0x1f, 0x8b]);
/// assert!(fs.exists("/www/index.htm"));
/// assert!(!fs.exists("/www"));
/// assert_eq!(fs.probe_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: HashMap<String, Bytes>,
    probes: AtomicUsize,
    opens: AtomicUsize,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file. Returns `self` for chaining.
    pub fn with_file(mut self, path: &str, contents: impl Into<Bytes>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: &str, contents: impl Into<Bytes>) {
        let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };
        self.files.insert(path, contents.into());
    }

    /// Number of [`FileSystem::exists`] calls so far.
    pub fn probe_count(&self) -> usize { self.probes.load(Ordering::Relaxed) }

    /// Number of [`FileSystem::open`] calls so far.
    pub fn open_count(&self) -> usize { self.opens.load(Ordering::Relaxed) }

    pub fn reset_counters(&self) {
        self.probes.store(0, Ordering::Relaxed);
        self.opens.store(0, Ordering::Relaxed);
    }
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &str) -> bool {
        self.probes.fetch_add(1, Ordering::Relaxed);
        self.files.contains_key(path)
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        match self.files.get(path) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, path.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_fs_rejects_parent_components() {
        let fs = DiskFs::new(".");
        assert!(fs.host_path("/../etc/passwd").is_none());
        assert!(fs.host_path("/a/../b").is_none());
        assert_eq!(fs.host_path("/src/lib.rs"), Some(PathBuf::from("./src/lib.rs")));
    }

    #[test]
    fn disk_fs_directories_are_not_files() {
        let fs = DiskFs::new(env!("CARGO_MANIFEST_DIR"));
        assert!(fs.exists("/Cargo.toml"));
        assert!(!fs.exists("/src"));
        assert!(!fs.exists("/no-such-file"));
    }

    #[test]
    fn memory_fs_counts_and_reads() {
        let fs = MemoryFs::new().with_file("a.txt", &b"abc"[..]);
        assert!(fs.exists("/a.txt"));
        assert!(!fs.exists("/b.txt"));
        let mut out = String::new();
        fs.open("/a.txt").unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
        assert!(fs.open("/b.txt").is_err());
        assert_eq!((fs.probe_count(), fs.open_count()), (2, 2));
    }
}
