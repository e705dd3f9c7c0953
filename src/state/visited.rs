//! Crash-safe record of URLs processed in this and earlier runs
//!
//! The on-disk format is one URL per line, append-only. Every insert is
//! flushed and synced before `mark_visited` returns, so a URL observed as
//! visited after a crash was really processed.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

struct Inner {
    file: File,
    urls: HashSet<String>,
}

/// Append-only visited-URL store shared by every crawl task
pub struct VisitedStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl VisitedStore {
    /// Opens the store, loading every URL recorded by earlier runs
    ///
    /// A missing file is an empty store; its parent directory is created. A
    /// partial last line left by a crash is cut off before anything is appended.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the newline-delimited visited file
    ///
    /// # Returns
    ///
    /// * `Ok(VisitedStore)` - Store ready for membership tests and inserts
    /// * `Err(io::Error)` - The file or its directory could not be opened
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        truncate_torn_tail(&path)?;
        let urls = Self::load_all(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::info!(
            "Loaded {} visited URLs from {}",
            urls.len(),
            path.display()
        );

        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, urls }),
        })
    }

    /// Reads the visited set from disk (missing file yields an empty set)
    pub fn load_all(path: impl AsRef<Path>) -> io::Result<HashSet<String>> {
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e),
        };

        let mut urls = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let url = line.trim();
            if !url.is_empty() {
                urls.insert(url.to_string());
            }
        }
        Ok(urls)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().urls.contains(url)
    }

    /// Durably records a URL
    ///
    /// Returns `Ok(false)` without touching the file when the URL is already
    /// present, so each URL is written at most once.
    pub fn mark_visited(&self, url: &str) -> io::Result<bool> {
        let mut inner = self.lock();
        if inner.urls.contains(url) {
            return Ok(false);
        }

        writeln!(inner.file, "{}", url)?;
        inner.file.flush()?;
        inner.file.sync_data()?;
        inner.urls.insert(url.to_string());

        tracing::debug!("Marked visited: {}", url);
        Ok(true)
    }

    /// Syncs the file to disk
    pub fn flush(&self) -> io::Result<()> {
        let mut inner = self.lock();
        inner.file.flush()?;
        inner.file.sync_all()
    }

    pub fn len(&self) -> usize {
        self.lock().urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drops bytes after the last newline
///
/// `mark_visited` only returns once the whole line is synced, so an
/// unterminated tail belongs to a write that never succeeded.
fn truncate_torn_tail(path: &Path) -> io::Result<()> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(());
    }

    let keep = bytes
        .iter()
        .rposition(|&byte| byte == b'\n')
        .map_or(0, |newline| newline + 1);
    tracing::warn!(
        "Discarding {} bytes of unterminated last line in {}",
        bytes.len() - keep,
        path.display()
    );

    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("visited_urls.txt");

        let store = VisitedStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(path.parent().unwrap().exists());
    }

    #[test]
    fn test_mark_and_contains() {
        let dir = TempDir::new().unwrap();
        let store = VisitedStore::open(dir.path().join("visited.txt")).unwrap();

        assert!(!store.contains("https://site.example/a"));
        assert!(store.mark_visited("https://site.example/a").unwrap());
        assert!(store.contains("https://site.example/a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visited.txt");
        let store = VisitedStore::open(&path).unwrap();

        assert!(store.mark_visited("https://site.example/a").unwrap());
        assert!(!store.mark_visited("https://site.example/a").unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "https://site.example/a\n");
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visited.txt");

        {
            let store = VisitedStore::open(&path).unwrap();
            store.mark_visited("https://site.example/index").unwrap();
            store.mark_visited("https://site.example/article/1").unwrap();
        }

        let store = VisitedStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("https://site.example/article/1"));

        store.mark_visited("https://site.example/article/2").unwrap();
        let lines: Vec<String> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_torn_last_line_is_discarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visited.txt");
        fs::write(&path, "https://site.example/index\nhttps://site.exa").unwrap();

        {
            let store = VisitedStore::open(&path).unwrap();
            assert_eq!(store.len(), 1);
            assert!(!store.contains("https://site.exa"));
            assert!(store.mark_visited("https://site.example/article/1").unwrap());
        }

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "https://site.example/index\nhttps://site.example/article/1\n"
        );
        let store = VisitedStore::open(&path).unwrap();
        assert!(store.contains("https://site.example/article/1"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_torn_only_line_leaves_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visited.txt");
        fs::write(&path, "https://site.ex").unwrap();

        let store = VisitedStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_load_all_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visited.txt");
        fs::write(&path, "https://a.example/\n\n  \nhttps://b.example/\n").unwrap();

        let urls = VisitedStore::load_all(&path).unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_concurrent_inserts_write_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visited.txt");
        let store = std::sync::Arc::new(VisitedStore::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..20 {
                        store
                            .mark_visited(&format!("https://site.example/{}", (i + j) % 10))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 10);
        assert_eq!(store.len(), 10);
    }
}
