//! Retry-safe filesystem access for the shared results directory.
//!
//! The results directory is written by concurrently running fixtures and is
//! often scanned by indexers or antivirus on the host. Single-attempt I/O
//! fails intermittently there, so every create/delete/write goes through a
//! fixed [`RetryPolicy`] that retries only transient errors.

use crate::result::{ReportError, ReportResult};
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed retry policy for file operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (first try included)
    pub max_attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempts and delay
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Longest time a single operation can spend waiting between attempts
    #[must_use]
    pub fn worst_case_wait(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

/// Whether an I/O error is worth retrying (sharing/lock violations and the like)
#[must_use]
pub fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    ) {
        return true;
    }

    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION on Windows;
    // EBUSY, ETXTBSY on Unix.
    #[cfg(windows)]
    const TRANSIENT_CODES: &[i32] = &[32, 33];
    #[cfg(not(windows))]
    const TRANSIENT_CODES: &[i32] = &[16, 26];

    err.raw_os_error()
        .is_some_and(|code| TRANSIENT_CODES.contains(&code))
}

/// Kind of a directory entry as seen by [`FsBackend::read_dir`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (or symlink, removed as a file)
    File,
    /// Directory
    Dir,
}

/// Filesystem primitives used by [`FileStore`].
///
/// Production code uses [`StdFs`]; tests substitute backends that simulate
/// locked files.
pub trait FsBackend: Send + Sync + Debug {
    /// List the direct children of a directory
    fn read_dir(&self, path: &Path) -> io::Result<Vec<(PathBuf, EntryKind)>>;
    /// Clear the read-only attribute of a file
    fn make_writable(&self, path: &Path) -> io::Result<()>;
    /// Remove a single file
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    /// Remove an empty directory
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
    /// Create a directory and all parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Write (create or truncate) a file
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    /// Whether a path exists
    fn exists(&self, path: &Path) -> bool;
}

/// [`FsBackend`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl FsBackend for StdFs {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<(PathBuf, EntryKind)>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let kind = if entry.file_type()?.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            entries.push((entry.path(), kind));
        }
        Ok(entries)
    }

    fn make_writable(&self, path: &Path) -> io::Result<()> {
        let mut perms = std::fs::symlink_metadata(path)?.permissions();
        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            std::fs::set_permissions(path, perms)?;
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Outcome of a single retried operation
#[derive(Debug)]
enum Attempted<T> {
    Done(T),
    /// Non-transient error on the given attempt
    Failed(io::Error, u32),
    /// Transient error persisted through every attempt
    Exhausted(io::Error, u32),
}

/// Retry-safe wrapper over directory create/delete and file write
#[derive(Debug)]
pub struct FileStore {
    backend: Box<dyn FsBackend>,
    policy: RetryPolicy,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    /// Create a store over the real filesystem with the default policy
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(StdFs, RetryPolicy::default())
    }

    /// Create a store over a custom backend
    #[must_use]
    pub fn with_backend(backend: impl FsBackend + 'static, policy: RetryPolicy) -> Self {
        Self {
            backend: Box::new(backend),
            policy,
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current retry policy
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn retry<T>(&self, operation: &str, path: &Path, mut op: impl FnMut() -> io::Result<T>) -> Attempted<T> {
        let max = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Attempted::Done(value),
                Err(err) if !is_transient(&err) => return Attempted::Failed(err, attempt),
                Err(err) if attempt >= max => return Attempted::Exhausted(err, attempt),
                Err(err) => {
                    debug!(
                        operation,
                        path = %path.display(),
                        attempt,
                        error = %err,
                        "transient I/O error, retrying"
                    );
                    std::thread::sleep(self.policy.delay);
                    attempt += 1;
                }
            }
        }
    }

    fn escalate<T>(&self, operation: &'static str, path: &Path, attempted: Attempted<T>) -> ReportResult<T> {
        match attempted {
            Attempted::Done(value) => Ok(value),
            Attempted::Failed(err, _) => Err(ReportError::Io(err)),
            Attempted::Exhausted(source, attempts) => Err(ReportError::RetriesExhausted {
                operation,
                path: path.to_path_buf(),
                attempts,
                source,
            }),
        }
    }

    /// Create a directory (and parents), retrying transient failures.
    ///
    /// A missing results directory is unrecoverable, so exhaustion is returned
    /// as an error.
    pub fn create_dir_all(&self, path: &Path) -> ReportResult<()> {
        let attempted = self.retry("create directory", path, || self.backend.create_dir_all(path));
        self.escalate("create directory", path, attempted)
    }

    /// Write a file, retrying transient failures
    pub fn write(&self, path: &Path, contents: &[u8]) -> ReportResult<()> {
        let attempted = self.retry("write file", path, || self.backend.write(path, contents));
        let result = self.escalate("write file", path, attempted);
        if result.is_ok() {
            debug!(path = %path.display(), size = contents.len(), "file written");
        }
        result
    }

    /// Remove a single file, retrying transient failures
    pub fn remove_file(&self, path: &Path) -> ReportResult<()> {
        if let Err(err) = self.backend.make_writable(path) {
            debug!(path = %path.display(), error = %err, "could not clear read-only attribute");
        }
        let attempted = self.retry("delete file", path, || self.backend.remove_file(path));
        self.escalate("delete file", path, attempted)
    }

    /// Delete a directory tree, best effort.
    ///
    /// Files go first (read-only attributes cleared), then subdirectories,
    /// then the directory itself. A file that stays locked is logged and
    /// skipped. Returns whether the directory is gone; never fails.
    pub fn delete_dir_all(&self, path: &Path) -> bool {
        if !self.backend.exists(path) {
            return true;
        }

        let entries = match self.retry("list directory", path, || self.backend.read_dir(path)) {
            Attempted::Done(entries) => entries,
            Attempted::Failed(err, attempts) | Attempted::Exhausted(err, attempts) => {
                warn!(path = %path.display(), attempts, error = %err, "cannot list directory for deletion");
                return false;
            }
        };

        let (files, dirs): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(_, kind)| *kind == EntryKind::File);

        for (file, _) in files {
            if let Err(err) = self.backend.make_writable(&file) {
                debug!(path = %file.display(), error = %err, "could not clear read-only attribute");
            }
            match self.retry("delete file", &file, || self.backend.remove_file(&file)) {
                Attempted::Done(()) => {}
                Attempted::Failed(err, attempts) | Attempted::Exhausted(err, attempts) => {
                    warn!(path = %file.display(), attempts, error = %err, "giving up on file deletion");
                }
            }
        }

        for (dir, _) in dirs {
            self.delete_dir_all(&dir);
        }

        match self.retry("delete directory", path, || self.backend.remove_dir(path)) {
            Attempted::Done(()) => {
                debug!(path = %path.display(), "directory deleted");
                true
            }
            Attempted::Failed(err, attempts) | Attempted::Exhausted(err, attempts) => {
                warn!(path = %path.display(), attempts, error = %err, "giving up on directory deletion");
                false
            }
        }
    }

    /// Delete a directory if present and create it again empty
    pub fn recreate_dir(&self, path: &Path) -> ReportResult<()> {
        if !self.delete_dir_all(path) {
            warn!(path = %path.display(), "directory not fully cleaned, reusing it");
        }
        self.create_dir_all(path)
    }
}
