//! Directory-backed key/value store for persistent storage.
//!
//! Layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                      # Advisory lock for single-owner access
//! ├─ tally%3Aoffline-queue     # One file per key (escaped key name)
//! └─ ledger
//! ```

use crate::backend::{validate_key, KeyValueStore};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const TEMP_SUFFIX: &str = ".tmp";

/// A file-based key/value store.
///
/// Each key is stored in its own file inside the store directory. Values
/// survive process restarts.
///
/// # Durability
///
/// `set` writes to a temporary file, calls `File::sync_all()`, then renames
/// it over the previous value, so a reader sees either the old or the new
/// value, never a torn write.
///
/// # Thread Safety
///
/// The store holds an exclusive advisory lock on the directory. Only one
/// `FileStore` may own a directory at a time; within a process, writes are
/// serialized by an internal mutex.
///
/// # Example
///
/// ```no_run
/// use tally_storage::{FileStore, KeyValueStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new(".tally")).unwrap();
/// store.set("tally:offline-queue", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - `path` exists but is not a directory
    /// - Another process holds the lock (returns `Locked`)
    pub fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;

        if !path.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path.display().to_string()));
        }

        tracing::debug!(path = %path.display(), "opened file store");

        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.path.join(escape_key(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        let bytes = match fs::read(self.value_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StorageError::Corrupted(format!("value for {key:?} is not UTF-8")))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        let target = self.value_path(key);
        let temp = self.path.join(format!("{}{TEMP_SUFFIX}", escape_key(key)));
        {
            let mut file = File::create(&temp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == LOCK_FILE || name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            if let Some(key) = unescape_key(name) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.')
}

/// Maps a key to a portable file name.
///
/// Bytes outside `[A-Za-z0-9._-]` become `%XX`. A leading `.`, the name
/// `LOCK` and a trailing `.tmp` are escaped too, so no key can collide with
/// the lock file or an in-flight temp file.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        let reserved = (i == 0 && byte == b'.') || (i == 0 && key == LOCK_FILE);
        if is_plain(byte) && !reserved {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    if out.ends_with(TEMP_SUFFIX) {
        let cut = out.len() - TEMP_SUFFIX.len();
        out.truncate(cut);
        out.push_str("%2Etmp");
    }
    out
}

fn unescape_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
