use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::errors::LedgerError;

/// Computes the next value of a key from the current one.
pub type Update<'a> = dyn FnMut(Option<String>) -> Result<String, LedgerError> + 'a;

/// Key-value backing of a [`Ledger`](super::Ledger).
///
/// Values are whole serialized lists. `update` is the read-modify-write primitive:
/// no other `update` or `store` on the same key may run between its read and its write.
pub trait Storage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, LedgerError>;

    /// Replace the value of `key` with what `apply` returns for the current value.
    ///
    /// Returns the stored value. Nothing is written when `apply` fails.
    fn update(&self, key: &str, apply: &mut Update<'_>) -> Result<String, LedgerError>;

    fn store(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        self.update(key, &mut |_| Ok(value.to_string())).map(|_| ())
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn load(&self, key: &str) -> Result<Option<String>, LedgerError> {
        (**self).load(key)
    }

    fn update(&self, key: &str, apply: &mut Update<'_>) -> Result<String, LedgerError> {
        (**self).update(key, apply)
    }
}

/// In-process storage, lost when the process exits.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn update(&self, key: &str, apply: &mut Update<'_>) -> Result<String, LedgerError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let next = apply(entries.get(key).cloned())?;
        entries.insert(key.to_string(), next.clone());
        Ok(next)
    }
}

/// Durable storage: one `<key>.json` file per key under a base directory.
///
/// Every update holds an exclusive `fs2` lock on `<key>.lock` from reading the current
/// value until the new one is in place, so ledgers in several processes sharing the
/// directory see each other's appends. New values are written to a temporary file in
/// the same directory and renamed over `<key>.json`, so a crash mid-write leaves the
/// previous value intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.json"))
    }

    /// The data file is replaced on every write, so locks live on a separate file.
    fn lock_file(&self, key: &str) -> Result<File, LedgerError> {
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(format!("{key}.lock")))?)
    }

    fn read(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let mut file = match File::open(self.path(key)) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok((!contents.trim().is_empty()).then_some(contents))
    }

    fn replace(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        let mut tmp = NamedTempFile::new_in(&self.base_path)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path(key)).map_err(|err| err.error)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let lock = self.lock_file(key)?;
        FileExt::lock_shared(&lock)?;
        let read = self.read(key);
        FileExt::unlock(&lock)?;
        read
    }

    fn update(&self, key: &str, apply: &mut Update<'_>) -> Result<String, LedgerError> {
        let lock = self.lock_file(key)?;
        FileExt::lock_exclusive(&lock)?;
        let updated = self.read(key).and_then(|current| {
            let next = apply(current)?;
            self.replace(key, &next)?;
            Ok(next)
        });
        FileExt::unlock(&lock)?;
        updated
    }
}
