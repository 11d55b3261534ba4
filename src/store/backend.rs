//! Byte-level storage backends.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

/// Durable key-value capability scoped by namespace and keyed by account.
///
/// Implementations must be callable from any thread; calls may block on I/O.
pub trait StoreBackend: Send + Sync {
    /// Return the payload stored under `account`, if any.
    fn read(&self, namespace: &str, account: &str) -> io::Result<Option<Vec<u8>>>;

    /// Insert or replace the payload stored under `account`.
    fn write(&self, namespace: &str, account: &str, payload: &[u8]) -> io::Result<()>;

    /// Remove `account`. Removing a missing account succeeds.
    fn remove(&self, namespace: &str, account: &str) -> io::Result<()>;

    /// List every account currently stored in `namespace`.
    fn accounts(&self, namespace: &str) -> io::Result<Vec<String>>;
}

/// Volatile backend, mostly for tests and benches.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    namespaces: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self, namespace: &str, account: &str) -> io::Result<Option<Vec<u8>>> {
        let namespaces = self.namespaces.read();
        Ok(namespaces
            .get(namespace)
            .and_then(|records| records.get(account))
            .cloned())
    }

    fn write(&self, namespace: &str, account: &str, payload: &[u8]) -> io::Result<()> {
        self.namespaces
            .write()
            .entry(namespace.to_owned())
            .or_default()
            .insert(account.to_owned(), payload.to_vec());
        Ok(())
    }

    fn remove(&self, namespace: &str, account: &str) -> io::Result<()> {
        if let Some(records) = self.namespaces.write().get_mut(namespace) {
            records.remove(account);
        }
        Ok(())
    }

    fn accounts(&self, namespace: &str) -> io::Result<Vec<String>> {
        let namespaces = self.namespaces.read();
        let mut accounts: Vec<String> = namespaces
            .get(namespace)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default();
        accounts.sort();
        Ok(accounts)
    }
}

/// Directory-backed store: `<root>/<namespace>/<hex(account)>`.
///
/// Account names are hex encoded so any string is a valid file name.
/// Writes land in a temp file that is renamed over the target, so a crash
/// leaves either the old payload or the new one.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn record_path(&self, namespace: &str, account: &str) -> PathBuf {
        self.namespace_dir(namespace).join(hex::encode(account))
    }
}

impl StoreBackend for FileBackend {
    fn read(&self, namespace: &str, account: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.record_path(namespace, account)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, namespace: &str, account: &str, payload: &[u8]) -> io::Result<()> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir)?;

        let target = self.record_path(namespace, account);
        let staging = target.with_extension("tmp");
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(payload)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &target)
    }

    fn remove(&self, namespace: &str, account: &str) -> io::Result<()> {
        match fs::remove_file(self.record_path(namespace, account)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }

    fn accounts(&self, namespace: &str) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(self.namespace_dir(namespace)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut accounts = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            // skip staging files and anything we did not write
            let Some(account) = name
                .to_str()
                .and_then(|name| hex::decode(name).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok())
            else {
                continue;
            };
            accounts.push(account);
        }
        accounts.sort();
        Ok(accounts)
    }
}
