use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use super::RecoveryStore;
use crate::error::StoreError;

/// [`RecoveryStore`] kept in a single JSON object file.
///
/// Any number of handles, in any number of processes, may share one path.
/// Reads always go to disk. A `set` holds an advisory lock on the `<path>.lock`
/// sibling while it re-reads the file, merges its key and replaces the file
/// through a uniquely named temporary sibling, so writers never drop each
/// other's keys and readers never observe a torn file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Exclusive advisory lock, released when the file is closed.
struct WriteLock(File);

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl FileStore {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// Fails if an existing file cannot be read or decoded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        let store = Self {
            path,
            lock_path: lock_path.into(),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match File::open(&self.path) {
            Ok(file) => Ok(serde_json::from_reader(BufReader::new(file))?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn lock(&self) -> Result<WriteLock, StoreError> {
        fs::create_dir_all(self.dir())?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        Ok(WriteLock(file))
    }

    fn write(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        let tmp = NamedTempFile::new_in(self.dir())?;
        let mut writer = BufWriter::new(tmp);
        serde_json::to_writer(&mut writer, map)?;
        writer.flush()?;
        let tmp = writer.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl RecoveryStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.write(&map)
    }

    fn get_all(&self) -> Result<HashMap<String, String>, StoreError> {
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::slots::LogicalIdentity;
    use tempfile::TempDir;

    #[test]
    fn reopen_sees_previous_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slots").join("recovery.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.get_all().unwrap().is_empty());
        store
            .save_assignment("slot.N1NRNTS0", &LogicalIdentity::new("mail", "Inbox"), 99)
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        let a = reopened.assignment("slot.N1NRNTS0").unwrap().unwrap();
        assert_eq!(a.identity, LogicalIdentity::new("mail", "Inbox"));
        assert_eq!(a.timestamp, 99);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n != "recovery.json" && n != "recovery.json.lock")
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn handles_on_one_path_keep_each_others_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recovery.json");

        let a = FileStore::open(&path).unwrap();
        let b = FileStore::open(&path).unwrap();
        a.save_assignment("slot.N1NRTS0", &LogicalIdentity::new("mail", "Inbox"), 1)
            .unwrap();
        b.save_assignment("slot.N1NRTS1", &LogicalIdentity::new("maps", "Route"), 2)
            .unwrap();

        let all = FileStore::open(&path).unwrap().get_all().unwrap();
        assert_eq!(all.len(), 2);
        let seen_by_b = b.assignment("slot.N1NRTS0").unwrap().unwrap();
        assert_eq!(seen_by_b.identity, LogicalIdentity::new("mail", "Inbox"));
        assert_eq!(a.assignment("slot.N1NRTS1").unwrap().unwrap().timestamp, 2);
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let path = Arc::new(dir.path().join("recovery.json"));

        let writers: Vec<_> = (0..8)
            .map(|w| {
                let path = Arc::clone(&path);
                std::thread::spawn(move || {
                    let store = FileStore::open(path.as_path()).unwrap();
                    for i in 0..5 {
                        store.set(&format!("slot.{w}.{i}"), format!("w{w}:c{i}:0")).unwrap();
                    }
                })
            })
            .collect();
        for t in writers {
            t.join().unwrap();
        }

        assert_eq!(FileStore::open(path.as_path()).unwrap().get_all().unwrap().len(), 40);
    }

    #[test]
    fn corrupt_file_is_a_codec_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recovery.json");
        fs::write(&path, b"{not json").unwrap();
        let err = FileStore::open(&path).unwrap_err();
        assert_eq!(err.as_label(), "store_codec");
    }
}
