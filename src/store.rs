use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    rc::Rc,
};

use crate::error::Result;

/// Durable blob storage for checkpoints and statistics
///
/// Implementations report failures through `Result`; callers on the simulation path log
/// and discard them.
pub trait Store {
    fn save(&self, path: &str, blob: &[u8]) -> Result<()>;

    /// `Ok(None)` when nothing is stored under `path`
    fn load(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Deleting a missing entry is not an error
    fn delete(&self, path: &str) -> Result<()>;
}

/// Stores blobs as files under a root directory
///
/// Saves write `<path>.tmp` first and rename it over the target, so an interrupted write
/// never leaves a truncated blob in place of the previous one.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Store for FileStore {
    fn save(&self, path: &str, blob: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn load(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.resolve(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.resolve(path)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-process store; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.borrow().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.borrow().is_empty()
    }
}

impl Store for MemoryStore {
    fn save(&self, path: &str, blob: &[u8]) -> Result<()> {
        self.blobs.borrow_mut().insert(path.to_owned(), blob.to_vec());
        Ok(())
    }

    fn load(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.borrow().get(path).cloned())
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.blobs.borrow_mut().remove(path);
        Ok(())
    }
}
