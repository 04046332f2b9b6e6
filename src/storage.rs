// Persistence adapters: load / save / clear of a single JSON payload

use eyre::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing::debug;

/// Key the task array is stored under
pub const DEFAULT_KEY: &str = "kanbanTasks";

/// Byte-level storage slot for the serialized task collection
pub trait Storage {
    /// Read the stored payload, `None` when nothing has been saved
    fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Overwrite the stored payload
    fn save(&self, bytes: &[u8]) -> Result<()>;

    /// Remove the stored payload entirely
    fn clear(&self) -> Result<()>;
}

/// Stores the payload in `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(dir: P, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Write a new payload next to the current one, then rename it into place.
    ///
    /// The stored payload is replaced only once the new one is fully on disk,
    /// so a failed write leaves the previous payload intact.
    fn save_with<F>(&self, write: F) -> Result<()>
    where
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).context("Failed to create storage directory")?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())
            .context("Failed to open storage lock file")?;

        // Acquire exclusive lock before writing
        FileExt::lock_exclusive(&lock).context("Failed to acquire file lock")?;

        let mut temp = NamedTempFile::new_in(dir).context("Failed to create temporary storage file")?;
        write(temp.as_file_mut()).context("Failed to write storage file")?;
        temp.as_file().sync_all().context("Failed to sync storage file")?;
        temp.persist(&self.path)
            .map_err(|e| e.error)
            .context("Failed to replace storage file")?;

        // Lock is automatically released when the lock file is dropped
        Ok(())
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to open storage file"),
        };

        FileExt::lock_shared(&file).context("Failed to acquire file lock")?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).context("Failed to read storage file")?;

        debug!(path = ?self.path, bytes = bytes.len(), "Loaded payload");
        Ok(Some(bytes))
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        self.save_with(|file| file.write_all(bytes))?;
        debug!(path = ?self.path, bytes = bytes.len(), "Saved payload");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = ?self.path, "Cleared payload");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove storage file"),
        }
    }
}

/// In-process storage slot; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with a payload
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(bytes.into()))),
        }
    }

    /// Current payload, for inspection
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut Option<Vec<u8>>) -> T) -> Result<T> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| eyre::eyre!("Memory storage lock poisoned"))?;
        Ok(f(&mut *slot))
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        self.with_slot(|slot| slot.clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        self.with_slot(|slot| *slot = Some(bytes.to_vec()))
    }

    fn clear(&self) -> Result<()> {
        self.with_slot(|slot| *slot = None)
    }
}
