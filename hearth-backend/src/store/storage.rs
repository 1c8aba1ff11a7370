//! Durable storage for the notes document.
//!
//! The store persists its whole state as one opaque byte document; the
//! backends here only read and write bytes and know nothing about the schema.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Byte-level durable document store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the whole document. `None` means nothing has been persisted yet.
    async fn read(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replace the whole document. Must be all-or-nothing: a failed write
    /// leaves the previous document readable.
    async fn write(&self, bytes: &[u8]) -> io::Result<()>;
}

/// File-backed storage. Writes go to a temp file first and are renamed into
/// place, so a crash mid-write never leaves a torn document.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        FileStorage { path }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)
    }
}

/// In-memory storage for ephemeral sessions and tests.
pub struct MemoryStorage {
    bytes: Mutex<Option<Vec<u8>>>,
    #[cfg(test)]
    fail_writes: std::sync::atomic::AtomicU32,
    #[cfg(test)]
    write_delay: Mutex<Option<std::time::Duration>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            bytes: Mutex::new(None),
            #[cfg(test)]
            fail_writes: std::sync::atomic::AtomicU32::new(0),
            #[cfg(test)]
            write_delay: Mutex::new(None),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MemoryStorage {
    /// Make the next `n` writes fail with an injected I/O error.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes
            .store(n, std::sync::atomic::Ordering::SeqCst);
    }

    /// Delay every write, keeping the store's write phase observable.
    pub fn set_write_delay(&self, delay: std::time::Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// Replace the raw document, bypassing the store (simulates corruption
    /// or an out-of-band change).
    pub fn put_raw(&self, bytes: Vec<u8>) {
        *self.bytes.lock() = Some(bytes);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.bytes.lock().clone())
    }

    async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        {
            let delay = *self.write_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            use std::sync::atomic::Ordering;
            if self.fail_writes.load(Ordering::SeqCst) > 0 {
                self.fail_writes.fetch_sub(1, Ordering::SeqCst);
                return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
            }
        }
        *self.bytes.lock() = Some(bytes.to_vec());
        Ok(())
    }
}
