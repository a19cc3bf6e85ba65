//! Per-object read and write handles
//!
//! Both handles live for exactly one pipeline iteration and are released by
//! `Drop` on every exit path. The writer buffers in memory and touches the
//! backend only on [`ObjectWriter::commit`], so a failed encode never leaves a
//! truncated object behind.

use super::{ObjectStore, StorageError};
use crate::config::WriteMode;
use bytes::Bytes;
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom, Write};
use tracing::{debug, trace, warn};

/// Suffix of the temporary key used by [`WriteMode::Staged`]. Keys ending in
/// it are reserved: a staged commit overwrites and then deletes them.
pub const STAGING_SUFFIX: &str = ".bucket-resizer-staging";

/// Readable, seekable view of a downloaded object
pub struct ObjectReader {
    name: String,
    inner: Cursor<Bytes>,
}

impl ObjectReader {
    /// Download `name` and open it for reading
    pub async fn open(store: &dyn ObjectStore, name: &str) -> Result<Self, StorageError> {
        let data = store.read(name).await?;
        debug!(object = %name, size = data.len(), "Opened object for reading");
        Ok(Self {
            name: name.to_string(),
            inner: Cursor::new(data),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for ObjectReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

impl Seek for ObjectReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Drop for ObjectReader {
    fn drop(&mut self) {
        trace!(object = %self.name, "Reader released");
    }
}

/// Buffered writer that replaces an object on commit
pub struct ObjectWriter<'a> {
    store: &'a dyn ObjectStore,
    name: String,
    content_type: String,
    mode: WriteMode,
    buf: Vec<u8>,
    finished: bool,
}

impl<'a> ObjectWriter<'a> {
    pub fn create(
        store: &'a dyn ObjectStore,
        name: &str,
        content_type: &str,
        mode: WriteMode,
    ) -> Self {
        Self {
            store,
            name: name.to_string(),
            content_type: content_type.to_string(),
            mode,
            buf: Vec::new(),
            finished: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Bytes buffered so far
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Upload the buffered bytes, returning the committed size
    pub async fn commit(mut self) -> Result<usize, StorageError> {
        self.finished = true;
        let data = Bytes::from(std::mem::take(&mut self.buf));
        let size = data.len();

        match self.mode {
            WriteMode::InPlace => {
                self.store
                    .write(&self.name, data, &self.content_type)
                    .await?;
            }
            WriteMode::Staged => {
                let staging = staging_key(&self.name);
                self.store.write(&staging, data, &self.content_type).await?;

                if let Err(e) = self.store.copy(&staging, &self.name).await {
                    if let Err(cleanup) = self.store.delete(&staging).await {
                        warn!(
                            object = %self.name,
                            staging = %staging,
                            error = %cleanup,
                            "Failed to remove staging object"
                        );
                    }
                    return Err(e);
                }

                if let Err(e) = self.store.delete(&staging).await {
                    warn!(
                        object = %self.name,
                        staging = %staging,
                        error = %e,
                        "Object replaced but staging object was left behind"
                    );
                }
            }
        }

        debug!(object = %self.name, size, mode = ?self.mode, "Committed object");
        Ok(size)
    }
}

impl Write for ObjectWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ObjectWriter<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                object = %self.name,
                discarded = self.buf.len(),
                "Writer dropped without commit, nothing uploaded"
            );
        }
    }
}

/// Temporary key a staged commit uploads to before copying over `name`
pub fn staging_key(name: &str) -> String {
    format!("{name}{STAGING_SUFFIX}")
}
