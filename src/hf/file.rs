//! File handles over Hub repositories
//!
//! Readers fetch byte ranges lazily and keep one read-ahead block. Writers
//! buffer locally and upload everything in a single commit on `close()`.

use std::io::{SeekFrom, Write};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use super::HfFileSystem;
use crate::error::{HffsError, Result};
use crate::hub::{CommitInfo, CommitOperation, HubClient, UploadSource};
use crate::path::ResolvedPath;

/// Prefix of the temporary files backing writers
const TEMP_PREFIX: &str = "hffs-";

#[derive(Debug)]
struct Block {
    start: u64,
    data: Bytes,
}

impl Block {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }
}

/// Read handle on a remote file
pub struct HfFileReader {
    hub: Arc<dyn HubClient>,
    resolved: ResolvedPath,
    revision: String,
    name: String,
    size: u64,
    pos: u64,
    block_size: usize,
    block: Option<Block>,
}

impl HfFileReader {
    pub(super) fn new(
        hub: Arc<dyn HubClient>,
        resolved: ResolvedPath,
        revision: String,
        size: u64,
        block_size: usize,
    ) -> Self {
        let name = resolved.canonical();
        Self {
            hub,
            resolved,
            revision,
            name,
            size,
            pos: 0,
            block_size,
            block: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current position
    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            HffsError::InvalidArgument(format!("Seek before start of {}", self.name))
        })?;
        self.pos = target;
        Ok(target)
    }

    /// Read up to `n` bytes from the current position
    pub async fn read(&mut self, n: usize) -> Result<Bytes> {
        let start = self.pos.min(self.size);
        let end = start.saturating_add(n as u64).min(self.size);
        let data = self.read_range(start, end).await?;
        self.pos = start + data.len() as u64;
        Ok(data)
    }

    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let remaining = self.size.saturating_sub(self.pos);
        self.read(remaining as usize).await
    }

    pub async fn read_to_string(&mut self) -> Result<String> {
        let data = self.read_to_end().await?;
        String::from_utf8(data.to_vec()).map_err(|e| {
            HffsError::InvalidArgument(format!("{} is not valid UTF-8: {}", self.name, e))
        })
    }

    /// Bytes `[start, end)`, served from the read-ahead block when possible
    async fn read_range(&mut self, start: u64, end: u64) -> Result<Bytes> {
        if start >= end {
            return Ok(Bytes::new());
        }

        let mut out = BytesMut::with_capacity((end - start) as usize);
        let mut from = start;

        if let Some(block) = &self.block {
            if block.start <= start && start < block.end() {
                let lo = (start - block.start) as usize;
                let hi = (end.min(block.end()) - block.start) as usize;
                if end <= block.end() {
                    trace!("read {} [{}, {}) from cache", self.name, start, end);
                    return Ok(block.data.slice(lo..hi));
                }
                out.extend_from_slice(&block.data[lo..hi]);
                from = block.end();
            }
        }

        let fetch_end = end
            .saturating_add(self.block_size as u64)
            .min(self.size)
            .max(end);
        let fetched = self
            .hub
            .fetch_range(
                &self.resolved.repo,
                &self.revision,
                &self.resolved.path_in_repo,
                from,
                fetch_end,
            )
            .await?;

        let wanted = ((end - from) as usize).min(fetched.len());
        out.extend_from_slice(&fetched[..wanted]);
        self.block = Some(Block {
            start: from,
            data: fetched,
        });
        Ok(out.freeze())
    }
}

/// Write handle on a remote file
///
/// Nothing reaches the Hub until [`HfFileWriter::close`]; a writer dropped
/// without closing discards its data.
pub struct HfFileWriter {
    fs: HfFileSystem,
    resolved: ResolvedPath,
    revision: String,
    name: String,
    block_size: usize,
    buffer: BytesMut,
    spill: Option<NamedTempFile>,
    written: u64,
    closed: bool,
}

impl HfFileWriter {
    pub(super) fn new(
        fs: HfFileSystem,
        resolved: ResolvedPath,
        revision: String,
        block_size: usize,
    ) -> Self {
        let name = resolved.canonical();
        Self {
            fs,
            resolved,
            revision,
            name,
            block_size,
            buffer: BytesMut::new(),
            spill: None,
            written: 0,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes accepted so far
    pub fn tell(&self) -> u64 {
        self.written
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(HffsError::InvalidArgument(format!(
                "I/O operation on closed file {}",
                self.name
            )));
        }

        self.buffer.extend_from_slice(data);
        self.written += data.len() as u64;
        if self.buffer.len() >= self.block_size {
            self.flush_block()?;
        }
        Ok(data.len())
    }

    /// Move the buffered bytes to the temporary file
    fn flush_block(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        if self.spill.is_none() {
            let file = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile()?;
            trace!("{} spills to {:?}", self.name, file.path());
            self.spill = Some(file);
        }
        if let Some(spill) = self.spill.as_mut() {
            spill.as_file_mut().write_all(&self.buffer)?;
        }
        self.buffer.clear();
        Ok(())
    }

    /// Upload the content in one commit; closing twice is a no-op
    ///
    /// A failed upload leaves the writer open with its data, so `close` can
    /// be called again.
    pub async fn close(&mut self) -> Result<Option<CommitInfo>> {
        if self.closed {
            return Ok(None);
        }

        if self.spill.is_some() {
            self.flush_block()?;
        }
        let source = match self.spill.as_mut() {
            Some(spill) => {
                spill.as_file_mut().flush()?;
                UploadSource::File(spill.path().to_path_buf())
            }
            None => UploadSource::Bytes(Bytes::copy_from_slice(&self.buffer)),
        };

        debug!("closing {} ({} bytes)", self.name, self.written);
        let commit = self
            .fs
            .commit(
                &self.resolved,
                &self.revision,
                vec![CommitOperation::Add {
                    path_in_repo: self.resolved.path_in_repo.clone(),
                    source,
                }],
                format!("Upload {}", self.name),
            )
            .await?;

        self.closed = true;
        self.buffer.clear();
        if let Some(spill) = self.spill.take() {
            spill.close()?;
        }
        self.fs.invalidate_resolved(&self.resolved);
        Ok(Some(commit))
    }
}

impl Drop for HfFileWriter {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "{} dropped without close(), discarding {} bytes",
                self.name, self.written
            );
        }
    }
}
