//! # Attachment Temp Storage
//!
//! Per-attachment staging files in a configured directory:
//! `<id>.original` and, when a thumbnail exists, `<id>.thumbnail`.
//! Writes go to a temp file first and are renamed into place, so a reader
//! never observes torn bytes. Deletes are idempotent, and orphan cleanup
//! is best-effort by last-modified time (candidates are logged first;
//! clock jumps make this advisory, not exact).

use shared_types::MessageId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Chunk size of the attachment download stream (64 KiB).
pub const ATTACHMENT_CHUNK_SIZE: usize = 64 * 1024;

/// File-backed staging store for attachment bytes.
pub struct AttachmentTempStore {
    dir: PathBuf,
}

impl AttachmentTempStore {
    /// Open (creating if needed) the staging directory.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn original_path(&self, id: MessageId) -> PathBuf {
        self.dir.join(format!("{id}.original"))
    }

    fn thumbnail_path(&self, id: MessageId) -> PathBuf {
        self.dir.join(format!("{id}.thumbnail"))
    }

    /// Atomically write a file: temp in the same directory, then rename.
    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = target.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, target)
    }

    /// Stage an attachment. An absent or empty thumbnail writes no
    /// thumbnail file.
    pub fn save(
        &self,
        id: MessageId,
        encrypted_original: &[u8],
        encrypted_thumbnail: Option<&[u8]>,
    ) -> io::Result<()> {
        self.write_atomic(&self.original_path(id), encrypted_original)?;
        match encrypted_thumbnail {
            Some(thumbnail) if !thumbnail.is_empty() => {
                self.write_atomic(&self.thumbnail_path(id), thumbnail)?;
            }
            _ => {}
        }
        debug!(%id, size = encrypted_original.len(), "Attachment staged");
        Ok(())
    }

    /// Both byte blobs, or `None` when the original is missing. A missing
    /// thumbnail is represented by file absence.
    pub fn retrieve(&self, id: MessageId) -> io::Result<Option<(Vec<u8>, Option<Vec<u8>>)>> {
        let original = match fs::read(self.original_path(id)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let thumbnail = match fs::read(self.thumbnail_path(id)) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };
        Ok(Some((original, thumbnail)))
    }

    /// Remove both files; silently succeeds when absent.
    pub fn delete(&self, id: MessageId) -> io::Result<()> {
        for path in [self.original_path(id), self.thumbnail_path(id)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Remove files whose last-modified time is older than `older_than`.
    /// Returns the number removed. Files that cannot be inspected or
    /// removed are skipped with a warning.
    pub fn cleanup_orphans(&self, older_than: Duration) -> io::Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "Skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(err) => {
                    warn!(path = %path.display(), %err, "Skipping file without modified time");
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }
            warn!(path = %path.display(), "Removing orphaned attachment file");
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %path.display(), %err, "Orphan removal failed"),
            }
        }
        Ok(removed)
    }
}

/// Split bytes into wire chunks; only the first carries totals.
#[must_use]
pub fn chunk_bytes(data: &[u8]) -> Vec<crate::wire::AttachmentChunk> {
    let total_size = data.len() as u64;
    let total_chunks = data.len().div_ceil(ATTACHMENT_CHUNK_SIZE).max(1) as u32;
    let mut chunks = Vec::with_capacity(total_chunks as usize);
    let mut pieces = data.chunks(ATTACHMENT_CHUNK_SIZE);
    for index in 0..total_chunks {
        let piece = pieces.next().unwrap_or(&[]);
        chunks.push(crate::wire::AttachmentChunk {
            chunk_index: index,
            total_chunks: if index == 0 { total_chunks } else { 0 },
            total_size: if index == 0 { total_size } else { 0 },
            data: piece.to_vec(),
        });
    }
    chunks
}
