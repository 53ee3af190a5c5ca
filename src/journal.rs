//! Append-only epoch journal.
//!
//! The journal brackets every durability epoch with two marks: a rotate
//! mark written *before* any storage attempt for that epoch's batch
//! (write-ahead), and a confirm mark written once the batch has been
//! durably applied. After a crash, the gap between the last rotate mark
//! and the last confirm mark is exactly the set of epochs whose writes may
//! not have reached storage.
//!
//! ## Record format
//!
//! Each mark is one record:
//!
//! ```text
//! [checksum: u32][length: u16][type: u8][payload: epoch number as u64 LE]
//! ```
//!
//! The checksum is CRC32 over type and payload. A torn trailing record
//! (crash mid-append) is discarded on open; a checksum mismatch anywhere
//! else is corruption.
//!
//! Once every rotated epoch is confirmed the log carries no information,
//! so it is truncated to reclaim space.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Size of the record header (checksum + length + type).
const HEADER_SIZE: usize = 7;

/// Payload size: the epoch number.
const PAYLOAD_SIZE: usize = 8;

/// Journal record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    /// An epoch was rotated out of the cache (write-ahead mark).
    EpochBegin = 1,
    /// An epoch was durably applied to storage.
    EpochConfirm = 2,
}

impl RecordType {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordType::EpochBegin),
            2 => Ok(RecordType::EpochConfirm),
            _ => Err(Error::Corruption(format!("Invalid journal record type: {}", value))),
        }
    }
}

/// The epoch journal.
///
/// Owned by the durability pipeline; `rotate` and `confirm` complete (and
/// optionally sync) before the caller proceeds.
pub struct Journal {
    file: File,
    path: PathBuf,
    sync: bool,
    /// Highest epoch with a rotate mark.
    rotated: u64,
    /// Highest epoch with a confirm mark.
    confirmed: u64,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("path", &self.path)
            .field("sync", &self.sync)
            .field("rotated", &self.rotated)
            .field("confirmed", &self.confirmed)
            .finish()
    }
}

impl Journal {
    /// Opens or creates a journal file and recovers its epoch watermarks.
    ///
    /// A torn trailing record is trimmed; any other damage is an error.
    /// If unconfirmed epochs are found, they are reported via
    /// [`Journal::pending_epochs`] and logged; replaying them against
    /// storage is the operator's decision, not taken here.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;

        let data = std::fs::read(&path)?;
        let (rotated, confirmed, valid_len) = scan(&data)?;

        if valid_len < data.len() {
            log::warn!(
                "Journal {:?}: discarding {} bytes of torn trailing record",
                path,
                data.len() - valid_len
            );
            file.set_len(valid_len as u64)?;
        }

        if rotated > confirmed {
            log::warn!(
                "Journal {:?}: {} unconfirmed epoch(s), writes may not have reached storage",
                path,
                rotated - confirmed
            );
        }

        Ok(Self { file, path, sync, rotated, confirmed })
    }

    /// Durably records the start of the next epoch. Must complete before
    /// any storage attempt for that epoch's batch.
    pub fn rotate(&mut self) -> Result<()> {
        let epoch = self.rotated + 1;
        self.append(RecordType::EpochBegin, epoch)?;
        self.rotated = epoch;
        log::debug!("Journal: epoch {} rotated", epoch);
        Ok(())
    }

    /// Records that the oldest unconfirmed epoch has been durably applied.
    /// When every rotated epoch is confirmed, the log is truncated.
    pub fn confirm(&mut self) -> Result<()> {
        let epoch = self.confirmed + 1;
        self.append(RecordType::EpochConfirm, epoch)?;
        self.confirmed = epoch;
        log::debug!("Journal: epoch {} confirmed", epoch);

        if self.confirmed >= self.rotated {
            self.file.set_len(0)?;
            log::debug!("Journal: all epochs confirmed, log reclaimed");
        }
        Ok(())
    }

    /// Number of rotated epochs not yet confirmed.
    pub fn pending_epochs(&self) -> u64 {
        self.rotated.saturating_sub(self.confirmed)
    }

    /// Current size of the journal file.
    pub fn size(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, record_type: RecordType, epoch: u64) -> Result<()> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + PAYLOAD_SIZE);
        let payload = epoch.to_le_bytes();

        buf.put_u32_le(checksum(record_type, &payload));
        buf.put_u16_le(PAYLOAD_SIZE as u16);
        buf.put_u8(record_type as u8);
        buf.put_slice(&payload);

        self.file.write_all(&buf)?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

fn checksum(record_type: RecordType, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[record_type as u8]);
    hasher.update(payload);
    hasher.finalize()
}

/// Scans the raw journal bytes, returning the recovered watermarks and the
/// length of the valid record prefix.
fn scan(data: &[u8]) -> Result<(u64, u64, usize)> {
    let mut rotated = 0u64;
    let mut confirmed = 0u64;
    let mut offset = 0usize;

    while data.len() - offset >= HEADER_SIZE {
        let mut slice = &data[offset..];
        let stored_checksum = slice.get_u32_le();
        let length = slice.get_u16_le() as usize;
        let type_byte = slice.get_u8();

        if data.len() - offset - HEADER_SIZE < length {
            break; // torn tail, caller trims it
        }

        let record_type = RecordType::from_u8(type_byte)?;
        let payload = &data[offset + HEADER_SIZE..offset + HEADER_SIZE + length];

        if checksum(record_type, payload) != stored_checksum {
            return Err(Error::corruption(format!(
                "Journal record at offset {} has a bad checksum",
                offset
            )));
        }
        if length != PAYLOAD_SIZE {
            return Err(Error::corruption(format!(
                "Journal record at offset {} has length {}, expected {}",
                offset, length, PAYLOAD_SIZE
            )));
        }

        let epoch = u64::from_le_bytes(payload.try_into().unwrap());
        match record_type {
            RecordType::EpochBegin => rotated = epoch,
            RecordType::EpochConfirm => confirmed = epoch,
        }
        offset += HEADER_SIZE + length;
    }

    Ok((rotated, confirmed, offset))
}
