//! Framed, CRC-checked mutation journal.
//!
//! Every store mutation is appended as one frame and synced to stable
//! storage before the mutation is reported successful. Reopening a store
//! replays the journal to rebuild the keyed record set.
//!
//! Frame layout: magic (4) + version (2) + type (1) + length (4) +
//! payload (CBOR) + CRC32 (4, over everything before it).

use crate::backend::JournalBackend;
use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordId};

/// Magic bytes identifying a journal frame.
pub const JOURNAL_MAGIC: [u8; 4] = *b"DJNL";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Header size: magic (4) + version (2) + type (1) + length (4).
const HEADER_SIZE: usize = 11;

/// Trailing CRC size.
const CRC_SIZE: usize = 4;

/// A journaled store mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Full record state after an insert or overwrite.
    Put(Record),
    /// The `synced` flag of the identified record flipped to true.
    MarkSynced(RecordId),
}

impl Frame {
    /// Returns the frame type code.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match self {
            Frame::Put(_) => 1,
            Frame::MarkSynced(_) => 2,
        }
    }
}

/// Append-only journal over a byte backend.
pub struct Journal {
    backend: Box<dyn JournalBackend>,
    sync_on_write: bool,
}

impl Journal {
    /// Creates a journal over the given backend.
    ///
    /// With `sync_on_write`, every append is synced to durable storage
    /// before returning; this is what gives `put` its
    /// write-before-acknowledge guarantee and should only be disabled for
    /// in-memory backends.
    pub fn new(backend: Box<dyn JournalBackend>, sync_on_write: bool) -> Self {
        Self {
            backend,
            sync_on_write,
        }
    }

    /// Appends a frame, returning the offset where it was written.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or I/O fails; the frame is not
    /// observable by replay in that case.
    pub fn append(&mut self, frame: &Frame) -> StoreResult<u64> {
        let payload = encode_payload(frame)?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(frame.type_code());
        let len = u32::try_from(payload.len())
            .map_err(|_| StoreError::codec("frame payload too large"))?;
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        let offset = self.backend.append(&data)?;
        if self.sync_on_write {
            self.backend.sync()?;
        }
        Ok(offset)
    }

    /// Replays every intact frame in write order.
    ///
    /// A torn or garbage tail (short frame, bad magic, CRC mismatch) ends
    /// replay cleanly at the last intact frame; a structurally valid frame
    /// that fails to decode is surfaced as corruption.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, an unsupported version, an unknown
    /// frame type, or an undecodable payload.
    pub fn replay<F>(&self, mut apply: F) -> StoreResult<()>
    where
        F: FnMut(Frame) -> StoreResult<()>,
    {
        let total = self.backend.size()?;
        let mut offset = 0u64;

        while offset < total {
            let remaining = total - offset;
            if remaining < (HEADER_SIZE + CRC_SIZE) as u64 {
                tracing::warn!(offset, remaining, "torn frame header at journal tail");
                break;
            }

            let header = self.backend.read_at(offset, HEADER_SIZE)?;
            if header[0..4] != JOURNAL_MAGIC {
                tracing::warn!(offset, "bad magic at journal tail, stopping replay");
                break;
            }
            let version = u16::from_le_bytes([header[4], header[5]]);
            if version != JOURNAL_VERSION {
                return Err(StoreError::corrupt(
                    offset,
                    format!("unsupported journal version {version}"),
                ));
            }
            let type_code = header[6];
            let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

            if remaining < (HEADER_SIZE + len + CRC_SIZE) as u64 {
                tracing::warn!(offset, len, "torn frame payload at journal tail");
                break;
            }

            let payload = self.backend.read_at(offset + HEADER_SIZE as u64, len)?;
            let crc_bytes = self
                .backend
                .read_at(offset + (HEADER_SIZE + len) as u64, CRC_SIZE)?;
            let stored_crc =
                u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

            let mut framed = Vec::with_capacity(HEADER_SIZE + len);
            framed.extend_from_slice(&header);
            framed.extend_from_slice(&payload);
            if compute_crc32(&framed) != stored_crc {
                tracing::warn!(offset, "CRC mismatch at journal tail, stopping replay");
                break;
            }

            apply(decode_payload(type_code, &payload, offset)?)?;
            offset += (HEADER_SIZE + len + CRC_SIZE) as u64;
        }

        Ok(())
    }

    /// Returns the current journal size in bytes.
    pub fn size(&self) -> StoreResult<u64> {
        self.backend.size()
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}

fn encode_payload(frame: &Frame) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    match frame {
        Frame::Put(record) => {
            ciborium::into_writer(record, &mut buf).map_err(StoreError::codec)?;
        }
        Frame::MarkSynced(id) => {
            ciborium::into_writer(id, &mut buf).map_err(StoreError::codec)?;
        }
    }
    Ok(buf)
}

fn decode_payload(type_code: u8, payload: &[u8], offset: u64) -> StoreResult<Frame> {
    match type_code {
        1 => {
            let record: Record = ciborium::from_reader(payload)
                .map_err(|e| StoreError::corrupt(offset, e.to_string()))?;
            Ok(Frame::Put(record))
        }
        2 => {
            let id: RecordId = ciborium::from_reader(payload)
                .map_err(|e| StoreError::corrupt(offset, e.to_string()))?;
            Ok(Frame::MarkSynced(id))
        }
        other => Err(StoreError::corrupt(
            offset,
            format!("unknown frame type {other}"),
        )),
    }
}

/// CRC32 (IEEE polynomial), table built in const context.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::record::Timestamp;

    fn sample_record(label: &str) -> Record {
        Record::with_parts(RecordId::new(), label, Timestamp::from_millis(100))
    }

    fn replay_all(journal: &Journal) -> Vec<Frame> {
        let mut frames = Vec::new();
        journal
            .replay(|frame| {
                frames.push(frame);
                Ok(())
            })
            .unwrap();
        frames
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0x0000_0000);
    }

    #[test]
    fn append_and_replay_roundtrip() {
        let mut journal = Journal::new(Box::new(MemoryBackend::new()), false);

        let record = sample_record("a1");
        let id = record.id;
        journal.append(&Frame::Put(record.clone())).unwrap();
        journal.append(&Frame::MarkSynced(id)).unwrap();

        let frames = replay_all(&journal);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame::Put(record));
        assert_eq!(frames[1], Frame::MarkSynced(id));
    }

    #[test]
    fn replay_preserves_write_order() {
        let mut journal = Journal::new(Box::new(MemoryBackend::new()), false);
        let records: Vec<Record> = (0..5).map(|i| sample_record(&format!("p{i}"))).collect();
        for record in &records {
            journal.append(&Frame::Put(record.clone())).unwrap();
        }

        let frames = replay_all(&journal);
        let replayed: Vec<&Record> = frames
            .iter()
            .map(|f| match f {
                Frame::Put(r) => r,
                Frame::MarkSynced(_) => panic!("unexpected frame"),
            })
            .collect();
        assert_eq!(replayed.len(), 5);
        for (expected, actual) in records.iter().zip(replayed) {
            assert_eq!(expected, actual);
        }
    }

    #[test]
    fn torn_tail_ends_replay_cleanly() {
        let mut backing = MemoryBackend::new();
        {
            let mut journal = Journal::new(Box::new(MemoryBackend::new()), false);
            journal.append(&Frame::Put(sample_record("a1"))).unwrap();
            journal.append(&Frame::Put(sample_record("a2"))).unwrap();
            // Copy the full journal, then chop the last frame in half.
            let full = replay_bytes(&journal);
            let cut = full.len() - 7;
            backing.append(&full[..cut]).unwrap();
        }

        let journal = Journal::new(Box::new(backing), false);
        let frames = replay_all(&journal);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn corrupted_crc_stops_replay() {
        let mut journal = Journal::new(Box::new(MemoryBackend::new()), false);
        journal.append(&Frame::Put(sample_record("a1"))).unwrap();
        let mut bytes = replay_bytes(&journal);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let journal = Journal::new(Box::new(MemoryBackend::with_data(bytes)), false);
        assert!(replay_all(&journal).is_empty());
    }

    #[test]
    fn unknown_frame_type_is_corruption() {
        let mut journal = Journal::new(Box::new(MemoryBackend::new()), false);
        journal.append(&Frame::Put(sample_record("a1"))).unwrap();
        let mut bytes = replay_bytes(&journal);
        // Flip the type byte and re-seal the CRC.
        bytes[6] = 0xEE;
        let body_len = bytes.len() - CRC_SIZE;
        let crc = compute_crc32(&bytes[..body_len]);
        bytes[body_len..].copy_from_slice(&crc.to_le_bytes());

        let journal = Journal::new(Box::new(MemoryBackend::with_data(bytes)), false);
        let result = journal.replay(|_| Ok(()));
        assert!(matches!(result, Err(StoreError::CorruptJournal { .. })));
    }

    /// Extracts the raw bytes of a memory-backed journal via replay bounds.
    fn replay_bytes(journal: &Journal) -> Vec<u8> {
        let size = journal.size().unwrap() as usize;
        journal.backend.read_at(0, size).unwrap()
    }
}
