use crate::{error::StorageError, ObjectId};

/// A slice of a payload, addressable by its parent object and its position in
/// the payload
#[derive(Debug, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub parent: ObjectId,
    pub seq: u32,
    pub data: &'a [u8],
}

/// Checks that chunks of `chunk_size` bytes can be stored and returns the
/// size as it is recorded in [`FileInfo`](super::FileInfo)
pub fn check_chunk_size(chunk_size: usize) -> Result<u32, StorageError> {
    match u32::try_from(chunk_size) {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(StorageError::InvalidChunkSize(chunk_size)),
    }
}

/// Calculates how many chunks of `chunk_size` bytes `length` bytes occupy.
/// Sequence numbers are 32 bits wide, so payloads that need more chunks are
/// rejected.
pub fn chunk_count(length: usize, chunk_size: usize) -> Result<u32, StorageError> {
    u32::try_from(length.div_ceil(chunk_size))
        .map_err(|_| StorageError::PayloadTooLarge { length, chunk_size })
}

/// Splits `payload` into chunks of at most `chunk_size` bytes. An empty
/// payload produces no chunks at all. The payload must have passed
/// [`chunk_count`].
pub fn split(
    parent: ObjectId,
    payload: &[u8],
    chunk_size: usize,
) -> impl Iterator<Item = Chunk<'_>> {
    payload
        .chunks(chunk_size)
        .enumerate()
        .map(move |(seq, data)| Chunk {
            parent,
            seq: seq as u32,
            data,
        })
}

/// Reassembles a payload from its chunks. Chunks may be pushed in any order.
/// They are concatenated by sequence index.
pub struct Assembler {
    id: ObjectId,
    length: u64,
    slots: Vec<Option<Vec<u8>>>,
}

impl Assembler {
    /// Creates an assembler for an object of `length` bytes consisting of
    /// `chunk_count` chunks
    pub fn new(id: ObjectId, length: u64, chunk_count: u32) -> Self {
        Self {
            id,
            length,
            slots: vec![None; chunk_count as usize],
        }
    }

    pub fn push(&mut self, seq: u32, data: Vec<u8>) -> Result<(), StorageError> {
        let total = self.slots.len();
        let slot = self
            .slots
            .get_mut(seq as usize)
            .ok_or_else(|| StorageError::Corrupt {
                id: self.id,
                reason: format!("unexpected chunk {seq} (object has {total} chunks)"),
            })?;
        if slot.is_some() {
            return Err(StorageError::Corrupt {
                id: self.id,
                reason: format!("duplicate chunk {seq}"),
            });
        }
        *slot = Some(data);
        Ok(())
    }

    /// Concatenates all chunks. Fails if a chunk is missing or if the result
    /// does not have the expected length.
    pub fn finish(self) -> Result<Vec<u8>, StorageError> {
        let mut result = Vec::with_capacity(self.length as usize);
        for (seq, slot) in self.slots.into_iter().enumerate() {
            let data = slot.ok_or_else(|| StorageError::Corrupt {
                id: self.id,
                reason: format!("missing chunk {seq}"),
            })?;
            result.extend_from_slice(&data);
        }

        if result.len() as u64 != self.length {
            return Err(StorageError::Corrupt {
                id: self.id,
                reason: format!(
                    "expected {} bytes but chunks contain {}",
                    self.length,
                    result.len()
                ),
            });
        }

        Ok(result)
    }
}
