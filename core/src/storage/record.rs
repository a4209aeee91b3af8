//! Binary encoding of catalog entries. Every record starts with a format
//! version byte followed by the bincode encoding of the record. The object ID
//! is not part of the record because it is always stored in the key.

use bincode::{config, Decode, Encode};

use crate::{error::StorageError, Location, ObjectId, PlaceRef};

use super::{FileInfo, Metadata};

const VERSION: u8 = 1;

#[derive(Encode, Decode)]
struct RecordV1 {
    length: u64,
    chunk_size: u32,
    chunk_count: u32,
    content_type: String,
    location: Option<(f64, f64)>,
    place: Option<[u8; 16]>,
}

pub fn encode(info: &FileInfo) -> Result<Vec<u8>, StorageError> {
    let record = RecordV1 {
        length: info.length,
        chunk_size: info.chunk_size,
        chunk_count: info.chunk_count,
        content_type: info.metadata.content_type.clone(),
        location: info.metadata.location.map(|l| (l.lat, l.lng)),
        place: info.metadata.place.id().map(ObjectId::to_be_bytes),
    };

    let mut result = vec![VERSION];
    result.extend(bincode::encode_to_vec(record, config::standard())?);
    Ok(result)
}

pub fn decode(id: ObjectId, bytes: &[u8]) -> Result<FileInfo, StorageError> {
    let Some((&version, rest)) = bytes.split_first() else {
        return Err(StorageError::Decode(format!("empty record for object `{id}'")));
    };
    if version != VERSION {
        return Err(StorageError::Decode(format!(
            "unsupported record version {version} for object `{id}'"
        )));
    }

    let (record, _): (RecordV1, usize) = bincode::decode_from_slice(rest, config::standard())
        .map_err(|err| StorageError::Decode(format!("object `{id}': {err}")))?;

    Ok(FileInfo {
        id,
        length: record.length,
        chunk_size: record.chunk_size,
        chunk_count: record.chunk_count,
        metadata: Metadata {
            content_type: record.content_type,
            location: record.location.map(|(lat, lng)| Location::new(lat, lng)),
            place: record
                .place
                .map(ObjectId::from_be_bytes)
                .map_or(PlaceRef::Unset, PlaceRef::ById),
        },
    })
}
