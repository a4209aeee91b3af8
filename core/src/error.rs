use thiserror::Error;

use crate::{gps::ExifError, id::InvalidObjectId, ObjectId};

/// A failure of the storage substrate or of the data it holds
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend failed: {0}")]
    Backend(#[from] rocksdb::Error),

    #[error("unable to encode metadata record: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("unable to decode metadata record: {0}")]
    Decode(String),

    #[error("object `{id}' is corrupt: {reason}")]
    Corrupt { id: ObjectId, reason: String },

    #[error("invalid chunk size {0}. Chunk size must be greater than 0 and fit into 32 bits")]
    InvalidChunkSize(usize),

    #[error("payload of {length} bytes needs more than {} chunks of {chunk_size} bytes", u32::MAX)]
    PayloadTooLarge { length: usize, chunk_size: usize },
}

/// An error that happened while storing or querying photos
#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("image does not carry GPS location data")]
    NoLocationData,

    #[error("unable to decode image: {0}")]
    Decode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    InvalidObjectId(#[from] InvalidObjectId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ExifError> for PhotoError {
    fn from(value: ExifError) -> Self {
        match value {
            ExifError::NoLocationData => PhotoError::NoLocationData,
            ExifError::Decode(msg) => PhotoError::Decode(msg),
        }
    }
}
