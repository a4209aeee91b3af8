pub mod config;
pub mod error;
pub mod geo_index;
pub mod gps;
pub mod id;
pub mod location;
pub mod photo;
pub mod service;
pub mod storage;

pub use error::{PhotoError, StorageError};
pub use id::ObjectId;
pub use location::Location;
pub use photo::{Photo, PlaceRef, JPEG_CONTENT_TYPE};
pub use service::{PhotoService, Saved};
