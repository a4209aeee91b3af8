pub mod chunk;
pub mod memory;
pub mod record;
pub mod rocksdb;

use std::time::SystemTime;

use geo::{Point, Rect};

use crate::{error::StorageError, Location, ObjectId, PlaceRef};

/// Default size of a single chunk in bytes (255 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Structured metadata attached to a stored object
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub content_type: String,
    pub location: Option<Location>,
    pub place: PlaceRef,
}

impl Metadata {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            location: None,
            place: PlaceRef::Unset,
        }
    }
}

/// Catalog entry of a stored object
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub id: ObjectId,

    /// Total payload size in bytes
    pub length: u64,

    /// Size of every chunk but the last one
    pub chunk_size: u32,

    pub chunk_count: u32,

    pub metadata: Metadata,
}

impl FileInfo {
    pub fn upload_date(&self) -> SystemTime {
        self.id.timestamp()
    }
}

/// A predicate over metadata fields used to look up objects
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Objects referencing the given place
    Place(ObjectId),

    /// Objects with exactly this content type
    ContentType(String),

    /// Objects whose location lies within the given rectangle (x = longitude,
    /// y = latitude, boundary included)
    Within(Rect),
}

impl Predicate {
    /// Checks if the given metadata satisfies this predicate
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Predicate::Place(place) => metadata.place.id() == Some(*place),
            Predicate::ContentType(ct) => metadata.content_type == *ct,
            Predicate::Within(rect) => metadata
                .location
                .is_some_and(|l| covers(rect, &Point::from(l))),
        }
    }
}

/// Like [`geo::Contains`] but also accepts points on the rectangle's boundary
fn covers(rect: &Rect, p: &Point) -> bool {
    let (min, max) = (rect.min(), rect.max());
    (min.x..=max.x).contains(&p.x()) && (min.y..=max.y).contains(&p.y())
}

/// A store for binary payloads split into ordered chunks, each object carrying
/// a metadata record. All operations on a single object are atomic: readers
/// either see the complete object or nothing.
pub trait ChunkStore: Send + Sync {
    /// Splits `payload` into chunks and stores them together with `metadata`
    /// under a newly generated ID
    fn put(&self, payload: &[u8], metadata: Metadata) -> Result<ObjectId>;

    /// Reassembles the payload of the object with the given `id`. Returns
    /// `None` if there is no such object.
    fn get(&self, id: ObjectId) -> Result<Option<(Vec<u8>, FileInfo)>>;

    /// Looks up the catalog entry of an object without reading its chunks
    fn info(&self, id: ObjectId) -> Result<Option<FileInfo>>;

    /// Replaces the metadata of an object in a single atomic operation.
    /// Chunks are never touched. Returns `None` if there is no such object.
    fn update_metadata(&self, id: ObjectId, metadata: Metadata) -> Result<Option<FileInfo>>;

    /// Removes an object, its chunks, and its metadata. Returns the catalog
    /// entry of the removed object or `None` if there was no such object.
    fn delete(&self, id: ObjectId) -> Result<Option<FileInfo>>;

    /// Enumerates objects in ID order. Returns all remaining objects if
    /// `limit` is `None`.
    fn list(&self, skip: usize, limit: Option<usize>) -> Result<Vec<FileInfo>>;

    /// Returns all objects whose metadata matches the given predicate, in ID
    /// order
    fn find(&self, predicate: &Predicate) -> Result<Vec<FileInfo>>;
}
