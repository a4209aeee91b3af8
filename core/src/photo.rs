use std::str::FromStr;

use crate::{
    geo_index::{Place, PlaceDirectory},
    id::InvalidObjectId,
    storage::{FileInfo, Metadata},
    Location, ObjectId,
};

/// The only media type photos are stored with
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// A weak reference to a [`Place`]. It only records an identifier and may
/// point to a place that does not exist (anymore).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlaceRef {
    #[default]
    Unset,
    ById(ObjectId),
}

impl PlaceRef {
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            PlaceRef::Unset => None,
            PlaceRef::ById(id) => Some(*id),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, PlaceRef::ById(_))
    }

    /// Looks up the referenced place. A dangling reference yields `None`.
    pub fn resolve<D>(&self, directory: &D) -> anyhow::Result<Option<Place>>
    where
        D: PlaceDirectory + ?Sized,
    {
        match self {
            PlaceRef::Unset => Ok(None),
            PlaceRef::ById(id) => directory.find(*id),
        }
    }
}

impl From<ObjectId> for PlaceRef {
    fn from(value: ObjectId) -> Self {
        PlaceRef::ById(value)
    }
}

impl From<Option<ObjectId>> for PlaceRef {
    fn from(value: Option<ObjectId>) -> Self {
        value.map_or(PlaceRef::Unset, PlaceRef::ById)
    }
}

impl From<&Place> for PlaceRef {
    fn from(value: &Place) -> Self {
        PlaceRef::ById(value.id)
    }
}

/// Parses a place ID. An empty string means [`PlaceRef::Unset`].
impl FromStr for PlaceRef {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            Ok(PlaceRef::Unset)
        } else {
            s.parse().map(PlaceRef::ById)
        }
    }
}

/// A photograph. A photo without an ID is *transient*. It becomes
/// *persisted* when it is saved for the first time and keeps its ID from then
/// on.
///
/// The contents of a photo are write-only: they are used when the photo is
/// saved for the first time and are never loaded back into this struct. Use
/// [`PhotoService::fetch_payload`](crate::PhotoService::fetch_payload) to
/// read them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Photo {
    id: Option<ObjectId>,
    pub location: Option<Location>,
    pub place: PlaceRef,
    contents: Option<Vec<u8>>,
}

impl Photo {
    /// Creates a new transient photo with the given contents
    pub fn new(contents: Vec<u8>) -> Self {
        Self {
            contents: Some(contents),
            ..Default::default()
        }
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn content_type(&self) -> &'static str {
        JPEG_CONTENT_TYPE
    }

    /// Replaces the photo's contents. Has no effect on the stored payload
    /// once the photo has been persisted.
    pub fn set_contents(&mut self, contents: Vec<u8>) {
        self.contents = Some(contents);
    }

    pub(crate) fn contents(&self) -> Option<&[u8]> {
        self.contents.as_deref()
    }

    pub(crate) fn take_contents(&mut self) -> Option<Vec<u8>> {
        self.contents.take()
    }

    /// Marks the photo as persisted. The first assignment wins.
    pub(crate) fn assign_id(&mut self, id: ObjectId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    pub(crate) fn metadata(&self) -> Metadata {
        Metadata {
            content_type: JPEG_CONTENT_TYPE.to_string(),
            location: self.location,
            place: self.place,
        }
    }
}

impl From<FileInfo> for Photo {
    fn from(value: FileInfo) -> Self {
        Self {
            id: Some(value.id),
            location: value.metadata.location,
            place: value.metadata.place,
            contents: None,
        }
    }
}
