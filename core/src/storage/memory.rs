use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{instrument, trace};

use crate::ObjectId;

use super::{
    chunk::{check_chunk_size, chunk_count, split, Assembler},
    ChunkStore, FileInfo, Metadata, Predicate, Result, DEFAULT_CHUNK_SIZE,
};

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<ObjectId, FileInfo>,
    chunks: BTreeMap<(ObjectId, u32), Vec<u8>>,
}

/// An implementation of the [`ChunkStore`] trait that keeps everything in
/// memory. All changes to an object are applied while holding a single write
/// lock.
#[derive(Debug)]
pub struct MemoryStore {
    chunk_size: u32,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(chunk_size: usize) -> Result<Self> {
        Ok(Self {
            chunk_size: check_chunk_size(chunk_size)?,
            inner: RwLock::default(),
        })
    }

    /// Number of chunks currently stored, across all objects
    pub fn total_chunks(&self) -> usize {
        self.inner.read().chunks.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE as u32,
            inner: RwLock::default(),
        }
    }
}

impl ChunkStore for MemoryStore {
    #[instrument(level = "trace", skip_all, fields(len = payload.len()))]
    fn put(&self, payload: &[u8], metadata: Metadata) -> Result<ObjectId> {
        let chunk_size = self.chunk_size as usize;
        let id = ObjectId::generate();
        let info = FileInfo {
            id,
            length: payload.len() as u64,
            chunk_size: self.chunk_size,
            chunk_count: chunk_count(payload.len(), chunk_size)?,
            metadata,
        };

        let chunks = split(id, payload, chunk_size)
            .map(|c| ((c.parent, c.seq), c.data.to_vec()))
            .collect::<Vec<_>>();

        let mut inner = self.inner.write();
        inner.chunks.extend(chunks);
        inner.records.insert(id, info);
        trace!(%id, "stored object");

        Ok(id)
    }

    fn get(&self, id: ObjectId) -> Result<Option<(Vec<u8>, FileInfo)>> {
        let inner = self.inner.read();
        let Some(info) = inner.records.get(&id) else {
            return Ok(None);
        };

        let mut assembler = Assembler::new(id, info.length, info.chunk_count);
        for ((_, seq), data) in inner.chunks.range((id, 0)..=(id, u32::MAX)) {
            assembler.push(*seq, data.clone())?;
        }

        Ok(Some((assembler.finish()?, info.clone())))
    }

    fn info(&self, id: ObjectId) -> Result<Option<FileInfo>> {
        Ok(self.inner.read().records.get(&id).cloned())
    }

    fn update_metadata(&self, id: ObjectId, metadata: Metadata) -> Result<Option<FileInfo>> {
        let mut inner = self.inner.write();
        Ok(inner.records.get_mut(&id).map(|info| {
            info.metadata = metadata;
            info.clone()
        }))
    }

    fn delete(&self, id: ObjectId) -> Result<Option<FileInfo>> {
        let mut inner = self.inner.write();
        let Some(info) = inner.records.remove(&id) else {
            return Ok(None);
        };
        for seq in 0..info.chunk_count {
            inner.chunks.remove(&(id, seq));
        }
        Ok(Some(info))
    }

    fn list(&self, skip: usize, limit: Option<usize>) -> Result<Vec<FileInfo>> {
        let inner = self.inner.read();
        let it = inner.records.values().skip(skip);
        Ok(match limit {
            Some(limit) => it.take(limit).cloned().collect(),
            None => it.cloned().collect(),
        })
    }

    fn find(&self, predicate: &Predicate) -> Result<Vec<FileInfo>> {
        Ok(self
            .inner
            .read()
            .records
            .values()
            .filter(|info| predicate.matches(&info.metadata))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, OptionAssertion, ResultAssertion, VecAssertion};
    use pretty_assertions::assert_eq;

    use crate::{
        storage::{ChunkStore, Metadata, Predicate},
        Location, ObjectId, PlaceRef,
    };

    use super::MemoryStore;

    fn jpeg_meta(place: PlaceRef) -> Metadata {
        Metadata {
            content_type: "image/jpeg".to_string(),
            location: Some(Location::new(50.1125, 8.6721)),
            place,
        }
    }

    #[test]
    fn invalid_chunk_size() {
        assert_that!(MemoryStore::new(0)).is_err();
    }

    #[test]
    fn put_and_get() {
        let store = MemoryStore::new(4).unwrap();
        let id = store
            .put(b"hello world", jpeg_meta(PlaceRef::Unset))
            .unwrap();
        assert_eq!(store.total_chunks(), 3);

        let (payload, info) = store.get(id).unwrap().unwrap();
        assert_eq!(payload, b"hello world".to_vec());
        assert_eq!(info.metadata, jpeg_meta(PlaceRef::Unset));
        assert_eq!(info.length, 11);
        assert_eq!(info.chunk_count, 3);
    }

    #[test]
    fn empty_payload() {
        let store = MemoryStore::new(4).unwrap();
        let id = store.put(&[], jpeg_meta(PlaceRef::Unset)).unwrap();
        assert_eq!(store.total_chunks(), 0);
        let (payload, _) = store.get(id).unwrap().unwrap();
        assert_that!(payload).is_empty();
    }

    #[test]
    fn delete_removes_chunks() {
        let store = MemoryStore::new(4).unwrap();
        let keep = store.put(b"keep me", jpeg_meta(PlaceRef::Unset)).unwrap();
        let id = store.put(b"hello world", jpeg_meta(PlaceRef::Unset)).unwrap();

        assert_that!(store.delete(id).unwrap()).is_some();
        assert_that!(store.get(id).unwrap()).is_none();
        assert_that!(store.delete(id).unwrap()).is_none();
        assert_eq!(store.total_chunks(), 2);
        assert_that!(store.get(keep).unwrap()).is_some();
    }

    #[test]
    fn update_keeps_payload() {
        let store = MemoryStore::new(4).unwrap();
        let id = store.put(b"hello world", jpeg_meta(PlaceRef::Unset)).unwrap();
        let place = ObjectId::generate();

        let updated = store.update_metadata(id, jpeg_meta(place.into())).unwrap();
        assert_eq!(updated.unwrap().metadata.place, PlaceRef::ById(place));

        let (payload, info) = store.get(id).unwrap().unwrap();
        assert_eq!(payload, b"hello world".to_vec());
        assert_eq!(info.metadata.place, PlaceRef::ById(place));

        assert_that!(store
            .update_metadata(ObjectId::generate(), jpeg_meta(PlaceRef::Unset))
            .unwrap())
        .is_none();
    }

    #[test]
    fn list_and_find() {
        let store = MemoryStore::default();
        let place = ObjectId::generate();
        let ids = (0..5)
            .map(|i| {
                let p = if i % 2 == 0 { place.into() } else { PlaceRef::Unset };
                store.put(&[i as u8], jpeg_meta(p)).unwrap()
            })
            .collect::<Vec<_>>();

        let all = store.list(0, None).unwrap().into_iter().map(|i| i.id).collect::<Vec<_>>();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(all, sorted);

        let page = store.list(1, Some(2)).unwrap().into_iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(page, sorted[1..3].to_vec());
        assert_that!(store.list(10, None).unwrap()).is_empty();

        let found = store.find(&Predicate::Place(place)).unwrap();
        assert_that!(found).has_length(3);
        assert_that!(store.find(&Predicate::Place(ObjectId::generate())).unwrap()).is_empty();
    }
}
