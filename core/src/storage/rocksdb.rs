use parking_lot::Mutex;
use rocksdb::{DBCompressionType, Direction, IteratorMode, Options, Snapshot, WriteBatch, DB};
use tracing::{debug, instrument, trace};

use crate::{error::StorageError, ObjectId};

use super::{
    chunk::{check_chunk_size, chunk_count, split, Assembler},
    record, ChunkStore, FileInfo, Metadata, Predicate, Result,
};

/// Key prefix of metadata records
const META: u8 = b'm';

const META_PREFIX: &[u8] = &[META];

/// Key prefix of chunks
const CHUNK: u8 = b'c';

/// Key prefix of the secondary index mapping places to objects
const PLACE: u8 = b'p';

fn meta_key(id: ObjectId) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(META);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn chunk_prefix(id: ObjectId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(CHUNK);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn chunk_key(id: ObjectId, seq: u32) -> Vec<u8> {
    // important! use `to_be_bytes()` to maintain sort order!
    let mut key = chunk_prefix(id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn place_prefix(place: ObjectId) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(PLACE);
    key.extend_from_slice(&place.to_be_bytes());
    key
}

fn place_key(place: ObjectId, id: ObjectId) -> Vec<u8> {
    let mut key = place_prefix(place);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Iterates over all key-value pairs in `snapshot` whose key starts with
/// `prefix`
fn scan<'a>(
    snapshot: &'a Snapshot<'a>,
    prefix: &'a [u8],
) -> impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>)>> + 'a {
    snapshot
        .iterator(IteratorMode::From(prefix, Direction::Forward))
        .take_while(move |r| r.as_ref().map_or(true, |(k, _)| k.starts_with(prefix)))
        .map(|r| r.map_err(StorageError::from))
}

fn read_info(snapshot: &Snapshot<'_>, id: ObjectId) -> Result<Option<FileInfo>> {
    snapshot
        .get(meta_key(id))?
        .map(|bytes| record::decode(id, &bytes))
        .transpose()
}

/// An implementation of the [`ChunkStore`] trait backed by RocksDB. Every
/// object is written, updated and deleted with a single [`WriteBatch`], which
/// RocksDB applies atomically. Reads that touch more than one key go through
/// a snapshot so that they never observe half of a batch.
#[derive(Debug)]
pub struct RocksDBStore {
    db: DB,
    chunk_size: u32,

    /// Serializes operations that read a record before replacing it
    write_lock: Mutex<()>,
}

impl RocksDBStore {
    /// Creates a new RocksDB store at the given location
    pub fn new(path: &str, chunk_size: usize) -> Result<Self> {
        let chunk_size = check_chunk_size(chunk_size)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(DBCompressionType::Lz4);

        Ok(Self {
            db: DB::open(&opts, path)?,
            chunk_size,
            write_lock: Mutex::new(()),
        })
    }

    fn decode_meta_entry(key: &[u8], value: &[u8]) -> Result<FileInfo> {
        let id = ObjectId::from_slice(&key[1..])
            .ok_or_else(|| StorageError::Decode(format!("malformed record key {key:?}")))?;
        record::decode(id, value)
    }
}

impl ChunkStore for RocksDBStore {
    #[instrument(level = "debug", skip_all, fields(len = payload.len()))]
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

        let mut batch = WriteBatch::default();
        for chunk in split(id, payload, chunk_size) {
            batch.put(chunk_key(chunk.parent, chunk.seq), chunk.data);
        }
        if let Some(place) = info.metadata.place.id() {
            batch.put(place_key(place, id), b"");
        }
        batch.put(meta_key(id), record::encode(&info)?);

        self.db.write(batch)?;
        debug!(%id, chunks = info.chunk_count, "stored object");

        Ok(id)
    }

    fn get(&self, id: ObjectId) -> Result<Option<(Vec<u8>, FileInfo)>> {
        let snapshot = self.db.snapshot();
        let Some(info) = read_info(&snapshot, id)? else {
            return Ok(None);
        };

        let prefix = chunk_prefix(id);
        let mut assembler = Assembler::new(id, info.length, info.chunk_count);
        for entry in scan(&snapshot, &prefix) {
            let (key, value) = entry?;
            let seq = key[prefix.len()..]
                .try_into()
                .map(u32::from_be_bytes)
                .map_err(|_| StorageError::Corrupt {
                    id,
                    reason: format!("malformed chunk key {key:?}"),
                })?;
            assembler.push(seq, value.into_vec())?;
        }

        Ok(Some((assembler.finish()?, info)))
    }

    fn info(&self, id: ObjectId) -> Result<Option<FileInfo>> {
        self.db
            .get(meta_key(id))?
            .map(|bytes| record::decode(id, &bytes))
            .transpose()
    }

    #[instrument(level = "debug", skip(self, metadata))]
    fn update_metadata(&self, id: ObjectId, metadata: Metadata) -> Result<Option<FileInfo>> {
        let _guard = self.write_lock.lock();

        let Some(old) = self.info(id)? else {
            return Ok(None);
        };

        let mut batch = WriteBatch::default();
        if let Some(place) = old.metadata.place.id() {
            batch.delete(place_key(place, id));
        }
        if let Some(place) = metadata.place.id() {
            batch.put(place_key(place, id), b"");
        }

        let info = FileInfo { metadata, ..old };
        batch.put(meta_key(id), record::encode(&info)?);
        self.db.write(batch)?;
        trace!("replaced metadata record");

        Ok(Some(info))
    }

    #[instrument(level = "debug", skip(self))]
    fn delete(&self, id: ObjectId) -> Result<Option<FileInfo>> {
        let _guard = self.write_lock.lock();

        let Some(info) = self.info(id)? else {
            return Ok(None);
        };

        let mut batch = WriteBatch::default();
        batch.delete(meta_key(id));
        for seq in 0..info.chunk_count {
            batch.delete(chunk_key(id, seq));
        }
        if let Some(place) = info.metadata.place.id() {
            batch.delete(place_key(place, id));
        }
        self.db.write(batch)?;

        Ok(Some(info))
    }

    fn list(&self, skip: usize, limit: Option<usize>) -> Result<Vec<FileInfo>> {
        let snapshot = self.db.snapshot();
        let entries = scan(&snapshot, META_PREFIX)
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX));
        entries
            .map(|entry| entry.and_then(|(k, v)| Self::decode_meta_entry(&k, &v)))
            .collect()
    }

    fn find(&self, predicate: &Predicate) -> Result<Vec<FileInfo>> {
        let snapshot = self.db.snapshot();
        match predicate {
            Predicate::Place(place) => {
                let prefix = place_prefix(*place);
                let mut result = Vec::new();
                for entry in scan(&snapshot, &prefix) {
                    let (key, _) = entry?;
                    let id = ObjectId::from_slice(&key[prefix.len()..]).ok_or_else(|| {
                        StorageError::Decode(format!("malformed place index key {key:?}"))
                    })?;
                    // index entries and records are written in the same
                    // batches, so a visible entry always has its record
                    let info = read_info(&snapshot, id)?.ok_or_else(|| StorageError::Corrupt {
                        id,
                        reason: format!("place index entry without record under {place}"),
                    })?;
                    result.push(info);
                }
                Ok(result)
            }

            _ => {
                let mut result = Vec::new();
                for entry in scan(&snapshot, META_PREFIX) {
                    let (key, value) = entry?;
                    let info = Self::decode_meta_entry(&key, &value)?;
                    if predicate.matches(&info.metadata) {
                        result.push(info);
                    }
                }
                Ok(result)
            }
        }
    }
}
