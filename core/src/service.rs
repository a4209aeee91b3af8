use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::{
    error::PhotoError,
    geo_index::{GeoIndex, GeoIndexError},
    gps::{ExifError, GpsReader},
    storage::{ChunkStore, Predicate},
    Location, ObjectId, Photo, PlaceRef,
};

pub type Result<T> = std::result::Result<T, PhotoError>;

impl From<GeoIndexError> for PhotoError {
    fn from(value: GeoIndexError) -> Self {
        PhotoError::InvalidArgument(value.to_string())
    }
}

/// The outcome of [`PhotoService::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    /// A transient photo has been stored for the first time
    Created(ObjectId),

    /// The metadata of a persisted photo have been replaced
    Updated(ObjectId),

    /// The photo was persisted but does not exist in the store anymore
    NotFound(ObjectId),
}

/// Stores photos in a [`ChunkStore`], extracts their locations with a
/// [`GpsReader`] and relates them to places through a [`GeoIndex`]. The
/// service itself holds no state.
pub struct PhotoService<S, R> {
    store: S,
    gps_reader: R,
    geo_index: Arc<GeoIndex>,
}

impl<S, R> PhotoService<S, R>
where
    S: ChunkStore,
    R: GpsReader,
{
    pub fn new(store: S, gps_reader: R, geo_index: Arc<GeoIndex>) -> Self {
        Self {
            store,
            gps_reader,
            geo_index,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn geo_index(&self) -> &GeoIndex {
        &self.geo_index
    }

    /// Saves a photo.
    ///
    /// If the photo is transient, its location is extracted from its
    /// contents, its contents are stored and it becomes persisted. An
    /// explicitly set location takes precedence over the extracted one, but
    /// the contents must still be a decodable image.
    ///
    /// If the photo is already persisted, only its metadata (location and
    /// place) are updated. New contents set with [`Photo::set_contents`] are
    /// discarded in this case.
    ///
    /// The photo does not keep its contents after saving.
    #[instrument(level = "debug", skip_all, fields(id = ?photo.id()))]
    pub fn save(&self, photo: &mut Photo) -> Result<Saved> {
        if let Some(id) = photo.id() {
            if photo.take_contents().is_some() {
                warn!(%id, "photo is already persisted, ignoring new contents");
            }
            if let Some(location) = photo.location {
                check_location(&location)?;
            }
            return Ok(match self.store.update_metadata(id, photo.metadata())? {
                Some(_) => Saved::Updated(id),
                None => Saved::NotFound(id),
            });
        }

        let contents = photo
            .contents()
            .ok_or_else(|| PhotoError::InvalidArgument("photo has no contents".to_string()))?;

        let location = match (self.gps_reader.extract_gps(contents), photo.location) {
            (Ok(extracted), None) => extracted,
            (Ok(_) | Err(ExifError::NoLocationData), Some(explicit)) => explicit,
            (Err(err), _) => return Err(err.into()),
        };
        check_location(&location)?;
        let mut metadata = photo.metadata();
        metadata.location = Some(location);
        let id = self.store.put(contents, metadata)?;

        photo.location = Some(location);
        photo.take_contents();
        photo.assign_id(id);
        debug!(%id, "stored new photo");

        Ok(Saved::Created(id))
    }

    /// Stores a new photo. See [`save`](Self::save) for how its location is
    /// determined.
    pub fn ingest(
        &self,
        payload: Vec<u8>,
        location: Option<Location>,
        place: PlaceRef,
    ) -> Result<Photo> {
        let mut photo = Photo::new(payload);
        photo.location = location;
        photo.place = place;
        self.save(&mut photo)?;
        Ok(photo)
    }

    /// Looks up a photo without fetching its contents
    pub fn retrieve(&self, id: ObjectId) -> Result<Option<Photo>> {
        Ok(self.store.info(id)?.map(Photo::from))
    }

    /// Reads the stored contents of a photo
    pub fn fetch_payload(&self, id: ObjectId) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(id)?.map(|(payload, _)| payload))
    }

    /// Finds the place closest to where the photo was taken within
    /// `max_distance` meters
    pub fn resolve_nearest_place(
        &self,
        photo: &Photo,
        max_distance: f64,
    ) -> Result<Option<ObjectId>> {
        let location = photo.location.ok_or_else(|| {
            PhotoError::InvalidArgument("photo does not have a location".to_string())
        })?;
        Ok(self.geo_index.nearest_within(&location, max_distance)?)
    }

    /// Resolves the nearest place and assigns it to the photo. Persisted
    /// photos are saved afterwards. If no place is within `max_distance`, the
    /// photo's place is left unchanged.
    pub fn assign_nearest_place(
        &self,
        photo: &mut Photo,
        max_distance: f64,
    ) -> Result<Option<ObjectId>> {
        let Some(place) = self.resolve_nearest_place(photo, max_distance)? else {
            return Ok(None);
        };
        photo.place = place.into();
        if photo.is_persisted() {
            self.save(photo)?;
        }
        Ok(Some(place))
    }

    /// Deletes a photo and its contents. Returns `false` if there was no such
    /// photo.
    pub fn delete(&self, id: ObjectId) -> Result<bool> {
        Ok(self.store.delete(id)?.is_some())
    }

    /// Enumerates photos in the order they were stored
    pub fn list(&self, skip: usize, limit: Option<usize>) -> Result<Vec<Photo>> {
        Ok(self
            .store
            .list(skip, limit)?
            .into_iter()
            .map(Photo::from)
            .collect())
    }

    /// Returns all photos referencing the given place
    pub fn list_by_place(&self, place: ObjectId) -> Result<Vec<Photo>> {
        Ok(self
            .store
            .find(&Predicate::Place(place))?
            .into_iter()
            .map(Photo::from)
            .collect())
    }
}

fn check_location(location: &Location) -> Result<()> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(PhotoError::InvalidArgument(format!(
            "invalid location (lat: {}, lng: {})",
            location.lat, location.lng
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assertor::{assert_that, OptionAssertion, VecAssertion};
    use pretty_assertions::assert_eq;
    use tempdir::TempDir;

    use crate::{
        error::{PhotoError, StorageError},
        geo_index::GeoIndex,
        gps::{
            test_images::{jpeg_with_gps, jpeg_without_gps},
            ExifGpsReader,
        },
        storage::{
            memory::MemoryStore, rocksdb::RocksDBStore, ChunkStore, FileInfo, Metadata,
            Predicate, DEFAULT_CHUNK_SIZE,
        },
        Location, ObjectId, Photo, PlaceRef,
    };

    use super::{PhotoService, Saved};

    const METERS_PER_DEGREE: f64 = 6_371_008.8 * std::f64::consts::PI / 180.0;

    fn service() -> PhotoService<MemoryStore, ExifGpsReader> {
        PhotoService::new(
            MemoryStore::new(1024).unwrap(),
            ExifGpsReader,
            Arc::new(GeoIndex::default()),
        )
    }

    fn assert_close(actual: Location, expected: Location) {
        assert!(
            (actual.lat - expected.lat).abs() < 1e-6 && (actual.lng - expected.lng).abs() < 1e-6,
            "expected {expected:?} but got {actual:?}"
        );
    }

    #[test]
    fn ingest_large_jpeg_with_gps() {
        let dir = TempDir::new("photogrid_service").unwrap();
        let store = RocksDBStore::new(dir.path().to_str().unwrap(), DEFAULT_CHUNK_SIZE).unwrap();
        let service = PhotoService::new(store, ExifGpsReader, Arc::new(GeoIndex::default()));

        let payload = jpeg_with_gps(37.7749, -122.4194, 1024 * 1024);
        let photo = service
            .ingest(payload.clone(), None, PlaceRef::Unset)
            .unwrap();

        let id = photo.id().unwrap();
        assert_close(photo.location.unwrap(), Location::new(37.7749, -122.4194));

        let stored = service.retrieve(id).unwrap().unwrap();
        assert_eq!(stored.location, photo.location);
        assert_eq!(service.fetch_payload(id).unwrap().unwrap(), payload);
        assert_eq!(service.store().info(id).unwrap().unwrap().chunk_count, 5);
    }

    #[test]
    fn ingest_without_location_fails() {
        let service = service();
        let err = service
            .ingest(jpeg_without_gps(), None, PlaceRef::Unset)
            .unwrap_err();
        assert!(matches!(err, PhotoError::NoLocationData));
        assert_that!(service.list(0, None).unwrap()).is_empty();
    }

    #[test]
    fn explicit_location_wins() {
        let service = service();
        let explicit = Location::new(50.1109, 8.6821);

        let photo = service
            .ingest(jpeg_without_gps(), Some(explicit), PlaceRef::Unset)
            .unwrap();
        assert_eq!(photo.location, Some(explicit));

        let photo = service
            .ingest(jpeg_with_gps(37.7749, -122.4194, 0), Some(explicit), PlaceRef::Unset)
            .unwrap();
        assert_eq!(photo.location, Some(explicit));
        assert_eq!(
            service.retrieve(photo.id().unwrap()).unwrap().unwrap().location,
            Some(explicit)
        );
    }

    #[test]
    fn undecodable_payload_fails_even_with_location() {
        let service = service();
        let err = service
            .ingest(
                b"not a jpeg".to_vec(),
                Some(Location::new(1.0, 2.0)),
                PlaceRef::Unset,
            )
            .unwrap_err();
        assert!(matches!(err, PhotoError::Decode(_)));
        assert_that!(service.list(0, None).unwrap()).is_empty();
    }

    #[test]
    fn invalid_explicit_location() {
        let service = service();
        let err = service
            .ingest(
                jpeg_without_gps(),
                Some(Location::new(100.0, 0.0)),
                PlaceRef::Unset,
            )
            .unwrap_err();
        assert!(matches!(err, PhotoError::InvalidArgument(_)));
    }

    #[test]
    fn resave_with_invalid_location() {
        let service = service();
        let mut photo = service
            .ingest(jpeg_with_gps(1.0, 2.0, 0), None, PlaceRef::Unset)
            .unwrap();
        let id = photo.id().unwrap();

        for location in [Location::new(100.0, 0.0), Location::new(0.0, f64::NAN)] {
            photo.location = Some(location);
            assert!(matches!(
                service.save(&mut photo),
                Err(PhotoError::InvalidArgument(_))
            ));
        }
        assert_close(
            service.retrieve(id).unwrap().unwrap().location.unwrap(),
            Location::new(1.0, 2.0),
        );
    }

    #[test]
    fn saved_photo_does_not_keep_contents() {
        let service = service();
        let place = ObjectId::generate();
        let origin = Location::new(50.0, 8.0);
        service.geo_index().upsert(place, origin).unwrap();

        let payload = jpeg_with_gps(origin.lat, origin.lng, 5000);
        let mut photo = service.ingest(payload.clone(), None, PlaceRef::Unset).unwrap();
        assert_that!(photo.contents()).is_none();

        assert_eq!(
            service.assign_nearest_place(&mut photo, 10.0).unwrap(),
            Some(place)
        );
        assert_that!(photo.contents()).is_none();
        assert_eq!(service.fetch_payload(photo.id().unwrap()).unwrap().unwrap(), payload);
    }

    #[test]
    fn transient_photo_without_contents() {
        let service = service();
        let mut photo = Photo::default();
        assert!(matches!(
            service.save(&mut photo),
            Err(PhotoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn resave_only_updates_metadata() {
        let service = service();
        let payload = jpeg_with_gps(37.7749, -122.4194, 5000);
        let mut photo = service.ingest(payload.clone(), None, PlaceRef::Unset).unwrap();
        let id = photo.id().unwrap();

        let place = ObjectId::generate();
        photo.place = place.into();
        photo.location = Some(Location::new(1.0, 2.0));
        photo.set_contents(jpeg_with_gps(10.0, 10.0, 10));

        assert_eq!(service.save(&mut photo).unwrap(), Saved::Updated(id));
        assert_eq!(photo.id(), Some(id));
        assert_that!(photo.contents()).is_none();

        assert_eq!(service.fetch_payload(id).unwrap().unwrap(), payload);
        let stored = service.retrieve(id).unwrap().unwrap();
        assert_eq!(stored.place, PlaceRef::ById(place));
        assert_eq!(stored.location, Some(Location::new(1.0, 2.0)));
        assert_that!(service.list(0, None).unwrap()).has_length(1);
    }

    #[test]
    fn save_deleted_photo() {
        let service = service();
        let mut photo = service
            .ingest(jpeg_with_gps(1.0, 2.0, 0), None, PlaceRef::Unset)
            .unwrap();
        let id = photo.id().unwrap();
        assert!(service.delete(id).unwrap());

        assert_eq!(service.save(&mut photo).unwrap(), Saved::NotFound(id));
        assert_that!(service.retrieve(id).unwrap()).is_none();
    }

    #[test]
    fn delete() {
        let service = service();
        let photo = service
            .ingest(jpeg_with_gps(1.0, 2.0, 3000), None, PlaceRef::Unset)
            .unwrap();
        let id = photo.id().unwrap();

        assert!(service.delete(id).unwrap());
        assert_that!(service.fetch_payload(id).unwrap()).is_none();
        assert_that!(service.retrieve(id).unwrap()).is_none();
        assert!(!service.delete(id).unwrap());
        assert_eq!(service.store().total_chunks(), 0);
    }

    #[test]
    fn nearest_place() {
        let service = service();
        let near = ObjectId::generate();
        let far = ObjectId::generate();
        let origin = Location::new(50.1109, 8.6821);
        service
            .geo_index()
            .upsert(near, Location::new(origin.lat + 50.0 / METERS_PER_DEGREE, origin.lng))
            .unwrap();
        service
            .geo_index()
            .upsert(far, Location::new(origin.lat + 200.0 / METERS_PER_DEGREE, origin.lng))
            .unwrap();

        let mut photo = service
            .ingest(jpeg_without_gps(), Some(origin), PlaceRef::Unset)
            .unwrap();

        assert_eq!(service.resolve_nearest_place(&photo, 100.0).unwrap(), Some(near));
        assert_that!(service.resolve_nearest_place(&photo, 40.0).unwrap()).is_none();

        assert_that!(service.assign_nearest_place(&mut photo, 40.0).unwrap()).is_none();
        assert_eq!(photo.place, PlaceRef::Unset);

        assert_eq!(
            service.assign_nearest_place(&mut photo, 100.0).unwrap(),
            Some(near)
        );
        let id = photo.id().unwrap();
        assert_eq!(
            service.retrieve(id).unwrap().unwrap().place,
            PlaceRef::ById(near)
        );
        let by_place = service.list_by_place(near).unwrap();
        assert_eq!(by_place.iter().map(|p| p.id()).collect::<Vec<_>>(), vec![Some(id)]);
        assert_that!(service.list_by_place(far).unwrap()).is_empty();
    }

    #[test]
    fn nearest_place_requires_location() {
        let service = service();
        let photo = Photo::new(vec![]);
        assert!(matches!(
            service.resolve_nearest_place(&photo, 100.0),
            Err(PhotoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn list_pages() {
        let service = service();
        let ids = (0..4)
            .map(|i| {
                service
                    .ingest(jpeg_with_gps(i as f64, 0.0, 0), None, PlaceRef::Unset)
                    .unwrap()
                    .id()
                    .unwrap()
            })
            .collect::<Vec<_>>();
        let mut sorted = ids.clone();
        sorted.sort();

        let all = service.list(0, None).unwrap();
        assert_eq!(all.iter().filter_map(Photo::id).collect::<Vec<_>>(), sorted);
        let page = service.list(1, Some(2)).unwrap();
        assert_eq!(
            page.iter().filter_map(Photo::id).collect::<Vec<_>>(),
            sorted[1..3].to_vec()
        );
    }

    #[test]
    fn concurrent_ingest() {
        let service = service();
        std::thread::scope(|s| {
            for i in 0..8 {
                let service = &service;
                s.spawn(move || {
                    for j in 0..10 {
                        service
                            .ingest(
                                jpeg_with_gps(i as f64, j as f64, 2000),
                                None,
                                PlaceRef::Unset,
                            )
                            .unwrap();
                    }
                });
            }
        });
        assert_that!(service.list(0, None).unwrap()).has_length(80);
    }

    /// A store whose writes always fail
    struct BrokenStore;

    impl ChunkStore for BrokenStore {
        fn put(&self, _: &[u8], _: Metadata) -> crate::storage::Result<ObjectId> {
            Err(StorageError::Decode("substrate unavailable".to_string()))
        }

        fn get(&self, _: ObjectId) -> crate::storage::Result<Option<(Vec<u8>, FileInfo)>> {
            Ok(None)
        }

        fn info(&self, _: ObjectId) -> crate::storage::Result<Option<FileInfo>> {
            Ok(None)
        }

        fn update_metadata(
            &self,
            _: ObjectId,
            _: Metadata,
        ) -> crate::storage::Result<Option<FileInfo>> {
            Ok(None)
        }

        fn delete(&self, _: ObjectId) -> crate::storage::Result<Option<FileInfo>> {
            Ok(None)
        }

        fn list(&self, _: usize, _: Option<usize>) -> crate::storage::Result<Vec<FileInfo>> {
            Ok(vec![])
        }

        fn find(&self, _: &Predicate) -> crate::storage::Result<Vec<FileInfo>> {
            Ok(vec![])
        }
    }

    #[test]
    fn storage_errors_propagate() {
        let service = PhotoService::new(BrokenStore, ExifGpsReader, Arc::new(GeoIndex::default()));
        let mut photo = Photo::new(jpeg_with_gps(1.0, 2.0, 0));
        assert!(matches!(
            service.save(&mut photo),
            Err(PhotoError::Storage(_))
        ));
        assert_that!(photo.id()).is_none();
    }
}
