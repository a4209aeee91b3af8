//! An index over place locations that answers "nearest place within radius"
//! queries.
//!
//! Places are bucketed into H3 cells (<https://h3geo.org/>) of a fixed
//! resolution. To answer a query, the index visits all cells within a number
//! of rings around the cell containing the query point. The number of rings
//! is chosen so that the visited cells completely cover the query radius,
//! even though H3 cells vary in size across the globe. Every candidate found
//! in these cells is then checked with its exact great-circle distance. If a
//! radius is so large that the number of rings would exceed a configured
//! maximum, the index falls back to checking all places.
//!
//! If two places have exactly the same distance to the query point, the one
//! with the smaller [`ObjectId`] wins.

use std::cmp::Ordering;

use h3o::{CellIndex, LatLng, Resolution};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{Location, ObjectId};

/// Default H3 resolution (average hexagon edge length of about 200m)
pub const DEFAULT_RESOLUTION: Resolution = Resolution::Nine;

/// Default maximum number of rings visited before falling back to a linear
/// scan
pub const DEFAULT_MAX_RINGS: u32 = 64;

/// A place with a fixed location. Places are managed by a [`PlaceDirectory`].
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub id: ObjectId,
    pub location: Location,
}

impl Place {
    pub fn new(id: ObjectId, location: Location) -> Self {
        Self { id, location }
    }
}

/// Supplies places to the index and resolves place references
pub trait PlaceDirectory {
    /// Returns all known places
    fn places(&self) -> anyhow::Result<Vec<Place>>;

    /// Looks up a single place by ID
    fn find(&self, id: ObjectId) -> anyhow::Result<Option<Place>>;
}

/// Invalid input to the [`GeoIndex`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoIndexError {
    #[error("invalid location (lat: {}, lng: {})", .0.lat, .0.lng)]
    InvalidLocation(Location),

    #[error("invalid maximum distance {0}. Distance must be a non-negative number")]
    InvalidDistance(f64),
}

#[derive(Debug, Default)]
struct Inner {
    places: FxHashMap<ObjectId, (Location, CellIndex)>,
    cells: FxHashMap<CellIndex, FxHashSet<ObjectId>>,
}

/// An index of place locations. All methods take `&self`, so the index can
/// be shared between threads.
#[derive(Debug)]
pub struct GeoIndex {
    resolution: Resolution,
    max_rings: u32,
    inner: RwLock<Inner>,
}

impl Default for GeoIndex {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION, DEFAULT_MAX_RINGS)
    }
}

/// Orders candidates by distance and then by ID
fn closer(a: &(f64, ObjectId), b: &(f64, ObjectId)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

fn to_lat_lng(location: &Location) -> Result<LatLng, GeoIndexError> {
    if !location.is_valid() {
        return Err(GeoIndexError::InvalidLocation(*location));
    }
    LatLng::try_from(*location).map_err(|_| GeoIndexError::InvalidLocation(*location))
}

impl GeoIndex {
    pub fn new(resolution: Resolution, max_rings: u32) -> Self {
        Self {
            resolution,
            max_rings,
            inner: RwLock::default(),
        }
    }

    /// Number of indexed places
    pub fn len(&self) -> usize {
        self.inner.read().places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a place or replaces its location if it is already indexed
    pub fn upsert(&self, id: ObjectId, location: Location) -> Result<(), GeoIndexError> {
        let cell = to_lat_lng(&location)?.to_cell(self.resolution);

        let mut inner = self.inner.write();
        if let Some((_, old_cell)) = inner.places.insert(id, (location, cell)) {
            if let Some(ids) = inner.cells.get_mut(&old_cell) {
                ids.remove(&id);
                if ids.is_empty() {
                    inner.cells.remove(&old_cell);
                }
            }
        }
        inner.cells.entry(cell).or_default().insert(id);

        Ok(())
    }

    /// Removes a place from the index. Returns `false` if it was not indexed.
    pub fn remove(&self, id: ObjectId) -> bool {
        let mut inner = self.inner.write();
        let Some((_, cell)) = inner.places.remove(&id) else {
            return false;
        };
        if let Some(ids) = inner.cells.get_mut(&cell) {
            ids.remove(&id);
            if ids.is_empty() {
                inner.cells.remove(&cell);
            }
        }
        true
    }

    /// Indexes all places of the given directory. Returns the number of
    /// places added.
    pub fn populate<D>(&self, directory: &D) -> anyhow::Result<usize>
    where
        D: PlaceDirectory + ?Sized,
    {
        let places = directory.places()?;
        let count = places.len();
        for place in places {
            self.upsert(place.id, place.location)?;
        }
        debug!(count, "populated place index");
        Ok(count)
    }

    /// Finds the place closest to `location` whose distance is at most
    /// `max_distance` meters. Returns `None` if there is no such place.
    pub fn nearest_within(
        &self,
        location: &Location,
        max_distance: f64,
    ) -> Result<Option<ObjectId>, GeoIndexError> {
        if !max_distance.is_finite() || max_distance < 0.0 {
            return Err(GeoIndexError::InvalidDistance(max_distance));
        }
        let origin = to_lat_lng(location)?.to_cell(self.resolution);

        let inner = self.inner.read();
        let result = match self.rings_for(max_distance) {
            Some(k) => {
                let disk = origin.grid_disk::<Vec<_>>(k);
                trace!(rings = k, cells = disk.len(), "querying place index");
                disk.iter()
                    .filter_map(|cell| inner.cells.get(cell))
                    .flatten()
                    .filter_map(|id| {
                        let d = inner.places[id].0.distance_to(location);
                        (d <= max_distance).then_some((d, *id))
                    })
                    .min_by(closer)
            }

            None => {
                debug!(max_distance, "radius too large for grid, scanning all places");
                Self::scan(&inner, location, max_distance)
            }
        };

        Ok(result.map(|(_, id)| id))
    }

    /// Checks every indexed place
    fn scan(inner: &Inner, location: &Location, max_distance: f64) -> Option<(f64, ObjectId)> {
        inner
            .places
            .iter()
            .filter_map(|(id, (l, _))| {
                let d = l.distance_to(location);
                (d <= max_distance).then_some((d, *id))
            })
            .min_by(closer)
    }

    /// Calculates how many rings around a cell have to be visited to cover
    /// `max_distance`. Returns `None` if this number exceeds the configured
    /// maximum.
    ///
    /// A point within `max_distance` of the query lies in a cell whose center
    /// is at most `max_distance + 2 * edge` away from the center of the query
    /// cell (a hexagon's circumradius equals its edge length). Two cells `k`
    /// rings apart have centers at least `1.5 * edge * k` apart. Cell sizes
    /// differ across the globe, so we assume edges between half and twice the
    /// average edge length.
    fn rings_for(&self, max_distance: f64) -> Option<u32> {
        let avg_edge = self.resolution.edge_length_m();
        let min_edge = avg_edge / 2.0;
        let max_edge = avg_edge * 2.0;
        let k = ((max_distance + 2.0 * max_edge) / (1.5 * min_edge)).ceil();
        (k <= self.max_rings as f64).then_some(k as u32)
    }
}
