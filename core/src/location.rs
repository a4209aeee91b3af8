use geo::{HaversineDistance, Point};
use h3o::LatLng;

/// A geographic point in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Checks if both coordinates are finite and within their valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance to `other` in meters
    pub fn distance_to(&self, other: &Location) -> f64 {
        Point::from(*self).haversine_distance(&Point::from(*other))
    }
}

impl From<Location> for Point {
    fn from(value: Location) -> Self {
        Point::new(value.lng, value.lat)
    }
}

impl From<Point> for Location {
    fn from(value: Point) -> Self {
        Location::new(value.y(), value.x())
    }
}

impl TryFrom<Location> for LatLng {
    type Error = h3o::error::InvalidLatLng;

    fn try_from(value: Location) -> Result<Self, Self::Error> {
        LatLng::new(value.lat, value.lng)
    }
}
