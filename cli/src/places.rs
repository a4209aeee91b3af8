use std::{fs, path::Path};

use anyhow::{Context, Result};
use photogrid_core::{
    config::Config,
    geo_index::{Place, PlaceDirectory},
    Location, ObjectId,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct PlacesFile {
    #[serde(default, rename = "place")]
    places: Vec<PlaceEntry>,
}

#[derive(Deserialize)]
struct PlaceEntry {
    id: String,
    name: Option<String>,
    lat: f64,
    lng: f64,
}

/// A [`PlaceDirectory`] backed by a TOML file:
///
/// ```toml
/// [[place]]
/// id = "01J2Z4T0G6K3W9X8Q5M7N1P2R4"
/// name = "Main Tower"
/// lat = 50.1125
/// lng = 8.6721
/// ```
pub struct TomlPlaceDirectory {
    places: Vec<(Place, Option<String>)>,
}

impl TomlPlaceDirectory {
    pub fn from_toml(s: &str) -> Result<Self> {
        let file: PlacesFile = toml::from_str(s).context("places file malformed")?;
        let places = file
            .places
            .into_iter()
            .map(|e| -> Result<(Place, Option<String>)> {
                let id = e.id.parse::<ObjectId>()?;
                let location = Location::new(e.lat, e.lng);
                anyhow::ensure!(
                    location.is_valid(),
                    "place `{id}' has an invalid location (lat: {}, lng: {})",
                    e.lat,
                    e.lng
                );
                Ok((Place::new(id, location), e.name))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { places })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read places file at {path:?}"))?;
        Self::from_toml(&contents).with_context(|| format!("invalid places file {path:?}"))
    }

    /// Loads the places file named in the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config
            .places
            .file
            .as_deref()
            .context("no places file configured (set `places.file')")?;
        Self::from_file(path)
    }

    pub fn name(&self, id: ObjectId) -> Option<&str> {
        self.places
            .iter()
            .find(|(p, _)| p.id == id)
            .and_then(|(_, name)| name.as_deref())
    }
}

impl PlaceDirectory for TomlPlaceDirectory {
    fn places(&self) -> Result<Vec<Place>> {
        Ok(self.places.iter().map(|(p, _)| p.clone()).collect())
    }

    fn find(&self, id: ObjectId) -> Result<Option<Place>> {
        Ok(self
            .places
            .iter()
            .find(|(p, _)| p.id == id)
            .map(|(p, _)| p.clone()))
    }
}
