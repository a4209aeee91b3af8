use std::sync::Arc;

use anyhow::{Context, Result};
use photogrid_core::{
    config::Config, gps::ExifGpsReader, storage::rocksdb::RocksDBStore, Location, ObjectId,
    PhotoService,
};
use thiserror::Error;

use crate::places::TomlPlaceDirectory;

pub mod delete;
pub mod get;
pub mod import;
pub mod list;
pub mod nearest;
pub mod update;

pub type Service = PhotoService<RocksDBStore, ExifGpsReader>;

/// An error that happened while running a command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("photo `{0}' not found")]
    PhotoNotFound(ObjectId),
}

/// Opens the configured store. If `with_places` is `true`, the configured
/// places file is loaded and indexed.
pub fn open_service(
    config: &Config,
    with_places: bool,
) -> Result<(Service, Option<TomlPlaceDirectory>)> {
    let store = config
        .open_store()
        .with_context(|| format!("unable to open store at {:?}", config.store.path))?;
    let geo_index = config.geo_index.build()?;

    let directory = if with_places {
        let directory = TomlPlaceDirectory::from_config(config)?;
        geo_index.populate(&directory)?;
        Some(directory)
    } else {
        None
    };

    Ok((
        PhotoService::new(store, ExifGpsReader, Arc::new(geo_index)),
        directory,
    ))
}

/// Combines optional latitude and longitude arguments
pub fn location_arg(lat: Option<f64>, lng: Option<f64>) -> Option<Location> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Location::new(lat, lng)),
        _ => None,
    }
}

pub fn format_location(location: Option<Location>) -> String {
    match location {
        Some(l) => format!("{:.6},{:.6}", l.lat, l.lng),
        None => "-".to_string(),
    }
}
