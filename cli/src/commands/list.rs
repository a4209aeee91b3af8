use anyhow::Result;
use clap::Args;
use humantime::format_rfc3339_seconds;
use photogrid_core::{config::Config, ObjectId, Photo};
use tracing::warn;
use yansi::Paint;

use crate::places::TomlPlaceDirectory;

use super::{format_location, open_service};

/// List stored photos
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Number of photos to skip
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Maximum number of photos to list
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only list photos of this place
    #[arg(long)]
    pub place: Option<ObjectId>,
}

/// Run the `list` command
pub fn run_list(args: ListArgs, config: &Config) -> Result<()> {
    let (service, _) = open_service(config, false)?;

    // place names are optional decoration
    let directory = match config.places.file {
        Some(_) => match TomlPlaceDirectory::from_config(config) {
            Ok(d) => Some(d),
            Err(err) => {
                warn!("unable to load places: {err:#}");
                None
            }
        },
        None => None,
    };

    let photos: Vec<Photo> = match args.place {
        Some(place) => service
            .list_by_place(place)?
            .into_iter()
            .skip(args.skip)
            .take(args.limit.unwrap_or(usize::MAX))
            .collect(),
        None => service.list(args.skip, args.limit)?,
    };

    for photo in photos {
        let Some(id) = photo.id() else {
            continue;
        };

        let place = match (&directory, photo.place.id()) {
            (_, None) => "-".to_string(),
            (Some(directory), Some(place_id)) => match photo.place.resolve(directory)? {
                Some(place) => directory
                    .name(place.id)
                    .map(|n| format!("{place_id} ({n})"))
                    .unwrap_or_else(|| place_id.to_string()),
                None => format!("{place_id} (unknown)"),
            },
            (None, Some(place_id)) => place_id.to_string(),
        };

        println!(
            "{}\t{}\t{}\t{}",
            id.green(),
            format_rfc3339_seconds(id.timestamp()),
            format_location(photo.location),
            place
        );
    }

    Ok(())
}
