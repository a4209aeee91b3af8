use anyhow::Result;
use clap::Args;
use photogrid_core::{config::Config, ObjectId, PlaceRef, Saved};

use super::{location_arg, open_service, CommandError};

/// Update the metadata of a stored photo. Contents are never changed.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// The photo's ID
    pub id: ObjectId,

    /// New latitude
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// New longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,

    /// ID of the place to assign
    #[arg(long, conflicts_with_all = ["clear_place", "nearest"])]
    pub place: Option<ObjectId>,

    /// Remove the photo's place
    #[arg(long, conflicts_with = "nearest")]
    pub clear_place: bool,

    /// Assign the nearest place from the places file
    #[arg(long)]
    pub nearest: bool,

    /// Radius in meters for --nearest (defaults to `places.max_distance')
    #[arg(long, requires = "nearest")]
    pub max_distance: Option<f64>,
}

/// Run the `update` command
pub fn run_update(args: UpdateArgs, config: &Config) -> Result<()> {
    let (service, _directory) = open_service(config, args.nearest)?;

    let mut photo = service
        .retrieve(args.id)?
        .ok_or(CommandError::PhotoNotFound(args.id))?;

    if let Some(location) = location_arg(args.lat, args.lng) {
        photo.location = Some(location);
    }
    if let Some(place) = args.place {
        photo.place = place.into();
    }
    if args.clear_place {
        photo.place = PlaceRef::Unset;
    }

    if args.nearest {
        let max_distance = args.max_distance.unwrap_or(config.places.max_distance);
        match service.resolve_nearest_place(&photo, max_distance)? {
            Some(place) => photo.place = place.into(),
            None => eprintln!("No place within {max_distance}m"),
        }
    }

    match service.save(&mut photo)? {
        Saved::Updated(id) | Saved::Created(id) => {
            eprintln!("Updated {id}");
            Ok(())
        }
        Saved::NotFound(id) => Err(CommandError::PhotoNotFound(id).into()),
    }
}
