use anyhow::Result;
use clap::Args;
use photogrid_core::{config::Config, Location};
use yansi::Paint;

use crate::places::TomlPlaceDirectory;

/// Find the place nearest to a location
#[derive(Args, Debug)]
pub struct NearestArgs {
    /// Latitude of the location
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the location
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// Search radius in meters (defaults to `places.max_distance')
    #[arg(long)]
    pub max_distance: Option<f64>,
}

/// Run the `nearest` command
pub fn run_nearest(args: NearestArgs, config: &Config) -> Result<()> {
    let directory = TomlPlaceDirectory::from_config(config)?;
    let geo_index = config.geo_index.build()?;
    geo_index.populate(&directory)?;

    let location = Location::new(args.lat, args.lng);
    let max_distance = args.max_distance.unwrap_or(config.places.max_distance);

    match geo_index.nearest_within(&location, max_distance)? {
        Some(id) => {
            let name = directory.name(id).unwrap_or("");
            println!("{}\t{}", id.green(), name);
        }
        None => eprintln!("No place within {max_distance}m"),
    }

    Ok(())
}
