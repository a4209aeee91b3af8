use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::bounded;
use humantime::format_duration;
use photogrid_core::{config::Config, ObjectId, Photo, PhotoError, PlaceRef, JPEG_CONTENT_TYPE};
use tracing::{debug, warn};
use yansi::Paint;

use super::{location_arg, open_service};

/// Import JPEG photos into the store
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Files or directories to import
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Latitude to store instead of the one found in the images
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude to store instead of the one found in the images
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,

    /// ID of the place to assign to all imported photos
    #[arg(long, conflicts_with = "nearest")]
    pub place: Option<ObjectId>,

    /// Assign the nearest place from the places file
    #[arg(long)]
    pub nearest: bool,

    /// Radius in meters for --nearest (defaults to `places.max_distance')
    #[arg(long, requires = "nearest")]
    pub max_distance: Option<f64>,
}

/// Expands directories (recursively) and keeps JPEG files only
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    fn visit(path: &Path, result: &mut Vec<PathBuf>) -> Result<()> {
        if path.is_dir() {
            let mut entries = fs::read_dir(path)
                .with_context(|| format!("unable to read directory {path:?}"))?
                .map(|e| e.map(|e| e.path()))
                .collect::<std::io::Result<Vec<_>>>()?;
            entries.sort();
            for e in entries {
                visit(&e, result)?;
            }
        } else if mime_guess::from_path(path).first_raw() == Some(JPEG_CONTENT_TYPE) {
            result.push(path.to_path_buf());
        } else {
            warn!(?path, "skipping file that is not a JPEG image");
        }
        Ok(())
    }

    let mut result = Vec::new();
    for p in paths {
        visit(p, &mut result)?;
    }
    Ok(result)
}

/// Run the `import` command
pub fn run_import(args: ImportArgs, config: &Config) -> Result<()> {
    let files = collect_files(&args.paths)?;
    let (service, _directory) = open_service(config, args.nearest)?;
    let location = location_arg(args.lat, args.lng);
    let place = PlaceRef::from(args.place);
    let max_distance = args.max_distance.unwrap_or(config.places.max_distance);
    let nearest = args.nearest;

    let import_start = Instant::now();
    let mut imported = 0;
    let mut skipped = 0;

    thread::scope(|s| -> Result<()> {
        let (path_send, path_recv) = bounded::<PathBuf>(64);
        let (result_send, result_recv) = bounded::<(PathBuf, Result<Photo>)>(64);

        // Photos are independent of each other, so reading, EXIF decoding
        // and writing can run on multiple threads
        for _ in 0..num_cpus::get() {
            let path_recv = path_recv.clone();
            let result_send = result_send.clone();
            let service = &service;
            s.spawn(move || {
                for path in path_recv {
                    let result = fs::read(&path)
                        .with_context(|| format!("unable to read {path:?}"))
                        .and_then(|payload| {
                            let mut photo = service.ingest(payload, location, place)?;
                            if nearest {
                                service.assign_nearest_place(&mut photo, max_distance)?;
                            }
                            Ok(photo)
                        });
                    if result_send.send((path, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(path_recv);
        drop(result_send);

        s.spawn(move || {
            for f in files {
                if path_send.send(f).is_err() {
                    break;
                }
            }
        });

        for (path, result) in result_recv {
            match result {
                Ok(photo) => {
                    imported += 1;
                    let id = photo.id().map(|id| id.to_string()).unwrap_or_default();
                    let place = photo.place.id().map(|id| id.to_string()).unwrap_or_default();
                    debug!(%id, ?path, "imported photo");
                    println!("{}\t{}\t{}", id.green(), path.display(), place);
                }

                Err(err) => match err.downcast_ref::<PhotoError>() {
                    // unreadable images are skipped, everything else aborts
                    Some(PhotoError::NoLocationData | PhotoError::Decode(_)) => {
                        skipped += 1;
                        eprintln!("{} {}: {err}", "skipped".yellow(), path.display());
                    }
                    _ => return Err(err.context(format!("unable to import {path:?}"))),
                },
            }
        }

        Ok(())
    })?;

    eprintln!(
        "Imported {} photos in {} ({} skipped)",
        imported,
        format_duration(Duration::from_millis(
            import_start.elapsed().as_millis() as u64
        )),
        skipped
    );

    Ok(())
}
