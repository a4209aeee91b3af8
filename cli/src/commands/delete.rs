use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use humantime::format_duration;
use photogrid_core::{config::Config, ObjectId};
use tracing::warn;

use super::open_service;

/// Delete photos from the store
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// IDs of the photos to delete
    #[arg(required = true)]
    pub ids: Vec<ObjectId>,
}

/// Run the `delete` command
pub fn run_delete(args: DeleteArgs, config: &Config) -> Result<()> {
    let (service, _) = open_service(config, false)?;

    let delete_start = Instant::now();
    let mut deleted = 0;

    for id in args.ids {
        if service.delete(id)? {
            deleted += 1;
        } else {
            warn!(%id, "photo not found");
        }
    }

    eprintln!(
        "Deleted {} photos in {}",
        deleted,
        format_duration(Duration::from_millis(
            delete_start.elapsed().as_millis() as u64
        ))
    );

    Ok(())
}
