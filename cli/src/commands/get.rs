use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Args;
use humantime::format_rfc3339_seconds;
use photogrid_core::{config::Config, storage::ChunkStore, ObjectId};

use super::{format_location, open_service, CommandError};

/// Retrieve the contents of a photo
#[derive(Args, Debug)]
pub struct GetArgs {
    /// The photo's ID
    pub id: ObjectId,

    /// Write the contents to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the `get` command
pub fn run_get(args: GetArgs, config: &Config) -> Result<()> {
    let (service, _) = open_service(config, false)?;

    let (payload, info) = service
        .store()
        .get(args.id)?
        .ok_or(CommandError::PhotoNotFound(args.id))?;

    match args.output {
        Some(path) => {
            fs::write(&path, &payload).with_context(|| format!("unable to write {path:?}"))?
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&payload)?;
            stdout.flush()?;
        }
    }

    eprintln!(
        "{}: {} bytes in {} chunks, uploaded {}, location {}",
        info.id,
        info.length,
        info.chunk_count,
        format_rfc3339_seconds(info.upload_date()),
        format_location(info.metadata.location)
    );

    Ok(())
}
