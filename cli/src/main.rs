use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use commands::{
    delete::{run_delete, DeleteArgs},
    get::{run_get, GetArgs},
    import::{run_import, ImportArgs},
    list::{run_list, ListArgs},
    nearest::{run_nearest, NearestArgs},
    update::{run_update, UpdateArgs},
};
use photogrid_core::config::Config;
use tracing_subscriber::EnvFilter;
use yansi::{Condition, Paint};

mod commands;
mod places;

#[derive(Parser, Debug)]
#[command(author, version)]
struct Cli {
    /// Configuration file (defaults to `photogrid.toml' in the current
    /// directory if it exists)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Import(ImportArgs),
    Get(GetArgs),
    List(ListArgs),
    Update(UpdateArgs),
    Delete(DeleteArgs),
    Nearest(NearestArgs),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Import(args) => run_import(args, &config),
        Commands::Get(args) => run_get(args, &config),
        Commands::List(args) => run_list(args, &config),
        Commands::Update(args) => run_update(args, &config),
        Commands::Delete(args) => run_delete(args, &config),
        Commands::Nearest(args) => run_nearest(args, &config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    yansi::whenever(Condition::from(|| {
        Condition::stderr_is_tty() && Condition::clicolor() && Condition::no_color()
    }));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
