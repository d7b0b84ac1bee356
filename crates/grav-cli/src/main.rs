//! `grav` - inspect and convert grav-encoded files

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::Io;
use grav_core::{Compression, Config};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Inspect and convert grav-encoded files.
#[derive(Parser)]
#[command(name = "grav", version)]
struct Cli {
    /// RON file with buffer settings.
    #[arg(long, global = true, value_name = "RON")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Codec of the input (and output) files; overrides the config.
    #[arg(long, global = true, value_name = "CODEC")]
    compression: Option<Compression>,

    /// Files hold Base64 text.
    #[arg(long, global = true)]
    base64: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every tagged value in a file.
    Inspect { input: PathBuf },
    /// Print the first tagged value of a file as JSON.
    ToJson {
        input: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Encode a JSON file (comments allowed) as a tree object.
    FromJson {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Re-encode a file with another codec, keeping any Base64 layer.
    Recompress {
        input: PathBuf,
        output: PathBuf,
        /// Target codec.
        #[arg(long, value_name = "CODEC")]
        to: Compression,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(compression) = cli.compression {
        config.compression = compression;
    }
    let io = Io {
        config,
        base64: cli.base64,
    };

    match cli.command {
        Command::Inspect { input } => {
            let mut ser = io.read(&input)?;
            for line in commands::inspect(&mut ser)? {
                println!("{line}");
            }
        }
        Command::ToJson { input, pretty } => {
            let mut ser = io.read(&input)?;
            println!("{}", commands::to_json(&mut ser, pretty)?);
        }
        Command::FromJson { input, output } => {
            let text = fs::read_to_string(&input)?;
            let ser = commands::from_json(&text)?;
            io.write(&output, &ser)?;
        }
        Command::Recompress { input, output, to } => {
            commands::recompress(&io, &input, &output, to)?;
        }
    }
    Ok(())
}
