//! TileScene CLI - headless driver for the tile lifecycle core
//!
//! Options come from an INI file (`--config`, or
//! `<config dir>/tilescene/tilescene.ini` when present); the scene
//! description is a JSON file given per command.

mod builder;
mod commands;
mod error;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use commands::common::{load_options_file, logging_config, parse_pair, scene_options};
use commands::run::RunArgs;
use commands::validate::ValidateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilescene")]
#[command(version = tilescene::VERSION)]
#[command(about = "Drive a tiled vector map scene without a GPU", long_about = None)]
struct Cli {
    /// Options file (INI)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `tilescene=trace` (overrides the options file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load tiles along a zoom path, rebuild once and print telemetry
    Run {
        /// Scene description (JSON)
        scene: PathBuf,

        /// Tile source name
        #[arg(long, default_value = "grid")]
        source: String,

        /// Tile source URL template
        #[arg(long, default_value = "")]
        url: String,

        /// Highest zoom the source provides
        #[arg(long)]
        max_zoom: Option<u8>,

        /// Number of workers (overrides the options file)
        #[arg(long)]
        workers: Option<usize>,

        /// Camera center as `lng,lat`
        #[arg(long, default_value = "-74.0,40.7", value_parser = parse_pair, allow_hyphen_values = true)]
        center: (f64, f64),

        /// Starting zoom
        #[arg(long, default_value_t = 12.0)]
        zoom_from: f64,

        /// Final zoom
        #[arg(long, default_value_t = 14.0)]
        zoom_to: f64,

        /// Zoom steps between start and end
        #[arg(long, default_value_t = 4)]
        steps: u32,

        /// Viewport size as `width,height` in CSS pixels
        #[arg(long, default_value = "1024,768", value_parser = parse_pair)]
        size: (f64, f64),

        /// Pick the feature under `x,y` after the rebuild
        #[arg(long, value_parser = parse_pair)]
        pick: Option<(f64, f64)>,

        /// Grid cells per tile side
        #[arg(long, default_value_t = builder::DEFAULT_GRID_CELLS)]
        cells: u32,

        /// Main loop interval in milliseconds
        #[arg(long, default_value_t = 16)]
        frame_ms: u64,

        /// Seconds to wait for each step to settle
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Check a scene description against the options
    Validate {
        /// Scene description (JSON)
        scene: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let ini = load_options_file(cli.config.as_deref())?;
    let logging = logging_config(ini.as_ref(), cli.log_level.as_deref())?;
    let _guard = tilescene::logging::init(&logging)?;
    let options = scene_options(ini.as_ref())?;

    match cli.command {
        Commands::Run {
            scene,
            source,
            url,
            max_zoom,
            workers,
            center,
            zoom_from,
            zoom_to,
            steps,
            size,
            pick,
            cells,
            frame_ms,
            timeout,
        } => {
            let args = RunArgs {
                scene,
                source,
                url,
                max_zoom,
                workers,
                center,
                zoom_from,
                zoom_to,
                steps,
                size,
                pick,
                cells,
                frame_interval: Duration::from_millis(frame_ms),
                timeout: Duration::from_secs(timeout),
            };
            commands::run::run(args, options).await
        }
        Commands::Validate { scene } => {
            commands::validate::run(ValidateArgs { scene }, &options)
        }
    }
}
