use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use pog::pipeline::Stage;
use pog::pyramid::{Compression, PixelType};
use pog::validate::FullCheck;

#[derive(Parser, Debug)]
#[command(name = "pog")]
#[command(author, version, about = "Validate and build pyramidal cloud-optimized GeoTIFFs", long_about = None)]
pub struct Cli {
    /// More logging (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the byte layout of a cloud-optimized GeoTIFF
    Validate {
        path: PathBuf,
        /// Print nothing; only the exit code reports the outcome
        #[arg(short, long)]
        quiet: bool,
        /// Walk every block to verify leaders, trailers and masks
        #[arg(long, value_enum, default_value_t = FullCheckArg::Auto)]
        full_check: FullCheckArg,
    },
    /// Check whether a raster follows the pyramid conventions
    Check {
        path: PathBuf,
        /// Include the block-level structural walk
        #[arg(long)]
        exhaustive: bool,
        #[arg(short, long)]
        quiet: bool,
    },
    /// Make a raster pyramid-compliant
    Convert {
        input: PathBuf,
        /// Write here instead of replacing the input
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Target pixel type, e.g. Byte, UInt16, Float32
        #[arg(long)]
        pixel_type: Option<PixelType>,
        /// Pixels below this value become no-data
        #[arg(long, allow_negative_numbers = true)]
        no_data_floor: Option<f64>,
        #[arg(long, default_value_t = Compression::Zstd)]
        compression: Compression,
        /// Stage to leave out; repeatable
        #[arg(long = "skip", value_name = "STAGE")]
        skip: Vec<Stage>,
    },
    /// Convert many rasters, one worker process per file
    Batch {
        /// Number of concurrent workers
        #[arg(short, long, default_value_t = default_jobs())]
        jobs: usize,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the pyramid level table
    Levels,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FullCheckArg {
    Yes,
    No,
    Auto,
}

impl From<FullCheckArg> for FullCheck {
    fn from(arg: FullCheckArg) -> Self {
        match arg {
            FullCheckArg::Yes => FullCheck::Yes,
            FullCheckArg::No => FullCheck::No,
            FullCheckArg::Auto => FullCheck::Auto,
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
