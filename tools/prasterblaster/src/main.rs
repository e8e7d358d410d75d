use std::path::PathBuf;

use clap::Parser;
use env_logger::{Env, TimestampPrecision};

use geo::coordinator::{Config, Partitioner, run};
use geo::workgroup::{FsGroup, SoloGroup, WorkerGroup};
use geo::{Error, Resampling};

#[derive(Parser, Debug)]
#[clap(name = "prasterblaster", about = "Parallel raster reprojection")]
pub struct Opt {
    /// Destination spatial reference system (EPSG:xxxx, WKT or proj string)
    #[arg(long = "t_srs")]
    pub target_srs: Option<String>,

    /// Override the source spatial reference system
    #[arg(long = "s_srs")]
    pub source_srs: Option<String>,

    /// Resampling method
    #[arg(short = 'r', long = "resampler", default_value = "nearest", value_name = "nearest|mean")]
    pub resampler: String,

    /// Partition size budget in pixels
    #[arg(short = 'n', long = "partition-size", default_value_t = 50_000)]
    pub partition_size: usize,

    /// Fill value for pixels outside the reprojected area
    #[arg(long = "dstnodata")]
    pub dstnodata: Option<String>,

    /// Work distribution scheme
    #[arg(short = 'q', long = "partitioner", default_value = "pixel", value_name = "pixel|tiled")]
    pub partitioner: String,

    /// On-disk layout of the output raster
    #[arg(short = 'y', long = "layout", default_value = "strip", value_name = "strip|tiled")]
    pub layout: String,

    /// Tile grid used by the tiled partitioner
    #[arg(short = 'x', long = "tile-size", default_value_t = 1024)]
    pub tile_size: i32,

    /// Append per-phase timings to this file
    #[arg(short = 'c', long = "timing-file")]
    pub timing_file: Option<PathBuf>,

    /// Rank of this worker, normally provided by the parallel launcher
    #[arg(long = "rank", env = "PRB_RANK", default_value_t = 0)]
    pub rank: usize,

    /// Total number of workers, normally provided by the parallel launcher
    #[arg(long = "num-workers", env = "PRB_NUM_WORKERS", default_value_t = 1)]
    pub num_workers: usize,

    pub input: PathBuf,
    pub output: PathBuf,
}

/// Exit codes: 1 bad arguments or open failure, 2 empty footprint, 3 I/O
/// failure, 4 projection failure.
fn exit_code(err: &Error) -> i32 {
    match err {
        Error::InvalidArgument(_) | Error::OpenFailure(_) => 1,
        Error::EmptyFootprint => 2,
        Error::IOError(_) | Error::TiffError(_) | Error::Runtime(_) | Error::Invariant(_) => 3,
        Error::Projection(_) => 4,
    }
}

fn config_from_options(opt: &Opt) -> Result<Config, Error> {
    if opt.layout != "strip" {
        return Err(Error::InvalidArgument(format!(
            "Unsupported output layout '{}': parallel writes require the strip layout",
            opt.layout
        )));
    }

    let mut config = Config::new(opt.input.clone(), opt.output.clone());
    config.target_srs = opt.target_srs.clone();
    config.source_srs = opt.source_srs.clone();
    config.resampling = opt.resampler.parse::<Resampling>()?;
    config.partitioner = opt.partitioner.parse::<Partitioner>()?;
    config.partition_budget = opt.partition_size;
    config.tile_size = opt.tile_size;
    config.fill_value = opt.dstnodata.clone();
    config.timing_file = opt.timing_file.clone();
    Ok(config)
}

fn run_with_group(opt: &Opt, config: &Config) -> Result<(), Error> {
    if opt.num_workers <= 1 {
        return run(config, &SoloGroup);
    }

    let mut sync_dir = opt.output.clone().into_os_string();
    sync_dir.push(".sync");
    let group = FsGroup::new(opt.rank, opt.num_workers, &PathBuf::from(sync_dir))?;

    let result = run(config, &group);
    if result.is_ok() && group.rank() == 0 {
        group.finalize()?;
    }
    result
}

fn main() {
    let opt = Opt::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let result = config_from_options(&opt).and_then(|config| run_with_group(&opt, &config));

    if let Err(err) = result {
        log::error!("rank {}: {err}", opt.rank);
        std::process::exit(exit_code(&err));
    }
}
