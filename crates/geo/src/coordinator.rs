//! Orchestration of a full reprojection run across a worker group.

use std::io::Write;
use std::path::PathBuf;

use inf::duration::Recorder;

use crate::geotiff::{GeoTiffReader, StripWriter, TiffMetadata, create_output};
use crate::minbox::{projected_minbox, raster_minbox};
use crate::partition::{row_partition, tile_partition};
use crate::projection::Projection;
use crate::reproject::reproject_chunk;
use crate::resample::Resampling;
use crate::workgroup::WorkerGroup;
use crate::{AnyRasterChunk, Error, GeoReference, Result, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Partitioner {
    /// Full-width row strips.
    #[default]
    RowStrips,
    /// Square tiles snapped to the tile grid.
    Tiled,
}

impl std::str::FromStr for Partitioner {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pixel" => Ok(Self::RowStrips),
            "tiled" => Ok(Self::Tiled),
            _ => Err(Error::InvalidArgument(format!("Unknown partitioner '{s}'"))),
        }
    }
}

/// Configuration of one reprojection run; every worker of a group runs with
/// an identical configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Destination reference system; the source system when absent.
    pub target_srs: Option<String>,
    /// Overrides the reference system stored in the input raster.
    pub source_srs: Option<String>,
    pub resampling: Resampling,
    /// Work unit size budget in pixels.
    pub partition_budget: usize,
    pub partitioner: Partitioner,
    /// Tile grid for the tiled partitioner.
    pub tile_size: i32,
    /// Fill value for pixels outside the projected area, parsed per output
    /// pixel type; defaults to the input nodata value, or zero.
    pub fill_value: Option<String>,
    /// When set, rank 0 appends per-phase timings to this file.
    pub timing_file: Option<PathBuf>,
}

impl Config {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Config {
            input,
            output,
            target_srs: None,
            source_srs: None,
            resampling: Resampling::default(),
            partition_budget: 50_000,
            partitioner: Partitioner::default(),
            tile_size: 1024,
            fill_value: None,
            timing_file: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.partition_budget == 0 {
            return Err(Error::InvalidArgument("Partition budget must be positive".into()));
        }
        if self.tile_size <= 0 {
            return Err(Error::InvalidArgument("Tile size must be positive".into()));
        }
        if self.input == self.output {
            return Err(Error::InvalidArgument("Input and output raster must differ".into()));
        }
        Ok(())
    }
}

struct PhaseTimings {
    recorder: Recorder,
    phases: Vec<(&'static str, f64)>,
}

impl PhaseTimings {
    fn new() -> Self {
        PhaseTimings {
            recorder: Recorder::new(),
            phases: Vec::new(),
        }
    }

    fn mark(&mut self, phase: &'static str) {
        self.phases.push((phase, self.recorder.elapsed_seconds()));
        self.recorder.reset();
    }

    fn write_report(&self, path: &std::path::Path, rank: usize) -> Result<()> {
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        for (phase, seconds) in &self.phases {
            writeln!(file, "{phase},{rank},{seconds:.6}")?;
        }
        Ok(())
    }
}

/// Runs the reprojection pipeline as one member of a worker group.
///
/// Rank 0 computes the output extent and creates the output file; after the
/// creation barrier every rank opens the output for parallel writes, obtains
/// its partitions and reprojects them independently. A second barrier
/// precedes the close so that no worker leaves while others still write.
///
/// Any error is fatal to the whole group: the failing worker signals an
/// abort before propagating its error.
pub fn run(config: &Config, group: &dyn WorkerGroup) -> Result<()> {
    run_worker(config, group).inspect_err(|err| {
        log::error!("rank {}: fatal: {err}", group.rank());
        group.abort();
    })
}

fn run_worker(config: &Config, group: &dyn WorkerGroup) -> Result<()> {
    config.validate()?;
    let rank = group.rank();
    let mut timings = PhaseTimings::new();

    let mut input = GeoTiffReader::from_file(&config.input, config.source_srs.as_deref())?;
    let input_ref = input.geo_reference().clone();
    let fill_value = resolve_fill_value(config, &input_ref)?;

    // The destination reference system definition every worker agrees on.
    let target_definition = match &config.target_srs {
        Some(definition) => definition.clone(),
        None => input_ref.projection().definition().to_string(),
    };
    timings.mark("describe_input");

    if rank == 0 {
        let target_projection = Projection::from_definition(&target_definition)?;
        let output_ref = projected_minbox(&input_ref, target_projection, input_ref.pixel_size())?;
        log::info!(
            "rank 0: creating output raster {} of {} pixels",
            config.output.display(),
            output_ref.raster_size()
        );
        create_output(&config.output, &output_ref)?;
    }
    timings.mark("create_output");

    // Wait for rank 0 to finish creating the file
    group.barrier()?;

    let mut writer = StripWriter::open(&config.output)?;
    let output_ref = TiffMetadata::from_file(&config.output)?.to_georeference(Some(&target_definition))?;

    let partitions = match config.partitioner {
        Partitioner::RowStrips => row_partition(rank, group.worker_count(), output_ref.raster_size(), config.partition_budget),
        Partitioner::Tiled => tile_partition(
            rank,
            group.worker_count(),
            output_ref.raster_size(),
            config.partition_budget,
            config.tile_size,
        ),
    };
    log::info!("rank {rank}: assigned {} partitions", partitions.len());
    timings.mark("open_output");

    for window in &partitions {
        let chunk = reproject_partition(config, &mut input, &input_ref, &output_ref, window, fill_value)?;
        write_chunk(&mut writer, &chunk, window)?;
    }
    writer.finish()?;
    timings.mark("reproject");

    // All partitions written; synchronize before close.
    group.barrier()?;

    if rank == 0 {
        if let Some(timing_file) = &config.timing_file {
            timings.mark("total");
            timings.write_report(timing_file, rank)?;
        }
        log::info!("rank 0: reprojection finished");
    }

    Ok(())
}

fn resolve_fill_value(config: &Config, input_ref: &GeoReference) -> Result<f64> {
    match &config.fill_value {
        Some(text) => input_ref.data_type().parse_value(text),
        None => Ok(input_ref.nodata().unwrap_or(0.0)),
    }
}

/// Produces the output pixel chunk for one work unit. Work units that lie
/// outside the projected area of the input, or whose source window misses
/// the input raster entirely, are flooded with the fill value rather than
/// skipped so that every output pixel is written exactly once.
fn reproject_partition(
    config: &Config,
    input: &mut GeoTiffReader,
    input_ref: &GeoReference,
    output_ref: &GeoReference,
    window: &Window,
    fill_value: f64,
) -> Result<AnyRasterChunk> {
    let src_window = raster_minbox(output_ref, input_ref, window).map(|w| w.intersection(&input_ref.full_window()));

    match src_window {
        None => Ok(AnyRasterChunk::with_value(output_ref, window, fill_value)),
        Some(clipped) if clipped.is_empty() => Ok(AnyRasterChunk::with_value(output_ref, window, fill_value)),
        Some(clipped) => {
            let src_chunk = input.read_window(&clipped)?;
            let mut dst_chunk = AnyRasterChunk::allocate(output_ref, window);
            reproject_chunk(&src_chunk, &mut dst_chunk, fill_value, config.resampling)?;
            Ok(dst_chunk)
        }
    }
}

/// Writes a finished chunk. Full-width multi-row chunks go out as one strip
/// write; anything narrower goes out row by row as subrow writes.
fn write_chunk(writer: &mut StripWriter, chunk: &AnyRasterChunk, window: &Window) -> Result<()> {
    let full_width = window.ul.col == 0 && window.cols() == writer.columns();

    if full_width && window.rows() > 1 {
        writer.write_rows(chunk.as_bytes(), window.ul.row, window.lr().row)
    } else {
        let row_bytes = window.cols() as usize * writer.bytes_per_pixel();
        let bytes = chunk.as_bytes();
        for (index, row) in (window.ul.row..=window.lr().row).enumerate() {
            writer.write_subrow(
                &bytes[index * row_bytes..(index + 1) * row_bytes],
                row,
                window.ul.col,
                window.lr().col,
            )?;
        }
        Ok(())
    }
}

/// Convenience runner executing a whole group in one process, one thread per
/// rank. Every rank holds its own file handles and projection handles; the
/// only shared state is the barrier.
pub fn run_parallel(config: &Config, worker_count: usize) -> Result<()> {
    let groups = crate::workgroup::ThreadGroup::split(worker_count);

    std::thread::scope(|scope| {
        let handles: Vec<_> = groups
            .iter()
            .map(|group| scope.spawn(move || run(config, group)))
            .collect();

        let mut result = Ok(());
        for handle in handles {
            let worker_result = handle.join().map_err(|_| Error::Runtime("Worker thread panicked".into()))?;
            if result.is_ok() {
                result = worker_result;
            }
        }
        result
    })
}
