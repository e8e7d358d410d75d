//! End-to-end runs of the reprojection pipeline against real files.

use std::path::Path;

use crate::coordinator::{Config, Partitioner, run, run_parallel};
use crate::testutils::{create_random_pixels, create_test_raster, eqc_georeference, read_raster_bytes};
use crate::workgroup::{FsGroup, SoloGroup};
use crate::{Point, Resampling, Result};

const EQC: &str = "+proj=eqc +R=6370997";
const MOLLWEIDE: &str = "+proj=moll +R=6370997";

fn sequential_pixels(count: usize) -> Vec<u8> {
    (0..count).map(|i| (i % 251) as u8 + 1).collect()
}

fn config(input: &Path, output: &Path) -> Config {
    Config::new(input.to_path_buf(), output.to_path_buf())
}

#[test_log::test]
fn identity_reprojection_reproduces_the_input() -> Result<()> {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let output = tmp.path().join("out.tif");

    let data: Vec<u8> = (1..=16).collect();
    create_test_raster(&input, &eqc_georeference(Point::new(0.0, 4.0), 1.0, 4, 4, None), &data)?;

    run(&config(&input, &output), &SoloGroup)?;

    assert_eq!(read_raster_bytes(&output, EQC)?, data);
    Ok(())
}

#[test_log::test]
fn identity_reprojection_with_mean_resampling() -> Result<()> {
    // With identical grids every destination pixel maps onto exactly one
    // source pixel, so mean resampling must not average anything.
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let output = tmp.path().join("out.tif");

    let data: Vec<u8> = (1..=16).collect();
    create_test_raster(&input, &eqc_georeference(Point::new(0.0, 4.0), 1.0, 4, 4, None), &data)?;

    let mut cfg = config(&input, &output);
    cfg.resampling = Resampling::Mean;
    run(&cfg, &SoloGroup)?;

    assert_eq!(read_raster_bytes(&output, EQC)?, data);
    Ok(())
}

#[test_log::test]
fn two_worker_run_is_byte_identical_to_solo_run() -> Result<()> {
    // 8x8 input, partition budget of 16 pixels: four strips of two rows,
    // ranks owning strips {0, 2} and {1, 3}.
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let solo_output = tmp.path().join("solo.tif");
    let pair_output = tmp.path().join("pair.tif");

    let data = create_random_pixels(64);
    create_test_raster(&input, &eqc_georeference(Point::new(0.0, 8000.0), 1000.0, 8, 8, None), &data)?;

    let mut cfg = config(&input, &solo_output);
    cfg.partition_budget = 16;
    cfg.target_srs = Some(MOLLWEIDE.into());
    run(&cfg, &SoloGroup)?;

    cfg.output = pair_output.clone();
    run_parallel(&cfg, 2)?;

    assert_eq!(
        std::fs::read(&solo_output)?,
        std::fs::read(&pair_output)?,
        "parallel run must be byte-identical to the solo run"
    );
    Ok(())
}

#[test_log::test]
fn worker_counts_beyond_the_strip_count_are_equivalent() -> Result<()> {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let solo_output = tmp.path().join("solo.tif");
    let many_output = tmp.path().join("many.tif");

    let data = sequential_pixels(6 * 5);
    create_test_raster(&input, &eqc_georeference(Point::new(0.0, 6000.0), 1000.0, 6, 5, None), &data)?;

    let mut cfg = config(&input, &solo_output);
    cfg.partition_budget = 5;
    run(&cfg, &SoloGroup)?;

    cfg.output = many_output.clone();
    run_parallel(&cfg, 8)?;

    assert_eq!(std::fs::read(&solo_output)?, std::fs::read(&many_output)?);
    Ok(())
}

#[test_log::test]
fn tiled_partitioner_matches_row_partitioner_output() -> Result<()> {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let rows_output = tmp.path().join("rows.tif");
    let tiles_output = tmp.path().join("tiles.tif");

    let data = sequential_pixels(16 * 16);
    create_test_raster(&input, &eqc_georeference(Point::new(0.0, 16_000.0), 1000.0, 16, 16, None), &data)?;

    let mut cfg = config(&input, &rows_output);
    cfg.partition_budget = 64;
    cfg.target_srs = Some(MOLLWEIDE.into());
    run(&cfg, &SoloGroup)?;

    cfg.output = tiles_output.clone();
    cfg.partitioner = Partitioner::Tiled;
    cfg.tile_size = 4;
    run_parallel(&cfg, 3)?;

    assert_eq!(
        read_raster_bytes(&rows_output, MOLLWEIDE)?,
        read_raster_bytes(&tiles_output, MOLLWEIDE)?
    );
    Ok(())
}

#[test_log::test]
fn separate_process_style_groups_synchronize_over_the_filesystem() -> Result<()> {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let solo_output = tmp.path().join("solo.tif");
    let fs_output = tmp.path().join("fs.tif");

    let data = create_random_pixels(8 * 8);
    create_test_raster(&input, &eqc_georeference(Point::new(0.0, 8000.0), 1000.0, 8, 8, None), &data)?;

    let mut cfg = config(&input, &solo_output);
    cfg.partition_budget = 16;
    run(&cfg, &SoloGroup)?;

    cfg.output = fs_output.clone();
    let sync_dir = tmp.path().join("fs.tif.sync");
    let rank0 = FsGroup::new(0, 2, &sync_dir)?;
    let rank1 = FsGroup::new(1, 2, &sync_dir)?;

    let cfg0 = cfg.clone();
    let cfg1 = cfg.clone();
    std::thread::scope(|scope| {
        let a = scope.spawn(move || run(&cfg0, &rank0));
        let b = scope.spawn(move || run(&cfg1, &rank1));
        a.join().unwrap().and(b.join().unwrap())
    })?;

    assert_eq!(std::fs::read(&solo_output)?, std::fs::read(&fs_output)?);
    Ok(())
}

#[test_log::test]
fn destination_pixels_outside_the_projection_domain_are_filled() -> Result<()> {
    // A source region touching the rim of the mollweide ellipse: the minbox
    // rectangle around its curved footprint necessarily contains destination
    // pixels with no geographic counterpart. Those must carry the fill value
    // while the interior still carries data.
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let output = tmp.path().join("out.tif");

    // 150 to 178 degrees east, 55 to 75 degrees north on the eqc grid.
    let pixel_size = 20_000.0;
    let georef = {
        let east = 150.0_f64.to_radians() * 6370997.0;
        let north = 75.0_f64.to_radians() * 6370997.0;
        eqc_georeference(Point::new(east, north), pixel_size, 100, 150, None)
    };
    create_test_raster(&input, &georef, &vec![7u8; 100 * 150])?;

    let mut cfg = config(&input, &output);
    cfg.target_srs = Some(MOLLWEIDE.into());
    cfg.fill_value = Some("255".into());
    run(&cfg, &SoloGroup)?;

    let pixels = read_raster_bytes(&output, MOLLWEIDE)?;
    let fill_count = pixels.iter().filter(|&&v| v == 255).count();
    let data_count = pixels.iter().filter(|&&v| v == 7).count();

    assert!(fill_count > 0, "expected fill pixels outside the projection domain");
    assert!(data_count > 0, "expected reprojected data pixels");
    assert_eq!(fill_count + data_count, pixels.len(), "unexpected pixel values in the output");
    Ok(())
}

#[test_log::test]
fn fill_value_defaults_to_the_input_nodata() -> Result<()> {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let output = tmp.path().join("out.tif");

    let pixel_size = 20_000.0;
    let georef = {
        let east = 150.0_f64.to_radians() * 6370997.0;
        let north = 75.0_f64.to_radians() * 6370997.0;
        eqc_georeference(Point::new(east, north), pixel_size, 60, 90, Some(200.0))
    };
    create_test_raster(&input, &georef, &vec![7u8; 60 * 90])?;

    let mut cfg = config(&input, &output);
    cfg.target_srs = Some(MOLLWEIDE.into());
    run(&cfg, &SoloGroup)?;

    let pixels = read_raster_bytes(&output, MOLLWEIDE)?;
    assert!(pixels.contains(&200), "nodata pixels must use the input nodata value");
    Ok(())
}

#[test_log::test]
fn bad_fill_value_is_rejected_before_any_work() {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let output = tmp.path().join("out.tif");

    create_test_raster(
        &input,
        &eqc_georeference(Point::new(0.0, 4.0), 1.0, 4, 4, None),
        &(1..=16).collect::<Vec<u8>>(),
    )
    .unwrap();

    let mut cfg = config(&input, &output);
    cfg.fill_value = Some("300".into()); // does not fit in uint8
    assert!(run(&cfg, &SoloGroup).is_err());
    assert!(!output.exists());
}

#[test_log::test]
fn reprojection_to_mollweide_and_back_preserves_constant_regions() -> Result<()> {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let input = tmp.path().join("in.tif");
    let there = tmp.path().join("there.tif");
    let back = tmp.path().join("back.tif");

    let georef = eqc_georeference(Point::new(0.0, 2_000_000.0), 10_000.0, 200, 200, None);
    create_test_raster(&input, &georef, &vec![42u8; 200 * 200])?;

    let mut cfg = config(&input, &there);
    cfg.target_srs = Some(MOLLWEIDE.into());
    run(&cfg, &SoloGroup)?;

    let mut cfg = config(&there, &back);
    cfg.source_srs = Some(MOLLWEIDE.into());
    cfg.target_srs = Some(EQC.into());
    run(&cfg, &SoloGroup)?;

    // The interior of a constant image survives the round trip; edges may
    // pick up fill values from the bounding box corners.
    let pixels = read_raster_bytes(&back, EQC)?;
    let data_count = pixels.iter().filter(|&&v| v == 42).count();
    assert!(data_count * 2 > pixels.len(), "round trip lost most of the image interior");
    Ok(())
}
