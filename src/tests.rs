use std::path::{Path, PathBuf};

use tempfile::tempdir;

use crate::colormap::MappingSpec;
use crate::dataset::Dataset;
use crate::error::RenderError;
use crate::field::FrameJob;
use crate::input::{
    CanvasConfig, ColorbarConfig, EncodeSettings, FieldConfig, JobConfig, OutputConfig,
    SchedulerConfig, SourceConfig,
};
use crate::{encode, render_one_frame, run_render_job, schedule};

/// Writes a small synthetic dataset: `t` time steps of a constant-valued
/// field on a regular global grid, with the coordinate layout the ERA5
/// products use (descending latitude).
fn write_synthetic_dataset(
    path: &Path,
    t: usize,
    nlat: usize,
    nlon: usize,
    value: f32,
) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", t)?;
    file.add_dimension("latitude", nlat)?;
    file.add_dimension("longitude", nlon)?;

    let lats: Vec<f64> = (0..nlat)
        .map(|i| 90.0 - 180.0 * (i as f64 + 0.5) / nlat as f64)
        .collect();
    let lons: Vec<f64> = (0..nlon)
        .map(|i| -180.0 + 360.0 * (i as f64 + 0.5) / nlon as f64)
        .collect();

    let mut lat_var = file.add_variable::<f64>("latitude", &["latitude"])?;
    lat_var.put_values(&lats, ..)?;
    let mut lon_var = file.add_variable::<f64>("longitude", &["longitude"])?;
    lon_var.put_values(&lons, ..)?;

    let data = vec![value; t * nlat * nlon];
    let mut var = file.add_variable::<f32>("t2m", &["time", "latitude", "longitude"])?;
    var.put_values(&data, ..)?;

    Ok(())
}

/// A minimal job over a synthetic dataset, everything routed into `root`.
fn synthetic_job(dataset: PathBuf, root: &Path) -> JobConfig {
    JobConfig {
        kind: "synthetic".to_string(),
        source: SourceConfig::Single {
            path: dataset,
            time_axis: "time".to_string(),
            lat_axis: "latitude".to_string(),
            lon_axis: "longitude".to_string(),
        },
        field: FieldConfig::Scalar {
            variable: "t2m".to_string(),
            scale: 1.0,
            offset: 0.0,
            level: None,
        },
        mapping: MappingSpec::Thermal {
            vmin: 0.0,
            vmax: 20.0,
        },
        canvas: CanvasConfig {
            width: 32,
            height: 16,
        },
        overlays: Default::default(),
        output: OutputConfig {
            frames_dir: root.join("frames"),
            colorbars_dir: root.join("colorbars"),
            animations_dir: root.join("animations"),
        },
        scheduler: SchedulerConfig {
            max_workers: 4,
            frame_budget_secs: None,
        },
        encode: EncodeSettings {
            preset: "ultrafast".to_string(),
            ..EncodeSettings::default()
        },
        colorbar: None,
    }
}

fn render_frames(job: &JobConfig, count: usize, workers: usize) {
    let mapping = job.mapping.resolve().unwrap();
    std::fs::create_dir_all(&job.output.frames_dir).unwrap();
    schedule::render_all(count, workers, None, |n| {
        let frame = FrameJob::for_index(job, n)?;
        render_one_frame(&frame, job, &mapping)
    })
    .unwrap();
}

mod dataset_tests {
    use super::*;

    #[test]
    fn accessor_reads_axes_and_slabs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("synthetic.nc");
        write_synthetic_dataset(&path, 4, 6, 12, 7.5).unwrap();

        let ds = Dataset::open(&path).unwrap();
        assert_eq!(ds.axis_len("time").unwrap(), 4);
        assert_eq!(ds.coord("latitude").unwrap().len(), 6);

        let grid = ds.read_slab("t2m", 2, None, "latitude", "longitude").unwrap();
        assert_eq!((grid.nlat, grid.nlon), (6, 12));
        assert!(grid.values.iter().all(|&v| v == 7.5));
        ds.close().unwrap();
    }

    #[test]
    fn unknown_axis_and_variable_are_format_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("synthetic.nc");
        write_synthetic_dataset(&path, 1, 2, 2, 0.0).unwrap();

        let ds = Dataset::open(&path).unwrap();
        assert!(matches!(
            ds.axis_len("depth"),
            Err(RenderError::Format { .. })
        ));
        assert!(matches!(
            ds.read_slab("zeta", 0, None, "latitude", "longitude"),
            Err(RenderError::Format { .. })
        ));
    }

    #[test]
    fn out_of_range_time_index_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("synthetic.nc");
        write_synthetic_dataset(&path, 2, 2, 2, 0.0).unwrap();

        let ds = Dataset::open(&path).unwrap();
        assert!(ds.read_slab("t2m", 5, None, "latitude", "longitude").is_err());
    }
}

mod pipeline_tests {
    use super::*;

    #[test]
    fn renders_one_frame_per_index() {
        let dir = tempdir().unwrap();
        let dataset = dir.path().join("synthetic.nc");
        write_synthetic_dataset(&dataset, 3, 4, 8, 10.0).unwrap();
        let job = synthetic_job(dataset, dir.path());

        let count = job.source.frame_count().unwrap();
        assert_eq!(count, 3);

        render_frames(&job, count, 4);
        schedule::verify_frames(&job.output.frames_dir, &job.kind, count).unwrap();

        for n in 0..count {
            let path = job.output.frames_dir.join(job.frame_filename(n));
            let img = image::open(&path).unwrap().into_rgba8();
            assert_eq!(img.dimensions(), (32, 16));
        }
    }

    #[test]
    fn constant_field_gives_identical_frames() {
        let dir = tempdir().unwrap();
        let dataset = dir.path().join("synthetic.nc");
        write_synthetic_dataset(&dataset, 3, 4, 8, 10.0).unwrap();
        let job = synthetic_job(dataset, dir.path());

        render_frames(&job, 3, 2);

        let first = std::fs::read(job.output.frames_dir.join(job.frame_filename(0))).unwrap();
        for n in 1..3 {
            let other = std::fs::read(job.output.frames_dir.join(job.frame_filename(n))).unwrap();
            assert_eq!(first, other, "frame {} differs", n);
        }

        // Constant value 10 on a [0, 20] mapping sits mid-gradient.
        let img = image::open(job.output.frames_dir.join(job.frame_filename(0)))
            .unwrap()
            .into_rgba8();
        let mapping = job.mapping.resolve().unwrap();
        let expected = mapping.color_at(10.0);
        assert!(img.pixels().all(|p| p.0 == expected));
    }

    #[test]
    fn worker_count_does_not_change_the_file_set() {
        let dir = tempdir().unwrap();
        let dataset = dir.path().join("synthetic.nc");
        write_synthetic_dataset(&dataset, 5, 4, 8, 3.0).unwrap();

        let serial_root = dir.path().join("serial");
        let parallel_root = dir.path().join("parallel");
        let serial_job = synthetic_job(dataset.clone(), &serial_root);
        let parallel_job = synthetic_job(dataset, &parallel_root);

        render_frames(&serial_job, 5, 1);
        render_frames(&parallel_job, 5, 4);

        for n in 0..5 {
            let a =
                std::fs::read(serial_job.output.frames_dir.join(serial_job.frame_filename(n)))
                    .unwrap();
            let b = std::fs::read(
                parallel_job.output.frames_dir.join(parallel_job.frame_filename(n)),
            )
            .unwrap();
            assert_eq!(a, b, "frame {} differs between 1 and 4 workers", n);
        }
    }

    #[test]
    fn missing_dataset_aborts_the_batch() {
        let dir = tempdir().unwrap();
        let job = synthetic_job(dir.path().join("nope.nc"), dir.path());
        let mapping = job.mapping.resolve().unwrap();
        std::fs::create_dir_all(&job.output.frames_dir).unwrap();

        let err = schedule::render_all(2, 2, None, |n| {
            let frame = FrameJob::for_index(&job, n)?;
            render_one_frame(&frame, &job, &mapping)
        })
        .unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
    }

    /// End-to-end scenario: 3 constant frames at 24 fps; requires ffmpeg.
    #[test]
    fn end_to_end_synthetic_animation() {
        if !encode::is_ffmpeg_on_path() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }

        let dir = tempdir().unwrap();
        let dataset = dir.path().join("synthetic.nc");
        write_synthetic_dataset(&dataset, 3, 4, 8, 10.0).unwrap();
        let job = synthetic_job(dataset, dir.path());

        run_render_job(&job).unwrap();

        let video = job.video_path();
        assert!(video.exists(), "no video at {}", video.display());
        assert!(std::fs::metadata(&video).unwrap().len() > 0);

        // 3 frames at 24 fps is 0.125s; allow one frame of slack.
        if let Some(duration) = probe_duration(&video) {
            assert!(
                (duration - 0.125).abs() <= 1.0 / 24.0,
                "unexpected duration {}s",
                duration
            );
        }
    }

    fn probe_duration(video: &Path) -> Option<f64> {
        let output = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(video)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }

    #[test]
    fn encode_refuses_gappy_sequences() {
        let dir = tempdir().unwrap();
        let dataset = dir.path().join("synthetic.nc");
        write_synthetic_dataset(&dataset, 3, 4, 8, 10.0).unwrap();
        let job = synthetic_job(dataset, dir.path());

        render_frames(&job, 3, 2);
        std::fs::remove_file(job.output.frames_dir.join(job.frame_filename(1))).unwrap();

        let err = schedule::verify_frames(&job.output.frames_dir, &job.kind, 3).unwrap_err();
        match err {
            RenderError::MissingFrames { indices } => assert_eq!(indices, vec![1]),
            other => panic!("unexpected error: {}", other),
        }
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn preset_jobs_validate() {
        for preset in [
            crate::input::Preset::Temperature,
            crate::input::Preset::Precipitation,
            crate::input::Preset::Sst,
            crate::input::Preset::Speed,
        ] {
            preset.job().validate().unwrap();
        }
    }

    #[test]
    fn preset_jobs_round_trip_through_json_and_yaml() {
        let job = crate::input::Preset::Sst.job();
        let json = serde_json::to_string(&job).unwrap();
        let back = JobConfig::from_json(&json).unwrap();
        assert_eq!(back.kind, "sst");
        assert_eq!(back.video_path(), job.video_path());

        let yaml = serde_yaml::to_string(&job).unwrap();
        let back: JobConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.frame_pattern(), "sst%05d.png");
    }

    #[test]
    fn validation_catches_bad_geometry_and_limits() {
        let dir = tempdir().unwrap();
        let mut job = synthetic_job(dir.path().join("x.nc"), dir.path());

        job.canvas = CanvasConfig {
            width: 33,
            height: 16,
        };
        assert!(matches!(job.validate(), Err(RenderError::Config(_))));

        job.canvas = CanvasConfig {
            width: 32,
            height: 16,
        };
        job.scheduler.max_workers = 0;
        assert!(job.validate().is_err());

        job.scheduler.max_workers = 1;
        job.kind = "bad kind!".to_string();
        assert!(job.validate().is_err());
    }

    #[test]
    fn dated_series_locates_files_by_date() {
        let source = SourceConfig::DatedSeries {
            dir: PathBuf::from("data"),
            pattern: "currents_%Y%m%d.nc4".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2020, 1, 30).unwrap(),
            days: 3,
            lat_axis: "lat".to_string(),
            lon_axis: "lon".to_string(),
        };
        let (path, t) = source.locate(2).unwrap();
        assert_eq!(path, PathBuf::from("data/currents_20200201.nc4"));
        assert_eq!(t, 0);
        assert!(source.locate(3).is_err());
        assert_eq!(source.frame_count().unwrap(), 3);
    }

    #[test]
    fn frame_names_are_zero_padded() {
        let dir = tempdir().unwrap();
        let job = synthetic_job(dir.path().join("x.nc"), dir.path());
        assert_eq!(job.frame_filename(0), "synthetic00000.png");
        assert_eq!(job.frame_filename(12345), "synthetic12345.png");
        assert_eq!(job.frame_pattern(), "synthetic%05d.png");
    }

    #[test]
    fn colorbar_path_follows_kind() {
        let dir = tempdir().unwrap();
        let mut job = synthetic_job(dir.path().join("x.nc"), dir.path());
        job.colorbar = Some(ColorbarConfig {
            label: "Synthetic".to_string(),
            width: 10,
            height: 4,
        });
        assert!(job
            .colorbar_path()
            .to_string_lossy()
            .ends_with("colorbars/synthetic_colorbar.png"));
    }
}
