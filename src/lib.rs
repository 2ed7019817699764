//! # ncanim
//!
//! A Rust library and CLI for rendering gridded geophysical NetCDF datasets
//! (reanalysis fields, sea-surface temperature products, ocean current
//! fields) into georeferenced frame sequences and assembling them into
//! videos with ffmpeg.
//!
//! ## Pipeline
//!
//! 1. Open the dataset and read the time-axis length
//! 2. Resolve the color mapping once for the whole job
//! 3. Fan frame rendering out across a bounded worker pool, each worker
//!    computing one derived 2D field and rasterizing it to a numbered PNG
//! 4. Verify every expected frame exists (no gaps)
//! 5. Invoke ffmpeg over the numbered sequence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ncanim::{run_render_job, input::JobConfig};
//!
//! let config = JobConfig::from_file("sst.json").expect("Failed to load config");
//! run_render_job(&config).expect("Rendering failed");
//! ```

pub mod cli;
pub mod colorbar;
pub mod colormap;
pub mod dataset;
pub mod encode;
pub mod error;
pub mod field;
pub mod info;
pub mod input;
pub mod log;
pub mod raster;
pub mod schedule;

#[cfg(test)]
mod tests;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::RenderResult;
use crate::field::FrameJob;
use crate::input::JobConfig;

/// Renders every frame of the configured job and encodes the result.
///
/// This is the whole pipeline behind the `render` subcommand:
/// configuration validation, explicit output-directory acquisition, colorbar
/// legend, parallel frame rendering with a hard completion barrier, frame gap
/// verification, and the encoder invocation.
pub fn run_render_job(config: &JobConfig) -> RenderResult<()> {
    config.validate()?;

    let count = config.source.frame_count()?;
    let mapping = config.mapping.resolve()?;

    // Output directories are acquired here, at pipeline start, never as an
    // import-time side effect.
    std::fs::create_dir_all(&config.output.frames_dir)?;
    std::fs::create_dir_all(&config.output.animations_dir)?;

    if let Some(colorbar) = &config.colorbar {
        std::fs::create_dir_all(&config.output.colorbars_dir)?;
        let path = config.colorbar_path();
        ::log::info!("writing colorbar '{}' to {}", colorbar.label, path.display());
        crate::colorbar::render_colorbar(&mapping, colorbar.width, colorbar.height, &path)?;
    }

    let progress = ProgressBar::new(count as u64).with_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} frames ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let budget = config.scheduler.frame_budget_secs.map(Duration::from_secs);
    let result = schedule::render_all(count, config.scheduler.max_workers, budget, |n| {
        let job = FrameJob::for_index(config, n)?;
        render_one_frame(&job, config, &mapping)?;
        progress.inc(1);
        Ok(())
    });
    progress.finish_and_clear();
    result?;

    // Hard barrier: encoding only starts once every frame is verified on
    // disk, instead of letting the encoder truncate at the first gap.
    schedule::verify_frames(&config.output.frames_dir, &config.kind, count)?;

    encode::encode(
        &config.output.frames_dir.join(config.frame_pattern()),
        &config.encode,
        &config.video_path(),
    )
}

/// Computes and rasterizes a single frame. Used by the scheduler workers;
/// everything it touches arrives through the immutable job descriptor and
/// the shared read-only mapping.
pub fn render_one_frame(
    job: &FrameJob,
    config: &JobConfig,
    mapping: &crate::colormap::ColorMapping,
) -> RenderResult<()> {
    ::log::debug!("rendering {}", job.output_path.display());
    let field = field::compute_field(job)?;
    raster::render_frame(
        &field.grid,
        &field.lat,
        &field.lon,
        mapping,
        &config.overlays,
        &config.canvas,
        &job.output_path,
    )
}
