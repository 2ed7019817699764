use std::time::Duration;

use crate::input::{FieldConfig, JobConfig, SourceConfig};

pub fn show_greeting(what: &str) {
    println!("=== NetCDF Animation Renderer ===");
    println!("Job: {}", what);
}

pub fn config_echo(config: &JobConfig) {
    println!("\nConfiguration:");
    println!("  Kind: {}", config.kind);
    match &config.source {
        SourceConfig::Single { path, time_axis, .. } => {
            println!("  Source: {} (time axis '{}')", path.display(), time_axis);
        }
        SourceConfig::DatedSeries {
            dir,
            pattern,
            start_date,
            days,
            ..
        } => {
            println!(
                "  Source: {} days of {} starting {} in {}",
                days,
                pattern,
                start_date,
                dir.display()
            );
        }
    }
    match &config.field {
        FieldConfig::Scalar {
            variable,
            scale,
            offset,
            ..
        } => println!("  Field: {} (scale {}, offset {})", variable, scale, offset),
        FieldConfig::Magnitude {
            u_variable,
            v_variable,
            ..
        } => println!("  Field: |({}, {})|", u_variable, v_variable),
    }
    println!("  Canvas: {}x{}", config.canvas.width, config.canvas.height);
    println!("  Frames dir: {}", config.output.frames_dir.display());
    println!("  Video: {}", config.video_path().display());
    let overlays = config.overlays.layers();
    if !overlays.is_empty() {
        println!("  Overlays: {}", overlays.len());
    }
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    println!("\n=== Completed successfully in {:.1}s! ===", elapsed.as_secs_f64());
}
