//! # Frame Computer
//!
//! Derives the 2D scalar field a single frame visualizes. Each frame render
//! receives an explicit, immutable [`FrameJob`] value carrying everything it
//! needs (dataset path, variable names, time index, unit conversion); workers
//! share nothing mutable and never capture ambient state.

use std::path::PathBuf;

use crate::dataset::{Dataset, Grid2};
use crate::error::{RenderError, RenderResult};
use crate::input::{FieldConfig, JobConfig};

/// Everything one worker needs to compute and rasterize frame `index`.
/// Built by the pipeline, passed to the scheduler by value.
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub index: usize,
    pub dataset_path: PathBuf,
    pub time_index: usize,
    pub field: FieldConfig,
    pub lat_axis: String,
    pub lon_axis: String,
    pub output_path: PathBuf,
}

impl FrameJob {
    /// Builds the job descriptor for frame `n` of a configured job.
    pub fn for_index(config: &JobConfig, n: usize) -> RenderResult<Self> {
        let (dataset_path, time_index) = config.source.locate(n)?;
        Ok(FrameJob {
            index: n,
            dataset_path,
            time_index,
            field: config.field.clone(),
            lat_axis: config.source.lat_axis().to_string(),
            lon_axis: config.source.lon_axis().to_string(),
            output_path: config.output.frames_dir.join(config.frame_filename(n)),
        })
    }
}

/// A computed field together with its coordinate axes.
#[derive(Debug, Clone)]
pub struct Field {
    pub grid: Grid2,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

/// Opens the job's dataset and computes its 2D field. The handle lives only
/// for the duration of this call; every worker re-reads from storage.
pub fn compute_field(job: &FrameJob) -> RenderResult<Field> {
    let ds = Dataset::open(&job.dataset_path)?;
    let grid = match &job.field {
        FieldConfig::Scalar {
            variable,
            scale,
            offset,
            level,
        } => {
            let mut grid =
                ds.read_slab(variable, job.time_index, *level, &job.lat_axis, &job.lon_axis)?;
            if *scale != 1.0 || *offset != 0.0 {
                let (s, o) = (*scale as f32, *offset as f32);
                for v in &mut grid.values {
                    *v = s * *v + o;
                }
            }
            grid
        }
        FieldConfig::Magnitude {
            u_variable,
            v_variable,
            level,
        } => {
            let u = ds.read_slab(u_variable, job.time_index, *level, &job.lat_axis, &job.lon_axis)?;
            let v = ds.read_slab(v_variable, job.time_index, *level, &job.lat_axis, &job.lon_axis)?;
            magnitude(&u, &v)?
        }
    };

    let lat = ds.coord(&job.lat_axis)?;
    let lon = ds.coord(&job.lon_axis)?;
    ds.close()?;

    if lat.len() != grid.nlat || lon.len() != grid.nlon {
        return Err(RenderError::Shape(format!(
            "field is {}x{} but coordinate axes are {}x{}",
            grid.nlat,
            grid.nlon,
            lat.len(),
            lon.len()
        )));
    }

    Ok(Field { grid, lat, lon })
}

/// Elementwise sqrt(u² + v²). Cells masked (NaN) in either component stay
/// masked in the result.
pub fn magnitude(u: &Grid2, v: &Grid2) -> RenderResult<Grid2> {
    if u.nlat != v.nlat || u.nlon != v.nlon {
        return Err(RenderError::Shape(format!(
            "component grids differ: {}x{} vs {}x{}",
            u.nlat, u.nlon, v.nlat, v.nlon
        )));
    }
    let values = u
        .values
        .iter()
        .zip(&v.values)
        .map(|(a, b)| (a * a + b * b).sqrt())
        .collect();
    Grid2::new(values, u.nlat, u.nlon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_is_euclidean() {
        let u = Grid2::new(vec![3.0, 0.0], 1, 2).unwrap();
        let v = Grid2::new(vec![4.0, 0.0], 1, 2).unwrap();
        let m = magnitude(&u, &v).unwrap();
        assert_eq!(m.values, vec![5.0, 0.0]);
    }

    #[test]
    fn magnitude_propagates_masked_cells() {
        let u = Grid2::new(vec![f32::NAN], 1, 1).unwrap();
        let v = Grid2::new(vec![1.0], 1, 1).unwrap();
        assert!(magnitude(&u, &v).unwrap().values[0].is_nan());
    }

    #[test]
    fn magnitude_rejects_mismatched_grids() {
        let u = Grid2::new(vec![0.0; 4], 2, 2).unwrap();
        let v = Grid2::new(vec![0.0; 2], 1, 2).unwrap();
        assert!(matches!(magnitude(&u, &v), Err(RenderError::Shape(_))));
    }
}
