//! # Dataset Accessor
//!
//! Thin wrapper around the `netcdf` crate exposing the handful of read
//! operations the rendering pipeline needs: axis lengths, coordinate
//! variables, and single-time-step 2D slabs. Handles are opened read-only per
//! call site and never shared between workers; there is no caching, every call
//! may re-read from storage.

use std::path::{Path, PathBuf};

use crate::error::{RenderError, RenderResult};

/// A dense 2D field aligned to (latitude, longitude), lat-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2 {
    pub values: Vec<f32>,
    pub nlat: usize,
    pub nlon: usize,
}

impl Grid2 {
    pub fn new(values: Vec<f32>, nlat: usize, nlon: usize) -> RenderResult<Self> {
        if values.len() != nlat * nlon {
            return Err(RenderError::Shape(format!(
                "grid has {} values but {}x{} = {} cells",
                values.len(),
                nlat,
                nlon,
                nlat * nlon
            )));
        }
        Ok(Grid2 { values, nlat, nlon })
    }

    #[inline]
    pub fn get(&self, ilat: usize, ilon: usize) -> f32 {
        self.values[ilat * self.nlon + ilon]
    }
}

/// Read-only handle on a NetCDF dataset.
#[derive(Debug)]
pub struct Dataset {
    file: netcdf::File,
    path: PathBuf,
}

impl Dataset {
    /// Opens `path` read-only. Fails with [`RenderError::NotFound`] when the
    /// file does not exist and [`RenderError::Format`] when it cannot be
    /// parsed as NetCDF.
    pub fn open<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RenderError::NotFound(path.to_path_buf()));
        }
        let file = netcdf::open(path).map_err(|e| RenderError::from_netcdf(path, e))?;
        Ok(Dataset {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the named axis (dimension).
    pub fn axis_len(&self, axis_name: &str) -> RenderResult<usize> {
        self.file
            .dimension(axis_name)
            .map(|d| d.len())
            .ok_or_else(|| {
                RenderError::Format {
                    path: self.path.clone(),
                    reason: format!("dimension '{}' not found", axis_name),
                }
            })
    }

    /// Reads a 1D coordinate variable (e.g. `latitude`) as f64.
    pub fn coord(&self, name: &str) -> RenderResult<Vec<f64>> {
        let var = self.file.variable(name).ok_or_else(|| RenderError::Format {
            path: self.path.clone(),
            reason: format!("coordinate variable '{}' not found", name),
        })?;
        let values = var
            .get::<f64, _>(..)
            .map_err(|e| RenderError::Format {
                path: self.path.clone(),
                reason: format!("cannot read coordinate '{}': {}", name, e),
            })?;
        Ok(values.iter().copied().collect())
    }

    /// Reads the 2D slab of `var_name` at `time_index` (and `level`, for
    /// variables carrying a vertical axis), returned lat-major regardless of
    /// the on-disk dimension order.
    ///
    /// The variable's trailing axes are matched against `lat_name`/`lon_name`
    /// to decide whether the slab needs transposing (some products store
    /// (time, lon, lat)).
    pub fn read_slab(
        &self,
        var_name: &str,
        time_index: usize,
        level: Option<usize>,
        lat_name: &str,
        lon_name: &str,
    ) -> RenderResult<Grid2> {
        let var = self.file.variable(var_name).ok_or_else(|| RenderError::Format {
            path: self.path.clone(),
            reason: format!("variable '{}' not found", var_name),
        })?;

        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
        let read_err = |e: netcdf::Error| RenderError::Format {
            path: self.path.clone(),
            reason: format!("cannot read variable '{}': {}", var_name, e),
        };

        // Fixing an axis with a scalar index drops that axis, so both reads
        // below yield a 2D array over the two remaining spatial axes.
        let (slab, spatial_dims) = match (dims.len(), level) {
            (3, None) => (
                var.get::<f32, _>((time_index, .., ..)).map_err(read_err)?,
                [dims[1].clone(), dims[2].clone()],
            ),
            (4, Some(k)) => (
                var.get::<f32, _>((time_index, k, .., ..)).map_err(read_err)?,
                [dims[2].clone(), dims[3].clone()],
            ),
            (4, None) => {
                return Err(RenderError::Shape(format!(
                    "variable '{}' has 4 axes {:?}; select a vertical level",
                    var_name, dims
                )));
            }
            (n, _) => {
                return Err(RenderError::Shape(format!(
                    "variable '{}' has {} axes {:?}; expected 3 or 4",
                    var_name, n, dims
                )));
            }
        };

        let shape = slab.shape().to_vec();
        let values: Vec<f32> = slab.iter().copied().collect();

        if spatial_dims[0] == lat_name && spatial_dims[1] == lon_name {
            Grid2::new(values, shape[0], shape[1])
        } else if spatial_dims[0] == lon_name && spatial_dims[1] == lat_name {
            Ok(transpose(&values, shape[0], shape[1]))
        } else {
            Err(RenderError::Shape(format!(
                "variable '{}' spatial axes {:?} do not match ({}, {})",
                var_name, spatial_dims, lat_name, lon_name
            )))
        }
    }

    pub fn close(self) -> RenderResult<()> {
        let path = self.path;
        self.file
            .close()
            .map_err(|e| RenderError::from_netcdf(&path, e))
    }
}

/// Transposes a lon-major slab of shape (nlon, nlat) into lat-major order.
fn transpose(values: &[f32], nlon: usize, nlat: usize) -> Grid2 {
    let mut out = vec![0.0f32; values.len()];
    for i in 0..nlon {
        for j in 0..nlat {
            out[j * nlon + i] = values[i * nlat + j];
        }
    }
    Grid2 {
        values: out,
        nlat,
        nlon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid2_rejects_mismatched_lengths() {
        let err = Grid2::new(vec![0.0; 5], 2, 3).unwrap_err();
        assert!(matches!(err, RenderError::Shape(_)));
    }

    #[test]
    fn grid2_indexing_is_lat_major() {
        let g = Grid2::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(g.get(0, 2), 3.0);
        assert_eq!(g.get(1, 0), 4.0);
    }

    #[test]
    fn transpose_swaps_axis_order() {
        // lon-major (2 lons, 3 lats): [(l0,a0),(l0,a1),(l0,a2),(l1,a0),...]
        let g = transpose(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        assert_eq!(g.nlat, 3);
        assert_eq!(g.nlon, 2);
        assert_eq!(g.get(0, 0), 1.0);
        assert_eq!(g.get(1, 0), 2.0);
        assert_eq!(g.get(2, 1), 6.0);
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let err = Dataset::open("definitely/not/there.nc").unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
    }
}
