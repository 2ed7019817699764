//! # Rasterizer
//!
//! Projects a 2D (lat, lon) field onto a fixed-size RGBA canvas using an
//! equirectangular (Plate-Carrée) mapping over the field's native coordinate
//! extent, composites the static overlay layers in fixed z-order, and writes
//! the frame PNG atomically (temp file + rename) so a failed render never
//! leaves a corrupt frame behind.
//!
//! The canvas carries no axes or chrome; pixels outside the color mapping
//! (masked cells) stay transparent until an overlay or the encoder flattens
//! them.

use std::io::BufWriter;
use std::path::Path;

use image::imageops::FilterType;
use image::{ImageFormat, ImageReader, Rgba, RgbaImage};
use log::debug;

use crate::colormap::ColorMapping;
use crate::dataset::Grid2;
use crate::error::{RenderError, RenderResult};
use crate::input::{CanvasConfig, OverlayConfig};

/// Rasterizes `grid` onto a `canvas`-sized image and writes it to
/// `output_path`. Overlay z-order: field, background imagery, coastline,
/// borders, lakes.
pub fn render_frame(
    grid: &Grid2,
    lat: &[f64],
    lon: &[f64],
    mapping: &ColorMapping,
    overlays: &OverlayConfig,
    canvas: &CanvasConfig,
    output_path: &Path,
) -> RenderResult<()> {
    let mut image = rasterize_field(grid, lat, lon, mapping, canvas)?;

    for layer in overlays.layers() {
        let overlay = load_overlay(layer, canvas)?;
        composite_over(&mut image, &overlay);
    }

    write_png_atomic(&image, output_path)
}

/// Maps the field onto the canvas with nearest-neighbour sampling over the
/// coordinate axes. Fails with [`RenderError::Shape`] when the field and
/// coordinate lengths disagree.
pub fn rasterize_field(
    grid: &Grid2,
    lat: &[f64],
    lon: &[f64],
    mapping: &ColorMapping,
    canvas: &CanvasConfig,
) -> RenderResult<RgbaImage> {
    if lat.len() != grid.nlat || lon.len() != grid.nlon {
        return Err(RenderError::Shape(format!(
            "field is {}x{} but coordinate axes are {}x{}",
            grid.nlat,
            grid.nlon,
            lat.len(),
            lon.len()
        )));
    }
    if lat.is_empty() || lon.is_empty() {
        return Err(RenderError::Shape("empty coordinate axis".to_string()));
    }

    let (w, h) = (canvas.width, canvas.height);
    let (lat_min, lat_max) = axis_extent(lat);
    let (lon_min, lon_max) = axis_extent(lon);

    // One index lookup per row/column, shared across the whole canvas.
    let row_index: Vec<usize> = (0..h)
        .map(|y| {
            let target = lat_max - (y as f64 + 0.5) * (lat_max - lat_min) / h as f64;
            nearest_index(lat, target)
        })
        .collect();
    let col_index: Vec<usize> = (0..w)
        .map(|x| {
            let target = lon_min + (x as f64 + 0.5) * (lon_max - lon_min) / w as f64;
            nearest_index(lon, target)
        })
        .collect();

    let mut image = RgbaImage::new(w, h);
    for (y, row) in row_index.iter().enumerate() {
        for (x, col) in col_index.iter().enumerate() {
            let rgba = mapping.color_at(grid.get(*row, *col));
            image.put_pixel(x as u32, y as u32, Rgba(rgba));
        }
    }
    Ok(image)
}

fn axis_extent(coords: &[f64]) -> (f64, f64) {
    let first = coords[0];
    let last = coords[coords.len() - 1];
    if first <= last { (first, last) } else { (last, first) }
}

/// Nearest index in a monotonic coordinate axis (ascending or descending).
fn nearest_index(coords: &[f64], target: f64) -> usize {
    let ascending = coords[0] <= coords[coords.len() - 1];
    let pos = if ascending {
        coords.partition_point(|&c| c < target)
    } else {
        coords.partition_point(|&c| c > target)
    };
    if pos == 0 {
        return 0;
    }
    if pos >= coords.len() {
        return coords.len() - 1;
    }
    if (coords[pos] - target).abs() < (coords[pos - 1] - target).abs() {
        pos
    } else {
        pos - 1
    }
}

/// Loads an overlay asset and scales it to the canvas. Image decode limits
/// are lifted: the Natural Earth relief imagery used as a basemap is far
/// beyond the default decompression guard.
fn load_overlay(path: &Path, canvas: &CanvasConfig) -> RenderResult<RgbaImage> {
    if !path.exists() {
        return Err(RenderError::Resource(path.to_path_buf()));
    }
    let mut reader = ImageReader::open(path).map_err(RenderError::Io)?;
    reader.no_limits();
    let decoded = reader
        .decode()
        .map_err(RenderError::Image)?
        .into_rgba8();
    if decoded.width() == canvas.width && decoded.height() == canvas.height {
        debug!("overlay {} matches canvas, no resampling", path.display());
        return Ok(decoded);
    }
    Ok(image::imageops::resize(
        &decoded,
        canvas.width,
        canvas.height,
        FilterType::Triangle,
    ))
}

/// Straight-alpha "over" compositing of `top` onto `base` in place.
pub fn composite_over(base: &mut RgbaImage, top: &RgbaImage) {
    for (b, t) in base.pixels_mut().zip(top.pixels()) {
        let ta = t.0[3] as u16;
        if ta == 255 {
            *b = *t;
            continue;
        }
        if ta == 0 {
            continue;
        }
        let ba = b.0[3] as u16;
        let inv = 255 - ta;
        let out_a = ta + mul_div255(ba, inv);
        for i in 0..3 {
            let tc = t.0[i] as u16;
            let bc = b.0[i] as u16;
            // Straight-alpha over; denominator guarded since out_a >= ta > 0.
            let num = tc as u32 * ta as u32 + bc as u32 * mul_div255(ba, inv) as u32;
            b.0[i] = (num / out_a as u32).min(255) as u8;
        }
        b.0[3] = out_a.min(255) as u8;
    }
}

fn mul_div255(x: u16, y: u16) -> u16 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u16
}

/// Writes a PNG via a named temp file in the target directory, renamed into
/// place once fully written.
pub fn write_png_atomic(image: &RgbaImage, path: &Path) -> RenderResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(&tmp);
        image
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(RenderError::Image)?;
    }
    tmp.persist(path)
        .map_err(|e| RenderError::Io(e.error))?;
    Ok(())
}
