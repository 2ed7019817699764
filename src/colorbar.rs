//! Colorbar legend rendering: a horizontal strip sampling the job's color
//! mapping, written as a transparent-background PNG next to the animation.

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::colormap::{ColorMapping, Normalization};
use crate::error::RenderResult;
use crate::raster::write_png_atomic;

const OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);
// Bin ticks need to stand apart from the palettes themselves; the
// precipitation ladder starts at white, so the separator is dark.
const SEPARATOR: Rgba<u8> = Rgba([68, 68, 68, 255]);

/// Renders a `width` x `height` legend strip for `mapping` and writes it
/// atomically to `path`. Continuous mappings get a smooth gradient; discrete
/// mappings get equal-width bins separated by outline-colored ticks.
pub fn render_colorbar(
    mapping: &ColorMapping,
    width: u32,
    height: u32,
    path: &Path,
) -> RenderResult<()> {
    let mut image = RgbaImage::new(width, height);
    let (vmin, vmax) = mapping.range();

    match mapping.normalization() {
        Normalization::Continuous { .. } => {
            for x in 0..width {
                let value = vmin + (x as f64 + 0.5) / width as f64 * (vmax - vmin);
                let rgba = mapping.color_at(value as f32);
                for y in 0..height {
                    image.put_pixel(x, y, Rgba(rgba));
                }
            }
        }
        Normalization::Discrete { .. } => {
            let nbins = mapping.stops().len() as u32;
            for x in 0..width {
                let bin = (x * nbins / width).min(nbins - 1) as usize;
                let [r, g, b] = mapping.stops()[bin];
                let separator = x > 0 && x * nbins / width != (x - 1) * nbins / width;
                let rgba = if separator { SEPARATOR } else { Rgba([r, g, b, 255]) };
                for y in 0..height {
                    image.put_pixel(x, y, rgba);
                }
            }
        }
    }

    outline(&mut image);
    write_png_atomic(&image, path)
}

fn outline(image: &mut RgbaImage) {
    let (w, h) = image.dimensions();
    for x in 0..w {
        image.put_pixel(x, 0, OUTLINE);
        image.put_pixel(x, h - 1, OUTLINE);
    }
    for y in 0..h {
        image.put_pixel(0, y, OUTLINE);
        image.put_pixel(w - 1, y, OUTLINE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::MappingSpec;

    #[test]
    fn continuous_colorbar_matches_gradient_direction() {
        let mapping = MappingSpec::Thermal { vmin: 0.0, vmax: 1.0 }.resolve().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar.png");
        render_colorbar(&mapping, 120, 12, &path).unwrap();

        let img = image::open(&path).unwrap().into_rgba8();
        assert_eq!(img.dimensions(), (120, 12));
        // Interior row, away from the outline: left end is the cold color.
        let left = img.get_pixel(2, 6).0;
        let expected = mapping.color_at(((2.0f64 + 0.5) / 120.0) as f32);
        assert_eq!(left, expected);
    }

    #[test]
    fn discrete_colorbar_starts_with_first_bin() {
        let mapping = MappingSpec::Precipitation { max_rate: 10.0 }.resolve().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar.png");
        render_colorbar(&mapping, 160, 10, &path).unwrap();

        let img = image::open(&path).unwrap().into_rgba8();
        assert_eq!(img.get_pixel(2, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn discrete_separators_contrast_with_white_bins() {
        // 16 bins over 160 px puts the first separator at x = 10; it must
        // not blend into the white first bins.
        let mapping = MappingSpec::Precipitation { max_rate: 10.0 }.resolve().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bar.png");
        render_colorbar(&mapping, 160, 10, &path).unwrap();

        let img = image::open(&path).unwrap().into_rgba8();
        let tick = img.get_pixel(10, 5).0;
        assert_ne!(tick, [255, 255, 255, 255]);
        assert_eq!(tick, [68, 68, 68, 255]);
        // Neighboring bin pixels keep their palette colors.
        assert_eq!(img.get_pixel(9, 5).0, [255, 255, 255, 255]);
    }
}
