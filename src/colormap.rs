//! # Color Mapping Resolver
//!
//! Converts scalar field values into pixel colors. A mapping is an immutable
//! (color stops, normalization) pair resolved once per job and shared
//! read-only across all frame renders. Two normalization modes exist:
//!
//! - **Continuous**: linear interpolation between `vmin` and `vmax`, values
//!   outside the range clipped to the end colors.
//! - **Discrete**: a strictly increasing boundary list partitioning the range
//!   into bins, one fixed color per bin, with an explicit overflow color for
//!   values above the last boundary when `extend = max`.
//!
//! Built-in palettes mirror the products this tool is used with: `thermal`
//! for temperature/SST fields, `blues_r` for current speed, and the 16-color
//! precipitation palette with its fractional boundary ladder.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Out-of-range handling for a color mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Extend {
    Neither,
    Min,
    Max,
    #[default]
    Both,
}

/// Normalization operating on raw field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Normalization {
    /// Linear min/max scaling.
    Continuous { vmin: f64, vmax: f64, extend: Extend },
    /// Ordered boundary binning. With `extend = max` the last color is the
    /// overflow bin for values above the final boundary.
    Discrete { bounds: Vec<f64>, extend: Extend },
}

/// Immutable (color stops, normalization) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMapping {
    stops: Vec<[u8; 3]>,
    norm: Normalization,
}

/// Declarative mapping configuration, resolved once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "palette", rename_all = "snake_case")]
pub enum MappingSpec {
    /// Continuous thermal palette (temperature, SST).
    Thermal { vmin: f64, vmax: f64 },
    /// Continuous reversed-Blues palette (current speed).
    BluesR { vmin: f64, vmax: f64 },
    /// Discrete 16-color precipitation palette. `max_rate` scales the
    /// boundary ladder so the top bin sits at `max_rate` mm/hour.
    Precipitation { max_rate: f64 },
    /// Custom palette from hex color stops.
    Custom {
        colors: Vec<String>,
        #[serde(flatten)]
        normalization: Normalization,
    },
}

impl MappingSpec {
    /// Resolves this configuration into a concrete mapping, validating the
    /// stop/boundary shape. Resolution is deterministic: the same spec always
    /// yields an identical mapping.
    pub fn resolve(&self) -> RenderResult<ColorMapping> {
        match self {
            MappingSpec::Thermal { vmin, vmax } => ColorMapping::continuous(
                parse_palette(THERMAL)?,
                *vmin,
                *vmax,
                Extend::Both,
            ),
            MappingSpec::BluesR { vmin, vmax } => ColorMapping::continuous(
                parse_palette(BLUES_R)?,
                *vmin,
                *vmax,
                Extend::Max,
            ),
            MappingSpec::Precipitation { max_rate } => {
                let bounds = scale_bounds(&precipitation_bounds(), max_rate / 30.0)?;
                ColorMapping::discrete(parse_palette(PRECIPITATION)?, bounds, Extend::Max)
            }
            MappingSpec::Custom {
                colors,
                normalization,
            } => {
                let stops: RenderResult<Vec<[u8; 3]>> =
                    colors.iter().map(|c| hex_to_rgb(c)).collect();
                match normalization {
                    Normalization::Continuous { vmin, vmax, extend } => {
                        ColorMapping::continuous(stops?, *vmin, *vmax, *extend)
                    }
                    Normalization::Discrete { bounds, extend } => {
                        ColorMapping::discrete(stops?, bounds.clone(), *extend)
                    }
                }
            }
        }
    }
}

impl ColorMapping {
    pub fn continuous(
        stops: Vec<[u8; 3]>,
        vmin: f64,
        vmax: f64,
        extend: Extend,
    ) -> RenderResult<Self> {
        if stops.len() < 2 {
            return Err(RenderError::Config(
                "continuous mapping needs at least two color stops".to_string(),
            ));
        }
        if !(vmin < vmax) {
            return Err(RenderError::Config(format!(
                "continuous mapping needs vmin < vmax, got [{}, {}]",
                vmin, vmax
            )));
        }
        Ok(ColorMapping {
            stops,
            norm: Normalization::Continuous { vmin, vmax, extend },
        })
    }

    pub fn discrete(stops: Vec<[u8; 3]>, bounds: Vec<f64>, extend: Extend) -> RenderResult<Self> {
        validate_increasing(&bounds)?;
        // N boundaries delimit N-1 bins; extending past the last boundary
        // claims one extra color for the overflow bin.
        let wanted = match extend {
            Extend::Max | Extend::Both => bounds.len(),
            Extend::Neither | Extend::Min => bounds.len().saturating_sub(1),
        };
        if stops.len() != wanted {
            return Err(RenderError::Config(format!(
                "discrete mapping with {} boundaries and extend={:?} needs {} colors, got {}",
                bounds.len(),
                extend,
                wanted,
                stops.len()
            )));
        }
        Ok(ColorMapping {
            stops,
            norm: Normalization::Discrete { bounds, extend },
        })
    }

    pub fn normalization(&self) -> &Normalization {
        &self.norm
    }

    pub fn stops(&self) -> &[[u8; 3]] {
        &self.stops
    }

    /// The value range the mapping covers (used for colorbar layout).
    pub fn range(&self) -> (f64, f64) {
        match &self.norm {
            Normalization::Continuous { vmin, vmax, .. } => (*vmin, *vmax),
            Normalization::Discrete { bounds, .. } => (bounds[0], bounds[bounds.len() - 1]),
        }
    }

    /// Maps a field value to an RGBA color. NaN (masked cells, e.g. land in
    /// ocean products) maps to fully transparent.
    pub fn color_at(&self, value: f32) -> [u8; 4] {
        if value.is_nan() {
            return [0, 0, 0, 0];
        }
        let v = value as f64;
        match &self.norm {
            Normalization::Continuous { vmin, vmax, .. } => {
                let t = ((v - vmin) / (vmax - vmin)).clamp(0.0, 1.0);
                let [r, g, b] = sample_gradient(&self.stops, t);
                [r, g, b, 255]
            }
            Normalization::Discrete { bounds, extend } => {
                let nbins = bounds.len() - 1;
                let idx = if v >= bounds[nbins] {
                    match extend {
                        Extend::Max | Extend::Both => nbins,
                        _ => nbins - 1,
                    }
                } else if v < bounds[0] {
                    0
                } else {
                    bounds.windows(2).position(|w| v >= w[0] && v < w[1]).unwrap_or(0)
                };
                let [r, g, b] = self.stops[idx.min(self.stops.len() - 1)];
                [r, g, b, 255]
            }
        }
    }
}

/// Interpolates the gradient defined by evenly spaced `stops` at `t` in [0,1].
fn sample_gradient(stops: &[[u8; 3]], t: f64) -> [u8; 3] {
    let last = stops.len() - 1;
    let pos = t * last as f64;
    let lo = (pos.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    let frac = pos - lo as f64;
    let lerp = |a: u8, b: u8| (a as f64 * (1.0 - frac) + b as f64 * frac).round() as u8;
    [
        lerp(stops[lo][0], stops[hi][0]),
        lerp(stops[lo][1], stops[hi][1]),
        lerp(stops[lo][2], stops[hi][2]),
    ]
}

/// Parse hex color string to RGB.
pub fn hex_to_rgb(hex: &str) -> RenderResult<[u8; 3]> {
    let raw = hex.trim_start_matches('#');
    if raw.len() != 6 {
        return Err(RenderError::Config(format!("invalid hex color '{}'", hex)));
    }
    let parse = |r: std::ops::Range<usize>| {
        u8::from_str_radix(&raw[r], 16)
            .map_err(|_| RenderError::Config(format!("invalid hex color '{}'", hex)))
    };
    Ok([parse(0..2)?, parse(2..4)?, parse(4..6)?])
}

/// Relative luminance of an sRGB color (ITU-R BT.709 weights).
pub fn luminance(rgb: [u8; 3]) -> f64 {
    0.2126 * rgb[0] as f64 + 0.7152 * rgb[1] as f64 + 0.0722 * rgb[2] as f64
}

/// Scales a boundary list by `k`, preserving bin structure. `k <= 0` would
/// collapse or reverse the ordering and is a configuration error.
pub fn scale_bounds(bounds: &[f64], k: f64) -> RenderResult<Vec<f64>> {
    if !(k > 0.0) {
        return Err(RenderError::Config(format!(
            "boundary scale factor must be positive, got {}",
            k
        )));
    }
    let scaled: Vec<f64> = bounds.iter().map(|b| b * k).collect();
    validate_increasing(&scaled)?;
    Ok(scaled)
}

fn validate_increasing(bounds: &[f64]) -> RenderResult<()> {
    if bounds.len() < 2 {
        return Err(RenderError::Config(
            "boundary list needs at least two values".to_string(),
        ));
    }
    if bounds.windows(2).any(|w| w[1] <= w[0]) {
        return Err(RenderError::Config(format!(
            "boundary list must be strictly increasing: {:?}",
            bounds
        )));
    }
    Ok(())
}

fn parse_palette(hexes: &[&str]) -> RenderResult<Vec<[u8; 3]>> {
    hexes.iter().map(|h| hex_to_rgb(h)).collect()
}

/// Dark-to-bright palette for temperature-like fields.
const THERMAL: &[&str] = &[
    "#042333", "#15356f", "#3e3c8e", "#67458f", "#8e4e87", "#b55c77", "#d86f63", "#f08a4e",
    "#fbaf3b", "#f5e626",
];

/// Reversed Blues, dark (slow) to near-white (fast).
const BLUES_R: &[&str] = &[
    "#08306b", "#08519c", "#2171b5", "#4292c6", "#6baed6", "#9ecae1", "#c6dbef", "#f7fbff",
];

/// 16-color precipitation-rate palette, white through greens, yellows, reds
/// into saturated purples for extreme rates.
const PRECIPITATION: &[&str] = &[
    "#ffffff", "#c7e9c0", "#a1d99b", "#74c476", "#31a353", "#006d2c", "#fffa8a", "#ffcc4f",
    "#fe8d3c", "#fc4e2a", "#d61a1c", "#ad0026", "#700026", "#3b0030", "#4c0073", "#ffdbff",
];

/// Canonical precipitation boundary ladder in mm/hour for a 30 mm/hour top
/// bin; scaled by `max_rate / 30` at resolution time.
pub fn precipitation_bounds() -> Vec<f64> {
    vec![
        0.0, 0.01, 0.1, 0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 6.0, 8.0, 10.0, 15.0, 20.0, 30.0,
    ]
}
