//! # Input Configuration Module
//!
//! Configuration parsing and validation for ncanim rendering jobs. A job
//! configuration file (JSON or YAML) specifies everything one animation needs:
//! the dataset source, the derived field, the color mapping, canvas geometry,
//! overlay assets, output directories, scheduler limits and encoder settings.
//!
//! Output directories are named explicitly here and created once at pipeline
//! start; nothing is created as an import-time side effect.
//!
//! ## Example
//!
//! ```rust
//! use ncanim::input::JobConfig;
//!
//! let json = r#"
//! {
//!   "kind": "temperature",
//!   "source": {
//!     "type": "single",
//!     "path": "2m_temperature.nc"
//!   },
//!   "field": {
//!     "type": "scalar",
//!     "variable": "t2m"
//!   },
//!   "mapping": { "palette": "thermal", "vmin": 243.0, "vmax": 313.0 }
//! }"#;
//! let config = JobConfig::from_json(json)?;
//! assert_eq!(config.kind, "temperature");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::colormap::MappingSpec;
use crate::error::{RenderError, RenderResult};

/// Main configuration structure for one rendering job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Frame-name stem, e.g. `"sst"` produces `sst00000.png`, `sst00001.png`, ...
    pub kind: String,
    /// Where the gridded data comes from
    pub source: SourceConfig,
    /// The 2D field derived per time index
    pub field: FieldConfig,
    /// Color mapping applied to the field
    pub mapping: MappingSpec,
    /// Canvas geometry
    #[serde(default)]
    pub canvas: CanvasConfig,
    /// Static geographic reference layers
    #[serde(default)]
    pub overlays: OverlayConfig,
    /// Output directory layout
    #[serde(default)]
    pub output: OutputConfig,
    /// Worker-pool limits
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Encoder settings
    #[serde(default)]
    pub encode: EncodeSettings,
    /// Optional colorbar legend
    #[serde(default)]
    pub colorbar: Option<ColorbarConfig>,
}

/// Dataset source: one file with a time axis, or one file per day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A single NetCDF file; frame `n` reads time index `n`.
    Single {
        path: PathBuf,
        #[serde(default = "default_time_axis")]
        time_axis: String,
        #[serde(default = "default_lat_axis")]
        lat_axis: String,
        #[serde(default = "default_lon_axis")]
        lon_axis: String,
    },
    /// One file per day; frame `n` reads time index 0 of the file whose name
    /// is `start_date + n` days formatted through `pattern` (chrono strftime,
    /// e.g. `"oscar_currents_final_%Y%m%d.nc4"`).
    DatedSeries {
        dir: PathBuf,
        pattern: String,
        start_date: NaiveDate,
        days: u32,
        #[serde(default = "default_lat_axis")]
        lat_axis: String,
        #[serde(default = "default_lon_axis")]
        lon_axis: String,
    },
}

fn default_time_axis() -> String {
    "time".to_string()
}

fn default_lat_axis() -> String {
    "latitude".to_string()
}

fn default_lon_axis() -> String {
    "longitude".to_string()
}

impl SourceConfig {
    pub fn lat_axis(&self) -> &str {
        match self {
            SourceConfig::Single { lat_axis, .. } => lat_axis,
            SourceConfig::DatedSeries { lat_axis, .. } => lat_axis,
        }
    }

    pub fn lon_axis(&self) -> &str {
        match self {
            SourceConfig::Single { lon_axis, .. } => lon_axis,
            SourceConfig::DatedSeries { lon_axis, .. } => lon_axis,
        }
    }

    /// Resolves frame index `n` to the file to open and the time index to
    /// read within it.
    pub fn locate(&self, n: usize) -> RenderResult<(PathBuf, usize)> {
        match self {
            SourceConfig::Single { path, .. } => Ok((path.clone(), n)),
            SourceConfig::DatedSeries {
                dir,
                pattern,
                start_date,
                days,
                ..
            } => {
                if n >= *days as usize {
                    return Err(RenderError::Shape(format!(
                        "frame index {} outside dated series of {} days",
                        n, days
                    )));
                }
                let date = *start_date + chrono::Duration::days(n as i64);
                let name = date.format(pattern).to_string();
                Ok((dir.join(name), 0))
            }
        }
    }

    /// Number of frames this source yields. For a single file this reads the
    /// time-axis length and closes the handle again; workers re-open the file
    /// independently.
    pub fn frame_count(&self) -> RenderResult<usize> {
        match self {
            SourceConfig::Single {
                path, time_axis, ..
            } => {
                let ds = crate::dataset::Dataset::open(path)?;
                let len = ds.axis_len(time_axis)?;
                ds.close()?;
                Ok(len)
            }
            SourceConfig::DatedSeries { days, .. } => Ok(*days as usize),
        }
    }
}

/// The 2D field to visualize for each time index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldConfig {
    /// A scalar variable with an affine unit conversion applied as
    /// `scale * value + offset` (Kelvin to Celsius: offset -273.15;
    /// m/hour to mm/hour: scale 1000).
    Scalar {
        variable: String,
        #[serde(default = "default_scale")]
        scale: f64,
        #[serde(default)]
        offset: f64,
        #[serde(default)]
        level: Option<usize>,
    },
    /// Vector magnitude sqrt(u² + v²) of two component variables.
    Magnitude {
        u_variable: String,
        v_variable: String,
        #[serde(default)]
        level: Option<usize>,
    },
}

fn default_scale() -> f64 {
    1.0
}

/// Rendered frame geometry. 1920x960 is a 2:1 canvas matching the global
/// equirectangular extent; both sides must stay even for yuv420p output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        CanvasConfig {
            width: 1920,
            height: 960,
        }
    }
}

/// Static overlay assets composited over the field in fixed z-order:
/// background imagery first, then the boundary layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Background basemap imagery (land relief etc.), RGBA
    pub background: Option<PathBuf>,
    pub coastline: Option<PathBuf>,
    pub borders: Option<PathBuf>,
    pub lakes: Option<PathBuf>,
}

impl OverlayConfig {
    /// Layer paths in compositing order.
    pub fn layers(&self) -> Vec<&PathBuf> {
        [&self.background, &self.coastline, &self.borders, &self.lakes]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Output directory layout, acquired at pipeline start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub frames_dir: PathBuf,
    pub colorbars_dir: PathBuf,
    pub animations_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            frames_dir: PathBuf::from("frames"),
            colorbars_dir: PathBuf::from("colorbars"),
            animations_dir: PathBuf::from("animations"),
        }
    }
}

/// Worker-pool limits for frame rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper cap on workers; the effective pool size is
    /// `min(max_workers, available_parallelism)`.
    pub max_workers: usize,
    /// Wall-clock budget per frame in seconds; a frame finishing over budget
    /// fails the batch.
    pub frame_budget_secs: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            max_workers: 24,
            frame_budget_secs: None,
        }
    }
}

/// Video container/codec choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    H264,
    Vp9,
}

impl Codec {
    pub fn tag(&self) -> &'static str {
        match self {
            Codec::H264 => "h264",
            Codec::Vp9 => "vp9",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Codec::H264 => "mp4",
            Codec::Vp9 => "webm",
        }
    }
}

/// Encoder settings for the ffmpeg invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeSettings {
    pub frame_rate: u32,
    pub codec: Codec,
    /// Encoder speed/quality preset (H.264 only)
    pub preset: String,
    /// Constant rate factor, lower is higher quality
    pub crf: u8,
    /// Downscale the output to half resolution (`-vf scale=iw/2:ih/2`)
    pub half_scale: bool,
    /// Abort if ffmpeg has not exited after this many seconds
    pub timeout_secs: Option<u64>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        EncodeSettings {
            frame_rate: 24,
            codec: Codec::H264,
            preset: "veryslow".to_string(),
            crf: 25,
            half_scale: false,
            timeout_secs: None,
        }
    }
}

/// Colorbar legend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorbarConfig {
    /// Axis label, e.g. "Temperature (°C)"
    pub label: String,
    #[serde(default = "default_colorbar_width")]
    pub width: u32,
    #[serde(default = "default_colorbar_height")]
    pub height: u32,
}

fn default_colorbar_width() -> u32 {
    720
}

fn default_colorbar_height() -> u32 {
    60
}

impl JobConfig {
    /// Loads a job configuration from a JSON or YAML file, chosen by
    /// extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|_| RenderError::NotFound(path.to_path_buf()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| RenderError::Config(format!("invalid YAML config: {}", e)))?,
            _ => serde_json::from_str(&content)
                .map_err(|e| RenderError::Config(format!("invalid JSON config: {}", e)))?,
        };
        Ok(config)
    }

    /// Loads a job configuration from a JSON string.
    pub fn from_json(json_str: &str) -> RenderResult<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| RenderError::Config(format!("invalid JSON config: {}", e)))
    }

    /// Validates cross-field constraints that serde cannot express.
    pub fn validate(&self) -> RenderResult<()> {
        if self.kind.is_empty()
            || !self.kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RenderError::Config(format!(
                "kind '{}' must be a non-empty [A-Za-z0-9_] token (it names the frame files)",
                self.kind
            )));
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(RenderError::Config(
                "canvas dimensions must be non-zero".to_string(),
            ));
        }
        if self.canvas.width % 2 != 0 || self.canvas.height % 2 != 0 {
            // yuv420p halves the chroma plane, odd canvases break the encoder.
            return Err(RenderError::Config(
                "canvas width and height must be even for yuv420p output".to_string(),
            ));
        }
        if self.scheduler.max_workers == 0 {
            return Err(RenderError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.encode.frame_rate == 0 {
            return Err(RenderError::Config("frame_rate must be non-zero".to_string()));
        }
        self.mapping.resolve().map(|_| ())
    }

    /// File name of frame `n`: `<kind><n zero-padded to 5 digits>.png`.
    pub fn frame_filename(&self, n: usize) -> String {
        frame_filename(&self.kind, n)
    }

    /// printf-style sequence pattern consumed by the encoder.
    pub fn frame_pattern(&self) -> String {
        format!("{}%05d.png", self.kind)
    }

    /// Output video path, e.g. `animations/sst_h264_veryslow_crf25.mp4`.
    pub fn video_path(&self) -> PathBuf {
        let e = &self.encode;
        self.output.animations_dir.join(format!(
            "{}_{}_{}_crf{}.{}",
            self.kind,
            e.codec.tag(),
            e.preset,
            e.crf,
            e.codec.extension()
        ))
    }

    /// Colorbar legend path, e.g. `colorbars/sst_colorbar.png`.
    pub fn colorbar_path(&self) -> PathBuf {
        self.output
            .colorbars_dir
            .join(format!("{}_colorbar.png", self.kind))
    }
}

/// File name of frame `n` for a given kind.
pub fn frame_filename(kind: &str, n: usize) -> String {
    format!("{}{:05}.png", kind, n)
}

/// Built-in job presets mirroring the datasets this tool grew up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// ERA5 2m air temperature, hourly single file
    Temperature,
    /// ERA5 total precipitation, hourly single file
    Precipitation,
    /// GHRSST L4 analysed SST, one file per day
    Sst,
    /// OSCAR surface current speed, one file per day
    Speed,
}

impl Preset {
    pub fn job(&self) -> JobConfig {
        match self {
            Preset::Temperature => JobConfig {
                kind: "temperature".to_string(),
                source: SourceConfig::Single {
                    path: PathBuf::from("2m_temperature.nc"),
                    time_axis: default_time_axis(),
                    lat_axis: default_lat_axis(),
                    lon_axis: default_lon_axis(),
                },
                field: FieldConfig::Scalar {
                    variable: "t2m".to_string(),
                    scale: 1.0,
                    offset: 0.0,
                    level: None,
                },
                mapping: MappingSpec::Thermal {
                    vmin: 243.15,
                    vmax: 313.15,
                },
                canvas: CanvasConfig::default(),
                overlays: OverlayConfig::default(),
                output: OutputConfig::default(),
                scheduler: SchedulerConfig::default(),
                encode: EncodeSettings {
                    preset: "fast".to_string(),
                    ..EncodeSettings::default()
                },
                colorbar: Some(ColorbarConfig {
                    label: "Temperature (°C)".to_string(),
                    width: default_colorbar_width(),
                    height: default_colorbar_height(),
                }),
            },
            Preset::Precipitation => JobConfig {
                kind: "precipitation".to_string(),
                source: SourceConfig::Single {
                    path: PathBuf::from("total_precipitation.nc"),
                    time_axis: default_time_axis(),
                    lat_axis: default_lat_axis(),
                    lon_axis: default_lon_axis(),
                },
                field: FieldConfig::Scalar {
                    variable: "tp".to_string(),
                    // ERA5 stores metres of accumulation per hour.
                    scale: 1000.0,
                    offset: 0.0,
                    level: None,
                },
                mapping: MappingSpec::Precipitation { max_rate: 10.0 },
                canvas: CanvasConfig::default(),
                overlays: OverlayConfig::default(),
                output: OutputConfig::default(),
                scheduler: SchedulerConfig::default(),
                encode: EncodeSettings {
                    preset: "fast".to_string(),
                    ..EncodeSettings::default()
                },
                colorbar: Some(ColorbarConfig {
                    label: "Precipitation (mm/hour)".to_string(),
                    width: default_colorbar_width(),
                    height: default_colorbar_height(),
                }),
            },
            Preset::Sst => JobConfig {
                kind: "sst".to_string(),
                source: SourceConfig::DatedSeries {
                    dir: PathBuf::from("data/ghrsst"),
                    pattern: "%Y%m%d120000-CMC-L4_GHRSST-SSTfnd-CMC0.1deg-GLOB-v02.0-fv03.0.nc4"
                        .to_string(),
                    start_date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                    days: 365,
                    lat_axis: "lat".to_string(),
                    lon_axis: "lon".to_string(),
                },
                field: FieldConfig::Scalar {
                    variable: "analysed_sst".to_string(),
                    scale: 1.0,
                    offset: -273.15,
                    level: None,
                },
                mapping: MappingSpec::Thermal {
                    vmin: -2.0,
                    vmax: 32.0,
                },
                canvas: CanvasConfig::default(),
                overlays: OverlayConfig {
                    background: Some(PathBuf::from("HYP_HR_SR/HYP_HR_SR_transparent.png")),
                    coastline: Some(PathBuf::from("assets/coastline_50m.png")),
                    borders: Some(PathBuf::from("assets/borders_50m.png")),
                    lakes: None,
                },
                output: OutputConfig::default(),
                scheduler: SchedulerConfig::default(),
                encode: EncodeSettings {
                    half_scale: true,
                    ..EncodeSettings::default()
                },
                colorbar: Some(ColorbarConfig {
                    label: "Temperature (°C)".to_string(),
                    width: default_colorbar_width(),
                    height: default_colorbar_height(),
                }),
            },
            Preset::Speed => JobConfig {
                kind: "ocean_speed".to_string(),
                source: SourceConfig::DatedSeries {
                    dir: PathBuf::from("data/oscar"),
                    pattern: "oscar_currents_final_%Y%m%d.nc4".to_string(),
                    start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    days: 366,
                    lat_axis: "lat".to_string(),
                    lon_axis: "lon".to_string(),
                },
                field: FieldConfig::Magnitude {
                    u_variable: "u".to_string(),
                    v_variable: "v".to_string(),
                    level: None,
                },
                mapping: MappingSpec::BluesR { vmin: 0.0, vmax: 2.0 },
                canvas: CanvasConfig::default(),
                overlays: OverlayConfig {
                    background: Some(PathBuf::from("HYP_HR_SR/HYP_HR_SR_transparent.png")),
                    coastline: Some(PathBuf::from("assets/coastline_50m.png")),
                    borders: Some(PathBuf::from("assets/borders_50m.png")),
                    lakes: None,
                },
                output: OutputConfig::default(),
                scheduler: SchedulerConfig {
                    // The OSCAR files decode slowly; more workers than this
                    // saturate the storage node.
                    max_workers: 8,
                    frame_budget_secs: None,
                },
                encode: EncodeSettings {
                    half_scale: true,
                    ..EncodeSettings::default()
                },
                colorbar: Some(ColorbarConfig {
                    label: "Ocean current speed (m/s)".to_string(),
                    width: default_colorbar_width(),
                    height: default_colorbar_height(),
                }),
            },
        }
    }
}
