//! # CLI Module
//!
//! Command-line interface for ncanim:
//! - Argument parsing with clap
//! - Configuration file loading (JSON/YAML) with preset fallback
//! - Environment variable support with the NCANIM_ prefix
//! - Subcommands for rendering, encoding, inspection and templates
//! - Shell completion generation
//!
//! Pipeline selection is a typed subcommand plus preset enum; an unknown
//! keyword is a parse error rather than a silent no-op.

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::io::Write as _;
use std::path::PathBuf;

use crate::colorbar::render_colorbar;
use crate::info;
use crate::input::{JobConfig, Preset};
use crate::{encode, log as ulog, run_render_job, schedule};

/// Render gridded NetCDF datasets into map frame sequences and videos
#[derive(Parser, Debug)]
#[command(name = "ncanim")]
#[command(about = "Render gridded geophysical NetCDF data as animated maps")]
#[command(version)]
#[command(long_about = "
ncanim renders each time step of a gridded geophysical dataset (atmospheric
reanalysis, sea-surface temperature, ocean currents) as a georeferenced PNG
frame and assembles the numbered sequence into a video with ffmpeg.

FEATURES:
  • Built-in presets: temperature, precipitation, sst, speed
  • Continuous and discrete (boundary-binned) color mappings
  • Static overlays: basemap imagery, coastlines, borders, lakes
  • Bounded parallel frame rendering with fail-fast cancellation
  • Frame gap verification before the encoder runs
  • H.264 MP4 or VP9 WebM output

EXAMPLES:
  # Render a built-in preset end to end
  ncanim render sst

  # Render from a configuration file
  ncanim render --config jobs/sst.yaml

  # Validate a job without touching the filesystem
  ncanim render --config jobs/sst.yaml --dry-run

  # Re-encode an existing frame sequence
  ncanim encode --config jobs/sst.yaml

  # Inspect a dataset
  ncanim info data/2m_temperature.nc --detailed

  # Emit a preset as an editable config
  ncanim template speed --format yaml > speed.yaml
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true, env = "NCANIM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render all frames of a job and encode the video
    Render {
        /// Built-in preset to render (ignored when --config is given)
        #[arg(value_enum)]
        preset: Option<PresetArg>,

        /// Override the worker-pool cap
        #[arg(long, env = "NCANIM_WORKERS")]
        workers: Option<usize>,

        /// Override the output frame rate
        #[arg(long, env = "NCANIM_FPS")]
        fps: Option<u32>,

        /// Validate the configuration without rendering anything
        #[arg(long, env = "NCANIM_DRY_RUN")]
        dry_run: bool,
    },

    /// Render only the colorbar legend for a job
    Colorbar {
        /// Built-in preset (ignored when --config is given)
        #[arg(value_enum)]
        preset: Option<PresetArg>,
    },

    /// Encode an already-rendered frame sequence into a video
    Encode {
        /// Built-in preset (ignored when --config is given)
        #[arg(value_enum)]
        preset: Option<PresetArg>,

        /// Expected frame count; defaults to the job's source length
        #[arg(long)]
        count: Option<usize>,

        /// Override the output frame rate
        #[arg(long, env = "NCANIM_FPS")]
        fps: Option<u32>,
    },

    /// Show information about a NetCDF file
    Info {
        /// NetCDF file path
        file: String,

        /// Show variable and global attributes
        #[arg(long)]
        detailed: bool,

        /// Show only specific variable info
        #[arg(short = 'n', long)]
        variable: Option<String>,

        /// Output format for file information
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Generate configuration templates from the built-in presets
    Template {
        /// Preset to emit
        #[arg(value_enum)]
        preset: PresetArg,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Commands {
    /// True for subcommands whose payload is written to stdout (`template`,
    /// `completions`, `info`). Console banners stay off for these so
    /// redirected output remains parseable.
    pub fn emits_payload_on_stdout(&self) -> bool {
        matches!(
            self,
            Commands::Template { .. } | Commands::Completions { .. } | Commands::Info { .. }
        )
    }

    /// Short name used in console reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Render { .. } => "render",
            Commands::Colorbar { .. } => "colorbar",
            Commands::Encode { .. } => "encode",
            Commands::Info { .. } => "info",
            Commands::Template { .. } => "template",
            Commands::Completions { .. } => "completions",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresetArg {
    /// ERA5 2m air temperature
    Temperature,
    /// ERA5 total precipitation
    Precipitation,
    /// GHRSST L4 analysed sea-surface temperature
    Sst,
    /// OSCAR surface current speed
    Speed,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Temperature => Preset::Temperature,
            PresetArg::Precipitation => Preset::Precipitation,
            PresetArg::Sst => Preset::Sst,
            PresetArg::Speed => Preset::Speed,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON structured output
    Json,
    /// YAML structured output
    Yaml,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON configuration format
    Json,
    /// YAML configuration format
    Yaml,
}

/// Resolves the job a subcommand operates on: an explicit config file wins
/// over a preset; neither is an error.
pub fn load_job(preset: Option<PresetArg>, config: Option<&PathBuf>) -> Result<JobConfig> {
    if let Some(path) = config {
        return JobConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()));
    }
    match preset {
        Some(p) => Ok(Preset::from(p).job()),
        None => bail!("specify a preset (temperature|precipitation|sst|speed) or --config FILE"),
    }
}

/// Executes a parsed command line.
pub fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Render {
            preset,
            workers,
            fps,
            dry_run,
        } => {
            let mut job = load_job(preset, cli.config.as_ref())?;
            if let Some(w) = workers {
                job.scheduler.max_workers = w;
            }
            if let Some(f) = fps {
                job.encode.frame_rate = f;
            }
            if dry_run {
                job.validate()?;
                println!("Configuration is valid; {} would be rendered.", job.kind);
                return Ok(());
            }
            if !cli.quiet {
                ulog::config_echo(&job);
            }
            run_render_job(&job)?;
            if !cli.quiet {
                println!("Wrote {}", job.video_path().display());
            }
            Ok(())
        }

        Commands::Colorbar { preset } => {
            let job = load_job(preset, cli.config.as_ref())?;
            let Some(colorbar) = &job.colorbar else {
                bail!("job '{}' has no colorbar configured", job.kind);
            };
            let mapping = job.mapping.resolve()?;
            std::fs::create_dir_all(&job.output.colorbars_dir)?;
            let path = job.colorbar_path();
            render_colorbar(&mapping, colorbar.width, colorbar.height, &path)?;
            println!("Wrote {} ({})", path.display(), colorbar.label);
            Ok(())
        }

        Commands::Encode { preset, count, fps } => {
            let mut job = load_job(preset, cli.config.as_ref())?;
            if let Some(f) = fps {
                job.encode.frame_rate = f;
            }
            let count = match count {
                Some(c) => c,
                None => job
                    .source
                    .frame_count()
                    .context("cannot derive the frame count from the source; pass --count")?,
            };
            schedule::verify_frames(&job.output.frames_dir, &job.kind, count)?;
            encode::encode(
                &job.output.frames_dir.join(job.frame_pattern()),
                &job.encode,
                &job.video_path(),
            )?;
            println!("Wrote {}", job.video_path().display());
            Ok(())
        }

        Commands::Info {
            file,
            detailed,
            variable,
            format,
        } => {
            let netcdf_info = info::get_netcdf_info(&file, variable.as_deref(), detailed)?;
            match format {
                OutputFormat::Human => info::print_file_info_human(&netcdf_info),
                OutputFormat::Json => info::print_file_info_json(&netcdf_info)?,
                OutputFormat::Yaml => info::print_file_info_yaml(&netcdf_info)?,
            }
            Ok(())
        }

        Commands::Template {
            preset,
            output,
            format,
        } => {
            let job = Preset::from(preset).job();
            let rendered = match format {
                ConfigFormat::Json => serde_json::to_string_pretty(&job)?,
                ConfigFormat::Yaml => serde_yaml::to_string(&job)?,
            };
            write_or_print(output.as_ref(), &rendered)
        }

        Commands::Completions { shell, output } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            match output {
                Some(path) => {
                    let mut file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create '{}'", path.display()))?;
                    clap_complete::generate(shell, &mut cmd, name, &mut file);
                }
                None => {
                    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
                }
            }
            Ok(())
        }
    }
}

fn write_or_print(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create '{}'", path.display()))?;
            file.write_all(content.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => println!("{}", content),
    }
    Ok(())
}
