use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upscaler")]
#[command(about = "Batch video upscaler using FFmpeg, libplacebo and Anime4K shaders")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Video files or directories to upscale (mp4, avi, mkv)
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub overrides: RunOverrides,
}

/// Per-invocation overrides of the `[defaults]` config section
#[derive(clap::Args, Debug, Default, Clone)]
pub struct RunOverrides {
    /// Resolution index (see `upscaler list`)
    #[arg(long, global = true)]
    pub resolution: Option<usize>,

    /// Shader index (see `upscaler list`)
    #[arg(long, global = true)]
    pub shader: Option<usize>,

    /// Encoder index among the encoders detected on this host
    #[arg(long, global = true)]
    pub encoder: Option<usize>,

    /// Constant rate factor, clamped into 0-51
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub crf: Option<i64>,

    /// Output format index: 0 = MP4, 1 = AVI, 2 = MKV
    #[arg(long, global = true)]
    pub format: Option<usize>,

    /// Skip hardware decode flags and encoder presets
    #[arg(long, global = true)]
    pub compat: bool,

    /// Log the working directory, paths and full FFmpeg command per job
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upscale every input in order (default)
    Run {
        inputs: Vec<PathBuf>,
    },

    /// Show ffmpeg commands without executing
    DryRun {
        inputs: Vec<PathBuf>,
    },

    /// Show detected GPU vendors, hwaccel flags and available encoders
    Detect,

    /// Probe a video file and show the queue entry it would produce
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Show config status and location, or create default config if missing
    InitConfig,

    /// List resolution, shader, encoder and format indices
    List,
}

pub fn parse() -> Cli {
    Cli::parse()
}
