// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::{
    Crf, DEFAULT_RESOLUTION, HardwareProfile, OutputFormat, RESOLUTIONS, RunConfiguration,
    SHADERS,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// FFmpeg binary, resolved through PATH when not absolute
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Process image name used to kill the engine on cancel.
    /// Derived from `ffmpeg_path` when unset.
    #[serde(default)]
    pub image_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Index into the resolution catalog
    #[serde(default = "default_resolution")]
    pub resolution: usize,

    /// Index into the shader catalog
    #[serde(default)]
    pub shader: usize,

    /// Index into the encoders available on this host; unset picks the
    /// detected primary codec
    #[serde(default)]
    pub encoder: Option<usize>,

    #[serde(default = "default_crf")]
    pub crf: i64,

    /// Index into MP4, AVI, MKV
    #[serde(default = "default_output_format")]
    pub output_format: usize,

    /// Drop hardware decode flags and quality presets (older drivers)
    #[serde(default)]
    pub compatibility_mode: bool,

    #[serde(default)]
    pub debug_mode: bool,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_resolution() -> usize {
    DEFAULT_RESOLUTION
}

fn default_crf() -> i64 {
    Crf::default().value() as i64
}

fn default_output_format() -> usize {
    2 // MKV keeps subtitles
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            image_name: None,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            shader: 0,
            encoder: None,
            crf: default_crf(),
            output_format: default_output_format(),
            compatibility_mode: false,
            debug_mode: false,
        }
    }
}

/// A stored selection that does not map onto a catalog entry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Resolution index {index} out of range (0..{len})")]
    Resolution { index: usize, len: usize },

    #[error("Shader index {index} out of range (0..{len})")]
    Shader { index: usize, len: usize },

    #[error("Encoder index {index} out of range, this host offers {len} encoders")]
    Encoder { index: usize, len: usize },

    #[error("Output format index {index} out of range (0..{len})")]
    OutputFormat { index: usize, len: usize },
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("upscaler")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("upscaler")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or fall back to defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Image name to kill on cancel
    pub fn image_name(&self) -> String {
        self.engine.image_name.clone().unwrap_or_else(|| {
            crate::engine::ImageNameKiller::for_program(&self.engine.ffmpeg_path)
                .image_name()
                .to_string()
        })
    }

    /// Map the stored selections onto the catalogs and the encoders this host offers
    pub fn resolve(&self, hardware: &HardwareProfile) -> Result<RunConfiguration, ConfigError> {
        let d = &self.defaults;

        let resolution = *RESOLUTIONS.get(d.resolution).ok_or(ConfigError::Resolution {
            index: d.resolution,
            len: RESOLUTIONS.len(),
        })?;
        let shader = *SHADERS.get(d.shader).ok_or(ConfigError::Shader {
            index: d.shader,
            len: SHADERS.len(),
        })?;

        let encoder_index = d.encoder.unwrap_or_else(|| hardware.primary_encoder_index());
        let encoder = *hardware
            .available_encoders
            .get(encoder_index)
            .ok_or(ConfigError::Encoder {
                index: encoder_index,
                len: hardware.available_encoders.len(),
            })?;

        let output_format = *OutputFormat::ALL
            .get(d.output_format)
            .ok_or(ConfigError::OutputFormat {
                index: d.output_format,
                len: OutputFormat::ALL.len(),
            })?;

        Ok(RunConfiguration {
            resolution,
            shader,
            encoder,
            crf: Crf::clamped(d.crf),
            output_format,
            compatibility_mode: d.compatibility_mode,
            debug: d.debug_mode,
        })
    }
}
