use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::engine::error::TransitionError;

/// Lifecycle of a queued video.
///
/// ```text
/// NotStarted -> Waiting -> Processing -> Finished
///                  |            |
///                  +------------+--> NotStarted (cancel / error)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    NotStarted,
    Waiting,
    Processing,
    Finished,
}

impl JobStatus {
    /// Transition table. Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        self == next
            || matches!(
                (self, next),
                (NotStarted, Waiting)
                    | (Waiting, Processing)
                    | (Waiting, NotStarted)
                    | (Processing, Finished)
                    | (Processing, NotStarted)
            )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::Waiting => "Waiting",
            Self::Processing => "Processing",
            Self::Finished => "Finished",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One video file queued for upscaling. Identity is the source path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub path: PathBuf,
    pub name: String,
    pub duration_s: Option<f64>,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
    pub has_subtitles: bool,
    /// Source pixel format, reused around the libplacebo filter
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    #[serde(default)]
    status: JobStatus,
}

pub(crate) fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

impl Job {
    /// Create a job for `path` with the display name taken from the file name
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Self {
            path,
            name,
            duration_s: None,
            size_bytes: 0,
            width: 0,
            height: 0,
            has_subtitles: false,
            pixel_format: default_pixel_format(),
            status: JobStatus::NotStarted,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == JobStatus::Finished
    }

    /// Guarded status change, rejects anything outside the transition table
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Explicit reset, the only way out of `Finished`
    pub fn reset(&mut self) {
        self.status = JobStatus::NotStarted;
    }
}

/// Hardware vendor tag carried by every encoder in the catalog
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum Vendor {
    Cpu,
    Nvidia,
    Amd,
    Intel,
}

impl Vendor {
    /// Lowercase tag as it appears in adapter names
    pub fn tag(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Nvidia => "nvidia",
            Self::Amd => "advanced micro devices",
            Self::Intel => "intel",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct EncoderDescriptor {
    pub name: &'static str,
    /// FFmpeg `-c:v` value
    pub codec: &'static str,
    pub vendor: Vendor,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ResolutionOption {
    pub width: u32,
    pub height: u32,
    /// 16:9 QHD-family preset; the default selection is taken from these
    pub qhd_class: bool,
}

impl ResolutionOption {
    pub fn label(&self) -> String {
        let aspect = if self.qhd_class { "16:9" } else { "4:3" };
        format!("{}x{} ({})", self.width, self.height, aspect)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ShaderOption {
    pub name: &'static str,
    /// Passed verbatim to libplacebo's `custom_shader_path`
    pub path: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Mp4,
    Avi,
    Mkv,
}

impl OutputFormat {
    /// Presentation order, indices in settings refer to this list
    pub const ALL: [OutputFormat; 3] = [Self::Mp4, Self::Avi, Self::Mkv];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
            Self::Mkv => "mkv",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Mp4 => "MP4",
            Self::Avi => "AVI",
            Self::Mkv => "MKV",
        }
    }

    /// Only Matroska can carry the source subtitle streams
    pub fn supports_subtitles(self) -> bool {
        self == Self::Mkv
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "avi" => Some(Self::Avi),
            "mkv" => Some(Self::Mkv),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Constant rate factor, always within 0..=51
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Crf(u8);

impl Crf {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 51;

    /// Accepts values already in range, rejects the rest
    pub fn new(value: i64) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Self)
    }

    /// Clamps out-of-range input onto the nearest bound
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Crf {
    fn default() -> Self {
        Self(20)
    }
}

/// Engine flags selected once at startup and reused for every job
pub type HardwareParams = Vec<String>;

/// Read-only settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    pub resolution: ResolutionOption,
    pub shader: ShaderOption,
    pub encoder: EncoderDescriptor,
    pub crf: Crf,
    pub output_format: OutputFormat,
    pub compatibility_mode: bool,
    pub debug: bool,
}
