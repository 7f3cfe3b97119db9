//! Error taxonomy for the upscaling engine.
//!
//! Everything the orchestrator can fail with is a [`RunError`]. Each variant
//! belongs to exactly one [`ErrorKind`], which decides how the failure is
//! reported to the presentation layer.

use std::path::PathBuf;
use thiserror::Error;

use super::core::JobStatus;

/// Broad classification used when reporting a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the user (empty queue, subtitle/format mismatch)
    UserInput,
    /// Host environment problem (working dir, spawn, pipe)
    Environment,
    /// FFmpeg ran and exited with an error
    Engine,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("A run is already active")]
    AlreadyRunning,

    #[error("There are no videos on the list, drop files into the queue first")]
    EmptyQueue,

    #[error(
        "File {name} contains a subtitles stream, output format must be MKV (selected {format})"
    )]
    IncompatibleSubtitles {
        index: usize,
        name: String,
        format: String,
    },

    #[error("Job #{index} ({path}): getting working directory failed: {source}")]
    WorkingDirectory {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Job #{index} ({path}): {source}")]
    Supervisor {
        index: usize,
        path: PathBuf,
        #[source]
        source: SupervisorError,
    },

    #[error("FFmpeg error on job #{index} ({name}): {status}")]
    Engine {
        index: usize,
        name: String,
        status: String,
        /// Every diagnostic line the engine printed that was not a stats line
        log: String,
    },
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRunning | Self::EmptyQueue | Self::IncompatibleSubtitles { .. } => {
                ErrorKind::UserInput
            }
            Self::WorkingDirectory { .. } | Self::Supervisor { .. } => ErrorKind::Environment,
            Self::Engine { .. } => ErrorKind::Engine,
        }
    }

    /// Diagnostic text attached to engine failures
    pub fn engine_log(&self) -> Option<&str> {
        match self {
            Self::Engine { log, .. } => Some(log),
            _ => None,
        }
    }
}

/// Failures of the process supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Starting {program} failed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Creating diagnostics pipe failed")]
    Pipe,

    #[error("Waiting for ffmpeg failed: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Starting process kill failed: {0}")]
    KillStart(#[source] std::io::Error),

    #[error("Process kill failed: {0}")]
    Kill(String),
}

/// The host refused to stay awake for a run
#[derive(Debug, Error)]
#[error("Preventing system sleep failed: {0}")]
pub struct SleepError(pub String);

/// Rejected job status change
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Illegal job status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("{0} is already on the list")]
    Duplicate(PathBuf),

    #[error("No job at index {0}")]
    OutOfRange(usize),

    #[error("The job list cannot be changed while a run is active")]
    RunActive,
}

/// Media intake failures
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Unsupported input {0} (supported: mp4, avi, mkv)")]
    Unsupported(PathBuf),

    #[error("Failed to run ffprobe: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffprobe failed for {path}: {stderr}")]
    Failed { path: PathBuf, stderr: String },

    #[error("Failed to parse ffprobe JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),
}
