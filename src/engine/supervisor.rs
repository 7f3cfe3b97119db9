//! Child process supervision for the FFmpeg engine.
//!
//! One engine process is supervised at a time. Only its stderr is exposed;
//! stdout is discarded. Cancellation never goes through the tracked child:
//! FFmpeg builds with Vulkan/CUDA can leave helper processes behind, so
//! [`kill_by_image_name`] terminates every process with the engine's image
//! name instead.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use tracing::debug;

use super::error::SupervisorError;
use super::orchestrator::RunControl;

/// How a supervised process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    /// Non-zero exit or signal, with the status description
    Failed(String),
}

/// Wait result after cancellation has been taken into account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited,
    Cancelled,
    Failed(String),
}

/// Handle on a running engine process
pub trait ProcessHandle: Send {
    /// Block until the process exits
    fn wait(&mut self) -> Result<ExitOutcome, SupervisorError>;
}

/// A started engine: its diagnostic stream plus the wait handle
pub struct RunningEngine {
    pub diagnostics: Box<dyn Read + Send>,
    pub handle: Box<dyn ProcessHandle>,
}

/// Starts the external engine
pub trait EngineRunner: Send + Sync {
    /// Program shown in debug logs
    fn program(&self) -> String;

    fn run(&self, args: &[String]) -> Result<RunningEngine, SupervisorError>;
}

/// Cancellation path: terminate the engine wherever it runs
pub trait ProcessKiller: Send + Sync {
    /// Returns the number of processes terminated
    fn kill_all(&self) -> Result<usize, SupervisorError>;
}

/// Suppress the console window child processes get on Windows
pub(crate) fn hide_console_window(cmd: &mut Command) {
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(windows))]
    let _ = cmd;
}

/// Runs a real FFmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    program: PathBuf,
}

impl FfmpegRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl EngineRunner for FfmpegRunner {
    fn program(&self) -> String {
        self.program.display().to_string()
    }

    fn run(&self, args: &[String]) -> Result<RunningEngine, SupervisorError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        hide_console_window(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            program: self.program(),
            source,
        })?;
        debug!(pid = child.id(), program = %self.program.display(), "engine started");

        let Some(stderr) = child.stderr.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SupervisorError::Pipe);
        };

        Ok(RunningEngine {
            diagnostics: Box::new(stderr),
            handle: Box::new(ChildHandle { child }),
        })
    }
}

struct ChildHandle {
    child: Child,
}

impl ProcessHandle for ChildHandle {
    fn wait(&mut self) -> Result<ExitOutcome, SupervisorError> {
        let status = self.child.wait().map_err(SupervisorError::Wait)?;
        debug!(pid = self.child.id(), %status, "engine exited");
        if status.success() {
            Ok(ExitOutcome::Success)
        } else {
            Ok(ExitOutcome::Failed(status.to_string()))
        }
    }
}

/// Kills every process named `image_name`
#[derive(Debug, Clone)]
pub struct ImageNameKiller {
    image_name: String,
}

impl ImageNameKiller {
    pub fn new(image_name: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
        }
    }

    /// Image name of an engine binary path (`./ffmpeg/ffmpeg.exe` -> `ffmpeg.exe`)
    pub fn for_program(program: &Path) -> Self {
        let image = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self::new(image)
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }
}

impl ProcessKiller for ImageNameKiller {
    fn kill_all(&self) -> Result<usize, SupervisorError> {
        kill_by_image_name(&self.image_name)
    }
}

/// Terminate all processes with the given image name (`taskkill /IM ... /F`)
#[cfg(windows)]
pub fn kill_by_image_name(image_name: &str) -> Result<usize, SupervisorError> {
    let mut cmd = Command::new("taskkill");
    cmd.args(["/IM", image_name, "/F"]);
    hide_console_window(&mut cmd);

    let output = cmd.output().map_err(SupervisorError::KillStart)?;
    if !output.status.success() {
        return Err(SupervisorError::Kill(format!(
            "taskkill exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let killed = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| l.starts_with("SUCCESS"))
        .count();
    Ok(killed)
}

/// Terminate all processes with the given image name
#[cfg(not(windows))]
pub fn kill_by_image_name(image_name: &str) -> Result<usize, SupervisorError> {
    use sysinfo::System;

    let mut system = System::new();
    system.refresh_processes();

    let mut matched = 0;
    let mut killed = 0;
    for process in system.processes_by_exact_name(image_name) {
        matched += 1;
        if process.kill() {
            killed += 1;
        }
    }

    match (matched, killed) {
        (0, _) => Err(SupervisorError::Kill(format!(
            "no process named {} found",
            image_name
        ))),
        (m, k) if k < m => Err(SupervisorError::Kill(format!(
            "only {} of {} {} processes could be killed",
            k, m, image_name
        ))),
        (_, k) => Ok(k),
    }
}

/// Runner + killer bound to the run's cancellation flag
pub struct Supervisor {
    runner: Box<dyn EngineRunner>,
    killer: Arc<dyn ProcessKiller>,
    control: RunControl,
}

impl Supervisor {
    pub fn new(
        runner: Box<dyn EngineRunner>,
        killer: Arc<dyn ProcessKiller>,
        control: RunControl,
    ) -> Self {
        Self {
            runner,
            killer,
            control,
        }
    }

    pub fn program(&self) -> String {
        self.runner.program()
    }

    pub fn run(&self, args: &[String]) -> Result<RunningEngine, SupervisorError> {
        self.runner.run(args)
    }

    /// Wait for exit. A failed exit while a cancellation is pending is a
    /// clean cancellation; the pending flag is consumed here.
    pub fn wait(&self, handle: &mut dyn ProcessHandle) -> Result<WaitOutcome, SupervisorError> {
        match handle.wait() {
            Ok(ExitOutcome::Success) => Ok(WaitOutcome::Exited),
            Ok(ExitOutcome::Failed(_)) | Err(_) if self.control.take_cancel() => {
                Ok(WaitOutcome::Cancelled)
            }
            Ok(ExitOutcome::Failed(status)) => Ok(WaitOutcome::Failed(status)),
            Err(e) => Err(e),
        }
    }

    /// Shared with the run's [`Canceller`](super::orchestrator::Canceller),
    /// the only caller of [`ProcessKiller::kill_all`]
    pub(crate) fn killer(&self) -> Arc<dyn ProcessKiller> {
        Arc::clone(&self.killer)
    }
}
