//! Sequential job runner.
//!
//! The [`Orchestrator`] owns the job queue and is the only writer of job
//! status. A run moves it onto a background thread ([`Orchestrator::spawn`]),
//! so nothing else can touch the queue until the run hands it back. The
//! presentation layer follows along through [`RunEvent`]s and stops a run
//! through a [`Canceller`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use super::core::{
    Job, JobQueue, JobStatus, ProgressSnapshot, RunConfiguration, build_command,
    derive_output_path, format_ffmpeg_cmd, pump_diagnostics,
};
use super::error::{QueueError, RunError};
use super::hardware::HardwareProfile;
use super::power::{SleepGuard, SleepInhibitor};
use super::supervisor::{
    EngineRunner, ProcessKiller, RunningEngine, Supervisor, WaitOutcome,
};

/// Run-active guard plus the pending-cancellation flag.
///
/// The cancellation flag has a single consumer: whoever observes it with
/// [`RunControl::take_cancel`] clears it.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    inner: Arc<ControlFlags>,
}

#[derive(Debug, Default)]
struct ControlFlags {
    running: AtomicBool,
    cancel: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the run slot. False if a run is already active.
    pub fn try_begin(&self) -> bool {
        let claimed = self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if claimed {
            self.inner.cancel.store(false, Ordering::Release);
        }
        claimed
    }

    pub fn finish(&self) {
        self.inner.cancel.store(false, Ordering::Release);
        self.inner.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Flag the active run for cancellation. False when idle.
    pub fn request_cancel(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.inner.cancel.store(true, Ordering::Release);
        true
    }

    /// Observe and clear a pending cancellation
    pub fn take_cancel(&self) -> bool {
        self.inner.cancel.swap(false, Ordering::AcqRel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// How a run ended, as reported to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Completed,
    Cancelled,
    Failed,
}

/// State changes published by a run. Every event is also a redraw request.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Log { level: LogLevel, message: String },
    RunStarted,
    JobStatus { index: usize, status: JobStatus },
    Progress { index: usize, snapshot: ProgressSnapshot },
    /// Aggregate counter; also clears the per-job speed and ETA
    Totals { finished: usize, total: usize },
    /// Secondary detail attached to a failure (engine diagnostics)
    ErrorReport { message: String, detail: String },
    RunEnded(RunEnd),
}

/// Result of [`Orchestrator::run`]
#[derive(Debug)]
pub enum RunOutcome {
    /// Every non-finished job was processed
    Completed { processed: usize },
    /// The run never started
    Rejected(RunError),
    Cancelled,
    /// The run aborted on the first failing job
    Failed(RunError),
}

/// Cancels the active run from any thread
#[derive(Clone)]
pub struct Canceller {
    control: RunControl,
    killer: Arc<dyn ProcessKiller>,
    events: Sender<RunEvent>,
}

impl Canceller {
    /// Flag the run and kill the engine. Returns false when no run is active.
    ///
    /// This is the only place the engine is killed. A failed kill is a soft
    /// error: it is reported, and the run still ends as cancelled once the
    /// engine exits.
    pub fn cancel(&self) -> bool {
        if !self.control.request_cancel() {
            return false;
        }
        info!("cancellation requested");

        match self.killer.kill_all() {
            Ok(killed) => debug!(killed, "engine processes terminated"),
            Err(e) => {
                warn!(error = %e, "cancellation kill failed");
                let _ = self.events.send(RunEvent::Log {
                    level: LogLevel::Warn,
                    message: format!("Taskkill error: {}", e),
                });
            }
        }
        true
    }
}

enum JobEnd {
    Finished,
    Cancelled,
}

pub struct Orchestrator {
    queue: JobQueue,
    hardware: HardwareProfile,
    supervisor: Supervisor,
    control: RunControl,
    sleep_inhibitor: Option<Arc<dyn SleepInhibitor>>,
    events: Sender<RunEvent>,
}

impl Orchestrator {
    pub fn new(
        queue: JobQueue,
        hardware: HardwareProfile,
        runner: Box<dyn EngineRunner>,
        killer: Arc<dyn ProcessKiller>,
        events: Sender<RunEvent>,
    ) -> Self {
        let control = RunControl::new();
        Self {
            queue,
            hardware,
            supervisor: Supervisor::new(runner, killer, control.clone()),
            control,
            sleep_inhibitor: None,
            events,
        }
    }

    /// Keep the host awake from run start until the run ends
    pub fn with_sleep_inhibitor(mut self, inhibitor: Arc<dyn SleepInhibitor>) -> Self {
        self.sleep_inhibitor = Some(inhibitor);
        self
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn hardware(&self) -> &HardwareProfile {
        &self.hardware
    }

    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            control: self.control.clone(),
            killer: self.supervisor.killer(),
            events: self.events.clone(),
        }
    }

    pub fn add_job(&mut self, job: Job) -> Result<usize, QueueError> {
        if self.control.is_running() {
            return Err(QueueError::RunActive);
        }
        self.queue.add(job)
    }

    pub fn remove_job(&mut self, index: usize) -> Result<Job, QueueError> {
        if self.control.is_running() {
            return Err(QueueError::RunActive);
        }
        self.queue.remove(index)
    }

    /// Move the orchestrator onto a background thread for one run
    pub fn spawn(self, cfg: RunConfiguration) -> RunHandle {
        let canceller = self.canceller();
        let thread = thread::spawn(move || {
            let mut orchestrator = self;
            let outcome = orchestrator.run(&cfg);
            (orchestrator, outcome)
        });
        RunHandle { canceller, thread }
    }

    /// Process every non-finished job in list order, stopping at the first
    /// failure or cancellation.
    pub fn run(&mut self, cfg: &RunConfiguration) -> RunOutcome {
        if !self.control.try_begin() {
            return self.reject(RunError::AlreadyRunning);
        }
        if self.queue.is_empty() {
            self.control.finish();
            return self.reject(RunError::EmptyQueue);
        }
        // Held until this function returns, after every end-of-run path
        let _awake = self.keep_awake();

        let total = self.queue.len();
        for index in 0..total {
            if !self.queue.jobs()[index].is_finished() {
                self.set_status(index, JobStatus::Waiting);
            }
        }

        self.emit(RunEvent::RunStarted);
        self.emit_totals();
        self.log(
            LogLevel::Info,
            "Upscaling started! Upscaled videos are saved next to the originals \
             with the _upscaled suffix",
        );
        self.debug_log(cfg, format!("Primary video codec: {}", self.hardware.primary_video_codec));
        info!(total, encoder = cfg.encoder.codec, crf = cfg.crf.value(), "run started");

        let mut processed = 0;
        for index in 0..total {
            if self.queue.jobs()[index].is_finished() {
                continue;
            }
            if self.control.take_cancel() {
                return self.cancelled();
            }

            match self.process_job(index, total, cfg) {
                Ok(JobEnd::Finished) => processed += 1,
                Ok(JobEnd::Cancelled) => return self.cancelled(),
                Err(e) => return self.fail(e),
            }
        }

        self.control.finish();
        info!(processed, "run completed");
        self.emit(RunEvent::RunEnded(RunEnd::Completed));
        self.emit_totals();
        self.log(LogLevel::Info, "Upscaling finished!");
        RunOutcome::Completed { processed }
    }

    fn process_job(
        &mut self,
        index: usize,
        total: usize,
        cfg: &RunConfiguration,
    ) -> Result<JobEnd, RunError> {
        let job = self.queue.jobs()[index].clone();
        self.log(
            LogLevel::Info,
            format!("Processing {} ({} / {})...", job.name, index + 1, total),
        );

        if job.has_subtitles && !cfg.output_format.supports_subtitles() {
            return Err(RunError::IncompatibleSubtitles {
                index,
                name: job.name,
                format: cfg.output_format.label().to_string(),
            });
        }

        self.set_status(index, JobStatus::Processing);

        let output_path = derive_output_path(&job.path, cfg.output_format);
        let args = build_command(&job, cfg, &self.hardware.hwaccel_params, &output_path);
        let working_dir =
            std::env::current_dir().map_err(|source| RunError::WorkingDirectory {
                index,
                path: job.path.clone(),
                source,
            })?;

        if cfg.debug {
            self.debug_log(cfg, format!("Working directory: {}", working_dir.display()));
            self.debug_log(cfg, format!("Input path: {}", job.path.display()));
            self.debug_log(cfg, format!("Output path: {}", output_path.display()));
            self.debug_log(cfg, format!("Target resolution: {}", cfg.resolution.label()));
            self.debug_log(cfg, format!("Shader: {}", cfg.shader.path));
            self.debug_log(cfg, format!("Output format: {}", cfg.output_format.extension()));
            self.debug_log(
                cfg,
                format!(
                    "FFmpeg command: {}",
                    format_ffmpeg_cmd(&self.supervisor.program(), &args)
                ),
            );
        }

        let RunningEngine {
            diagnostics,
            mut handle,
        } = self
            .supervisor
            .run(&args)
            .map_err(|source| RunError::Supervisor {
                index,
                path: job.path.clone(),
                source,
            })?;

        let events = self.events.clone();
        let log = pump_diagnostics(diagnostics, job.duration_s, |snapshot| {
            let _ = events.send(RunEvent::Progress {
                index,
                snapshot: *snapshot,
            });
        });

        match self.supervisor.wait(handle.as_mut()) {
            Ok(WaitOutcome::Exited) => {
                self.set_status(index, JobStatus::Finished);
                self.emit_totals();
                self.log(LogLevel::Info, format!("Finished {}", job.name));
                Ok(JobEnd::Finished)
            }
            Ok(WaitOutcome::Cancelled) => Ok(JobEnd::Cancelled),
            Ok(WaitOutcome::Failed(status)) => Err(RunError::Engine {
                index,
                name: job.name,
                status,
                log,
            }),
            Err(e) => Err(RunError::Engine {
                index,
                name: job.name,
                status: e.to_string(),
                log,
            }),
        }
    }

    /// Failing to inhibit sleep is reported but never stops the run
    fn keep_awake(&self) -> Option<SleepGuard> {
        let inhibitor = self.sleep_inhibitor.as_ref()?;
        match inhibitor.inhibit("Upscaling videos") {
            Ok(guard) => {
                debug!("system sleep inhibited");
                Some(guard)
            }
            Err(e) => {
                warn!(error = %e, "running without sleep inhibition");
                self.log(LogLevel::Warn, e.to_string());
                None
            }
        }
    }

    fn reject(&self, err: RunError) -> RunOutcome {
        info!(reason = %err, "run rejected");
        self.log(LogLevel::Info, err.to_string());
        RunOutcome::Rejected(err)
    }

    fn cancelled(&mut self) -> RunOutcome {
        for index in 0..self.queue.len() {
            if !self.queue.jobs()[index].is_finished() {
                self.set_status(index, JobStatus::NotStarted);
            }
        }
        self.control.finish();
        info!("run cancelled");
        self.emit(RunEvent::RunEnded(RunEnd::Cancelled));
        self.emit_totals();
        self.log(LogLevel::Info, "Upscaling cancelled!");
        RunOutcome::Cancelled
    }

    /// Abort on error. The job being processed goes back to `NotStarted`;
    /// queued jobs keep `Waiting` so the list shows where the run stopped.
    fn fail(&mut self, err: RunError) -> RunOutcome {
        for index in 0..self.queue.len() {
            if self.queue.status_of(index) == Some(JobStatus::Processing) {
                self.set_status(index, JobStatus::NotStarted);
            }
        }
        self.control.finish();

        error!(error = %err, kind = ?err.kind(), "run aborted");
        self.log(LogLevel::Error, err.to_string());
        if let Some(log) = err.engine_log() {
            self.emit(RunEvent::ErrorReport {
                message: "FFmpeg logs:".to_string(),
                detail: log.to_string(),
            });
        }
        self.emit(RunEvent::RunEnded(RunEnd::Failed));
        self.emit_totals();
        RunOutcome::Failed(err)
    }

    fn set_status(&mut self, index: usize, status: JobStatus) {
        let Some(job) = self.queue.jobs_mut().get_mut(index) else {
            return;
        };
        match job.transition(status) {
            Ok(()) => {
                debug!(index, name = %job.name, %status, "job status");
                self.emit(RunEvent::JobStatus { index, status });
            }
            Err(e) => error!(index, error = %e, "rejected status change"),
        }
    }

    fn emit_totals(&self) {
        self.emit(RunEvent::Totals {
            finished: self.queue.finished_count(),
            total: self.queue.len(),
        });
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(RunEvent::Log {
            level,
            message: message.into(),
        });
    }

    fn debug_log(&self, cfg: &RunConfiguration, message: String) {
        if cfg.debug {
            self.log(LogLevel::Debug, message);
        }
    }

    fn emit(&self, event: RunEvent) {
        // Presentation may already be gone; the run continues regardless
        let _ = self.events.send(event);
    }
}

/// A run executing on its background thread
pub struct RunHandle {
    canceller: Canceller,
    thread: JoinHandle<(Orchestrator, RunOutcome)>,
}

impl RunHandle {
    pub fn canceller(&self) -> &Canceller {
        &self.canceller
    }

    pub fn cancel(&self) -> bool {
        self.canceller.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run and take the orchestrator back
    pub fn join(self) -> thread::Result<(Orchestrator, RunOutcome)> {
        self.thread.join()
    }
}
