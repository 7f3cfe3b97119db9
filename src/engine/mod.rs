// Core upscaling engine - independent of any presentation surface

pub mod core;
pub mod error;
pub mod hardware;
pub mod orchestrator;
pub mod power;
pub mod probe;
pub mod scan;
pub mod supervisor;

pub use self::core::*;
pub use error::{
    ErrorKind, ProbeError, QueueError, RunError, SleepError, SupervisorError, TransitionError,
};
pub use hardware::{GpuProbe, GpuVendor, HardwareProfile, SystemGpuProbe, detect_hardware};
pub use orchestrator::{
    Canceller, LogLevel, Orchestrator, RunControl, RunEnd, RunEvent, RunHandle, RunOutcome,
};
pub use power::{SleepGuard, SleepInhibitor, SystemSleepInhibitor};
pub use supervisor::{
    EngineRunner, ExitOutcome, FfmpegRunner, ImageNameKiller, ProcessHandle, ProcessKiller,
    RunningEngine, Supervisor, WaitOutcome, kill_by_image_name,
};
