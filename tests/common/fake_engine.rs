#![allow(dead_code)] // Each integration module uses a different slice of the fakes

//! Scripted stand-ins for the FFmpeg process, the image-name killer and the
//! sleep inhibitor.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use upscaler::engine::{
    EngineRunner, ExitOutcome, ProcessHandle, ProcessKiller, RunningEngine, SleepError,
    SleepGuard, SleepInhibitor, SupervisorError,
};

/// A typical stats line; 2s of a 10s clip at 1x
pub const STATS_LINE: &str = concat!(
    "frame=   48 fps= 24 q=28.0 size=     256kB ",
    "time=00:00:02.00 bitrate=1048.6kbits/s speed=1.00x\r",
);

/// What one engine invocation prints on stderr and how it ends
#[derive(Debug, Clone)]
pub enum Script {
    Exit { stderr: String, outcome: ExitOutcome },
    /// Print `stderr`, then hang until the kill switch trips and end with `exit`
    UntilKilled { stderr: String, exit: ExitOutcome },
    SpawnError,
}

impl Script {
    pub fn success() -> Self {
        Self::Exit {
            stderr: STATS_LINE.to_string(),
            outcome: ExitOutcome::Success,
        }
    }

    pub fn failure(stderr: &str) -> Self {
        Self::Exit {
            stderr: stderr.to_string(),
            outcome: ExitOutcome::Failed("exit status: 1".to_string()),
        }
    }

    pub fn until_killed() -> Self {
        Self::UntilKilled {
            stderr: STATS_LINE.to_string(),
            exit: ExitOutcome::Failed("exit status: 255".to_string()),
        }
    }

    /// Hangs until the kill switch trips, then exits 0 as if the encode had
    /// just completed when the kill arrived
    pub fn finishes_on_kill() -> Self {
        Self::UntilKilled {
            stderr: STATS_LINE.to_string(),
            exit: ExitOutcome::Success,
        }
    }
}

/// Stands in for the OS terminating the engine
#[derive(Default)]
pub struct KillSwitch {
    killed: Mutex<bool>,
    cv: Condvar,
}

impl KillSwitch {
    pub fn trip(&self) {
        *self.killed.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn wait(&self) {
        let mut killed = self.killed.lock().unwrap();
        while !*killed {
            killed = self.cv.wait(killed).unwrap();
        }
    }
}

/// Engine runner replaying one script per invocation, recording arguments
pub struct ScriptedRunner {
    scripts: Mutex<VecDeque<Script>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    switch: Arc<KillSwitch>,
}

impl ScriptedRunner {
    pub fn new(scripts: Vec<Script>, switch: Arc<KillSwitch>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
            switch,
        }
    }

    /// Shared log of the argument lists the engine was started with
    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.calls)
    }
}

impl EngineRunner for ScriptedRunner {
    fn program(&self) -> String {
        "ffmpeg".to_string()
    }

    fn run(&self, args: &[String]) -> Result<RunningEngine, SupervisorError> {
        self.calls.lock().unwrap().push(args.to_vec());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Script::success);

        match script {
            Script::Exit { stderr, outcome } => Ok(RunningEngine {
                diagnostics: Box::new(Cursor::new(stderr.into_bytes())),
                handle: Box::new(FixedExit(Some(outcome))),
            }),
            Script::UntilKilled { stderr, exit } => Ok(RunningEngine {
                diagnostics: Box::new(Cursor::new(stderr.into_bytes()).chain(BlockingTail {
                    switch: Arc::clone(&self.switch),
                })),
                handle: Box::new(KilledExit {
                    switch: Arc::clone(&self.switch),
                    exit: Some(exit),
                }),
            }),
            Script::SpawnError => Err(SupervisorError::Spawn {
                program: self.program(),
                source: io::Error::new(io::ErrorKind::NotFound, "program not found"),
            }),
        }
    }
}

struct FixedExit(Option<ExitOutcome>);

impl ProcessHandle for FixedExit {
    fn wait(&mut self) -> Result<ExitOutcome, SupervisorError> {
        self.0
            .take()
            .ok_or_else(|| SupervisorError::Wait(io::Error::other("already waited")))
    }
}

/// Stream end that only arrives once the process is killed
struct BlockingTail {
    switch: Arc<KillSwitch>,
}

impl Read for BlockingTail {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.switch.wait();
        Ok(0)
    }
}

struct KilledExit {
    switch: Arc<KillSwitch>,
    exit: Option<ExitOutcome>,
}

impl ProcessHandle for KilledExit {
    fn wait(&mut self) -> Result<ExitOutcome, SupervisorError> {
        self.switch.wait();
        self.exit
            .take()
            .ok_or_else(|| SupervisorError::Wait(io::Error::other("already waited")))
    }
}

/// Killer that counts calls and trips the switch. With `fail` set it still
/// trips the switch (the engine dies anyway) but reports an error.
pub struct RecordingKiller {
    kills: AtomicUsize,
    fail: bool,
    switch: Arc<KillSwitch>,
}

impl RecordingKiller {
    pub fn new(switch: Arc<KillSwitch>) -> Self {
        Self {
            kills: AtomicUsize::new(0),
            fail: false,
            switch,
        }
    }

    pub fn failing(switch: Arc<KillSwitch>) -> Self {
        Self {
            fail: true,
            ..Self::new(switch)
        }
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

impl ProcessKiller for RecordingKiller {
    fn kill_all(&self) -> Result<usize, SupervisorError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.switch.trip();
        if self.fail {
            Err(SupervisorError::Kill(
                "ERROR: The process \"ffmpeg.exe\" not found.".to_string(),
            ))
        } else {
            Ok(1)
        }
    }
}

/// Sleep inhibitor counting acquisitions and the guards still alive
#[derive(Default)]
pub struct RecordingInhibitor {
    acquired: AtomicUsize,
    held: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingInhibitor {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }
}

struct HeldCount(Arc<AtomicUsize>);

impl Drop for HeldCount {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SleepInhibitor for RecordingInhibitor {
    fn inhibit(&self, _reason: &str) -> Result<SleepGuard, SleepError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SleepError("no logind session".to_string()));
        }
        self.held.fetch_add(1, Ordering::SeqCst);
        Ok(SleepGuard::new(HeldCount(Arc::clone(&self.held))))
    }
}
