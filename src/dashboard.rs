//! Presentation state driven by run events.
//!
//! A [`Dashboard`] holds everything a front end displays: one row per job,
//! the aggregate counter, speed/ETA strings, the progress fraction, the
//! rolling log and the label of the primary action. It is only ever updated
//! through [`Dashboard::apply`], never by mutating job status.

use std::collections::VecDeque;

use chrono::Local;

use crate::engine::{Job, JobStatus, LogLevel, ProgressSnapshot, RunEnd, RunEvent};

pub const IDLE_LABEL: &str = "Start upscaling";
pub const CANCEL_LABEL: &str = "Cancel";
const SPEED_PREFIX: &str = "Speed:";
const ETA_PREFIX: &str = "ETA:";

/// Oldest lines are dropped past this point
const MAX_LOG_LINES: usize = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub name: String,
    pub duration: String,
    pub size: String,
    pub resolution: String,
    pub status: JobStatus,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            name: job.name.clone(),
            duration: job.duration_s.map(format_clock).unwrap_or_else(|| "-".to_string()),
            size: format_megabytes(job.size_bytes),
            resolution: format!("{}x{}", job.width, job.height),
            status: job.status(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub rows: Vec<JobRow>,
    /// "finished / total"
    pub total_progress: String,
    pub current_speed: String,
    pub eta: String,
    /// Progress of the job being processed, in [0, 1]
    pub progress: f32,
    pub progress_label: String,
    pub button_label: &'static str,
    pub running: bool,
    /// Last failure detail (engine diagnostics)
    pub error_report: Option<(String, String)>,
    show_debug: bool,
    log: VecDeque<String>,
}

impl Dashboard {
    pub fn new(jobs: &[Job], show_debug: bool) -> Self {
        let mut dashboard = Self {
            rows: Vec::new(),
            total_progress: String::new(),
            current_speed: SPEED_PREFIX.to_string(),
            eta: ETA_PREFIX.to_string(),
            progress: 0.0,
            progress_label: String::new(),
            button_label: IDLE_LABEL,
            running: false,
            error_report: None,
            show_debug,
            log: VecDeque::new(),
        };
        dashboard.sync_jobs(jobs);
        dashboard
    }

    /// Rebuild the rows from the queue (only while idle)
    pub fn sync_jobs(&mut self, jobs: &[Job]) {
        self.rows = jobs.iter().map(JobRow::from).collect();
        let finished = jobs.iter().filter(|j| j.is_finished()).count();
        self.total_progress = format!("{} / {}", finished, jobs.len());
    }

    /// Fold one event into the display state. Returns true when a redraw is needed.
    pub fn apply(&mut self, event: &RunEvent) -> bool {
        match event {
            RunEvent::Log { level, message } => {
                if *level == LogLevel::Debug && !self.show_debug {
                    return false;
                }
                self.push_log(*level, message);
            }
            RunEvent::RunStarted => {
                self.running = true;
                self.button_label = CANCEL_LABEL;
                self.progress = 0.0;
                self.progress_label.clear();
                self.error_report = None;
            }
            RunEvent::JobStatus { index, status } => match self.rows.get_mut(*index) {
                Some(row) => row.status = *status,
                None => return false,
            },
            RunEvent::Progress { snapshot, .. } => self.apply_progress(snapshot),
            RunEvent::Totals { finished, total } => {
                self.total_progress = format!("{} / {}", finished, total);
                self.current_speed = SPEED_PREFIX.to_string();
                self.eta = ETA_PREFIX.to_string();
            }
            RunEvent::ErrorReport { message, detail } => {
                self.push_log(LogLevel::Error, &format!("{}\n{}", message, detail.trim_end()));
                self.error_report = Some((message.clone(), detail.clone()));
            }
            RunEvent::RunEnded(end) => {
                self.running = false;
                self.button_label = IDLE_LABEL;
                if *end == RunEnd::Completed {
                    self.progress = 1.0;
                    self.progress_label = "100%".to_string();
                }
            }
        }
        true
    }

    fn apply_progress(&mut self, snapshot: &ProgressSnapshot) {
        self.progress = snapshot.fraction;
        self.progress_label = format!("{:.0}%", snapshot.fraction * 100.0);
        self.current_speed = match snapshot.speed {
            Some(speed) => format!("{} {:.2}x", SPEED_PREFIX, speed),
            None => SPEED_PREFIX.to_string(),
        };
        self.eta = match snapshot.eta_s {
            Some(eta) => format!("{} {}", ETA_PREFIX, format_duration(eta)),
            None => ETA_PREFIX.to_string(),
        };
    }

    pub fn push_log(&mut self, level: LogLevel, message: &str) {
        let prefix = match level {
            LogLevel::Debug => "[DEBUG] ",
            LogLevel::Info => "",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Error => "[ERROR] ",
        };
        let timestamp = Local::now().format("%H:%M:%S");
        self.log
            .push_back(format!("[{}] {}{}", timestamp, prefix, message));
        while self.log.len() > MAX_LOG_LINES {
            self.log.pop_front();
        }
    }

    pub fn log_lines(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub fn log_text(&self) -> String {
        self.log_lines().collect::<Vec<_>>().join("\n")
    }
}

/// Format bytes as megabytes, the unit shown in the job table
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Format duration in seconds as human-readable time
pub fn format_duration(seconds: f64) -> String {
    let total_secs = seconds.max(0.0) as u64;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// `HH:MM:SS` for media durations
pub fn format_clock(seconds: f64) -> String {
    let total_secs = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}
