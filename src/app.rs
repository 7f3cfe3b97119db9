use crate::cli::{Cli, Commands, RunOverrides};
use anyhow::{Context, Result, anyhow, bail};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use upscaler::config::Config;
use upscaler::dashboard::{Dashboard, JobRow};
use upscaler::engine::{
    self, FfmpegRunner, HardwareProfile, ImageNameKiller, JobQueue, Orchestrator, RunEvent,
    RunOutcome, SystemGpuProbe, SystemSleepInhibitor,
};

const EVENT_POLL: Duration = Duration::from_millis(100);

pub fn run(cli: Cli) -> Result<()> {
    let overrides = cli.overrides;
    match cli.command {
        None => handle_run(cli.inputs, &overrides),
        Some(Commands::Run { inputs }) => handle_run(merge(cli.inputs, inputs), &overrides),
        Some(Commands::DryRun { inputs }) => handle_dry_run(merge(cli.inputs, inputs), &overrides),
        Some(Commands::Detect) => handle_detect(),
        Some(Commands::Probe { file }) => handle_probe(&file),
        Some(Commands::CheckFfmpeg) => handle_check_ffmpeg(),
        Some(Commands::InitConfig) => handle_init_config(),
        Some(Commands::List) => {
            handle_list();
            Ok(())
        }
    }
}

fn merge(mut a: Vec<PathBuf>, b: Vec<PathBuf>) -> Vec<PathBuf> {
    a.extend(b);
    a
}

/// Config from disk with command-line overrides applied
pub fn effective_config(overrides: &RunOverrides) -> Result<Config> {
    let mut config = Config::load()?;
    let d = &mut config.defaults;
    if let Some(resolution) = overrides.resolution {
        d.resolution = resolution;
    }
    if let Some(shader) = overrides.shader {
        d.shader = shader;
    }
    if overrides.encoder.is_some() {
        d.encoder = overrides.encoder;
    }
    if let Some(crf) = overrides.crf {
        d.crf = crf;
    }
    if let Some(format) = overrides.format {
        d.output_format = format;
    }
    d.compatibility_mode |= overrides.compat;
    d.debug_mode |= overrides.debug;
    Ok(config)
}

/// Probe every input into a queue. Unreadable files are reported and skipped.
fn build_queue(config: &Config, inputs: &[PathBuf]) -> JobQueue {
    let mut queue = JobQueue::new();
    for path in engine::scan::collect_inputs(inputs) {
        match engine::probe::probe_job(&config.engine.ffprobe_path, &path) {
            Ok(job) => {
                if let Err(e) = queue.add(job) {
                    eprintln!("Skipping: {}", e);
                }
            }
            Err(e) => eprintln!("Skipping {}: {:#}", path.display(), e),
        }
    }
    queue
}

fn handle_run(inputs: Vec<PathBuf>, overrides: &RunOverrides) -> Result<()> {
    let config = effective_config(overrides)?;
    let hardware = engine::detect_hardware(&SystemGpuProbe);
    let cfg = config
        .resolve(&hardware)
        .context("Invalid selection in config or command line")?;
    let queue = build_queue(&config, &inputs);

    let mut dashboard = Dashboard::new(queue.jobs(), cfg.debug);
    for row in &dashboard.rows {
        print_row(row);
    }

    let (tx, rx) = mpsc::channel();
    let orchestrator = Orchestrator::new(
        queue,
        hardware,
        Box::new(FfmpegRunner::new(config.engine.ffmpeg_path.clone())),
        Arc::new(ImageNameKiller::new(config.image_name())),
        tx,
    )
    .with_sleep_inhibitor(Arc::new(SystemSleepInhibitor));

    let handle = orchestrator.spawn(cfg);
    spawn_cancel_listener(handle.canceller().clone());
    println!("Type 'c' and press Enter to cancel.");

    loop {
        match rx.recv_timeout(EVENT_POLL) {
            Ok(event) => render(&mut dashboard, &event),
            Err(RecvTimeoutError::Timeout) if handle.is_finished() => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let (_orchestrator, outcome) = handle
        .join()
        .map_err(|_| anyhow!("Run thread panicked"))?;
    for event in rx.try_iter() {
        render(&mut dashboard, &event);
    }

    match outcome {
        RunOutcome::Completed { processed } => {
            println!("Upscaled {} video(s) [{}]", processed, dashboard.total_progress);
            Ok(())
        }
        RunOutcome::Cancelled => Ok(()),
        RunOutcome::Rejected(e) | RunOutcome::Failed(e) => Err(e.into()),
    }
}

/// Cancel the run when the user types `c` (or `q`) on stdin
fn spawn_cancel_listener(canceller: engine::Canceller) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if matches!(line.trim(), "c" | "q") && canceller.cancel() {
                break;
            }
        }
    });
}

fn render(dashboard: &mut Dashboard, event: &RunEvent) {
    if !dashboard.apply(event) {
        return;
    }
    match event {
        RunEvent::Log { .. } | RunEvent::ErrorReport { .. } => {
            if let Some(line) = dashboard.log_lines().last() {
                println!("\r{}", line);
            }
        }
        RunEvent::Progress { .. } => {
            print!(
                "\r{:>4} | {} | {} | {}    ",
                dashboard.progress_label,
                dashboard.current_speed,
                dashboard.eta,
                dashboard.total_progress
            );
            let _ = io::stdout().flush();
        }
        _ => {}
    }
}

fn print_row(row: &JobRow) {
    println!(
        "- {} [{}] {} {} {}",
        row.name, row.status, row.duration, row.size, row.resolution
    );
}

fn handle_dry_run(inputs: Vec<PathBuf>, overrides: &RunOverrides) -> Result<()> {
    let config = effective_config(overrides)?;
    let hardware = engine::detect_hardware(&SystemGpuProbe);
    let cfg = config
        .resolve(&hardware)
        .context("Invalid selection in config or command line")?;
    let queue = build_queue(&config, &inputs);
    let program = config.engine.ffmpeg_path.display().to_string();

    println!("Dry run: building ffmpeg commands for {} job(s)", queue.len());
    for job in queue.jobs() {
        if job.has_subtitles && !cfg.output_format.supports_subtitles() {
            println!(
                "# {} has subtitles, output format must be MKV (selected {})",
                job.name, cfg.output_format
            );
            continue;
        }
        let output = engine::derive_output_path(&job.path, cfg.output_format);
        let args = engine::build_command(job, &cfg, &hardware.hwaccel_params, &output);
        println!("{}", engine::format_ffmpeg_cmd(&program, &args));
    }
    Ok(())
}

fn handle_detect() -> Result<()> {
    let hardware = engine::detect_hardware(&SystemGpuProbe);
    print_hardware(&hardware);
    Ok(())
}

fn print_hardware(hardware: &HardwareProfile) {
    if hardware.vendors.is_empty() {
        println!("GPU vendors: none detected (CPU encoders only)");
    } else {
        println!("GPU vendors: {:?}", hardware.vendors);
    }
    if hardware.hwaccel_params.is_empty() {
        println!("Hardware decode flags: (none)");
    } else {
        println!("Hardware decode flags: {}", hardware.hwaccel_params.join(" "));
    }
    println!("Primary video codec: {}", hardware.primary_video_codec);
    println!("Available encoders:");
    for (i, encoder) in hardware.available_encoders.iter().enumerate() {
        println!("  {:>2}  {:<28} {}", i, encoder.name, encoder.codec);
    }
}

fn handle_probe(file: &Path) -> Result<()> {
    let config = Config::load()?;
    let job = engine::probe::probe_job(&config.engine.ffprobe_path, file)
        .with_context(|| format!("Failed to probe {}", file.display()))?;
    let row = JobRow::from(&job);

    println!("Name:        {}", row.name);
    println!("Duration:    {}", row.duration);
    println!("Size:        {}", row.size);
    println!("Resolution:  {}", row.resolution);
    println!("Pixel format: {}", job.pixel_format);
    println!("Subtitles:   {}", if job.has_subtitles { "yes" } else { "no" });
    Ok(())
}

/// First line of `<program> -version`
fn tool_version(program: &Path) -> Result<String> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .with_context(|| {
            format!(
                "Failed to execute {}. Is it installed and in PATH?",
                program.display()
            )
        })?;

    if !output.status.success() {
        bail!("{} failed with status: {}", program.display(), output.status);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");
    Ok(first_line.to_string())
}

/// Check if ffmpeg was built with the libplacebo filter
fn libplacebo_available(ffmpeg: &Path) -> bool {
    let output = Command::new(ffmpeg).args(["-hide_banner", "-filters"]).output();
    match output {
        Ok(out) if out.status.success() => {
            String::from_utf8_lossy(&out.stdout).contains("libplacebo")
        }
        _ => false,
    }
}

fn handle_check_ffmpeg() -> Result<()> {
    let config = Config::load()?;
    let ffmpeg = tool_version(&config.engine.ffmpeg_path)?;
    println!("ffmpeg found: {}", ffmpeg);
    let ffprobe = tool_version(&config.engine.ffprobe_path)?;
    println!("ffprobe found: {}", ffprobe);

    if libplacebo_available(&config.engine.ffmpeg_path) {
        println!("libplacebo filter: OK");
        Ok(())
    } else {
        bail!("ffmpeg was built without the libplacebo filter, upscaling is unavailable")
    }
}

fn handle_init_config() -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        let cfg = Config::load_from(&path)?;
        println!("Config loaded successfully from {}", path.display());
        println!("{:#?}", cfg);
    } else {
        println!("Config missing, creating default config...");
        let saved = Config::default().save()?;
        println!("Default config saved to {}", saved.display());
    }
    Ok(())
}

fn handle_list() {
    println!("Resolutions:");
    for (i, res) in engine::RESOLUTIONS.iter().enumerate() {
        let marker = if i == engine::DEFAULT_RESOLUTION { " (default)" } else { "" };
        println!("  {:>2}  {}{}", i, res.label(), marker);
    }
    println!("Shaders:");
    for (i, shader) in engine::SHADERS.iter().enumerate() {
        println!("  {:>2}  {}", i, shader.name);
    }
    println!("Output formats:");
    for (i, format) in engine::OutputFormat::ALL.iter().enumerate() {
        println!("  {:>2}  {}", i, format);
    }
    println!("Encoders (catalog; `upscaler detect` shows the indices for this host):");
    for encoder in engine::ENCODERS {
        println!("      {:<28} {}", encoder.name, encoder.codec);
    }
}
