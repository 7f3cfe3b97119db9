// Input probing using ffprobe

use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use super::core::{Job, default_pixel_format};
use super::error::ProbeError;
use super::scan::is_video_file;
use super::supervisor::hide_console_window;

/// Still-image codecs used for embedded cover art, never the main picture
const COVER_ART_CODECS: &[&str] = &["mjpeg", "png"];

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

/// Probe `path` with ffprobe and build a queue entry for it
pub fn probe_job(ffprobe: &Path, path: &Path) -> Result<Job, ProbeError> {
    if !is_video_file(path) {
        return Err(ProbeError::Unsupported(path.to_path_buf()));
    }

    let mut cmd = Command::new(ffprobe);
    cmd.args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ])
    .arg(path);
    hide_console_window(&mut cmd);

    let output = cmd.output().map_err(ProbeError::Spawn)?;
    if !output.status.success() {
        return Err(ProbeError::Failed {
            path: path.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let fallback_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    job_from_ffprobe_json(path, &String::from_utf8_lossy(&output.stdout), fallback_size)
}

/// Build a job from ffprobe's `-show_format -show_streams` JSON
pub fn job_from_ffprobe_json(
    path: &Path,
    json: &str,
    fallback_size: u64,
) -> Result<Job, ProbeError> {
    let probe: FfprobeOutput = serde_json::from_str(json)?;

    let video = probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .find(|s| {
            !s.codec_name
                .as_deref()
                .is_some_and(|c| COVER_ART_CODECS.contains(&c))
        })
        .ok_or_else(|| ProbeError::NoVideoStream(path.to_path_buf()))?;

    let mut job = Job::new(path.to_path_buf());
    job.width = video.width.unwrap_or(0);
    job.height = video.height.unwrap_or(0);
    job.pixel_format = video.pix_fmt.clone().unwrap_or_else(default_pixel_format);
    job.has_subtitles = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("subtitle"));

    let format = probe.format.as_ref();
    job.duration_s = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok());
    job.size_bytes = format
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(fallback_size);

    Ok(job)
}
