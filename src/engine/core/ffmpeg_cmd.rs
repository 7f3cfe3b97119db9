//! FFmpeg argument construction for one upscaling job.
//!
//! The builder is pure: the same job, configuration, hardware flags and output
//! path always produce the same argument vector. Argument order is stable
//! because the full command is printed verbatim in debug logs.

use std::path::{Path, PathBuf};

use super::types::{Crf, EncoderDescriptor, Job, OutputFormat, RunConfiguration, Vendor};

/// Suffix appended to the source file stem
pub const OUTPUT_SUFFIX: &str = "_upscaled";

/// Pixel format pinned in compatibility mode
const COMPAT_PIXEL_FORMAT: &str = "yuv420p";

/// `/videos/clip.mp4` + MKV -> `/videos/clip_upscaled.mkv`
pub fn derive_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    input.with_file_name(format!("{}{}.{}", stem, OUTPUT_SUFFIX, format.extension()))
}

/// Build the FFmpeg argument list for `job`.
///
/// The caller validates subtitle/container compatibility beforehand; a job
/// with subtitles is never combined with a non-MKV format here.
pub fn build_command(
    job: &Job,
    cfg: &RunConfiguration,
    hw: &[String],
    output_path: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];

    // Decoder acceleration is the first thing dropped when troubleshooting
    if !cfg.compatibility_mode {
        args.extend(hw.iter().cloned());
    }

    args.push("-init_hw_device".into());
    args.push("vulkan".into());

    args.push("-i".into());
    args.push(job.path.to_string_lossy().into_owned());

    args.push("-vf".into());
    args.push(build_filter_chain(job, cfg));

    push_all(&mut args, &["-map", "0:v:0", "-map", "0:a?"]);
    apply_container_settings(&mut args, cfg.output_format, cfg.compatibility_mode);

    push_all(&mut args, &["-dn", "-c:a", "copy"]);

    args.push("-c:v".into());
    args.push(cfg.encoder.codec.to_string());
    apply_quality(&mut args, &cfg.encoder, cfg.crf, cfg.compatibility_mode);

    args.push(output_path.to_string_lossy().into_owned());
    args
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

/// Upload to Vulkan, run libplacebo with the shader, convert back
fn build_filter_chain(job: &Job, cfg: &RunConfiguration) -> String {
    let res = cfg.resolution;
    let shader = cfg.shader.path;

    if cfg.compatibility_mode {
        return format!(
            "format={pix},hwupload,libplacebo=w={w}:h={h}:custom_shader_path={shader},format={pix}",
            pix = COMPAT_PIXEL_FORMAT,
            w = res.width,
            h = res.height,
        );
    }

    format!(
        "format={pix},hwupload,libplacebo=w={w}:h={h}:upscaler=ewa_lanczos:\
         custom_shader_path={shader},format={pix}",
        pix = job.pixel_format,
        w = res.width,
        h = res.height,
    )
}

fn apply_container_settings(args: &mut Vec<String>, format: OutputFormat, compatibility: bool) {
    match format {
        OutputFormat::Mp4 => push_all(args, &["-movflags", "+faststart"]),
        OutputFormat::Avi => {}
        OutputFormat::Mkv => {
            push_all(args, &["-map", "0:s?"]);
            // Font attachments for styled subtitles
            if !compatibility {
                push_all(args, &["-map", "0:t?"]);
            }
            push_all(args, &["-c:s", "copy"]);
        }
    }
}

/// Rate control for the selected encoder family; CRF value is passed through as-is
fn apply_quality(
    args: &mut Vec<String>,
    encoder: &EncoderDescriptor,
    crf: Crf,
    compatibility: bool,
) {
    let q = crf.value().to_string();

    match encoder.vendor {
        Vendor::Cpu => {
            args.push("-crf".into());
            args.push(q);
        }
        Vendor::Nvidia => {
            push_all(args, &["-rc", "vbr", "-cq"]);
            args.push(q);
            push_all(args, &["-b:v", "0"]);
        }
        Vendor::Amd => {
            push_all(args, &["-rc", "cqp", "-qp_i"]);
            args.push(q.clone());
            args.push("-qp_p".into());
            args.push(q);
        }
        Vendor::Intel => {
            args.push("-global_quality".into());
            args.push(q);
        }
    }

    if compatibility {
        return;
    }

    let preset: &[&str] = match (encoder.vendor, encoder.codec) {
        (Vendor::Cpu, "libsvtav1") => &["-preset", "8"],
        (Vendor::Cpu, _) | (Vendor::Intel, _) => &["-preset", "slow"],
        (Vendor::Nvidia, _) => &["-preset", "p7"],
        (Vendor::Amd, _) => &["-quality", "quality"],
    };
    push_all(args, preset);
}

/// Format the engine invocation as a shell-safe string for display
pub fn format_ffmpeg_cmd(program: &str, args: &[String]) -> String {
    let parts = std::iter::once(program).chain(args.iter().map(String::as_str));
    shlex::try_join(parts).unwrap_or_else(|_| {
        // Arguments with NUL bytes cannot be quoted, show them raw
        std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    })
}
