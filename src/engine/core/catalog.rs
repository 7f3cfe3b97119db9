//! Static option catalogs offered to the user.

use super::types::{EncoderDescriptor, ResolutionOption, ShaderOption, Vendor};

pub const RESOLUTIONS: &[ResolutionOption] = &[
    res(1024, 768, false),
    res(1440, 1080, false),
    res(1920, 1440, false),
    res(2880, 2160, false),
    res(1280, 720, true),
    res(1920, 1080, true),
    res(2560, 1440, true),
    res(3840, 2160, true),
];

pub const SHADERS: &[ShaderOption] = &[
    shader("Anime4K Mode A", "shaders/Anime4K_ModeA.glsl"),
    shader("Anime4K Mode A+A", "shaders/Anime4K_ModeA+A.glsl"),
    shader("Anime4K Mode B", "shaders/Anime4K_ModeB.glsl"),
    shader("Anime4K Mode B+B", "shaders/Anime4K_ModeB+B.glsl"),
    shader("Anime4K Mode C", "shaders/Anime4K_ModeC.glsl"),
    shader("Anime4K Mode C+A", "shaders/Anime4K_ModeC+A.glsl"),
    shader("FSRCNNX", "shaders/FSRCNNX_x2_16-0-4-1.glsl"),
];

pub const ENCODERS: &[EncoderDescriptor] = &[
    encoder("H.264 (CPU)", "libx264", Vendor::Cpu),
    encoder("H.264 NVENC (NVIDIA)", "h264_nvenc", Vendor::Nvidia),
    encoder("H.264 AMF (AMD)", "h264_amf", Vendor::Amd),
    encoder("H.264 Quick Sync (Intel)", "h264_qsv", Vendor::Intel),
    encoder("H.265 (CPU)", "libx265", Vendor::Cpu),
    encoder("H.265 NVENC (NVIDIA)", "hevc_nvenc", Vendor::Nvidia),
    encoder("H.265 AMF (AMD)", "hevc_amf", Vendor::Amd),
    encoder("H.265 Quick Sync (Intel)", "hevc_qsv", Vendor::Intel),
    encoder("AV1 (CPU)", "libsvtav1", Vendor::Cpu),
    encoder("AV1 NVENC (NVIDIA)", "av1_nvenc", Vendor::Nvidia),
    encoder("AV1 AMF (AMD)", "av1_amf", Vendor::Amd),
    encoder("AV1 Quick Sync (Intel)", "av1_qsv", Vendor::Intel),
];

const fn res(width: u32, height: u32, qhd_class: bool) -> ResolutionOption {
    ResolutionOption {
        width,
        height,
        qhd_class,
    }
}

const fn shader(name: &'static str, path: &'static str) -> ShaderOption {
    ShaderOption { name, path }
}

const fn encoder(name: &'static str, codec: &'static str, vendor: Vendor) -> EncoderDescriptor {
    EncoderDescriptor {
        name,
        codec,
        vendor,
    }
}

/// Index of the preset selected on first launch (1920x1080)
pub const DEFAULT_RESOLUTION: usize = 5;

/// Find an encoder entry by its FFmpeg codec name
pub fn encoder_by_codec(codec: &str) -> Option<&'static EncoderDescriptor> {
    ENCODERS.iter().find(|e| e.codec == codec)
}
