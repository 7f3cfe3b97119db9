//! GPU vendor detection and encoder catalog narrowing

use std::process::Command;

use tracing::{debug, info};

use crate::engine::core::{ENCODERS, EncoderDescriptor, HardwareParams, Vendor};

/// Detected GPU vendor for hardware encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
}

impl GpuVendor {
    /// Preference order when picking decoder acceleration
    pub const PRIORITY: [GpuVendor; 3] = [Self::Nvidia, Self::Amd, Self::Intel];

    /// Classify an adapter name such as "NVIDIA GeForce RTX 3080"
    pub fn classify(adapter: &str) -> Option<Self> {
        let lower = adapter.to_lowercase();
        if lower.contains("nvidia") {
            Some(Self::Nvidia)
        } else if lower.contains("advanced micro devices")
            || lower.contains("amd")
            || lower.contains("radeon")
        {
            Some(Self::Amd)
        } else if lower.contains("intel") {
            Some(Self::Intel)
        } else {
            None
        }
    }

    pub fn catalog_vendor(self) -> Vendor {
        match self {
            Self::Nvidia => Vendor::Nvidia,
            Self::Amd => Vendor::Amd,
            Self::Intel => Vendor::Intel,
        }
    }

    /// Decoder acceleration flags for this vendor
    pub fn hwaccel_params(self) -> HardwareParams {
        let backend = match self {
            Self::Nvidia => "cuda",
            Self::Amd if cfg!(windows) => "d3d11va",
            Self::Amd => "vaapi",
            Self::Intel => "qsv",
        };
        vec!["-hwaccel".to_string(), backend.to_string()]
    }
}

/// Source of GPU adapter names
pub trait GpuProbe {
    /// Every adapter name this probe can see. A failing source is skipped,
    /// the probe itself never errors.
    fn adapter_names(&self) -> Vec<String>;
}

/// Probes the host with the platform's usual tooling
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGpuProbe;

impl GpuProbe for SystemGpuProbe {
    fn adapter_names(&self) -> Vec<String> {
        let mut names = platform_adapter_names();
        if let Some(nvidia) = detect_nvidia_gpu() {
            names.push(nvidia);
        }
        names
    }
}

/// Run a listing tool and return its stdout, or None if it could not run
fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    crate::engine::supervisor::hide_console_window(&mut cmd);

    match cmd.output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!(program, status = %output.status, "GPU listing tool failed");
            None
        }
        Err(e) => {
            debug!(program, error = %e, "GPU listing tool unavailable");
            None
        }
    }
}

#[cfg(windows)]
fn platform_adapter_names() -> Vec<String> {
    // wmic is gone from recent Windows 11 builds
    let wmic = command_stdout("wmic", &["path", "win32_VideoController", "get", "name"])
        .map(|out| parse_adapter_listing(&out))
        .unwrap_or_default();
    if !wmic.is_empty() {
        return wmic;
    }
    debug!("wmic listed no adapters, asking PowerShell");
    command_stdout(
        "powershell",
        &[
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            "Get-CimInstance Win32_VideoController | Select-Object -ExpandProperty Name",
        ],
    )
    .map(|out| parse_adapter_listing(&out))
    .unwrap_or_default()
}

#[cfg(target_os = "macos")]
fn platform_adapter_names() -> Vec<String> {
    command_stdout("system_profiler", &["SPDisplaysDataType"])
        .map(|out| {
            out.lines()
                .filter_map(|l| l.trim().strip_prefix("Chipset Model:"))
                .map(|m| m.trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(not(any(windows, target_os = "macos")))]
fn platform_adapter_names() -> Vec<String> {
    command_stdout("lspci", &[])
        .map(|out| parse_lspci(&out))
        .unwrap_or_default()
}

/// PCI classes that carry a GPU
const DISPLAY_CLASSES: [&str; 3] = [
    "VGA compatible controller",
    "3D controller",
    "Display controller",
];

/// Device names of the display-class entries in default `lspci` output.
///
/// Lines look like `01:00.0 3D controller: NVIDIA Corporation GA107M (rev a1)`.
/// Only the class column decides, so a slot such as `3d:00.0` or a
/// `(rev 3d)` suffix never turns a NIC into a GPU.
pub fn parse_lspci(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let (_slot, rest) = line.trim().split_once(' ')?;
            let (class, device) = rest.split_once(": ")?;
            DISPLAY_CLASSES
                .iter()
                .any(|c| class.starts_with(c))
                .then(|| device.trim().to_string())
        })
        .collect()
}

/// Adapter names from a one-name-per-line listing (`wmic ... get name` or
/// `Get-CimInstance ... -ExpandProperty Name`), header and blanks dropped
pub fn parse_adapter_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("name"))
        .map(str::to_string)
        .collect()
}

/// Detect NVIDIA GPU using nvidia-smi
pub fn detect_nvidia_gpu() -> Option<String> {
    command_stdout("nvidia-smi", &["--query-gpu=name", "--format=csv,noheader"])?
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|name| format!("NVIDIA {}", name.trim_start_matches("NVIDIA ")))
}

/// Outcome of startup capability detection
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareProfile {
    pub vendors: Vec<GpuVendor>,
    /// Catalog entries this host can run, catalog order kept. Never empty.
    pub available_encoders: Vec<EncoderDescriptor>,
    pub hwaccel_params: HardwareParams,
    /// Default codec for the best vendor (H.264 family)
    pub primary_video_codec: String,
}

impl HardwareProfile {
    /// Profile with no GPU at all
    pub fn cpu_only() -> Self {
        Self::from_vendors(Vec::new())
    }

    /// Build the profile for an explicit vendor set
    pub fn from_vendors(mut vendors: Vec<GpuVendor>) -> Self {
        vendors.sort_by_key(|v| GpuVendor::PRIORITY.iter().position(|p| p == v));
        vendors.dedup();

        let available_encoders: Vec<EncoderDescriptor> = ENCODERS
            .iter()
            .filter(|e| {
                e.vendor == Vendor::Cpu || vendors.iter().any(|v| v.catalog_vendor() == e.vendor)
            })
            .copied()
            .collect();

        let best = vendors.first().copied();
        let hwaccel_params = best.map(GpuVendor::hwaccel_params).unwrap_or_default();
        let primary_vendor = best.map(GpuVendor::catalog_vendor).unwrap_or(Vendor::Cpu);
        let primary_video_codec = available_encoders
            .iter()
            .find(|e| e.vendor == primary_vendor)
            .map(|e| e.codec.to_string())
            .unwrap_or_else(|| "libx264".to_string());

        Self {
            vendors,
            available_encoders,
            hwaccel_params,
            primary_video_codec,
        }
    }

    /// Index into `available_encoders` of the primary codec
    pub fn primary_encoder_index(&self) -> usize {
        self.available_encoders
            .iter()
            .position(|e| e.codec == self.primary_video_codec)
            .unwrap_or(0)
    }
}

/// Inspect the host once at startup and narrow the encoder catalog
pub fn detect_hardware(probe: &dyn GpuProbe) -> HardwareProfile {
    let vendors: Vec<GpuVendor> = probe
        .adapter_names()
        .iter()
        .filter_map(|name| {
            let vendor = GpuVendor::classify(name);
            debug!(adapter = %name, ?vendor, "GPU adapter");
            vendor
        })
        .collect();

    let profile = HardwareProfile::from_vendors(vendors);
    info!(
        vendors = ?profile.vendors,
        hwaccel = ?profile.hwaccel_params,
        encoders = profile.available_encoders.len(),
        "hardware detection finished"
    );
    profile
}
