mod catalog;
mod ffmpeg_cmd;
mod progress;
mod queue;
mod types;

pub use catalog::{DEFAULT_RESOLUTION, ENCODERS, RESOLUTIONS, SHADERS, encoder_by_codec};
pub use ffmpeg_cmd::{OUTPUT_SUFFIX, build_command, derive_output_path, format_ffmpeg_cmd};
pub use progress::{
    DiagnosticLines, ProgressParser, ProgressSnapshot, parse_timestamp, pump_diagnostics,
};
pub use queue::JobQueue;
pub use types::{
    Crf, EncoderDescriptor, HardwareParams, Job, JobStatus, OutputFormat, ResolutionOption,
    RunConfiguration, ShaderOption, Vendor,
};
pub(crate) use types::default_pixel_format;
