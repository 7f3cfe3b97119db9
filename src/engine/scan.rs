use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Input containers accepted into the queue
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv"];

/// Check if a path has a supported video file extension
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Expand command-line inputs into video files.
///
/// Files are kept when their extension is supported; directories are walked
/// recursively and sorted so the queue order is stable.
pub fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if is_video_file(input) {
            files.push(input.clone());
        } else {
            tracing::warn!(path = %input.display(), "skipping unsupported input");
        }
    }
    files
}
