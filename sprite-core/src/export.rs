//! Writing generated sprites to disk.

use crate::image::ImageData;
use crate::pipeline::PoseImage;
use crate::poses::PoseDescriptor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from exporting images.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to export")]
    Empty,

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turn a display label into a safe file stem.
///
/// Path separators and characters rejected by common filesystems become
/// `_`; surrounding whitespace and dots are trimmed.
pub fn file_stem(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "sprite".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Write one image to `<dir>/<name>.png`, creating `dir` if needed.
pub async fn write_image(dir: &Path, name: &str, image: &ImageData) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).await.map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(format!("{}.png", file_stem(name)));
    fs::write(&path, image.bytes())
        .await
        .map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

    tracing::debug!(path = %path.display(), bytes = image.len(), "image written");
    Ok(path)
}

/// Write every pose that has a result as `<dir>/<label>.png`, in the order
/// of `poses`. Returns the written paths.
pub async fn export_poses(
    dir: &Path,
    poses: &[PoseDescriptor],
    results: &HashMap<String, PoseImage>,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::new();

    for pose in poses {
        if let Some(result) = results.get(&pose.id) {
            written.push(write_image(dir, &pose.label, &result.image).await?);
        }
    }

    if written.is_empty() {
        return Err(ExportError::Empty);
    }

    tracing::info!(dir = %dir.display(), files = written.len(), "poses exported");
    Ok(written)
}
