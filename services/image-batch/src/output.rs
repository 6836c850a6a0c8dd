//! Artifact persistence

use std::path::{Path, PathBuf};

use provider::InlineImage;

/// Write `image` to `{dir}/{target}.{ext}` and return the path.
pub async fn save_artifact(dir: &Path, target: &str, image: &InlineImage) -> std::io::Result<PathBuf> {
    let path = dir.join(format!("{target}.{}", image.extension()));
    tokio::fs::write(&path, &image.data).await?;
    Ok(path)
}
