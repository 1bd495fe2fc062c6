use std::path::{Path, PathBuf};

use tokio::fs;
use utils::ids::random_filename_preserving_ext;

/// §4.1 step 1: each uploaded file is written under a fresh random name
/// preserving its extension. A write failure degrades to a skipped file
/// (logged) rather than aborting the whole submission.
pub async fn persist_uploads(
    upload_dir: &Path,
    files: Vec<(String, Vec<u8>)>,
) -> Vec<String> {
    let mut stored = Vec::with_capacity(files.len());
    for (original_name, bytes) in files {
        let filename = random_filename_preserving_ext(&original_name);
        let dest: PathBuf = upload_dir.join(&filename);
        match fs::write(&dest, &bytes).await {
            Ok(()) => stored.push(dest.to_string_lossy().into_owned()),
            Err(e) => tracing::warn!(%original_name, error = %e, "failed to persist upload, skipping"),
        }
    }
    stored
}
