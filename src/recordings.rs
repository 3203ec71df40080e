use crate::audio::AudioArtifact;
use crate::config::RecordingsConfig;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Move a session's staged audio into the archive.
///
/// Files are named `recording_{unix_timestamp}.wav` so retention can read
/// their age back out of the name.
///
/// # Errors
/// Returns an error when the archive directory cannot be created or the
/// recording cannot be moved into it.
pub fn archive(artifact: AudioArtifact, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).context("failed to create recordings directory")?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("failed to get current time")?
        .as_secs();
    let dest = dir.join(format!("recording_{timestamp}.wav"));

    artifact
        .keep_at(&dest)
        .context("failed to move recording into archive")?;
    Ok(dest)
}

/// Delete archived recordings that fall outside the retention policy.
///
/// Removes recordings older than `retention_days` OR beyond the `max_count`
/// newest; a zero disables that policy. Returns the number of files deleted.
///
/// # Errors
/// Returns an error if the directory listing fails. Individual file deletion
/// failures are logged but don't stop the pass.
pub fn prune(dir: &Path, config: &RecordingsConfig) -> Result<usize> {
    if !dir.exists() {
        tracing::debug!("recordings directory does not exist, skipping prune");
        return Ok(0);
    }

    // Collect recordings with the timestamps encoded in their names; anything
    // else in the directory is not ours to delete.
    let mut recordings: Vec<(PathBuf, u64)> = fs::read_dir(dir)
        .context("failed to read recordings directory")?
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if !path.is_file() {
                return None;
            }

            let filename = path.file_name()?.to_str()?;
            let timestamp: u64 = filename
                .strip_prefix("recording_")?
                .strip_suffix(".wav")?
                .parse()
                .ok()?;

            Some((path, timestamp))
        })
        .collect();

    if recordings.is_empty() {
        return Ok(0);
    }

    // Newest first
    recordings.sort_by(|a, b| b.1.cmp(&a.1));

    let mut to_delete = HashSet::new();

    if config.retention_days > 0 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("failed to get current time")?
            .as_secs();
        let retention_secs = u64::from(config.retention_days) * 24 * 60 * 60;

        for (path, timestamp) in &recordings {
            if now.saturating_sub(*timestamp) > retention_secs {
                to_delete.insert(path.clone());
            }
        }
    }

    if config.max_count > 0 && recordings.len() > config.max_count {
        for (path, _) in recordings.iter().skip(config.max_count) {
            to_delete.insert(path.clone());
        }
    }

    let mut deleted = 0;
    for path in to_delete {
        match fs::remove_file(&path) {
            Ok(()) => {
                deleted += 1;
                tracing::debug!("deleted recording: {}", path.display());
            }
            Err(e) => {
                tracing::warn!("failed to delete {}: {}", path.display(), e);
            }
        }
    }

    if deleted > 0 {
        tracing::debug!(
            deleted,
            remaining = recordings.len() - deleted,
            "recording prune complete"
        );
    }

    Ok(deleted)
}
