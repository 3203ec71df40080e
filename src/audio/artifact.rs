use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Failures staging a session's audio on disk.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create temporary wav file: {0}")]
    Create(#[source] std::io::Error),
    #[error("failed to encode wav data: {0}")]
    Encode(#[from] hound::Error),
    #[error("failed to keep recording at {path}: {source}")]
    Keep {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One session's captured audio, staged as a mono 16-bit PCM WAV for the
/// engine.
///
/// The file lives in the OS temp directory and is deleted when the artifact
/// drops, unless [`keep_at`](Self::keep_at) moves it into the archive first.
pub struct AudioArtifact {
    file: NamedTempFile,
    sample_count: usize,
}

impl AudioArtifact {
    /// Quantize `samples` (f32, already mono at `sample_rate`) into a fresh
    /// temp WAV.
    ///
    /// # Errors
    ///
    /// Returns an [`ArtifactError`] when the temp file cannot be created or
    /// the WAV data cannot be written.
    pub fn write(samples: &[f32], sample_rate: u32) -> Result<Self, ArtifactError> {
        let file = tempfile::Builder::new()
            .prefix("whisperclip-")
            .suffix(".wav")
            .tempfile()
            .map_err(ArtifactError::Create)?;

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let handle = file.reopen().map_err(ArtifactError::Create)?;
        let mut writer = WavWriter::new(BufWriter::new(handle), spec)?;
        for &sample in samples {
            writer.write_sample(quantize(sample))?;
        }
        writer.finalize()?;

        debug!(
            path = %file.path().display(),
            samples = samples.len(),
            "session audio staged"
        );
        Ok(Self {
            file,
            sample_count: samples.len(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub const fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Move the staged recording to `dest` instead of deleting it.
    ///
    /// # Errors
    ///
    /// Returns an [`ArtifactError`] when neither a rename nor a copy into
    /// `dest` succeeds.
    pub fn keep_at(self, dest: &Path) -> Result<(), ArtifactError> {
        match self.file.persist(dest) {
            Ok(_) => Ok(()),
            // Rename fails when the archive sits on another filesystem than
            // the temp dir; copy instead and let drop remove the original.
            Err(persist) => std::fs::copy(persist.file.path(), dest)
                .map(|_| ())
                .map_err(|source| ArtifactError::Keep {
                    path: dest.to_path_buf(),
                    source,
                }),
        }
    }
}

/// f32 sample in [-1.0, 1.0] to 16-bit PCM, saturating outside the range.
fn quantize(sample: f32) -> i16 {
    // Clamped product always fits in i16
    #[allow(clippy::cast_possible_truncation)]
    {
        (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
    }
}
