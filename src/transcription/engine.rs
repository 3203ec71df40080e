use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Boundary to the speech-to-text engine (enables testing via mocking)
///
/// The orchestrator only sees this trait, so tests substitute
/// `MockTranscriptionBackend` (via `mockall`) and the engine binary can be
/// swapped through configuration without touching the pipeline.
#[cfg_attr(test, mockall::automock)]
pub trait TranscriptionBackend: Send {
    /// Transcribe the staged WAV file at `audio` and return the normalized
    /// text. Empty output means the engine heard no speech.
    ///
    /// # Errors
    /// Returns an [`EngineError`] when the engine cannot be launched or
    /// reports failure.
    fn transcribe(&self, audio: &Path) -> Result<String, EngineError>;
}

/// Errors that can occur invoking the external engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine executable missing at the configured path
    #[error("engine executable not found: {0}")]
    MissingExecutable(PathBuf),

    /// Model file missing at the configured path
    #[error("model file not found: {0}")]
    MissingModel(PathBuf),

    /// Engine process could not be launched
    #[error("failed to launch {path}: {source}")]
    Spawn {
        /// Configured executable
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Engine ran but reported failure
    #[error("engine exited with {status}: {stderr}")]
    Failed {
        /// Process exit status
        status: std::process::ExitStatus,
        /// Trailing stderr excerpt
        stderr: String,
    },

    /// Engine produced output that is not UTF-8
    #[error("engine output is not valid utf-8: {0}")]
    Output(#[from] std::string::FromUtf8Error),
}

/// Invokes a whisper.cpp-style command-line engine, one process per session.
///
/// The engine is run as `<path> --model <model> --file <wav> <extra_args>`;
/// its stdout is the transcript and a non-zero exit is a failure. Spawning
/// per session keeps the engine swappable and the host process free of
/// inference state.
#[derive(Debug)]
pub struct CliEngine {
    executable: PathBuf,
    model: PathBuf,
    extra_args: Vec<String>,
}

impl CliEngine {
    /// Validate the configured executable and model.
    ///
    /// A bare executable name is resolved through `PATH` at spawn time and
    /// is not checked here.
    ///
    /// # Errors
    /// Returns an [`EngineError`] when an explicit executable path or the
    /// model file does not exist.
    pub fn new(
        executable: PathBuf,
        model: PathBuf,
        extra_args: Vec<String>,
    ) -> Result<Self, EngineError> {
        if executable.components().count() > 1 && !executable.exists() {
            return Err(EngineError::MissingExecutable(executable));
        }
        if !model.exists() {
            return Err(EngineError::MissingModel(model));
        }

        info!(
            executable = %executable.display(),
            model = %model.display(),
            "transcription engine configured"
        );

        Ok(Self {
            executable,
            model,
            extra_args,
        })
    }
}

impl TranscriptionBackend for CliEngine {
    fn transcribe(&self, audio: &Path) -> Result<String, EngineError> {
        let start = std::time::Instant::now();
        debug!(
            executable = %self.executable.display(),
            audio = %audio.display(),
            "invoking engine"
        );

        let output = Command::new(&self.executable)
            .arg("--model")
            .arg(&self.model)
            .arg("--file")
            .arg(audio)
            .args(&self.extra_args)
            .output()
            .map_err(|source| EngineError::Spawn {
                path: self.executable.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed {
                status: output.status,
                stderr: stderr_excerpt(&stderr),
            });
        }

        let text = normalize_output(&String::from_utf8(output.stdout)?);
        info!(
            chars = text.len(),
            engine_ms = start.elapsed().as_millis(),
            "engine finished"
        );
        Ok(text)
    }
}

/// Join the engine's non-empty output lines, dropping the whitespace
/// whisper-cli pads around each segment.
fn normalize_output(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Leading slice of stderr for the log; whisper-cli dumps its whole system
/// banner there on failure.
fn stderr_excerpt(stderr: &str) -> String {
    const MAX_LEN: usize = 200;

    let trimmed = stderr.trim();
    if trimmed.len() <= MAX_LEN {
        return trimmed.to_owned();
    }
    let mut end = MAX_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
