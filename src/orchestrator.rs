use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::audio::artifact::{ArtifactError, AudioArtifact};
use crate::audio::capture::CaptureSource;
use crate::clipboard::{ClipboardError, ClipboardSink};
use crate::config::{Config, RecordingsConfig, SnippetsConfig};
use crate::recordings;
use crate::session::{SessionState, SessionTracker};
use crate::snippets;
use crate::transcription::engine::{EngineError, TranscriptionBackend};

/// Everything that can go wrong between hotkey release and clipboard update.
///
/// Capture failures never reach the worker; the press/release handlers deal
/// with them before a job is queued.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Session audio could not be staged for the engine
    #[error("failed to stage session audio: {0}")]
    Artifact(#[from] ArtifactError),

    /// Engine invocation failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The session produced no usable text
    #[error("no speech detected")]
    EmptyResult,

    /// Clipboard rejected the transcript; carries the text so the log can
    /// preserve the utterance
    #[error("clipboard write failed: {source}")]
    Clipboard {
        /// Underlying clipboard failure
        source: ClipboardError,
        /// The transcript that failed to land
        text: String,
    },
}

/// One released session, queued for the worker.
struct Job {
    samples: Vec<f32>,
    held: Duration,
}

/// Owns the record -> transcribe -> publish cycle.
///
/// Press and release arrive on the event-loop thread and only touch the
/// microphone; the heavy half of the cycle (WAV staging, engine subprocess,
/// clipboard) runs on a dedicated worker thread so the loop keeps polling
/// while the engine grinds. The session tracker refuses new sessions until
/// the worker reports back.
pub struct Orchestrator {
    tracker: Arc<SessionTracker>,
    capture: Box<dyn CaptureSource>,
    jobs: Option<mpsc::Sender<Job>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Orchestrator {
    /// Wire the pipeline and spawn the transcription worker.
    ///
    /// # Errors
    ///
    /// Returns an error when the recordings directory cannot be resolved or
    /// the worker thread cannot be spawned.
    pub fn new(
        capture: Box<dyn CaptureSource>,
        engine: Box<dyn TranscriptionBackend>,
        clipboard: Box<dyn ClipboardSink>,
        config: &Config,
    ) -> Result<Self> {
        let archive_dir = if config.recordings.keep {
            Some(Config::expand_path(&config.recordings.dir)?)
        } else {
            None
        };

        let tracker = Arc::new(SessionTracker::new());
        let pipeline = Pipeline {
            tracker: Arc::clone(&tracker),
            engine,
            clipboard,
            sample_rate: config.audio.sample_rate,
            snippets: config.snippets.clone(),
            archive_dir,
            retention: config.recordings.clone(),
        };

        let (jobs, queue) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("transcribe".to_owned())
            .spawn(move || pipeline.run(&queue))
            .context("failed to spawn transcription worker")?;

        Ok(Self {
            tracker,
            capture,
            jobs: Some(jobs),
            worker: Some(worker),
        })
    }

    /// Hotkey went down: open a session unless one is already active.
    pub fn on_press(&mut self) {
        if let Err(state) = self.tracker.start_recording(Instant::now()) {
            debug!(%state, "hotkey press ignored");
            return;
        }

        match self.capture.start() {
            Ok(()) => info!("recording (release to transcribe)"),
            Err(err) => {
                error!(error = %err, "could not start recording; still idle");
                self.tracker.finish();
            }
        }
    }

    /// Hotkey came up: close the session and queue its audio for the worker.
    pub fn on_release(&mut self) {
        let started_at = match self.tracker.start_transcribing() {
            Ok(started_at) => started_at,
            Err(state) => {
                debug!(%state, "hotkey release ignored");
                return;
            }
        };

        let samples = match self.capture.stop() {
            Ok(samples) => samples,
            Err(err) => {
                error!(error = %err, "could not stop recording; session dropped");
                self.tracker.finish();
                return;
            }
        };

        let held = started_at.elapsed();
        debug!(
            samples = samples.len(),
            held_ms = held.as_millis(),
            "session closed, transcription queued"
        );

        let queued = self
            .jobs
            .as_ref()
            .is_some_and(|jobs| jobs.send(Job { samples, held }).is_ok());
        if !queued {
            error!("transcription worker is gone; session dropped");
            self.tracker.finish();
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.tracker.current()
    }

    /// Block until no session is active or `timeout` elapses. Returns
    /// whether the pipeline went idle in time.
    #[must_use]
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.tracker.wait_until_idle(timeout)
    }

    /// Close the pipeline, draining in-flight work for at most `grace`.
    ///
    /// The job channel closes immediately so no further sessions queue. If
    /// the worker goes idle within `grace` it is joined; otherwise its
    /// handle is dropped and the thread left detached, so a wedged engine
    /// subprocess cannot hold the process open past the grace period.
    /// Returns whether the pipeline drained in time.
    #[must_use]
    pub fn shutdown(mut self, grace: Duration) -> bool {
        self.jobs.take();
        let drained = self.tracker.wait_until_idle(grace);
        if let Some(worker) = self.worker.take() {
            if drained {
                // Channel is closed and the tracker is idle, so the worker
                // is already on its way out.
                if worker.join().is_err() {
                    error!("transcription worker panicked");
                }
            } else {
                warn!("transcription worker detached with a session in flight");
            }
        }
        drained
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain in-flight work and exit.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("transcription worker panicked");
            }
        }
    }
}

/// The worker-thread half of the cycle.
struct Pipeline {
    tracker: Arc<SessionTracker>,
    engine: Box<dyn TranscriptionBackend>,
    clipboard: Box<dyn ClipboardSink>,
    sample_rate: u32,
    snippets: SnippetsConfig,
    archive_dir: Option<PathBuf>,
    retention: RecordingsConfig,
}

impl Pipeline {
    fn run(&self, jobs: &mpsc::Receiver<Job>) {
        while let Ok(job) = jobs.recv() {
            match self.process(&job) {
                Ok(text) => info!(
                    chars = text.len(),
                    held_ms = job.held.as_millis(),
                    "transcript on clipboard"
                ),
                Err(err) => report(&err),
            }
            self.tracker.finish();
        }
        debug!("transcription worker stopped");
    }

    fn process(&self, job: &Job) -> Result<String, CycleError> {
        if job.samples.is_empty() {
            debug!("no audio captured, engine not invoked");
            return Err(CycleError::EmptyResult);
        }

        let artifact = AudioArtifact::write(&job.samples, self.sample_rate)?;
        let transcribed = self.engine.transcribe(artifact.path());
        // Archive even failed sessions; the audio is what explains them.
        self.stash(artifact);

        let text = transcribed?;
        if text.is_empty() {
            return Err(CycleError::EmptyResult);
        }

        let text = snippets::expand(&text, &self.snippets);
        match self.clipboard.publish(&text) {
            Ok(()) => Ok(text),
            Err(source) => Err(CycleError::Clipboard { source, text }),
        }
    }

    fn stash(&self, artifact: AudioArtifact) {
        let Some(dir) = &self.archive_dir else {
            return; // drop removes the staged file
        };
        match recordings::archive(artifact, dir) {
            Ok(path) => {
                debug!(path = %path.display(), "recording archived");
                if let Err(err) = recordings::prune(dir, &self.retention) {
                    warn!(error = %err, "recording prune failed");
                }
            }
            Err(err) => warn!(error = %err, "failed to archive recording"),
        }
    }
}

fn report(err: &CycleError) {
    match err {
        CycleError::EmptyResult => warn!("no speech detected; clipboard unchanged"),
        CycleError::Clipboard { source, text } => {
            error!(error = %source, "transcript could not reach the clipboard");
            info!(transcript = %text, "transcript preserved in log");
        }
        other => error!(error = %other, "transcription cycle failed"),
    }
}
