use std::fmt;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Where the push-to-talk cycle currently is.
///
/// `Recording` carries the moment the hotkey went down; the audio itself
/// accumulates in the capture ring buffer while this variant is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session active; a hotkey press opens one.
    Idle,
    /// Hotkey held, microphone streaming into the ring buffer.
    Recording {
        /// When the hotkey went down.
        started_at: Instant,
    },
    /// Hotkey released, audio handed to the transcription worker.
    Transcribing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Recording { .. } => f.write_str("recording"),
            Self::Transcribing => f.write_str("transcribing"),
        }
    }
}

/// Shared session state between the hotkey event loop and the transcription
/// worker.
///
/// Only the cycle's own edges are expressible: `Idle` to `Recording` on
/// press, `Recording` to `Transcribing` on release, and back to `Idle` when
/// the worker finishes or a step fails. Waiters parked in
/// [`wait_until_idle`](Self::wait_until_idle) are woken on every return to
/// `Idle`.
#[derive(Debug)]
pub struct SessionTracker {
    state: Mutex<SessionState>,
    idle: Condvar,
}

impl SessionTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            idle: Condvar::new(),
        }
    }

    #[must_use]
    pub fn current(&self) -> SessionState {
        *self.lock()
    }

    /// Open a recording session.
    ///
    /// # Errors
    ///
    /// Returns the blocking state when a session is already active, leaving
    /// it unchanged. Key repeats while the hotkey is held land here.
    pub fn start_recording(&self, started_at: Instant) -> Result<(), SessionState> {
        let mut state = self.lock();
        match *state {
            SessionState::Idle => {
                *state = SessionState::Recording { started_at };
                Ok(())
            }
            blocking => Err(blocking),
        }
    }

    /// Close the recording session and enter `Transcribing`.
    ///
    /// # Errors
    ///
    /// Returns the current state unchanged when no recording is open. A
    /// release without a matching press lands here.
    pub fn start_transcribing(&self) -> Result<Instant, SessionState> {
        let mut state = self.lock();
        match *state {
            SessionState::Recording { started_at } => {
                *state = SessionState::Transcribing;
                Ok(started_at)
            }
            blocking => Err(blocking),
        }
    }

    /// Return to `Idle` from any state and wake idle waiters.
    pub fn finish(&self) {
        let mut state = self.lock();
        *state = SessionState::Idle;
        drop(state);
        self.idle.notify_all();
    }

    /// Block until the tracker is `Idle` or `timeout` elapses. Returns
    /// whether it went idle in time.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _timed_out) = self
            .idle
            .wait_timeout_while(state, timeout, |current| {
                *current != SessionState::Idle
            })
            .unwrap_or_else(PoisonError::into_inner);
        *state == SessionState::Idle
    }

    // Holders of the lock never panic mid-update, so a poisoned state is
    // still consistent and safe to reuse.
    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
