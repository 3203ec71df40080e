//! Whisperclip - push-to-talk voice transcription for the clipboard
//!
//! Hold a global hotkey to record from the default microphone, release it
//! to transcribe the take with a local speech engine and place the text on
//! the system clipboard. This library exports the building blocks so the
//! binary stays a thin event loop and the pieces stay testable.

/// Microphone capture and WAV staging
pub mod audio;
/// System clipboard delivery
pub mod clipboard;
/// Configuration management
pub mod config;
/// Global hotkey registration
pub mod input;
/// Press/release cycle coordination and the transcription worker
pub mod orchestrator;
/// Archiving and retention of recorded takes
pub mod recordings;
/// Session state tracking across threads
pub mod session;
/// Voice snippet expansion for transcribed text
pub mod snippets;
/// Telemetry and logging setup
pub mod telemetry;
/// Speech engine invocation
pub mod transcription;

pub use config::Config;
pub use orchestrator::Orchestrator;
