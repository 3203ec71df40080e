/// Temporary WAV staging for captured sessions
pub mod artifact;
/// Microphone capture and sample conversion
pub mod capture;

pub use artifact::{ArtifactError, AudioArtifact};
pub use capture::{AudioCapture, CaptureError, CaptureSource};
