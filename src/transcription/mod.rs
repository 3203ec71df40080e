/// External engine invocation
pub mod engine;

pub use engine::{CliEngine, EngineError, TranscriptionBackend};
