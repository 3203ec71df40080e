use thiserror::Error;
use tracing::debug;

/// Errors that can occur delivering text to the clipboard
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// No clipboard could be opened (headless session, display gone)
    #[error("clipboard unavailable: {source}")]
    Unavailable {
        /// Underlying error
        source: anyhow::Error,
    },

    /// The clipboard was open but refused the write
    #[error("clipboard write failed: {source}")]
    Write {
        /// Underlying error
        source: anyhow::Error,
    },
}

/// Destination for finished transcripts.
pub trait ClipboardSink: Send {
    /// Replace the clipboard contents with `text`.
    ///
    /// # Errors
    /// Returns a [`ClipboardError`] when the clipboard cannot be reached or
    /// rejects the write.
    fn publish(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The OS clipboard via `arboard`.
///
/// A fresh handle is opened per publish; a long-lived handle would hold the
/// clipboard connection open between sessions, which blocks other writers on
/// some platforms.
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn publish(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|err| ClipboardError::Unavailable {
                source: anyhow::Error::new(err),
            })?;
        clipboard
            .set_text(text)
            .map_err(|err| ClipboardError::Write {
                source: anyhow::Error::new(err),
            })?;

        debug!(chars = text.len(), "clipboard updated");
        Ok(())
    }
}
