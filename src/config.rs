use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Settings loaded from `~/.whisperclip.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub hotkey: HotkeyConfig,
    pub engine: EngineConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub snippets: SnippetsConfig,
    #[serde(default)]
    pub recordings: RecordingsConfig,
    pub telemetry: TelemetryConfig,
}

/// The push-to-talk chord, e.g. `Control` + `Backquote`.
#[derive(Debug, Deserialize, Clone)]
pub struct HotkeyConfig {
    pub modifiers: Vec<String>,
    pub key: String,
}

/// The external speech-to-text executable and how to invoke it.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Executable path, or a bare name resolved through `PATH`.
    pub path: String,
    /// Model file handed to the engine via `--model`.
    pub model: String,
    /// Flags appended after `--model` and `--file`.
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
}

/// Capture parameters for the microphone ring buffer.
#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    /// Rate the staged WAV is resampled to before transcription.
    pub sample_rate: u32,
    /// Longest hold the ring buffer can retain without dropping samples.
    pub max_record_secs: usize,
}

/// Fuzzy phrase replacement applied to transcripts before the clipboard.
#[derive(Debug, Deserialize, Clone)]
pub struct SnippetsConfig {
    pub enabled: bool,
    /// Jaro-Winkler similarity required for a trigger to fire (0.0 to 1.0).
    pub threshold: f64,
    /// Spoken trigger phrase to replacement text.
    pub entries: HashMap<String, String>,
}

/// Optional on-disk archive of session recordings.
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingsConfig {
    pub keep: bool,
    pub dir: String,
    pub retention_days: u32,
    pub max_count: usize,
}

/// Where tracing output goes.
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// When true, log to `log_path` instead of stdout.
    pub enabled: bool,
    pub log_path: String,
}

impl Default for SnippetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.85,
            entries: HashMap::new(),
        }
    }
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            keep: false,
            dir: "~/.whisperclip/recordings".to_owned(),
            retention_days: 7,
            max_count: 50,
        }
    }
}

fn default_extra_args() -> Vec<String> {
    vec!["--no-timestamps".to_owned(), "--no-prints".to_owned()]
}

impl Config {
    /// Load config from `~/.whisperclip.toml`, writing a default file on first run.
    ///
    /// # Errors
    ///
    /// Returns an error when the home directory cannot be resolved, the file
    /// cannot be read or created, the TOML does not parse, or a capture
    /// setting is zero.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path)
                .context("failed to create default config")?;
        }

        let contents = fs::read_to_string(&config_path)
            .context("failed to read config file")?;

        let config: Self = toml::from_str(&contents)
            .context("failed to parse config TOML")?;

        config.validate()?;

        Ok(config)
    }

    // The ring buffer is sized from these, so zero would panic at startup.
    fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate must be non-zero");
        }
        if self.audio.max_record_secs == 0 {
            anyhow::bail!("audio.max_record_secs must be at least 1");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".whisperclip.toml"))
    }

    fn create_default(path: &PathBuf) -> Result<()> {
        let default_config = r#"[hotkey]
modifiers = ["Control"]
key = "Backquote"

[engine]
path = "whisper-cli"
model = "~/.whisperclip/models/ggml-small.en.bin"
extra_args = ["--no-timestamps", "--no-prints"]

[audio]
sample_rate = 16000
max_record_secs = 30

[snippets]
enabled = false
threshold = 0.85

[snippets.entries]
# "sign off" = "Best regards,\nAlex"

[recordings]
keep = false
dir = "~/.whisperclip/recordings"
retention_days = 7
max_count = 50

[telemetry]
enabled = false
log_path = "~/.whisperclip/whisperclip.log"
"#;
        fs::write(path, default_config)
            .context("failed to write default config")?;
        Ok(())
    }

    /// Expand ~ in paths to home directory
    ///
    /// # Errors
    ///
    /// Returns an error when the path starts with `~/` and `HOME` is unset.
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(rest) = path.strip_prefix("~/") {
            let home = std::env::var("HOME")
                .context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(rest))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}
