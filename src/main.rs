use std::time::Duration;

use anyhow::Result;
use global_hotkey::{GlobalHotKeyEvent, HotKeyState};

use whisperclip::audio::AudioCapture;
use whisperclip::clipboard::SystemClipboard;
use whisperclip::config::Config;
use whisperclip::input::HotkeyBinding;
use whisperclip::orchestrator::Orchestrator;
use whisperclip::transcription::CliEngine;
use whisperclip::{recordings, telemetry};

/// How long shutdown waits for an in-flight transcription to land.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    println!("✓ Config loaded from ~/.whisperclip.toml");

    telemetry::init(&config.telemetry)?;
    tracing::info!("whisperclip starting");
    println!("✓ Telemetry initialized");

    let engine = CliEngine::new(
        Config::expand_path(&config.engine.path)?,
        Config::expand_path(&config.engine.model)?,
        config.engine.extra_args.clone(),
    )?;
    println!("✓ Speech engine ready: {}", config.engine.path);

    let capture = AudioCapture::new(&config.audio)?;
    println!("✓ Microphone ready ({} Hz mono)", config.audio.sample_rate);

    if config.recordings.keep {
        let dir = Config::expand_path(&config.recordings.dir)?;
        match recordings::prune(&dir, &config.recordings) {
            Ok(0) => {}
            Ok(n) => tracing::info!("pruned {} archived recording(s) at startup", n),
            Err(e) => tracing::warn!("recording prune failed: {:#}", e),
        }
    }

    let mut orchestrator = Orchestrator::new(
        Box::new(capture),
        Box::new(engine),
        Box::new(SystemClipboard),
        &config,
    )?;

    let binding = HotkeyBinding::new(&config.hotkey)?;
    println!(
        "✓ Hotkey registered: {:?} + {}",
        config.hotkey.modifiers, config.hotkey.key
    );

    tracing::info!("event loop starting (press Ctrl+C to exit)");
    println!("\nWhisperclip is running. Hold the hotkey to dictate; release to copy.");
    println!("Press Ctrl+C to exit.\n");

    let receiver = GlobalHotKeyEvent::receiver();
    loop {
        // Poll for hotkey events
        if let Ok(event) = receiver.try_recv() {
            if binding.matches(&event) {
                match event.state {
                    HotKeyState::Pressed => orchestrator.on_press(),
                    HotKeyState::Released => orchestrator.on_release(),
                }
            }
        }

        // Check for shutdown signal
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                println!("\nShutting down...");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(10)) => {
                // Poll interval (10ms to avoid busy-waiting)
            }
        }
    }

    if !orchestrator.shutdown(SHUTDOWN_GRACE) {
        tracing::warn!(
            "transcription still running after {:?}; leaving it behind",
            SHUTDOWN_GRACE
        );
    }

    Ok(())
}
