use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapRb,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AudioConfig;

/// Failures talking to the capture device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio input device available")]
    NoDevice,
    #[error("failed to read input device config: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build input stream: {0}")]
    StreamBuild(#[from] cpal::BuildStreamError),
    #[error("failed to resume audio stream: {0}")]
    Resume(#[from] cpal::PlayStreamError),
    #[error("failed to pause audio stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),
}

/// Microphone boundary for the push-to-talk cycle.
///
/// `start` arms the device; `stop` disarms it and drains what was captured,
/// already downmixed and resampled for the engine. Implementations stay on
/// the event-loop thread.
pub trait CaptureSource {
    /// Begin routing microphone input into the session buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] when the stream cannot be resumed.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop capturing and return the session's samples.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] when the stream cannot be paused.
    fn stop(&mut self) -> Result<Vec<f32>, CaptureError>;
}

/// Stream lifecycle handle, mockable in tests.
trait StreamControl {
    /// Resume audio stream (activate microphone)
    fn play(&self) -> Result<(), CaptureError>;
    /// Pause audio stream (deactivate microphone)
    fn pause(&self) -> Result<(), CaptureError>;
}

struct CpalStreamControl {
    stream: cpal::Stream,
}

impl StreamControl for CpalStreamControl {
    fn play(&self) -> Result<(), CaptureError> {
        self.stream.play().map_err(CaptureError::from)
    }

    fn pause(&self) -> Result<(), CaptureError> {
        self.stream.pause().map_err(CaptureError::from)
    }
}

/// Microphone capture through CPAL with a lock-free session buffer.
///
/// The stream is built once and left paused; each hotkey press resumes it
/// and each release pauses it again, so the microphone is only live while
/// the key is held.
pub struct AudioCapture {
    /// Kept alive for play/pause; dropping it kills the stream.
    stream_control: Option<Box<dyn StreamControl>>,
    ring_buffer_consumer: HeapCons<f32>,
    is_recording: Arc<AtomicBool>,
    device_sample_rate: u32,
    device_channels: u16,
    /// Rate the drained samples are converted to for the engine.
    resample_to: u32,
}

impl AudioCapture {
    /// Open the default input device and prepare a paused stream.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] when no input device exists or the stream
    /// cannot be built.
    pub fn new(config: &AudioConfig) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_owned());
        info!("using input device: {}", device_name);

        // Capture at the device's native config; conversion happens on stop.
        let supported_config = device.default_input_config()?;
        let device_sample_rate = supported_config.sample_rate();
        let device_channels = supported_config.channels();
        info!(
            "device config: {} Hz, {} channels",
            device_sample_rate, device_channels
        );

        // Size the ring buffer for the longest allowed hold so no samples
        // are dropped mid-session.
        let capacity =
            (device_sample_rate as usize) * usize::from(device_channels) * config.max_record_secs;
        debug!(
            capacity,
            max_record_secs = config.max_record_secs,
            "ring buffer allocated"
        );
        let ring_buffer = HeapRb::<f32>::new(capacity);
        let (mut producer, ring_buffer_consumer) = ring_buffer.split();

        let is_recording = Arc::new(AtomicBool::new(false));
        let recording_flag = Arc::clone(&is_recording);

        let stream_config = supported_config.into();
        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if recording_flag.load(Ordering::Relaxed) {
                    let pushed = producer.push_slice(data);
                    if pushed < data.len() {
                        warn!("ring buffer full, dropped {} samples", data.len() - pushed);
                    }
                }
            },
            move |err| {
                warn!("audio stream error: {}", err);
            },
            None,
        )?;

        let stream_control = CpalStreamControl { stream };

        // Start then immediately pause: the device stays warm without
        // listening until the hotkey goes down.
        stream_control.play()?;
        stream_control.pause()?;
        info!("audio stream initialized (paused)");

        Ok(Self {
            stream_control: Some(Box::new(stream_control)),
            ring_buffer_consumer,
            is_recording,
            device_sample_rate,
            device_channels,
            resample_to: config.sample_rate,
        })
    }

    fn downmix_and_resample(&self, samples: &[f32]) -> Vec<f32> {
        let mono = self.downmix(samples);
        if self.device_sample_rate == self.resample_to || mono.is_empty() {
            return mono;
        }
        resample(&mono, self.device_sample_rate, self.resample_to)
    }

    fn downmix(&self, samples: &[f32]) -> Vec<f32> {
        if self.device_channels <= 1 {
            return samples.to_vec();
        }
        let channels = f64::from(self.device_channels);
        samples
            .chunks(usize::from(self.device_channels))
            .map(|frame| {
                let sum: f64 = frame.iter().map(|&s| f64::from(s)).sum();
                // f64 -> f32: samples are stored as f32, precision sufficient
                #[allow(clippy::cast_possible_truncation)]
                {
                    (sum / channels) as f32
                }
            })
            .collect()
    }
}

impl CaptureSource for AudioCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        debug!("starting capture");

        // Discard anything left from an aborted session.
        self.ring_buffer_consumer.clear();

        // Flag goes up before the stream resumes so no frames are missed.
        self.is_recording.store(true, Ordering::Relaxed);

        if let Some(stream_control) = &self.stream_control {
            stream_control.play()?;
        }

        Ok(())
    }

    fn stop(&mut self) -> Result<Vec<f32>, CaptureError> {
        debug!("stopping capture");

        self.is_recording.store(false, Ordering::Relaxed);

        if let Some(stream_control) = &self.stream_control {
            stream_control.pause()?;
        }

        let mut samples = Vec::new();
        while let Some(sample) = self.ring_buffer_consumer.try_pop() {
            samples.push(sample);
        }
        debug!(samples = samples.len(), "ring buffer drained");

        Ok(self.downmix_and_resample(&samples))
    }
}

// Fractional index math needs f64 <-> usize casts.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn resample(mono: &[f32], from: u32, to: u32) -> Vec<f32> {
    let Some(last) = mono.len().checked_sub(1) else {
        return Vec::new();
    };
    let ratio = f64::from(from) / f64::from(to);
    let output_len = ((mono.len() as f64) / ratio).ceil() as usize;
    let mut resampled = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let src = (i as f64) * ratio;
        let lo = (src.floor() as usize).min(last);
        let hi = (lo + 1).min(last);
        let fract = src - src.floor();
        let interpolated = f64::from(mono[lo]).mul_add(1.0 - fract, f64::from(mono[hi]) * fract);
        resampled.push(interpolated as f32);
    }

    debug!(
        from_rate = from,
        to_rate = to,
        input_samples = mono.len(),
        output_samples = resampled.len(),
        "resampled"
    );
    resampled
}

#[cfg(test)]
#[allow(clippy::float_cmp)] // Test assertions with known exact values
mod tests {
    use super::*;

    struct StubStreamControl {
        played: Arc<AtomicBool>,
        paused: Arc<AtomicBool>,
    }

    impl StreamControl for StubStreamControl {
        fn play(&self) -> Result<(), CaptureError> {
            self.played.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn pause(&self) -> Result<(), CaptureError> {
            self.paused.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn capture_for_conversion(sample_rate: u32, channels: u16) -> AudioCapture {
        AudioCapture {
            stream_control: None,
            ring_buffer_consumer: HeapRb::<f32>::new(1024).split().1,
            is_recording: Arc::new(AtomicBool::new(false)),
            device_sample_rate: sample_rate,
            device_channels: channels,
            resample_to: 16_000,
        }
    }

    #[test]
    fn stereo_frames_average_to_mono() {
        let capture = capture_for_conversion(16_000, 2);
        let stereo = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let result = capture.downmix_and_resample(&stereo);

        assert_eq!(result, vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn four_channel_frames_average_to_mono() {
        let capture = capture_for_conversion(16_000, 4);
        let quad = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];

        let result = capture.downmix_and_resample(&quad);

        assert_eq!(result, vec![2.5, 6.5]);
    }

    #[test]
    fn matching_rate_mono_passes_through() {
        let capture = capture_for_conversion(16_000, 1);
        let mono = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        assert_eq!(capture.downmix_and_resample(&mono), mono);
    }

    #[test]
    fn empty_input_stays_empty() {
        let capture = capture_for_conversion(48_000, 2);
        assert!(capture.downmix_and_resample(&[]).is_empty());
    }

    #[test]
    fn downsampling_halves_and_thirds_sample_counts() {
        let capture = capture_for_conversion(48_000, 1);
        let samples = vec![0.0; 48];

        // 3:1 ratio
        assert_eq!(capture.downmix_and_resample(&samples).len(), 16);

        let capture = capture_for_conversion(32_000, 1);
        let samples = vec![0.0; 32];

        // 2:1 ratio
        assert_eq!(capture.downmix_and_resample(&samples).len(), 16);
    }

    #[test]
    fn upsampling_doubles_sample_count() {
        let capture = capture_for_conversion(8_000, 1);
        let samples = vec![1.0, 2.0, 3.0, 4.0];

        assert_eq!(capture.downmix_and_resample(&samples).len(), 8);
    }

    #[test]
    fn interpolation_stays_within_input_bounds() {
        let capture = capture_for_conversion(44_100, 1);
        let samples = vec![-1.0, -0.5, 0.0, 0.5, 1.0];

        for sample in capture.downmix_and_resample(&samples) {
            assert!((-1.0..=1.0).contains(&sample));
        }
    }

    #[test]
    fn start_resumes_and_stop_pauses_the_stream() {
        let played = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));
        let stub = StubStreamControl {
            played: Arc::clone(&played),
            paused: Arc::clone(&paused),
        };

        let mut capture = AudioCapture {
            stream_control: Some(Box::new(stub)),
            ring_buffer_consumer: HeapRb::<f32>::new(1024).split().1,
            is_recording: Arc::new(AtomicBool::new(false)),
            device_sample_rate: 16_000,
            device_channels: 1,
            resample_to: 16_000,
        };

        capture.start().unwrap();
        assert!(played.load(Ordering::Relaxed));
        assert!(capture.is_recording.load(Ordering::Relaxed));

        let samples = capture.stop().unwrap();
        assert!(paused.load(Ordering::Relaxed));
        assert!(!capture.is_recording.load(Ordering::Relaxed));
        assert!(samples.is_empty());
    }

    #[test]
    fn start_drops_samples_left_by_a_previous_session() {
        let ring_buffer = HeapRb::<f32>::new(16);
        let (mut producer, consumer) = ring_buffer.split();
        producer.push_slice(&[0.25, 0.5, 0.75]);

        let mut capture = AudioCapture {
            stream_control: None,
            ring_buffer_consumer: consumer,
            is_recording: Arc::new(AtomicBool::new(false)),
            device_sample_rate: 16_000,
            device_channels: 1,
            resample_to: 16_000,
        };

        capture.start().unwrap();
        let samples = capture.stop().unwrap();

        assert!(samples.is_empty());
    }

    // Hardware-dependent checks, run with: cargo test -- --ignored

    #[test]
    #[ignore = "requires audio hardware"]
    fn device_initializes_with_default_config() {
        let config = AudioConfig {
            sample_rate: 16_000,
            max_record_secs: 30,
        };

        let capture = AudioCapture::new(&config).unwrap();
        assert!(capture.device_sample_rate > 0);
        assert!(capture.device_channels > 0);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn repeated_capture_cycles_run_clean() {
        let config = AudioConfig {
            sample_rate: 16_000,
            max_record_secs: 30,
        };

        let mut capture = AudioCapture::new(&config).unwrap();
        for _ in 0..3 {
            capture.start().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(50));
            let _samples = capture.stop().unwrap();
        }
    }
}
