// Audio output using cpal
// Handles cross-platform audio output with a ring buffer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{HeapRb, traits::{Consumer, Observer, Producer, Split}};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

const RING_BUFFER_SIZE: usize = 48000 * 2 / 4; // ~250ms of stereo audio at 48kHz

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// State shared with the device callback
struct CallbackShared {
    consumer: Mutex<RingConsumer>,
    volume: Mutex<f32>,
    paused: AtomicBool,
    /// Samples handed to the device since the last clear
    played_samples: AtomicU64,
    stream_error: Mutex<Option<String>>,
}

pub struct AudioOutput {
    _stream: Stream,
    producer: Mutex<RingProducer>,
    shared: Arc<CallbackShared>,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Create a new audio output with default device
    ///
    /// The stream starts paused; call `resume` to let samples through.
    pub fn new() -> Result<Self, EngineError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::Output("No output device available".to_string()))?;

        let config = device.default_output_config().map_err(|e| {
            EngineError::Output(format!("Failed to get default output config: {}", e))
        })?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let shared = Arc::new(CallbackShared {
            consumer: Mutex::new(consumer),
            volume: Mutex::new(1.0),
            paused: AtomicBool::new(true),
            played_samples: AtomicU64::new(0),
            stream_error: Mutex::new(None),
        });

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), shared.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), shared.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), shared.clone())?
            }
            format => {
                return Err(EngineError::Output(format!(
                    "Unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream
            .play()
            .map_err(|e| EngineError::Output(format!("Failed to start stream: {}", e)))?;

        tracing::info!(
            "[Output] Opened default device: {}Hz, {} channels",
            sample_rate,
            channels
        );

        Ok(Self {
            _stream: stream,
            producer: Mutex::new(producer),
            shared,
            sample_rate,
            channels,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        shared: Arc<CallbackShared>,
    ) -> Result<Stream, EngineError> {
        let error_slot = shared.clone();
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // Paused: keep buffered samples for resume, emit silence
                    if shared.paused.load(Ordering::Acquire) {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0);
                        }
                        return;
                    }

                    let mut consumer = shared.consumer.lock();
                    let vol = *shared.volume.lock();
                    let mut played = 0u64;

                    for sample in data.iter_mut() {
                        let value = match consumer.try_pop() {
                            Some(v) => {
                                played += 1;
                                v * vol
                            }
                            None => 0.0,
                        };
                        *sample = T::from_sample(value);
                    }

                    shared.played_samples.fetch_add(played, Ordering::AcqRel);
                },
                move |err| {
                    tracing::error!("[Output] Audio output error: {}", err);
                    *error_slot.stream_error.lock() = Some(err.to_string());
                },
                None,
            )
            .map_err(|e| EngineError::Output(format!("Failed to build output stream: {}", e)))?;

        Ok(stream)
    }

    /// Write samples to the output buffer
    /// Returns the number of samples actually written
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut producer = self.producer.lock();
        let mut written = 0;

        for &sample in samples {
            if producer.try_push(sample).is_ok() {
                written += 1;
            } else {
                // Buffer full, caller retries with the remainder
                break;
            }
        }

        written
    }

    /// Samples still waiting to be played
    pub fn buffered(&self) -> usize {
        self.producer.lock().occupied_len()
    }

    /// Drop everything buffered and restart the played-sample count
    pub fn clear(&self) {
        let mut consumer = self.shared.consumer.lock();
        while consumer.try_pop().is_some() {}
        self.shared.played_samples.store(0, Ordering::Release);
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    /// Handle for reading playback progress from other threads
    pub fn meter(&self) -> OutputMeter {
        OutputMeter {
            shared: self.shared.clone(),
            channels: self.channels,
        }
    }

    /// Get the output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of output channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        *self.shared.volume.lock() = vol.clamp(0.0, 1.0);
    }
}

/// Thread-safe view of what the device callback has played
///
/// The stream itself is not `Send`, this is what leaves the engine thread.
#[derive(Clone)]
pub struct OutputMeter {
    shared: Arc<CallbackShared>,
    channels: u16,
}

impl OutputMeter {
    /// Frames the device has consumed since the last clear
    pub fn played_frames(&self) -> u64 {
        self.shared.played_samples.load(Ordering::Acquire) / self.channels.max(1) as u64
    }

    /// Take the last stream error reported by the device, if any
    pub fn take_error(&self) -> Option<String> {
        self.shared.stream_error.lock().take()
    }
}
