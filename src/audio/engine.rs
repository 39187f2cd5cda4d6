// Symphonia + cpal engine
// Decoding runs on a dedicated thread that owns the output stream

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::adapter::EngineAdapter;
use super::decoder::AudioDecoder;
use super::output::{AudioOutput, OutputMeter};
use super::resampler::{remix, StreamResampler};
use crate::error::{EngineError, LoadError};

/// How long the worker naps when the ring buffer is full or draining
const BACKOFF: Duration = Duration::from_millis(5);

enum EngineCommand {
    Prepare {
        path: PathBuf,
        reply: Sender<Result<Duration, LoadError>>,
    },
    Start,
    Stop,
    Seek {
        position: Duration,
        reply: Sender<Result<(), EngineError>>,
    },
    SetGain(f32),
    Shutdown,
}

/// Progress the worker publishes for the controller side
#[derive(Default)]
struct EngineShared {
    meter: Mutex<Option<OutputMeter>>,
    output_rate: AtomicU32,
    base_micros: AtomicU64,
    duration_micros: AtomicU64,
    prepared: AtomicBool,
    finished: AtomicBool,
    fault: Mutex<Option<String>>,
}

impl EngineShared {
    fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_micros.load(Ordering::Acquire))
    }

    fn set_base(&self, position: Duration) {
        self.base_micros
            .store(position.as_micros() as u64, Ordering::Release);
    }
}

/// Production engine: decodes with symphonia, plays through the default cpal device
pub struct SymphoniaEngine {
    commands: Sender<EngineCommand>,
    shared: Arc<EngineShared>,
    thread: Option<JoinHandle<()>>,
}

impl SymphoniaEngine {
    pub fn new() -> Result<Self, EngineError> {
        let (commands, rx) = mpsc::channel();
        let shared = Arc::new(EngineShared::default());
        let worker_shared = shared.clone();

        let thread = std::thread::Builder::new()
            .name("soloplay-engine".to_string())
            .spawn(move || EngineWorker::new(worker_shared).run(rx))
            .map_err(|e| EngineError::Output(format!("Failed to spawn engine thread: {}", e)))?;

        Ok(Self {
            commands,
            shared,
            thread: Some(thread),
        })
    }

    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::Disconnected)
    }

    fn ensure_prepared(&self) -> Result<(), EngineError> {
        if self.shared.prepared.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(EngineError::NotPrepared)
        }
    }
}

impl EngineAdapter for SymphoniaEngine {
    fn prepare(&mut self, resource: &str) -> Result<Duration, LoadError> {
        let path = resolve_locator(resource)?;
        let (reply, response) = mpsc::channel();

        self.commands
            .send(EngineCommand::Prepare { path, reply })
            .map_err(|_| LoadError::Output("Audio engine is not running".to_string()))?;

        response
            .recv()
            .map_err(|_| LoadError::Output("Audio engine is not running".to_string()))?
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.ensure_prepared()?;
        if let Some(fault) = self.shared.fault.lock().take() {
            return Err(EngineError::Output(fault));
        }
        self.send(EngineCommand::Start)
    }

    fn stop(&mut self) {
        if self.send(EngineCommand::Stop).is_err() {
            tracing::warn!("[Engine] Stop ignored, engine thread is gone");
        }
    }

    fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        self.ensure_prepared()?;
        let (reply, response) = mpsc::channel();
        self.send(EngineCommand::Seek { position, reply })?;
        response.recv().map_err(|_| EngineError::Disconnected)?
    }

    fn set_gain(&mut self, gain: f32) {
        if self
            .send(EngineCommand::SetGain(gain.clamp(0.0, 1.0)))
            .is_err()
        {
            tracing::warn!("[Engine] Gain change ignored, engine thread is gone");
        }
    }

    fn current_position(&self) -> Result<Duration, EngineError> {
        self.ensure_prepared()?;

        if let Some(fault) = self.shared.fault.lock().take() {
            return Err(EngineError::Output(fault));
        }

        let duration = self.shared.duration();
        if self.shared.finished.load(Ordering::Acquire) {
            return Ok(duration);
        }

        let meter = self.shared.meter.lock();
        let Some(meter) = meter.as_ref() else {
            return Err(EngineError::NotPrepared);
        };
        if let Some(err) = meter.take_error() {
            return Err(EngineError::Output(err));
        }

        let rate = self.shared.output_rate.load(Ordering::Acquire).max(1);
        let played = Duration::from_secs_f64(meter.played_frames() as f64 / rate as f64);
        let base = Duration::from_micros(self.shared.base_micros.load(Ordering::Acquire));

        Ok((base + played).min(duration))
    }
}

impl Drop for SymphoniaEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(EngineCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("[Engine] Engine thread panicked");
            }
        }
    }
}

/// Turn a sound locator into a local path
///
/// Plain paths and `file://` URLs are accepted; every other scheme is rejected.
pub fn resolve_locator(resource: &str) -> Result<PathBuf, LoadError> {
    let trimmed = resource.trim();
    if trimmed.is_empty() {
        return Err(LoadError::UnsupportedLocator(resource.to_string()));
    }

    if let Some(path) = trimmed.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }

    if trimmed.contains("://") {
        return Err(LoadError::UnsupportedLocator(trimmed.to_string()));
    }

    Ok(PathBuf::from(trimmed))
}

/// The prepared resource on the worker side
struct Track {
    decoder: AudioDecoder,
    resampler: StreamResampler,
    source_channels: usize,
    /// Converted samples not yet accepted by the ring buffer
    carry: Vec<f32>,
    eof: bool,
}

struct EngineWorker {
    shared: Arc<EngineShared>,
    output: Option<AudioOutput>,
    track: Option<Track>,
    playing: bool,
    gain: f32,
}

impl EngineWorker {
    fn new(shared: Arc<EngineShared>) -> Self {
        Self {
            shared,
            output: None,
            track: None,
            playing: false,
            gain: 1.0,
        }
    }

    fn run(mut self, rx: Receiver<EngineCommand>) {
        tracing::debug!("[Engine] Worker started");
        loop {
            let command = if self.wants_data() {
                match rx.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match rx.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            match command {
                Some(EngineCommand::Shutdown) => break,
                Some(command) => self.handle(command),
                None => self.pump(),
            }
        }
        if let Some(output) = self.output.as_ref() {
            output.pause();
        }
        tracing::debug!("[Engine] Worker stopped");
    }

    fn wants_data(&self) -> bool {
        self.playing && self.track.is_some() && !self.shared.finished.load(Ordering::Acquire)
    }

    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Prepare { path, reply } => {
                let result = self.prepare(path);
                let _ = reply.send(result);
            }
            EngineCommand::Start => {
                if let (Some(output), Some(_)) = (self.output.as_ref(), self.track.as_ref()) {
                    self.playing = true;
                    output.resume();
                }
            }
            EngineCommand::Stop => {
                self.playing = false;
                if let Some(output) = self.output.as_ref() {
                    output.pause();
                }
            }
            EngineCommand::Seek { position, reply } => {
                let _ = reply.send(self.seek(position));
            }
            EngineCommand::SetGain(gain) => {
                self.gain = gain;
                if let Some(output) = self.output.as_ref() {
                    output.set_volume(gain);
                }
            }
            EngineCommand::Shutdown => {}
        }
    }

    fn prepare(&mut self, path: PathBuf) -> Result<Duration, LoadError> {
        self.playing = false;
        self.track = None;
        self.shared.prepared.store(false, Ordering::Release);
        self.shared.finished.store(false, Ordering::Release);
        self.shared.fault.lock().take();

        let decoder = AudioDecoder::open(&path)?;
        let duration = decoder.duration().ok_or(LoadError::UnknownDuration)?;

        if self.output.is_none() {
            let output = AudioOutput::new().map_err(|e| LoadError::Output(e.to_string()))?;
            output.set_volume(self.gain);
            *self.shared.meter.lock() = Some(output.meter());
            self.shared
                .output_rate
                .store(output.sample_rate(), Ordering::Release);
            self.output = Some(output);
        }
        let Some(output) = self.output.as_ref() else {
            return Err(LoadError::Output("Audio output unavailable".to_string()));
        };
        output.pause();
        output.clear();

        let resampler = StreamResampler::new(
            decoder.sample_rate(),
            output.sample_rate(),
            output.channels() as usize,
        )
        .map_err(|e| LoadError::Output(e.to_string()))?;

        self.shared
            .duration_micros
            .store(duration.as_micros() as u64, Ordering::Release);
        self.shared.set_base(Duration::ZERO);
        self.shared.prepared.store(true, Ordering::Release);

        tracing::info!("[Engine] Prepared {:?} ({:?})", path, duration);

        self.track = Some(Track {
            source_channels: decoder.channels(),
            decoder,
            resampler,
            carry: Vec::new(),
            eof: false,
        });

        Ok(duration)
    }

    fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        let (Some(output), Some(track)) = (self.output.as_ref(), self.track.as_mut()) else {
            return Err(EngineError::NotPrepared);
        };

        let landed = track.decoder.seek(position)?;

        output.clear();
        track.resampler.reset();
        track.carry.clear();
        track.eof = false;
        self.shared.finished.store(false, Ordering::Release);
        self.shared.set_base(landed.min(self.shared.duration()));

        tracing::debug!("[Engine] Seek to {:?} landed at {:?}", position, landed);
        Ok(())
    }

    /// Move decoded audio into the ring buffer
    fn pump(&mut self) {
        if let Err(reason) = self.pump_track() {
            self.fail(reason);
        }
    }

    fn pump_track(&mut self) -> Result<(), String> {
        let (Some(output), Some(track)) = (self.output.as_ref(), self.track.as_mut()) else {
            return Ok(());
        };

        if !track.carry.is_empty() {
            let written = output.write(&track.carry);
            track.carry.drain(..written);
            if !track.carry.is_empty() {
                std::thread::sleep(BACKOFF);
            }
            return Ok(());
        }

        if track.eof {
            if output.buffered() == 0 {
                tracing::debug!("[Engine] Output drained, end of track");
                self.shared.finished.store(true, Ordering::Release);
            } else {
                std::thread::sleep(BACKOFF);
            }
            return Ok(());
        }

        match track.decoder.decode_next().map_err(|e| e.to_string())? {
            Some(samples) => {
                let mixed = remix(&samples, track.source_channels, output.channels() as usize);
                track.carry = track.resampler.process(&mixed).map_err(|e| e.to_string())?;
            }
            None => {
                match track.resampler.flush() {
                    Ok(tail) => track.carry = tail,
                    Err(e) => tracing::warn!("[Engine] Dropping resampler tail: {}", e),
                }
                track.eof = true;
            }
        }
        Ok(())
    }

    fn fail(&mut self, reason: String) {
        tracing::error!("[Engine] Playback fault: {}", reason);
        self.playing = false;
        if let Some(output) = self.output.as_ref() {
            output.pause();
        }
        *self.shared.fault.lock() = Some(reason);
    }
}
