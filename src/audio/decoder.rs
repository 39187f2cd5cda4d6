// Audio decoder using Symphonia
// Decodes audio files to raw PCM samples

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia::core::units::Time;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, LoadError};

const DEFAULT_SAMPLE_RATE: u32 = 44100;

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration: Option<Duration>,
}

impl AudioDecoder {
    /// Open an audio file and prepare for decoding
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint using the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| LoadError::Format(e.to_string()))?;

        let format = probed.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let sample_rate = usable_rate(track.codec_params.sample_rate);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let duration = track
            .codec_params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Format(format!("Failed to create decoder: {}", e)))?;

        tracing::debug!(
            "[Decoder] Opened {:?}: {}Hz, {} channels, duration {:?}",
            path,
            sample_rate,
            channels,
            duration
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration,
        })
    }

    /// Get the sample rate of the audio
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of channels
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total duration, if the container reports a frame count
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Decode next packet, returns interleaved f32 samples
    /// Returns None when end of stream is reached
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>, EngineError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(EngineError::Output(format!("Failed to read packet: {}", e))),
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    return Ok(Some(interleaved_f32(&decoded)));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!("[Decoder] Decode error (skipping): {}", e);
                    continue;
                }
                Err(e) => return Err(EngineError::Output(format!("Decode failed: {}", e))),
            }
        }
    }

    /// Seek to an absolute position, returns where the reader actually landed
    pub fn seek(&mut self, position: Duration) -> Result<Duration, EngineError> {
        let time = Time::new(
            position.as_secs(),
            position.subsec_nanos() as f64 / 1_000_000_000.0,
        );

        let seeked_to = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| EngineError::Seek(e.to_string()))?;

        // Reset decoder state after seek
        self.decoder.reset();

        Ok(Duration::from_secs_f64(
            seeked_to.actual_ts as f64 / self.sample_rate as f64,
        ))
    }
}

/// Containers may omit the rate or report zero
fn usable_rate(rate: Option<u32>) -> u32 {
    rate.filter(|rate| *rate > 0).unwrap_or(DEFAULT_SAMPLE_RATE)
}

/// Interleave any decoded buffer as f32 in `[-1.0, 1.0]`
fn interleaved_f32(buf: &AudioBufferRef) -> Vec<f32> {
    match buf {
        AudioBufferRef::U8(b) => interleave(&**b),
        AudioBufferRef::U16(b) => interleave(&**b),
        AudioBufferRef::U24(b) => interleave(&**b),
        AudioBufferRef::U32(b) => interleave(&**b),
        AudioBufferRef::S8(b) => interleave(&**b),
        AudioBufferRef::S16(b) => interleave(&**b),
        AudioBufferRef::S24(b) => interleave(&**b),
        AudioBufferRef::S32(b) => interleave(&**b),
        AudioBufferRef::F32(b) => interleave(&**b),
        AudioBufferRef::F64(b) => interleave(&**b),
    }
}

fn interleave<S: Sample>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();

    let mut out = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for ch in 0..channels {
            out.push(f32::from_sample(buf.chan(ch)[frame]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::audio::{Channels, SignalSpec};

    #[test]
    fn test_open_missing_file() {
        let result = AudioDecoder::open(Path::new("/definitely/not/here.flac"));
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_open_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"this is not audio").unwrap();

        let result = AudioDecoder::open(&path);
        assert!(matches!(result, Err(LoadError::Format(_))));
    }

    #[test]
    fn test_zero_rate_falls_back() {
        assert_eq!(usable_rate(Some(0)), 44100);
        assert_eq!(usable_rate(None), 44100);
        assert_eq!(usable_rate(Some(48000)), 48000);
    }

    #[test]
    fn test_interleave_stereo_i16() {
        let spec = SignalSpec::new(44100, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut buf = AudioBuffer::<i16>::new(4, spec);
        buf.render_reserved(Some(2));
        buf.chan_mut(0).copy_from_slice(&[16384, -32768]);
        buf.chan_mut(1).copy_from_slice(&[0, 8192]);

        let samples = interleave(&buf);
        assert_eq!(samples, vec![0.5, 0.0, -1.0, 0.25]);
    }
}
