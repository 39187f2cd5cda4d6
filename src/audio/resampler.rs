// Sample rate and channel layout conversion
// Decoded packets arrive in the file's format, the device wants its own

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::EngineError;

/// Input frames fed to rubato per process call
const CHUNK_FRAMES: usize = 1024;

/// Streaming resampler that carries partial chunks between packets
pub struct StreamResampler {
    inner: Option<FastFixedIn<f32>>,
    channels: usize,
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    /// Passes samples through untouched when the rates match
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self, EngineError> {
        let channels = channels.max(1);
        let inner = if input_rate == output_rate {
            None
        } else {
            tracing::debug!(
                "[Resampler] Resampling from {}Hz to {}Hz ({} channels)",
                input_rate,
                output_rate,
                channels
            );
            let resampler = FastFixedIn::<f32>::new(
                output_rate as f64 / input_rate as f64,
                1.0,
                PolynomialDegree::Cubic,
                CHUNK_FRAMES,
                channels,
            )
            .map_err(|e| EngineError::Output(format!("Failed to create resampler: {}", e)))?;
            Some(resampler)
        };

        Ok(Self {
            inner,
            channels,
            pending: vec![Vec::new(); channels],
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    /// Feed interleaved samples, get back whatever full chunks produced
    pub fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>, EngineError> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(interleaved.to_vec());
        };

        for frame in interleaved.chunks_exact(self.channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                self.pending[ch].push(sample);
            }
        }

        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|plane| plane.drain(..needed).collect())
                .collect();
            let planar = resampler
                .process(&chunk, None)
                .map_err(|e| EngineError::Output(format!("Resampling failed: {}", e)))?;
            interleave_into(&planar, &mut out);
        }

        Ok(out)
    }

    /// Drain the partial chunk left at end of stream
    pub fn flush(&mut self) -> Result<Vec<f32>, EngineError> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        if self.pending[0].is_empty() {
            return Ok(Vec::new());
        }

        let planar = resampler
            .process_partial(Some(self.pending.as_slice()), None)
            .map_err(|e| EngineError::Output(format!("Resampling failed: {}", e)))?;
        for plane in self.pending.iter_mut() {
            plane.clear();
        }

        let mut out = Vec::new();
        interleave_into(&planar, &mut out);
        Ok(out)
    }

    /// Forget staged input, used after a seek
    pub fn reset(&mut self) {
        for plane in self.pending.iter_mut() {
            plane.clear();
        }
        if let Some(resampler) = self.inner.as_mut() {
            resampler.reset();
        }
    }
}

fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    let Some(first) = planar.first() else {
        return;
    };
    out.reserve(first.len() * planar.len());
    for frame in 0..first.len() {
        for plane in planar {
            out.push(plane[frame]);
        }
    }
}

/// Map interleaved samples from one channel count to another
///
/// Mono is duplicated to every output channel, downmix to mono averages,
/// anything else copies matching channels and repeats the last one.
pub fn remix(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
            continue;
        }
        for ch in 0..to {
            out.push(frame[ch.min(from - 1)]);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_when_rates_match() {
        let mut resampler = StreamResampler::new(48000, 48000, 2).unwrap();
        assert!(resampler.is_passthrough());

        let input = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resampler.process(&input).unwrap(), input);
        assert!(resampler.flush().unwrap().is_empty());
    }

    #[test]
    fn test_resample_length_follows_ratio() {
        let mut resampler = StreamResampler::new(44100, 48000, 1).unwrap();
        let input: Vec<f32> = (0..44100)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * 0.5)
            .collect();

        let mut output = Vec::new();
        for packet in input.chunks(1152) {
            output.extend(resampler.process(packet).unwrap());
        }
        output.extend(resampler.flush().unwrap());

        // One second in, roughly one second out
        let frames = output.len() as i64;
        assert!(
            (frames - 48000).abs() < 2048,
            "Expected ~48000 frames, got {}",
            frames
        );
    }

    #[test]
    fn test_remix_mono_to_stereo() {
        assert_eq!(remix(&[0.1, 0.2], 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_remix_stereo_to_mono() {
        assert_eq!(remix(&[0.2, 0.4, -1.0, 1.0], 2, 1), vec![0.3, 0.0]);
    }

    #[test]
    fn test_remix_stereo_to_quad() {
        assert_eq!(
            remix(&[0.1, 0.2], 2, 4),
            vec![0.1, 0.2, 0.2, 0.2]
        );
    }
}
