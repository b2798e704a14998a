//! Decoded clip data and the loaders that produce it.

mod default_loader;
mod loader;
pub(crate) mod wav;

pub use default_loader::WavFileLoader;
pub use loader::ClipLoader;
pub use wav::{SUPPORTED_BITS_PER_SAMPLE, SUPPORTED_SAMPLE_RATE, decode_wav};

use std::sync::Arc;
use std::time::Duration;

/// Sample layout of a decoded clip, as read from its `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipFormat {
    /// Number of interleaved channels
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per stored sample
    pub bits_per_sample: u16,
    /// Bytes per frame (`channels * bits_per_sample / 8`)
    pub block_align: u16,
}

/// Immutable decoded audio, shared cheaply between the store and the mixer.
///
/// # Data Format
/// Samples are normalised to `[-1.0, 1.0]` and stored **interleaved**:
/// - Mono: `[M0, M1, M2, ...]`
/// - Stereo: `[L0, R0, L1, R1, ...]`
///
/// A value of this type only exists once decoding succeeded, so there is no
/// separate validity flag to check.
#[derive(Debug, Clone)]
pub struct AudioClip {
    inner: Arc<ClipInner>,
}

#[derive(Debug)]
struct ClipInner {
    format: ClipFormat,
    samples: Vec<f32>,
    total_frames: usize,
}

impl AudioClip {
    pub(crate) fn new(format: ClipFormat, samples: Vec<f32>) -> Self {
        let total_frames = samples.len() / format.channels.max(1) as usize;
        Self {
            inner: Arc::new(ClipInner {
                format,
                samples,
                total_frames,
            }),
        }
    }

    /// Build a clip directly from normalised interleaved samples.
    ///
    /// Intended for procedurally generated sounds; a trailing partial frame is dropped.
    pub fn from_samples(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        samples.truncate(samples.len() - samples.len() % channels as usize);
        Self::new(
            ClipFormat {
                channels,
                sample_rate,
                bits_per_sample: SUPPORTED_BITS_PER_SAMPLE,
                block_align: channels * (SUPPORTED_BITS_PER_SAMPLE / 8),
            },
            samples,
        )
    }

    pub fn format(&self) -> ClipFormat {
        self.inner.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.format.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    /// Number of frames; this is the clip length a playback cursor runs against.
    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.total_frames == 0
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.inner.total_frames as f64 / self.sample_rate().max(1) as f64)
    }

    /// Sample at `frame` for output channel `channel`.
    ///
    /// Output channels beyond the clip's own channel count wrap around, so a mono
    /// clip feeds every output channel.
    #[inline]
    pub fn frame_sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.inner.format.channels as usize;
        self.inner.samples[frame * channels + channel % channels]
    }
}
