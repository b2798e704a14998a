//! Configuration for the streaming output

use crate::error::{ConsoleSoundError, Result};
use std::time::Duration;

/// Parameters passed to [`ConsoleSoundEngine::start_audio`](crate::ConsoleSoundEngine::start_audio).
///
/// `samples_per_block` counts interleaved samples, so a stereo block of 512
/// samples holds 256 frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved output channels
    pub channels: u16,
    /// Number of blocks in the ring shared with the device
    pub block_count: usize,
    /// Interleaved samples per block
    pub samples_per_block: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            block_count: 8,
            samples_per_block: 512,
        }
    }
}

impl AudioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn block_count(mut self, count: usize) -> Self {
        self.block_count = count;
        self
    }

    pub fn samples_per_block(mut self, samples: usize) -> Self {
        self.samples_per_block = samples;
        self
    }

    /// Check that the configuration describes a usable ring.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConsoleSoundError::Configuration(
                "sample rate must be greater than zero".into(),
            ));
        }
        if self.channels == 0 {
            return Err(ConsoleSoundError::Configuration(
                "channel count must be greater than zero".into(),
            ));
        }
        if self.block_count == 0 {
            return Err(ConsoleSoundError::Configuration(
                "block count must be greater than zero".into(),
            ));
        }
        if self.samples_per_block == 0 {
            return Err(ConsoleSoundError::Configuration(
                "samples per block must be greater than zero".into(),
            ));
        }
        if self.samples_per_block % self.channels as usize != 0 {
            return Err(ConsoleSoundError::Configuration(format!(
                "samples per block ({}) must be a multiple of the channel count ({})",
                self.samples_per_block, self.channels
            )));
        }
        Ok(())
    }

    /// Whole frames (one sample per channel) held by a block
    pub fn frames_per_block(&self) -> usize {
        self.samples_per_block / self.channels as usize
    }

    /// Duration of one frame in seconds
    pub fn tick_duration(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    /// Playback time covered by one block
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames_per_block() as f64 / self.sample_rate as f64)
    }
}
