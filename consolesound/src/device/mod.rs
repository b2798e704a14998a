//! Boundary between the block scheduler and an output device.
//!
//! A device accepts fixed-size blocks of interleaved 16-bit PCM, reports each
//! block it has finished playing through [`BlockCompletion`], and supports
//! reset, volume and close. [`CpalBackend`] is the hardware implementation;
//! anything else satisfying the same traits can stand in for it.

mod cpal_backend;

pub use cpal_backend::CpalBackend;

use crate::config::AudioConfig;
use crate::error::Result;
use std::sync::Arc;

/// Output layout requested from a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Always 16
    pub bits_per_sample: u16,
    /// Bytes per frame
    pub block_align: u16,
    /// Interleaved samples in one block
    pub samples_per_block: usize,
    /// Blocks that may be queued on the device at once
    pub block_count: usize,
}

impl DeviceFormat {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bits_per_sample: 16,
            block_align: config.channels * 2,
            samples_per_block: config.samples_per_block,
            block_count: config.block_count,
        }
    }
}

/// Receiver of "block consumed" notifications.
///
/// Called once per submitted block, in submission order, from whatever thread
/// the device delivers completions on.
pub trait BlockCompletion: Send + Sync {
    fn on_block_consumed(&self);
}

/// Queue side of an open device, owned by the audio worker.
pub trait BlockSink: Send {
    /// Queue one full block. Must not wait for playback.
    fn submit(&mut self, block: &[i16]);
}

/// Control side of an open device, owned by the engine.
pub trait DeviceControl {
    /// Discard queued blocks. Each discarded block is still reported as consumed.
    fn reset(&mut self);

    /// Linear output gain in `[0.0, 1.0]`
    fn set_volume(&mut self, gain: f32);

    /// Stop the device and release it. Called exactly once.
    fn close(&mut self);
}

/// Both halves of a device opened by an [`OutputBackend`]
pub struct OpenedDevice {
    pub sink: Box<dyn BlockSink>,
    pub control: Box<dyn DeviceControl>,
}

/// Factory for output devices.
pub trait OutputBackend {
    /// Open a device for `format`, delivering completions to `completion`.
    ///
    /// # Errors
    ///
    /// Returns `ConsoleSoundError::DeviceOpen` if no device is available or it
    /// rejects the format. Nothing stays open on failure.
    fn open(&self, format: &DeviceFormat, completion: Arc<dyn BlockCompletion>) -> Result<OpenedDevice>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory device that hands submitted blocks to the test.

    use super::*;
    use crate::error::ConsoleSoundError;
    use crossbeam_channel::{Receiver, Sender};
    use std::sync::Mutex;

    #[derive(Clone)]
    pub(crate) struct ScriptedBackend {
        pub(crate) blocks: Sender<Vec<i16>>,
        pub(crate) completion: Arc<Mutex<Option<Arc<dyn BlockCompletion>>>>,
        pub(crate) calls: Arc<Mutex<Vec<&'static str>>>,
        pub(crate) fail_open: bool,
    }

    impl ScriptedBackend {
        pub(crate) fn new() -> (Self, Receiver<Vec<i16>>) {
            let (tx, rx) = crossbeam_channel::unbounded();
            (
                Self {
                    blocks: tx,
                    completion: Arc::new(Mutex::new(None)),
                    calls: Arc::new(Mutex::new(Vec::new())),
                    fail_open: false,
                },
                rx,
            )
        }

        pub(crate) fn complete(&self) {
            let completion = self.completion.lock().unwrap().clone();
            completion.expect("device not open").on_block_consumed();
        }
    }

    struct Sink(Sender<Vec<i16>>);

    impl BlockSink for Sink {
        fn submit(&mut self, block: &[i16]) {
            let _ = self.0.send(block.to_vec());
        }
    }

    struct Control(Arc<Mutex<Vec<&'static str>>>);

    impl DeviceControl for Control {
        fn reset(&mut self) {
            self.0.lock().unwrap().push("reset");
        }

        fn set_volume(&mut self, _gain: f32) {
            self.0.lock().unwrap().push("volume");
        }

        fn close(&mut self) {
            self.0.lock().unwrap().push("close");
        }
    }

    impl OutputBackend for ScriptedBackend {
        fn open(&self, _format: &DeviceFormat, completion: Arc<dyn BlockCompletion>) -> Result<OpenedDevice> {
            if self.fail_open {
                return Err(ConsoleSoundError::DeviceOpen("scripted failure".into()));
            }
            *self.completion.lock().unwrap() = Some(completion);
            Ok(OpenedDevice {
                sink: Box::new(Sink(self.blocks.clone())),
                control: Box::new(Control(self.calls.clone())),
            })
        }
    }
}
