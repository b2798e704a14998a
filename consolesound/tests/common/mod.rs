#![allow(dead_code)]

use consolesound::{
    BlockCompletion, BlockSink, ConsoleSoundError, DeviceControl, DeviceFormat, OpenedDevice,
    OutputBackend,
};
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SharedCompletion = Arc<Mutex<Option<Arc<dyn BlockCompletion>>>>;

/// Output backend that forwards every submitted block to the test
pub struct TestDevice {
    blocks: Sender<Vec<i16>>,
    completion: SharedCompletion,
    calls: Arc<Mutex<Vec<String>>>,
    formats: Arc<Mutex<Vec<DeviceFormat>>>,
}

/// Test-side view of a [`TestDevice`]
pub struct DeviceProbe {
    pub blocks: Receiver<Vec<i16>>,
    completion: SharedCompletion,
    calls: Arc<Mutex<Vec<String>>>,
    formats: Arc<Mutex<Vec<DeviceFormat>>>,
}

pub fn test_device() -> (TestDevice, DeviceProbe) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let completion: SharedCompletion = Arc::new(Mutex::new(None));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let formats = Arc::new(Mutex::new(Vec::new()));
    (
        TestDevice {
            blocks: tx,
            completion: completion.clone(),
            calls: calls.clone(),
            formats: formats.clone(),
        },
        DeviceProbe {
            blocks: rx,
            completion,
            calls,
            formats,
        },
    )
}

impl DeviceProbe {
    /// Report the oldest queued block as played
    pub fn complete(&self) {
        let completion = self.completion.lock().unwrap().clone();
        completion.expect("device was never opened").on_block_consumed();
    }

    pub fn next_block(&self) -> Vec<i16> {
        self.blocks
            .recv_timeout(Duration::from_secs(5))
            .expect("worker did not submit a block in time")
    }

    /// Assert the worker submits nothing more without a completion
    pub fn assert_no_block(&self) {
        assert!(
            self.blocks.recv_timeout(Duration::from_millis(50)).is_err(),
            "worker submitted a block with no free slot"
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn formats(&self) -> Vec<DeviceFormat> {
        self.formats.lock().unwrap().clone()
    }
}

struct Sink(Sender<Vec<i16>>);

impl BlockSink for Sink {
    fn submit(&mut self, block: &[i16]) {
        let _ = self.0.send(block.to_vec());
    }
}

struct Control(Arc<Mutex<Vec<String>>>);

impl DeviceControl for Control {
    fn reset(&mut self) {
        self.0.lock().unwrap().push("reset".into());
    }

    fn set_volume(&mut self, gain: f32) {
        self.0.lock().unwrap().push(format!("volume {}", gain));
    }

    fn close(&mut self) {
        self.0.lock().unwrap().push("close".into());
    }
}

impl OutputBackend for TestDevice {
    fn open(
        &self,
        format: &DeviceFormat,
        completion: Arc<dyn BlockCompletion>,
    ) -> Result<OpenedDevice, ConsoleSoundError> {
        self.formats.lock().unwrap().push(*format);
        *self.completion.lock().unwrap() = Some(completion);
        self.calls.lock().unwrap().push("open".into());
        Ok(OpenedDevice {
            sink: Box::new(Sink(self.blocks.clone())),
            control: Box::new(Control(self.calls.clone())),
        })
    }
}

/// 16-bit 44100 Hz PCM WAVE stream
pub fn wav_bytes(channels: u16, samples: &[i16]) -> Vec<u8> {
    let block_align = channels * 2;
    let data_len = (samples.len() * 2) as u32;

    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(4 + 8 + 16 + 8 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&44100u32.to_le_bytes());
    out.extend_from_slice(&(44100 * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Sample value the pipeline produces for a decoded 16-bit input sample
pub fn round_trip(sample: i16) -> i16 {
    consolesound::scheduler::quantise((sample as f32 / i16::MAX as f32).max(-1.0))
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
