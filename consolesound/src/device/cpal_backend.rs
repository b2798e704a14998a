use super::{BlockCompletion, BlockSink, DeviceControl, DeviceFormat, OpenedDevice, OutputBackend};
use crate::error::{ConsoleSoundError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Output through the default cpal host and device.
///
/// Blocks are pushed into a lock-free ring sized to hold the whole block ring.
/// The stream callback drains it, converts to the device's native sample
/// format, and reports one completion each time a block's worth of samples has
/// been played or discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

/// State shared between the control handle and the stream callback
struct SharedControl {
    gain_bits: AtomicU32,
    discard: AtomicBool,
}

/// Counts played samples and turns them into block completions
struct CompletionCounter {
    samples_per_block: usize,
    consumed: usize,
    completion: Arc<dyn BlockCompletion>,
}

impl CompletionCounter {
    fn add(&mut self, samples: usize) {
        self.consumed += samples;
        while self.consumed >= self.samples_per_block {
            self.consumed -= self.samples_per_block;
            self.completion.on_block_consumed();
        }
    }
}

impl OutputBackend for CpalBackend {
    fn open(&self, format: &DeviceFormat, completion: Arc<dyn BlockCompletion>) -> Result<OpenedDevice> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ConsoleSoundError::DeviceOpen("No default output device available".into()))?;

        let default_config = device.default_output_config().map_err(|e| {
            ConsoleSoundError::DeviceOpen(format!("Failed to get default config: {}", e))
        })?;

        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = format.block_count * format.samples_per_block;
        let ring = HeapRb::<i16>::new(capacity);
        let (producer, consumer) = ring.split();

        let shared = Arc::new(SharedControl {
            gain_bits: AtomicU32::new(1.0f32.to_bits()),
            discard: AtomicBool::new(false),
        });
        let feed = StreamFeed {
            consumer,
            scratch: vec![0; capacity],
            counter: CompletionCounter {
                samples_per_block: format.samples_per_block,
                consumed: 0,
                completion,
            },
            shared: shared.clone(),
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, feed)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, feed)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, feed)?
            }
            other => {
                return Err(ConsoleSoundError::DeviceOpen(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| ConsoleSoundError::DeviceOpen(format!("Failed to start stream: {}", e)))?;

        log::info!(
            "Opened output device {:?}: {} Hz, {} channel(s), {} x {} samples",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            format.sample_rate,
            format.channels,
            format.block_count,
            format.samples_per_block
        );

        Ok(OpenedDevice {
            sink: Box::new(CpalSink { producer }),
            control: Box::new(CpalControl {
                stream: Some(stream),
                shared,
            }),
        })
    }
}

/// Callback side of the stream: drains the ring into the device buffer
struct StreamFeed {
    consumer: HeapCons<i16>,
    /// Sized once to the ring capacity; never grown on the audio thread
    scratch: Vec<i16>,
    counter: CompletionCounter,
    shared: Arc<SharedControl>,
}

impl StreamFeed {
    fn fill<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        if self.shared.discard.swap(false, Ordering::AcqRel) {
            let dropped = self.consumer.clear();
            self.counter.add(dropped);
        }

        let gain = f32::from_bits(self.shared.gain_bits.load(Ordering::Relaxed));
        let mut written = 0;
        while written < data.len() && !self.scratch.is_empty() {
            let want = (data.len() - written).min(self.scratch.len());
            let popped = self.consumer.pop_slice(&mut self.scratch[..want]);
            if popped == 0 {
                break;
            }

            for (out, &sample) in data[written..].iter_mut().zip(&self.scratch[..popped]) {
                *out = T::from_sample(sample as f32 / i16::MAX as f32 * gain);
            }
            written += popped;
            self.counter.add(popped);
        }

        for out in &mut data[written..] {
            *out = T::from_sample(0.0f32);
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut feed: StreamFeed,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| feed.fill(data),
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| ConsoleSoundError::DeviceOpen(format!("Failed to build stream: {}", e)))
}

struct CpalSink {
    producer: HeapProd<i16>,
}

impl BlockSink for CpalSink {
    fn submit(&mut self, block: &[i16]) {
        let pushed = self.producer.push_slice(block);
        if pushed < block.len() {
            log::error!(
                "Output ring overrun: queued {} of {} samples",
                pushed,
                block.len()
            );
        }
    }
}

struct CpalControl {
    stream: Option<cpal::Stream>,
    shared: Arc<SharedControl>,
}

impl DeviceControl for CpalControl {
    fn reset(&mut self) {
        self.shared.discard.store(true, Ordering::Release);
    }

    fn set_volume(&mut self, gain: f32) {
        self.shared
            .gain_bits
            .store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause stream before closing: {}", e);
            }
            drop(stream);
            log::info!("Closed output device");
        }
    }
}

impl Drop for CpalControl {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Count(AtomicUsize);

    impl BlockCompletion for Count {
        fn on_block_consumed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_completion_counter_reports_whole_blocks() {
        let count = Arc::new(Count::default());
        let mut counter = CompletionCounter {
            samples_per_block: 4,
            consumed: 0,
            completion: count.clone(),
        };

        counter.add(3);
        assert_eq!(count.0.load(Ordering::SeqCst), 0);
        counter.add(6);
        assert_eq!(count.0.load(Ordering::SeqCst), 2);
        assert_eq!(counter.consumed, 1);
    }

    fn feed(capacity: usize, scratch: usize, samples_per_block: usize) -> (StreamFeed, HeapProd<i16>, Arc<Count>) {
        let (producer, consumer) = HeapRb::<i16>::new(capacity).split();
        let count = Arc::new(Count::default());
        let feed = StreamFeed {
            consumer,
            scratch: vec![0; scratch],
            counter: CompletionCounter {
                samples_per_block,
                consumed: 0,
                completion: count.clone(),
            },
            shared: Arc::new(SharedControl {
                gain_bits: AtomicU32::new(1.0f32.to_bits()),
                discard: AtomicBool::new(false),
            }),
        };
        (feed, producer, count)
    }

    #[test]
    fn test_feed_drains_in_chunks_larger_than_scratch() {
        let (mut feed, mut producer, count) = feed(16, 3, 4);
        let samples: Vec<i16> = (1..=8).map(|s| s * 1000).collect();
        assert_eq!(producer.push_slice(&samples), 8);

        let mut data = [1.0f32; 10];
        feed.fill(&mut data);

        for (out, &sample) in data.iter().zip(&samples) {
            assert_eq!(*out, sample as f32 / i16::MAX as f32);
        }
        assert_eq!(&data[8..], &[0.0, 0.0]);
        assert_eq!(feed.scratch.len(), 3);
        assert_eq!(count.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_feed_applies_gain_and_discard() {
        let (mut feed, mut producer, count) = feed(8, 8, 2);
        producer.push_slice(&[i16::MAX, i16::MAX]);
        feed.shared.gain_bits.store(0.25f32.to_bits(), Ordering::Relaxed);

        let mut data = [0.0f32; 2];
        feed.fill(&mut data);
        assert_eq!(data, [0.25, 0.25]);

        producer.push_slice(&[100, 100, 100, 100]);
        feed.shared.discard.store(true, Ordering::Release);
        feed.fill(&mut data);
        assert_eq!(data, [0.0, 0.0]);
        assert_eq!(count.0.load(Ordering::SeqCst), 3);
    }
}
