//! Block scheduler: a fixed ring of output blocks shared with the device.
//!
//! # Block states
//!
//! Every block cycles `Free -> Submitted -> Free`. The worker thread claims the
//! next block in ring order once the free-block counter is above zero, fills it
//! through the [`Mixer`], marks it submitted, then hands it to the device. The
//! device reports each played block through [`BlockCompletion`], which frees
//! the oldest submitted block and wakes the worker.
//!
//! The counter, the per-block states and the running flag live under one mutex,
//! and the worker's wait re-checks its predicate under that mutex, so a
//! completion can never be lost between the check and the wait.

use crate::config::AudioConfig;
use crate::device::{BlockCompletion, BlockSink, DeviceControl, DeviceFormat, OpenedDevice, OutputBackend};
use crate::error::{ConsoleSoundError, Result, lock_or_recover};
use crate::mixer::Mixer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Symmetric clip: `min(x, max)` for non-negative `x`, `max(x, -max)` otherwise.
#[inline]
pub fn clip(sample: f32, max: f32) -> f32 {
    if sample >= 0.0 {
        sample.min(max)
    } else {
        sample.max(-max)
    }
}

/// Clamp to `[-1.0, 1.0]` and scale to a 16-bit sample.
#[inline]
pub fn quantise(sample: f32) -> i16 {
    (clip(sample, 1.0) * i16::MAX as f32) as i16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Free,
    Submitted,
}

#[derive(Debug)]
struct RingState {
    free: usize,
    blocks: Vec<BlockState>,
    /// Next block expected back from the device
    oldest_submitted: usize,
    running: bool,
}

/// Outcome of waiting for a free block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// The block is now owned by the producer; `waited` is true if the
    /// producer had to suspend first.
    Ready { waited: bool },
    Stopped,
}

/// Free-block counter and block ownership for one running stream.
#[derive(Debug)]
pub struct BlockRing {
    state: Mutex<RingState>,
    block_freed: Condvar,
}

impl BlockRing {
    pub fn new(block_count: usize) -> Self {
        assert!(block_count > 0, "block ring needs at least one block");
        Self {
            state: Mutex::new(RingState {
                free: block_count,
                blocks: vec![BlockState::Free; block_count],
                oldest_submitted: 0,
                running: true,
            }),
            block_freed: Condvar::new(),
        }
    }

    pub fn block_count(&self) -> usize {
        lock_or_recover(&self.state, "Block ring").blocks.len()
    }

    /// Current value of the free-block counter
    pub fn free_blocks(&self) -> usize {
        lock_or_recover(&self.state, "Block ring").free
    }

    pub fn is_running(&self) -> bool {
        lock_or_recover(&self.state, "Block ring").running
    }

    /// Block until a block is free, then take ownership of block `index`.
    pub(crate) fn claim(&self, index: usize) -> Claim {
        let mut state = lock_or_recover(&self.state, "Block ring");
        let mut waited = false;

        while state.free == 0 && state.running {
            waited = true;
            state = self.block_freed.wait(state).unwrap_or_else(|e| {
                log::warn!("Block ring mutex poisoned while waiting; continuing");
                e.into_inner()
            });
        }

        if !state.running {
            return Claim::Stopped;
        }

        assert_eq!(
            state.blocks[index],
            BlockState::Free,
            "claimed block {} while the device still owns it",
            index
        );
        state.free -= 1;
        Claim::Ready { waited }
    }

    /// Hand block `index` to the device. Must precede the actual submission,
    /// since the device may report it consumed before `submit` returns.
    pub(crate) fn mark_submitted(&self, index: usize) {
        let mut state = lock_or_recover(&self.state, "Block ring");
        assert_eq!(
            state.blocks[index],
            BlockState::Free,
            "block {} submitted twice",
            index
        );
        state.blocks[index] = BlockState::Submitted;
    }

    /// Wake the worker and make every future [`claim`](Self::claim) return `Stopped`.
    pub fn shutdown(&self) {
        let mut state = lock_or_recover(&self.state, "Block ring");
        state.running = false;
        self.block_freed.notify_all();
    }
}

impl BlockCompletion for BlockRing {
    fn on_block_consumed(&self) {
        let mut state = lock_or_recover(&self.state, "Block ring");
        let index = state.oldest_submitted;
        assert_eq!(
            state.blocks[index],
            BlockState::Submitted,
            "completion for block {} which was never submitted",
            index
        );
        state.blocks[index] = BlockState::Free;
        state.oldest_submitted = (index + 1) % state.blocks.len();
        state.free += 1;
        assert!(
            state.free <= state.blocks.len(),
            "free-block counter exceeded block count"
        );
        self.block_freed.notify_one();
    }
}

/// Snapshot of worker counters since the last start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub blocks_submitted: u64,
    pub frames_mixed: u64,
    /// Times the worker found no free block and had to suspend
    pub producer_waits: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    blocks_submitted: AtomicU64,
    frames_mixed: AtomicU64,
    producer_waits: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            blocks_submitted: self.blocks_submitted.load(Ordering::Relaxed),
            frames_mixed: self.frames_mixed.load(Ordering::Relaxed),
            producer_waits: self.producer_waits.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.blocks_submitted.store(0, Ordering::Relaxed);
        self.frames_mixed.store(0, Ordering::Relaxed);
        self.producer_waits.store(0, Ordering::Relaxed);
    }
}

/// Virtual clock in seconds, written by the worker and readable anywhere
#[derive(Debug, Default)]
pub(crate) struct GlobalClock {
    bits: AtomicU64,
}

impl GlobalClock {
    pub(crate) fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }
}

/// Everything the worker thread owns
struct Worker {
    ring: Arc<BlockRing>,
    sink: Box<dyn BlockSink>,
    mixer: Mixer,
    clock: Arc<GlobalClock>,
    stats: Arc<StatsCounters>,
    channels: usize,
    samples_per_block: usize,
    block_count: usize,
    tick: f64,
}

impl Worker {
    fn run(mut self) {
        log::debug!("Audio worker started");

        let mut blocks = vec![vec![0i16; self.samples_per_block]; self.block_count];
        let mut frame = vec![0.0f32; self.channels];
        let mut time = self.clock.now();
        let mut current = 0;

        loop {
            match self.ring.claim(current) {
                Claim::Stopped => break,
                Claim::Ready { waited } => {
                    if waited {
                        self.stats.producer_waits.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }

            let block = &mut blocks[current];
            for out in block.chunks_exact_mut(self.channels) {
                self.mixer.mix_frame(time, self.tick, &mut frame);
                for (dst, &sample) in out.iter_mut().zip(&frame) {
                    *dst = quantise(sample);
                }
                time += self.tick;
                self.clock.set(time);
            }

            self.ring.mark_submitted(current);
            self.sink.submit(block);
            log::trace!("Submitted block {}", current);

            self.stats.blocks_submitted.fetch_add(1, Ordering::Relaxed);
            self.stats
                .frames_mixed
                .fetch_add((self.samples_per_block / self.channels) as u64, Ordering::Relaxed);

            current = (current + 1) % self.block_count;
        }

        log::debug!("Audio worker finished");
    }
}

/// A running stream: the worker thread plus the control half of its device.
pub struct BlockScheduler {
    ring: Arc<BlockRing>,
    worker: Option<JoinHandle<()>>,
    control: Option<Box<dyn DeviceControl>>,
}

impl BlockScheduler {
    /// Open the device and spawn the worker.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the device cannot be opened; no worker
    /// is spawned in that case.
    pub(crate) fn start(
        config: &AudioConfig,
        backend: &dyn OutputBackend,
        mixer: Mixer,
        clock: Arc<GlobalClock>,
        stats: Arc<StatsCounters>,
    ) -> Result<Self> {
        let format = DeviceFormat::from_config(config);
        let ring = Arc::new(BlockRing::new(config.block_count));
        let completion: Arc<dyn BlockCompletion> = ring.clone();

        let OpenedDevice { sink, mut control } = backend.open(&format, completion)?;

        let worker = Worker {
            ring: ring.clone(),
            sink,
            mixer,
            clock,
            stats,
            channels: config.channels as usize,
            samples_per_block: config.samples_per_block,
            block_count: config.block_count,
            tick: config.tick_duration(),
        };

        let handle = match thread::Builder::new()
            .name("consolesound-worker".into())
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                control.close();
                return Err(ConsoleSoundError::Engine(format!(
                    "Failed to spawn audio worker: {}",
                    e
                )));
            }
        };

        Ok(Self {
            ring,
            worker: Some(handle),
            control: Some(control),
        })
    }

    pub fn ring(&self) -> &BlockRing {
        &self.ring
    }

    /// Discard everything queued on the device
    pub(crate) fn reset_device(&mut self) {
        if let Some(control) = self.control.as_mut() {
            control.reset();
        }
    }

    pub(crate) fn set_volume(&mut self, gain: f32) {
        if let Some(control) = self.control.as_mut() {
            control.set_volume(gain);
        }
    }

    /// Stop the worker, wait for it to exit, then reset and close the device.
    ///
    /// Safe to call more than once. The device is released even if the worker
    /// panicked; the panic is reported afterwards as an `Engine` error.
    pub fn stop(&mut self) -> Result<()> {
        self.ring.shutdown();

        let joined = self.worker.take().map(JoinHandle::join);

        if let Some(mut control) = self.control.take() {
            control.set_volume(1.0);
            control.reset();
            control.close();
        }

        match joined {
            Some(Err(_)) => Err(ConsoleSoundError::Engine("Audio worker panicked".into())),
            _ => Ok(()),
        }
    }
}

impl Drop for BlockScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Error while dropping block scheduler: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip_store::ClipStore;
    use crate::device::testing::ScriptedBackend;
    use crate::mixer::SilentHooks;
    use crate::playback::PlaybackTable;
    use std::time::Duration;

    #[test]
    fn test_clip_is_symmetric() {
        assert_eq!(clip(1.5, 1.0), 1.0);
        assert_eq!(clip(-1.5, 1.0), -1.0);
        assert_eq!(clip(0.25, 1.0), 0.25);
        assert_eq!(quantise(2.0), i16::MAX);
        assert_eq!(quantise(-2.0), -i16::MAX);
        assert_eq!(quantise(0.0), 0);
    }

    #[test]
    fn test_counter_tracks_claims_and_completions() {
        let ring = BlockRing::new(3);
        for index in 0..3 {
            assert_eq!(ring.claim(index), Claim::Ready { waited: false });
            ring.mark_submitted(index);
        }
        assert_eq!(ring.free_blocks(), 0);

        ring.on_block_consumed();
        ring.on_block_consumed();
        assert_eq!(ring.free_blocks(), 2);

        assert_eq!(ring.claim(0), Claim::Ready { waited: false });
        ring.mark_submitted(0);
        assert_eq!(ring.free_blocks(), 1);

        // blocks 2 and 0 are still with the device
        ring.on_block_consumed();
        ring.on_block_consumed();
        assert_eq!(ring.free_blocks(), 3);
    }

    #[test]
    #[should_panic(expected = "never submitted")]
    fn test_completion_after_ring_drained_panics() {
        let ring = BlockRing::new(2);
        for index in 0..2 {
            ring.claim(index);
            ring.mark_submitted(index);
        }
        ring.on_block_consumed();
        ring.on_block_consumed();
        ring.on_block_consumed();
    }

    #[test]
    #[should_panic(expected = "never submitted")]
    fn test_completion_without_submission_panics() {
        let ring = BlockRing::new(2);
        ring.on_block_consumed();
    }

    #[test]
    #[should_panic(expected = "submitted twice")]
    fn test_double_submission_panics() {
        let ring = BlockRing::new(2);
        ring.claim(0);
        ring.mark_submitted(0);
        ring.mark_submitted(0);
    }

    #[test]
    fn test_shutdown_wakes_blocked_claim() {
        let ring = Arc::new(BlockRing::new(1));
        assert_eq!(ring.claim(0), Claim::Ready { waited: false });
        ring.mark_submitted(0);

        let waiter = {
            let ring = ring.clone();
            thread::spawn(move || ring.claim(0))
        };
        thread::sleep(Duration::from_millis(20));
        ring.shutdown();

        assert_eq!(waiter.join().unwrap(), Claim::Stopped);
    }

    #[test]
    fn test_completion_wakes_blocked_claim() {
        let ring = Arc::new(BlockRing::new(1));
        ring.claim(0);
        ring.mark_submitted(0);

        let waiter = {
            let ring = ring.clone();
            thread::spawn(move || ring.claim(0))
        };
        thread::sleep(Duration::from_millis(20));
        ring.on_block_consumed();

        assert_eq!(waiter.join().unwrap(), Claim::Ready { waited: true });
    }

    fn start_scripted(
        config: &AudioConfig,
        backend: &ScriptedBackend,
    ) -> (BlockScheduler, Arc<StatsCounters>) {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mixer = Mixer::new(
            Arc::new(ClipStore::new()),
            Arc::new(Mutex::new(PlaybackTable::new())),
            Arc::new(SilentHooks),
            config.sample_rate,
            tx,
        );
        let stats = Arc::new(StatsCounters::default());
        let scheduler = BlockScheduler::start(
            config,
            backend,
            mixer,
            Arc::new(GlobalClock::default()),
            stats.clone(),
        )
        .unwrap();
        (scheduler, stats)
    }

    #[test]
    fn test_worker_fills_ring_then_waits_for_device() {
        let config = AudioConfig::new().block_count(4).samples_per_block(64);
        let (backend, blocks) = ScriptedBackend::new();
        let (mut scheduler, stats) = start_scripted(&config, &backend);

        for _ in 0..4 {
            let block = blocks.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(block.len(), 64);
        }
        assert!(blocks.recv_timeout(Duration::from_millis(50)).is_err());

        backend.complete();
        assert!(blocks.recv_timeout(Duration::from_secs(2)).is_ok());

        scheduler.stop().unwrap();
        let stats = stats.snapshot();
        assert_eq!(stats.blocks_submitted, 5);
        assert_eq!(stats.frames_mixed, 5 * 64);
    }

    #[test]
    fn test_stop_while_blocked_releases_device_once() {
        let config = AudioConfig::new().block_count(2).samples_per_block(16);
        let (backend, blocks) = ScriptedBackend::new();
        let (mut scheduler, _stats) = start_scripted(&config, &backend);

        blocks.recv_timeout(Duration::from_secs(2)).unwrap();
        blocks.recv_timeout(Duration::from_secs(2)).unwrap();

        scheduler.stop().unwrap();
        scheduler.stop().unwrap();
        assert!(!scheduler.ring().is_running());
        assert_eq!(*backend.calls.lock().unwrap(), vec!["volume", "reset", "close"]);
    }

    #[test]
    fn test_failed_open_spawns_nothing() {
        let (mut backend, _blocks) = ScriptedBackend::new();
        backend.fail_open = true;
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mixer = Mixer::new(
            Arc::new(ClipStore::new()),
            Arc::new(Mutex::new(PlaybackTable::new())),
            Arc::new(SilentHooks),
            44100,
            tx,
        );

        let result = BlockScheduler::start(
            &AudioConfig::default(),
            &backend,
            mixer,
            Arc::new(GlobalClock::default()),
            Arc::new(StatsCounters::default()),
        );
        assert!(matches!(result, Err(ConsoleSoundError::DeviceOpen(_))));
    }
}
