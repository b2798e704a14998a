use crate::audio_data::ClipLoader;
use crate::clip_store::{ClipHandle, ClipStore};
use crate::config::AudioConfig;
use crate::device::{CpalBackend, OutputBackend};
use crate::error::{Result, lock_or_recover};
use crate::events::ConsoleSoundEvent;
use crate::mixer::{Mixer, SilentHooks, SoundHooks};
use crate::playback::{InstanceId, PlaybackTable};
use crate::scheduler::{BlockScheduler, GlobalClock, SchedulerStats, StatsCounters};
use crossbeam_channel::{Receiver, Sender};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Audio engine: clip store, playback control and the streaming output.
///
/// Playback calls never block on the device. They lock the playback table for
/// the duration of one operation, the same lock the audio worker takes for one
/// mixer sweep.
pub struct ConsoleSoundEngine {
    backend: Box<dyn OutputBackend>,
    clips: Arc<ClipStore>,
    table: Arc<Mutex<PlaybackTable>>,
    hooks: Arc<dyn SoundHooks>,
    scheduler: Option<BlockScheduler>,
    active_config: Option<AudioConfig>,
    clock: Arc<GlobalClock>,
    stats: Arc<StatsCounters>,
    volume_percent: f32,
    muted: bool,
    event_sender: Sender<ConsoleSoundEvent>,
    event_receiver: Receiver<ConsoleSoundEvent>,
}

impl ConsoleSoundEngine {
    /// Create an engine that will open its output through `backend`
    pub fn new(backend: impl OutputBackend + 'static) -> Self {
        let (event_sender, event_receiver) = crossbeam_channel::unbounded();
        Self {
            backend: Box::new(backend),
            clips: Arc::new(ClipStore::new()),
            table: Arc::new(Mutex::new(PlaybackTable::new())),
            hooks: Arc::new(SilentHooks),
            scheduler: None,
            active_config: None,
            clock: Arc::new(GlobalClock::default()),
            stats: Arc::new(StatsCounters::default()),
            volume_percent: 100.0,
            muted: false,
            event_sender,
            event_receiver,
        }
    }

    /// Create an engine that plays through the default cpal output device
    pub fn with_default_device() -> Self {
        Self::new(CpalBackend::new())
    }

    pub fn with_hooks(mut self, hooks: impl SoundHooks + 'static) -> Self {
        self.set_hooks(hooks);
        self
    }

    /// Replace the synthesis and filter hooks. Takes effect on the next `start_audio`.
    pub fn set_hooks(&mut self, hooks: impl SoundHooks + 'static) {
        if self.is_running() {
            log::info!("Sound hooks replaced; they apply from the next start_audio");
        }
        self.hooks = Arc::new(hooks);
    }

    pub fn clips(&self) -> &ClipStore {
        &self.clips
    }

    /// Load a WAV clip from disk
    pub fn load_clip(&self, path: impl AsRef<Path>) -> Result<ClipHandle> {
        self.clips.load_path(path)
    }

    /// Load a clip from an in-memory RIFF/WAVE stream
    pub fn load_clip_bytes(&self, bytes: &[u8]) -> Result<ClipHandle> {
        self.clips.load(bytes)
    }

    pub fn load_clip_with<L: ClipLoader>(&self, loader: &L, path: impl AsRef<Path>) -> Result<ClipHandle> {
        self.clips.load_with(loader, path)
    }

    /// Start a new instance of `clip`.
    ///
    /// Returns `None` and leaves the table unchanged if the handle is unknown.
    pub fn play(&self, clip: ClipHandle, looping: bool) -> Option<InstanceId> {
        if !self.clips.contains(clip) {
            log::warn!("play: unknown {}", clip);
            return None;
        }
        let id = self.table().play(clip, looping);
        log::debug!("Playing {} as {} (looping: {})", clip, id, looping);
        Some(id)
    }

    /// Toggle pause on one instance
    pub fn pause(&self, id: InstanceId) {
        if !self.table().pause(id) {
            log::warn!("pause: unknown {}", id);
        }
    }

    pub fn restart(&self, id: InstanceId) {
        if !self.table().restart(id) {
            log::warn!("restart: unknown {}", id);
        }
    }

    pub fn stop(&self, id: InstanceId) {
        if !self.table().stop(id) {
            log::warn!("stop: unknown {}", id);
        }
    }

    /// Toggle pause on every instance of `clip`
    pub fn pause_clip(&self, clip: ClipHandle) {
        if self.check_clip(clip, "pause_clip") {
            self.table().pause_clip(clip);
        }
    }

    pub fn restart_clip(&self, clip: ClipHandle) {
        if self.check_clip(clip, "restart_clip") {
            self.table().restart_clip(clip);
        }
    }

    pub fn stop_clip(&self, clip: ClipHandle) {
        if self.check_clip(clip, "stop_clip") {
            self.table().stop_clip(clip);
        }
    }

    pub fn pause_all(&self) {
        self.table().pause_all();
    }

    pub fn restart_all(&self) {
        self.table().restart_all();
    }

    /// Drop every instance and discard output already queued on the device.
    ///
    /// This is an abrupt cut, not a fade.
    pub fn stop_all(&mut self) {
        self.table().clear();
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.reset_device();
        }
        log::debug!("Stopped all instances");
    }

    /// Set output volume in percent, clamped to 0-100. The device gain is the
    /// square of the fraction.
    pub fn set_volume(&mut self, percent: f32) {
        self.volume_percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        self.apply_gain();
    }

    pub fn volume(&self) -> f32 {
        self.volume_percent
    }

    pub fn mute(&mut self) {
        self.muted = true;
        self.apply_gain();
    }

    pub fn unmute(&mut self) {
        self.muted = false;
        self.apply_gain();
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Gain currently applied by the device
    pub fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            let fraction = self.volume_percent / 100.0;
            fraction * fraction
        }
    }

    /// Open the device and start the audio worker.
    ///
    /// If audio is already running it is fully stopped first. Global time and
    /// stats are reset, and volume returns to 100% unmuted.
    ///
    /// # Errors
    ///
    /// `Configuration` if `config` is invalid, or the backend's `DeviceOpen`
    /// error. In both cases nothing is left running.
    pub fn start_audio(&mut self, config: AudioConfig) -> Result<()> {
        config.validate()?;

        if self.scheduler.is_some() {
            log::info!("Audio already running, restarting with new parameters");
            self.stop_audio()?;
        }

        self.clock.set(0.0);
        self.stats.reset();
        self.volume_percent = 100.0;
        self.muted = false;

        let mixer = Mixer::new(
            self.clips.clone(),
            self.table.clone(),
            self.hooks.clone(),
            config.sample_rate,
            self.event_sender.clone(),
        );

        let mut scheduler = BlockScheduler::start(
            &config,
            self.backend.as_ref(),
            mixer,
            self.clock.clone(),
            self.stats.clone(),
        )?;
        scheduler.set_volume(self.gain());

        log::info!(
            "Audio started: {} Hz, {} channel(s), {} blocks of {} samples",
            config.sample_rate,
            config.channels,
            config.block_count,
            config.samples_per_block
        );
        let _ = self.event_sender.try_send(ConsoleSoundEvent::AudioStarted {
            sample_rate: config.sample_rate,
            channels: config.channels,
            block_count: config.block_count,
            samples_per_block: config.samples_per_block,
        });

        self.scheduler = Some(scheduler);
        self.active_config = Some(config);
        Ok(())
    }

    /// Stop the worker, wait for it, and release the device.
    ///
    /// Calling this while audio is not running is a no-op.
    pub fn stop_audio(&mut self) -> Result<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Ok(());
        };

        let result = scheduler.stop();
        self.active_config = None;

        log::info!("Audio stopped");
        let _ = self.event_sender.try_send(ConsoleSoundEvent::AudioStopped);
        result
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Parameters of the running stream
    pub fn audio_config(&self) -> Option<&AudioConfig> {
        self.active_config.as_ref()
    }

    /// Seconds of audio mixed since the last `start_audio`
    pub fn global_time(&self) -> f64 {
        self.clock.now()
    }

    /// Number of instances currently in the playback table
    pub fn active_instances(&self) -> usize {
        self.table().len()
    }

    pub fn is_active(&self, id: InstanceId) -> bool {
        self.table().contains(id)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.snapshot()
    }

    /// Drain all pending events
    pub fn poll_events(&self) -> Vec<ConsoleSoundEvent> {
        self.event_receiver.try_iter().collect()
    }

    fn apply_gain(&mut self) {
        let gain = self.gain();
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_volume(gain);
        }
    }

    fn check_clip(&self, clip: ClipHandle, operation: &str) -> bool {
        let known = self.clips.contains(clip);
        if !known {
            log::warn!("{}: unknown {}", operation, clip);
        }
        known
    }

    fn table(&self) -> std::sync::MutexGuard<'_, PlaybackTable> {
        lock_or_recover(&self.table, "Playback table")
    }
}

impl Drop for ConsoleSoundEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop_audio() {
            log::error!("Error while stopping audio on drop: {}", e);
        }
    }
}
