//! # ConsoleSound
//!
//! A small streaming audio engine for fixed-cadence applications: clips are mixed
//! together with a user synthesis hook into fixed-size 16-bit blocks, queued on
//! an output device through a ring of blocks, and torn down in order when the
//! host asks the process to close.
//!
//! ## Quick Start
//!
//! ```no_run
//! use consolesound::*;
//!
//! let mut engine = ConsoleSoundEngine::with_default_device();
//!
//! // Load a 16-bit, 44100 Hz WAV file
//! let clip = engine.load_clip("explosion.wav")?;
//!
//! // Open the device and start mixing
//! engine.start_audio(AudioConfig::default())?;
//!
//! // Play it once
//! let instance = engine.play(clip, false);
//!
//! // Poll for events
//! for event in engine.poll_events() {
//!     if let ConsoleSoundEvent::InstanceFinished { instance, .. } = event {
//!         println!("Finished: {}", instance);
//!     }
//! }
//!
//! engine.stop_audio()?;
//! # let _ = instance;
//! # Ok::<(), ConsoleSoundError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`ConsoleSoundEngine`]**: Clip loading, playback control, volume, and audio start/stop
//! - **[`ClipStore`]**: Immutable decoded clips addressed by [`ClipHandle`]
//! - **[`PlaybackTable`]**: Per-instance cursor, loop, pause and finished state
//! - **[`SoundHooks`]**: User synthesis and filter hooks called for every sample
//! - **[`BlockScheduler`]**: Worker thread filling the block ring shared with the device
//! - **[`EngineLifecycle`]** and **[`AppRunner`]**: Main loop and shutdown rendezvous
//!
//! ## Architecture
//!
//! 1. **Main Thread**: Owns the engine, loads clips, issues playback calls
//! 2. **Audio Worker**: Waits for a free block, mixes it, submits it to the device
//! 3. **Device Callback**: Plays queued samples and reports each consumed block
//! 4. **Termination Handler**: Blocks until the main thread has torn audio down
//!
//! The worker never busy-waits; it sleeps on a condition tied to the free-block
//! counter, which only device completions increment.
pub mod app;
pub mod audio_data;
pub mod clip_store;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod mixer;
pub mod playback;
pub mod scheduler;
pub mod sprite;

pub use app::{AppContext, AppRunner, Application};
pub use audio_data::{AudioClip, ClipFormat, ClipLoader, WavFileLoader, decode_wav};
pub use clip_store::{ClipHandle, ClipStore};
pub use config::AudioConfig;
pub use device::{
    BlockCompletion, BlockSink, CpalBackend, DeviceControl, DeviceFormat, OpenedDevice,
    OutputBackend,
};
pub use engine::ConsoleSoundEngine;
pub use error::{ConsoleSoundError, DecodeError};
pub use events::ConsoleSoundEvent;
pub use lifecycle::{EngineLifecycle, LifecyclePhase};
pub use mixer::{MixReport, Mixer, SilentHooks, SoundHooks};
pub use playback::{InstanceId, PlayState, PlaybackInstance, PlaybackTable};
pub use scheduler::{BlockRing, BlockScheduler, SchedulerStats};
pub use sprite::{Cell, Sprite};
