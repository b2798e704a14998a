//! Error types for ConsoleSound

use thiserror::Error;

/// Reasons a clip byte stream was rejected by the decoder.
///
/// A failed decode never registers anything in the [`ClipStore`](crate::clip_store::ClipStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Not a RIFF container")]
    NotRiff,

    #[error("RIFF container is not of form type WAVE")]
    NotWave,

    #[error("Missing required chunk: {0}")]
    MissingChunk(&'static str),

    #[error("Malformed chunk: {0}")]
    MalformedChunk(String),

    #[error(
        "Unsupported sample format: tag={format_tag}, rate={sample_rate}Hz, bits={bits_per_sample} \
         (only 16-bit integer PCM at 44100Hz is accepted)"
    )]
    UnsupportedFormat {
        format_tag: u16,
        sample_rate: u32,
        bits_per_sample: u16,
    },

    #[error("Truncated payload: expected {expected} bytes, found {available}")]
    Truncated { expected: usize, available: usize },
}

#[derive(Error, Debug)]
pub enum ConsoleSoundError {
    #[error("Clip decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to open audio device: {0}")]
    DeviceOpen(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Sprite format error: {0}")]
    SpriteFormat(String),
}

pub type Result<T> = std::result::Result<T, ConsoleSoundError>;

/// Lock a mutex, recovering the guard if another thread panicked while holding it.
///
/// Every lock in this crate guards plain counters, flags and vectors that stay
/// valid across a panic.
pub(crate) fn lock_or_recover<'a, T>(
    mutex: &'a std::sync::Mutex<T>,
    what: &str,
) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|e| {
        log::warn!("{} mutex poisoned; continuing", what);
        e.into_inner()
    })
}
