//! Append-only storage for decoded clips.

use crate::audio_data::{AudioClip, ClipLoader, WavFileLoader, decode_wav};
use crate::error::Result;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard};

/// Stable index of a clip inside a [`ClipStore`].
///
/// Handles are never reused and stay valid for the lifetime of the store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipHandle(pub(crate) usize);

impl ClipHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ClipHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClipHandle({})", self.0)
    }
}

/// Owns every loaded clip.
///
/// Clips are decoded outside the lock and published in a single push, so a
/// reader either sees a complete clip or no clip at all. Published clips are
/// never mutated or removed.
#[derive(Default)]
pub struct ClipStore {
    clips: RwLock<Vec<AudioClip>>,
}

impl ClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a RIFF/WAVE byte stream and register it.
    ///
    /// # Errors
    ///
    /// Returns `ConsoleSoundError::Decode` and leaves the store unchanged if the
    /// bytes are malformed or not in the supported format.
    pub fn load(&self, bytes: &[u8]) -> Result<ClipHandle> {
        let clip = decode_wav(bytes)?;
        Ok(self.insert(clip))
    }

    /// Read and register a clip file with the default WAV loader.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<ClipHandle> {
        self.load_with(&WavFileLoader, path)
    }

    /// Read and register a clip with a custom loader.
    pub fn load_with<L: ClipLoader>(&self, loader: &L, path: impl AsRef<Path>) -> Result<ClipHandle> {
        let clip = loader.load(path.as_ref())?;
        Ok(self.insert(clip))
    }

    /// Register an already decoded clip.
    pub fn insert(&self, clip: AudioClip) -> ClipHandle {
        let mut clips = self.write();
        clips.push(clip);
        let handle = ClipHandle(clips.len() - 1);
        log::debug!("Registered {}", handle);
        handle
    }

    /// Returns a shared reference to the clip behind `handle`, if it exists.
    pub fn get(&self, handle: ClipHandle) -> Option<AudioClip> {
        self.read().get(handle.0).cloned()
    }

    pub fn contains(&self, handle: ClipHandle) -> bool {
        handle.0 < self.read().len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Read view used by the mixer for the duration of one sweep.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<AudioClip>> {
        self.clips.read().unwrap_or_else(|e| {
            log::warn!("Clip store lock poisoned; continuing");
            e.into_inner()
        })
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<AudioClip>> {
        self.clips.write().unwrap_or_else(|e| {
            log::warn!("Clip store lock poisoned; continuing");
            e.into_inner()
        })
    }
}
