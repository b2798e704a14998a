use crate::audio_data::AudioClip;
use crate::error::Result;
use std::path::Path;

/// Trait for loading clips from file paths.
///
/// The engine ships [`WavFileLoader`](crate::audio_data::WavFileLoader); implement
/// this trait to read clips from an archive, an embedded asset table or any other
/// source, then hand the result to [`ClipStore::insert`](crate::clip_store::ClipStore::insert).
///
/// # Example
///
/// ```ignore
/// use consolesound::audio_data::{AudioClip, ClipLoader, decode_wav};
/// use consolesound::error::Result;
/// use std::path::Path;
///
/// struct PackLoader { /* ... */ }
///
/// impl ClipLoader for PackLoader {
///     fn load(&self, path: &Path) -> Result<AudioClip> {
///         let bytes = self.read_entry(path)?;
///         Ok(decode_wav(&bytes)?)
///     }
/// }
/// ```
pub trait ClipLoader {
    /// Loads and decodes one clip.
    ///
    /// # Errors
    ///
    /// Returns a `ConsoleSoundError` if the source cannot be read or decoded.
    fn load(&self, path: &Path) -> Result<AudioClip>;
}
