use crate::{
    audio_data::{AudioClip, ClipLoader, decode_wav},
    error::Result,
};
use std::path::Path;

/// Default loader: reads the whole file, then decodes it as RIFF/WAVE.
///
/// Accepts only the layout described in [`decode_wav`].
///
/// # Examples
///
/// ```ignore
/// use consolesound::audio_data::{ClipLoader, WavFileLoader};
///
/// let clip = WavFileLoader.load("assets/jump.wav".as_ref())?;
/// ```
pub struct WavFileLoader;

impl ClipLoader for WavFileLoader {
    fn load(&self, path: &Path) -> Result<AudioClip> {
        let bytes = std::fs::read(path)?;
        let clip = decode_wav(&bytes)?;
        log::info!(
            "Loaded clip {} ({} frames, {} channel(s))",
            path.display(),
            clip.total_frames(),
            clip.channels()
        );
        Ok(clip)
    }
}
