//! RIFF/WAVE decoding for the single accepted sample layout.
//!
//! Layout walked here:
//!
//! ```text
//! "RIFF" <u32 size> "WAVE"
//!     "fmt " <u32 size> <tag u16> <channels u16> <rate u32> <byte rate u32> <align u16> <bits u16> [...]
//!     <any other chunks, skipped>
//!     "data" <u32 size> <interleaved little-endian i16 samples>
//! ```
//!
//! Chunks are word aligned: an odd-sized chunk is followed by one pad byte.

use super::{AudioClip, ClipFormat};
use crate::error::DecodeError;

/// The only sample rate accepted by the decoder
pub const SUPPORTED_SAMPLE_RATE: u32 = 44100;
/// The only bit depth accepted by the decoder
pub const SUPPORTED_BITS_PER_SAMPLE: u16 = 16;

const FORMAT_TAG_PCM: u16 = 1;
const CHUNK_HEADER_LEN: usize = 8;
const FMT_MIN_LEN: usize = 16;

struct Chunk<'a> {
    id: [u8; 4],
    body: &'a [u8],
    /// Declared size, which may exceed `body.len()` for a truncated file
    declared_len: usize,
}

/// Walks the sub-chunks of a WAVE form.
struct ChunkReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ChunkReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn next_chunk(&mut self) -> Option<Chunk<'a>> {
        let header = self.bytes.get(self.offset..self.offset + CHUNK_HEADER_LEN)?;
        let id = [header[0], header[1], header[2], header[3]];
        let declared_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let body_start = self.offset + CHUNK_HEADER_LEN;
        let body_end = body_start.saturating_add(declared_len).min(self.bytes.len());
        let body = &self.bytes[body_start..body_end];

        // Pad to word boundary
        let padded = declared_len + (declared_len % 2);
        self.offset = body_start.saturating_add(padded);

        Some(Chunk {
            id,
            body,
            declared_len,
        })
    }
}

fn read_format(body: &[u8]) -> Result<(u16, ClipFormat), DecodeError> {
    if body.len() < FMT_MIN_LEN {
        return Err(DecodeError::MalformedChunk(format!(
            "fmt chunk too small ({} bytes)",
            body.len()
        )));
    }

    let format_tag = u16::from_le_bytes([body[0], body[1]]);
    let channels = u16::from_le_bytes([body[2], body[3]]);
    let sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
    let block_align = u16::from_le_bytes([body[12], body[13]]);
    let bits_per_sample = u16::from_le_bytes([body[14], body[15]]);

    Ok((
        format_tag,
        ClipFormat {
            channels,
            sample_rate,
            bits_per_sample,
            block_align,
        },
    ))
}

fn check_supported(format_tag: u16, format: &ClipFormat) -> Result<(), DecodeError> {
    if format_tag != FORMAT_TAG_PCM
        || format.sample_rate != SUPPORTED_SAMPLE_RATE
        || format.bits_per_sample != SUPPORTED_BITS_PER_SAMPLE
    {
        return Err(DecodeError::UnsupportedFormat {
            format_tag,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
        });
    }
    if format.channels == 0 {
        return Err(DecodeError::MalformedChunk("fmt chunk declares zero channels".into()));
    }
    let expected_align = format.channels as u32 * (format.bits_per_sample as u32 / 8);
    if format.block_align as u32 != expected_align {
        return Err(DecodeError::MalformedChunk(format!(
            "block align {} does not match {} channels of {} bits",
            format.block_align, format.channels, format.bits_per_sample
        )));
    }
    Ok(())
}

/// Decode a complete RIFF/WAVE byte stream into an [`AudioClip`].
///
/// Only 16-bit integer PCM at 44100 Hz is accepted; any channel count is allowed.
/// Chunks other than `fmt ` and `data` are skipped wherever they appear. Integer
/// samples are divided by `i16::MAX` to land in `[-1.0, 1.0]`.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioClip, DecodeError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" {
        return Err(DecodeError::NotRiff);
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(DecodeError::NotWave);
    }

    let mut chunks = ChunkReader::new(&bytes[12..]);
    let mut format: Option<ClipFormat> = None;

    let payload = loop {
        let Some(chunk) = chunks.next_chunk() else {
            return Err(if format.is_none() {
                DecodeError::MissingChunk("fmt ")
            } else {
                DecodeError::MissingChunk("data")
            });
        };

        match &chunk.id {
            b"fmt " => {
                if chunk.body.len() < chunk.declared_len {
                    return Err(DecodeError::Truncated {
                        expected: chunk.declared_len,
                        available: chunk.body.len(),
                    });
                }
                let (format_tag, parsed) = read_format(chunk.body)?;
                check_supported(format_tag, &parsed)?;
                format = Some(parsed);
            }
            b"data" => {
                if format.is_none() {
                    return Err(DecodeError::MissingChunk("fmt "));
                }
                if chunk.body.len() < chunk.declared_len {
                    return Err(DecodeError::Truncated {
                        expected: chunk.declared_len,
                        available: chunk.body.len(),
                    });
                }
                break chunk.body;
            }
            other => {
                log::trace!(
                    "Skipping chunk {:?} ({} bytes)",
                    String::from_utf8_lossy(other),
                    chunk.declared_len
                );
            }
        }
    };

    let Some(format) = format else {
        return Err(DecodeError::MissingChunk("fmt "));
    };

    let frame_bytes = format.block_align as usize;
    let frames = payload.len() / frame_bytes;
    let sample_count = frames * format.channels as usize;

    let samples: Vec<f32> = payload[..sample_count * 2]
        .chunks_exact(2)
        .map(|pair| (i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32).max(-1.0))
        .collect();

    log::debug!(
        "Decoded clip: {} channel(s), {} Hz, {} frames",
        format.channels,
        format.sample_rate,
        frames
    );

    Ok(AudioClip::new(format, samples))
}
