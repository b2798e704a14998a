//! Character/attribute cell buffer with binary persistence.
//!
//! On-disk layout, little-endian:
//!
//! ```text
//! i32 width
//! i32 height
//! width * height cells, row major: u16 glyph, u16 attributes
//! ```

use crate::error::{ConsoleSoundError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const CELL_BYTES: usize = 4;
const HEADER_BYTES: usize = 8;

/// Glyph written into freshly created cells
pub const BLANK_GLYPH: u16 = b' ' as u16;
/// Attributes of freshly created cells: black background, black foreground
pub const BLANK_ATTRIBUTES: u16 = 0x0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub glyph: u16,
    pub attributes: u16,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            glyph: BLANK_GLYPH,
            attributes: BLANK_ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Sprite {
    /// Blank sprite. Both dimensions must be positive.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let count = Self::cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![Cell::default(); count],
        })
    }

    fn cell_count(width: usize, height: usize) -> Result<usize> {
        if width == 0 || height == 0 {
            return Err(ConsoleSoundError::SpriteFormat(format!(
                "dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(ConsoleSoundError::SpriteFormat(format!(
                "dimensions {}x{} exceed the file format range",
                width, height
            )));
        }
        width.checked_mul(height).ok_or_else(|| {
            ConsoleSoundError::SpriteFormat(format!("{}x{} cells overflow", width, height))
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// Glyph at `(x, y)`, or a blank outside the sprite
    pub fn glyph(&self, x: i32, y: i32) -> u16 {
        self.cell(x, y).map_or(BLANK_GLYPH, |c| c.glyph)
    }

    pub fn attributes(&self, x: i32, y: i32) -> u16 {
        self.cell(x, y).map_or(BLANK_ATTRIBUTES, |c| c.attributes)
    }

    /// Writes outside the sprite are ignored
    pub fn set_glyph(&mut self, x: i32, y: i32, glyph: u16) {
        if let Some(i) = self.index(x, y) {
            self.cells[i].glyph = glyph;
        }
    }

    pub fn set_attributes(&mut self, x: i32, y: i32, attributes: u16) {
        if let Some(i) = self.index(x, y) {
            self.cells[i].attributes = attributes;
        }
    }

    fn sample_index(&self, u: f32, v: f32) -> usize {
        let sx = ((u * self.width as f32) as i64).clamp(0, self.width as i64 - 1) as usize;
        let sy = ((v * self.height as f32) as i64).clamp(0, self.height as i64 - 1) as usize;
        sy * self.width + sx
    }

    /// Glyph at normalised coordinates, clamped to the edges
    pub fn sample_glyph(&self, u: f32, v: f32) -> u16 {
        self.cells[self.sample_index(u, v)].glyph
    }

    pub fn sample_attributes(&self, u: f32, v: f32) -> u16 {
        self.cells[self.sample_index(u, v)].attributes
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&(self.width as i32).to_le_bytes())?;
        writer.write_all(&(self.height as i32).to_le_bytes())?;

        let mut body = Vec::with_capacity(self.cells.len() * CELL_BYTES);
        for cell in &self.cells {
            body.extend_from_slice(&cell.glyph.to_le_bytes());
            body.extend_from_slice(&cell.attributes.to_le_bytes());
        }
        writer.write_all(&body)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut header = [0u8; HEADER_BYTES];
        reader.read_exact(&mut header).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                ConsoleSoundError::SpriteFormat("missing width/height header".into())
            }
            _ => ConsoleSoundError::Io(e),
        })?;

        let width = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let height = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if width <= 0 || height <= 0 {
            return Err(ConsoleSoundError::SpriteFormat(format!(
                "dimensions must be positive, got {}x{}",
                width, height
            )));
        }

        let (width, height) = (width as usize, height as usize);
        let expected = Self::cell_count(width, height)?
            .checked_mul(CELL_BYTES)
            .ok_or_else(|| {
                ConsoleSoundError::SpriteFormat(format!("{}x{} sprite is too large", width, height))
            })?;

        // Sized by the bytes present, never by the header
        let mut body = Vec::new();
        reader.take(expected as u64).read_to_end(&mut body)?;
        if body.len() < expected {
            return Err(ConsoleSoundError::SpriteFormat(format!(
                "truncated cell data: expected {} bytes, found {}",
                expected,
                body.len()
            )));
        }

        let cells = body
            .chunks_exact(CELL_BYTES)
            .map(|bytes| Cell {
                glyph: u16::from_le_bytes([bytes[0], bytes[1]]),
                attributes: u16::from_le_bytes([bytes[2], bytes[3]]),
            })
            .collect();
        let sprite = Self {
            width,
            height,
            cells,
        };
        Ok(sprite)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_to(BufWriter::new(file))?;
        log::debug!(
            "Saved {}x{} sprite to {}",
            self.width,
            self.height,
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::read_from(BufReader::new(file))
    }
}
