use bytemuck::{Pod, Zeroable};

use crate::host::marshal::span_bytes;
use crate::host::{EngineBuffer, EngineError, LinearMemory, Result};

pub(crate) const HEADER_WORDS: usize = 4;

/// In-memory header every buffer starts with.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub(crate) struct BufferHeader {
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    /// Byte address of the first pixel.
    pub pixels: u32,
}

impl BufferHeader {
    pub fn read(memory: &LinearMemory, buffer: EngineBuffer) -> Result<Self> {
        let index = word_index(buffer.addr())?;
        let words = memory
            .words()
            .get(index..index + HEADER_WORDS)
            .ok_or_else(|| dangling(buffer.addr()))?;
        Ok(bytemuck::cast_slice::<u32, BufferHeader>(words)[0])
    }

    pub fn write(self, memory: &mut LinearMemory, addr: u32) -> Result<()> {
        let index = word_index(addr)?;
        let words = memory
            .words_mut()
            .get_mut(index..index + HEADER_WORDS)
            .ok_or_else(|| dangling(addr))?;
        bytemuck::cast_slice_mut::<u32, BufferHeader>(words)[0] = self;
        Ok(())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Word index of the first pixel.
    #[inline]
    pub fn base(&self) -> usize {
        self.pixels as usize / 4
    }

    /// Words from the first pixel to the end of the last visible pixel.
    pub fn span_words(&self) -> Result<usize> {
        Ok(span_bytes(self.width as usize, self.height as usize, self.pitch as usize)? / 4)
    }

    /// Fails unless every visible pixel lies inside `memory`.
    pub fn validate(&self, memory: &LinearMemory) -> Result<()> {
        word_index(self.pixels)?;
        let end = self.base() + self.span_words()?;
        if end > memory.words().len() {
            return Err(EngineError::MarshalMismatch(format!(
                "{}x{} pitch {} at {:#x} runs past linear memory",
                self.width, self.height, self.pitch, self.pixels
            )));
        }
        Ok(())
    }
}

fn word_index(addr: u32) -> Result<usize> {
    if addr % 4 != 0 {
        return Err(EngineError::MarshalMismatch(format!("address {addr:#x} is not word aligned")));
    }
    Ok(addr as usize / 4)
}

fn dangling(addr: u32) -> EngineError {
    EngineError::MarshalMismatch(format!("buffer handle {addr:#x} points outside linear memory"))
}

/// Read-only pixel view of one buffer.
pub(crate) struct Plane<'a> {
    words: &'a [u32],
    pub width: usize,
    pub height: usize,
    pitch: usize,
}

impl<'a> Plane<'a> {
    pub fn new(memory: &'a LinearMemory, header: &BufferHeader) -> Result<Self> {
        header.validate(memory)?;
        let base = header.base();
        let words = &memory.words()[base..base + header.span_words()?];
        Ok(Self {
            words,
            width: header.width as usize,
            height: header.height as usize,
            pitch: header.pitch as usize,
        })
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u32 {
        self.words[y * self.pitch + x]
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Sum of absolute RGB differences; alpha is ignored.
#[inline]
pub(crate) fn rgb_distance(a: u32, b: u32) -> u32 {
    let a = a.to_ne_bytes();
    let b = b.to_ne_bytes();
    a[..3].iter().zip(&b[..3]).map(|(&p, &q)| p.abs_diff(q) as u32).sum()
}

/// Per-channel truncating average of four RGBA pixels.
#[inline]
pub(crate) fn average4(px: [u32; 4]) -> u32 {
    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let sum: u32 = px.iter().map(|w| w.to_ne_bytes()[c] as u32).sum();
        *slot = (sum >> 2) as u8;
    }
    u32::from_ne_bytes(out)
}
