use super::error::{EngineError, Result};

/// Growth granularity of linear memory.
pub const PAGE_SIZE: usize = 65536;

/// Hard ceiling: a 32-bit address space worth of pages.
pub const MAX_PAGES: usize = 65536;

const WORDS_PER_PAGE: usize = PAGE_SIZE / 4;

/// Host-owned, growable linear memory shared with the compute module.
///
/// Backed by 32-bit words so that word-aligned pixel access never needs unaligned
/// loads; the byte view is a `bytemuck` cast of the same storage.
/// Memory only ever grows.
#[derive(Debug)]
pub struct LinearMemory {
    words: Vec<u32>,
    max_pages: usize,
}

impl LinearMemory {
    /// Allocates `initial_pages` zeroed pages; growth stops at `max_pages`.
    pub fn new(initial_pages: usize, max_pages: usize) -> Result<Self> {
        let max_pages = max_pages.min(MAX_PAGES);
        let mut memory = Self {
            words: Vec::new(),
            max_pages,
        };
        memory.grow(initial_pages)?;
        Ok(memory)
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.words.len() * 4
    }

    #[inline]
    pub fn pages(&self) -> usize {
        self.words.len() / WORDS_PER_PAGE
    }

    #[inline]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Grows by `pages` whole pages and returns the previous page count.
    pub fn grow(&mut self, pages: usize) -> Result<usize> {
        let previous = self.pages();
        let target = previous
            .checked_add(pages)
            .filter(|&p| p <= self.max_pages)
            .ok_or_else(|| self.allocation_error(previous.saturating_add(pages)))?;

        let new_words = target * WORDS_PER_PAGE;
        self.words
            .try_reserve_exact(new_words - self.words.len())
            .map_err(|_| self.allocation_error(target))?;
        self.words.resize(new_words, 0);
        Ok(previous)
    }

    /// Grows so that at least `required_bytes` are addressable.
    ///
    /// The shortfall is rounded up to whole pages; requests at or below the current
    /// capacity change nothing. Returns the capacity in bytes after growth.
    pub fn grow_to(&mut self, required_bytes: usize) -> Result<usize> {
        let current = self.byte_len();
        if required_bytes > current {
            let delta = required_bytes - current;
            self.grow(delta.div_ceil(PAGE_SIZE))?;
        }
        Ok(self.byte_len())
    }

    fn allocation_error(&self, pages: usize) -> EngineError {
        EngineError::Allocation {
            requested: pages.saturating_mul(PAGE_SIZE),
            limit: self.max_pages * PAGE_SIZE,
        }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    /// Bounds-checked byte range `[addr, addr + len)`.
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8]> {
        let end = self.checked_end(addr, len)?;
        Ok(&self.bytes()[addr..end])
    }

    /// Mutable bounds-checked byte range `[addr, addr + len)`.
    pub fn slice_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8]> {
        let end = self.checked_end(addr, len)?;
        Ok(&mut self.bytes_mut()[addr..end])
    }

    fn checked_end(&self, addr: usize, len: usize) -> Result<usize> {
        addr.checked_add(len)
            .filter(|&end| end <= self.byte_len())
            .ok_or_else(|| {
                EngineError::MarshalMismatch(format!(
                    "range {addr}+{len} exceeds linear memory of {} bytes",
                    self.byte_len()
                ))
            })
    }
}
