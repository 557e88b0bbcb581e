use crate::host::{EngineError, Imports, Result, MAX_PAGES, PAGE_SIZE};

/// Memory is requested from the host in steps of at least this many bytes.
pub(crate) const MIN_GROWTH_BYTES: usize = 4 << 20;

/// Word-aligned bump allocator over linear memory.
///
/// `reset` rewinds to the heap base; `mark`/`release` scope temporaries.
#[derive(Debug)]
pub(crate) struct BumpAllocator {
    base: usize,
    top: usize,
}

impl BumpAllocator {
    pub fn new(base: usize) -> Self {
        Self { base, top: base }
    }

    pub fn reset(&mut self) {
        self.top = self.base;
    }

    #[inline]
    pub fn mark(&self) -> usize {
        self.top
    }

    pub fn release(&mut self, mark: usize) {
        debug_assert!(mark >= self.base && mark <= self.top);
        self.top = mark.clamp(self.base, self.top);
    }

    /// Reserves `words` 32-bit words and returns their byte address.
    pub fn allocate_words(&mut self, env: &mut dyn Imports, words: usize) -> Result<u32> {
        let limit = MAX_PAGES * PAGE_SIZE;
        let start = self.top;
        let end = words
            .checked_mul(4)
            .and_then(|bytes| start.checked_add(bytes))
            .filter(|&end| end <= limit)
            .ok_or(EngineError::Allocation {
                requested: start.saturating_add(words.saturating_mul(4)),
                limit,
            })?;

        let available = env.memory().byte_len();
        if end > available {
            let generous = available.saturating_add((end - start).max(MIN_GROWTH_BYTES));
            let grown = match env.set_memory_size(generous) {
                Ok(bytes) => bytes,
                // The generous step may cross the host's ceiling; the exact need might not.
                Err(_) => env.set_memory_size(end)?,
            };
            if grown < end {
                return Err(EngineError::Allocation {
                    requested: end,
                    limit: grown,
                });
            }
        }

        self.top = end;
        Ok(start as u32)
    }
}
