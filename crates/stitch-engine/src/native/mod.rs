//! Reference compute module.
//!
//! A native implementation of the module export surface so the bridge can run
//! without an external binary. It only ever touches the host through
//! [`Imports`], exactly as a sandboxed module would.
//!
//! Memory layout: a bump allocator starting at [`HEAP_BASE`]; every buffer is a
//! 16-byte header `{width, height, pitch, pixels}` followed by its pixels.
//! Input buffers are tight (`pitch == width`); merged output rows are padded to
//! a multiple of [`ROW_ALIGN_PIXELS`].

mod alloc;
mod plane;
mod search;

use crate::host::{ComputeModule, EngineBuffer, EngineError, Imports, LinearMemory, Result};

use alloc::BumpAllocator;
use plane::{average4, BufferHeader, HEADER_WORDS};

pub use search::SearchConfig;

/// First byte handed out by the allocator; everything below is reserved.
pub const HEAP_BASE: u32 = 1024;

/// Row alignment of buffers produced by `find_overlap`.
pub const ROW_ALIGN_PIXELS: u32 = 8;

pub struct NativeModule {
    alloc: BumpAllocator,
    search: SearchConfig,
}

impl NativeModule {
    /// Instantiates the module with the default search parameters.
    pub fn instantiate(env: &mut dyn Imports) -> Result<Self> {
        Self::with_search(env, SearchConfig::default())
    }

    pub fn with_search(env: &mut dyn Imports, search: SearchConfig) -> Result<Self> {
        let available = env.set_memory_size(HEAP_BASE as usize)?;
        if available < HEAP_BASE as usize {
            return Err(EngineError::Initialization(format!(
                "linear memory of {available} bytes cannot hold the heap base"
            )));
        }
        Ok(Self {
            alloc: BumpAllocator::new(HEAP_BASE as usize),
            search,
        })
    }

    fn allocate_buffer(&mut self, env: &mut dyn Imports, width: u32, height: u32, pitch: u32) -> Result<EngineBuffer> {
        let pixel_words = (pitch as usize)
            .checked_mul(height as usize)
            .ok_or(EngineError::Allocation {
                requested: usize::MAX,
                limit: env.memory().max_pages() * crate::host::PAGE_SIZE,
            })?;
        let addr = self.alloc.allocate_words(env, HEADER_WORDS + pixel_words)?;
        let header = BufferHeader {
            width,
            height,
            pitch,
            pixels: addr + (HEADER_WORDS as u32) * 4,
        };
        header.write(env.memory_mut(), addr)?;
        Ok(EngineBuffer(addr))
    }

    /// Allocates a zero-filled buffer whose rows are padded to [`ROW_ALIGN_PIXELS`].
    pub fn create_padded_buffer(&mut self, env: &mut dyn Imports, width: u32, height: u32) -> Result<EngineBuffer> {
        let pitch = width.next_multiple_of(ROW_ALIGN_PIXELS);
        let buffer = self.allocate_buffer(env, width, height, pitch)?;
        let header = BufferHeader::read(env.memory(), buffer)?;
        let start = header.base();
        let len = pitch as usize * height as usize;
        env.memory_mut().words_mut()[start..start + len].fill(0);
        Ok(buffer)
    }

    fn mip_buffer(&mut self, env: &mut dyn Imports, buffer: EngineBuffer) -> Result<EngineBuffer> {
        let src = BufferHeader::read(env.memory(), buffer)?;
        if src.is_empty() {
            return Err(EngineError::EmptyImage {
                width: src.width,
                height: src.height,
            });
        }
        src.validate(env.memory())?;

        let out = self.create_image_buffer(env, src.width.div_ceil(2), src.height.div_ceil(2))?;
        let dst = BufferHeader::read(env.memory(), out)?;

        let (w, h) = (src.width as usize, src.height as usize);
        let (sp, dp) = (src.pitch as usize, dst.pitch as usize);
        let (s0, d0) = (src.base(), dst.base());
        let words = env.memory_mut().words_mut();
        for oy in 0..dst.height as usize {
            let y0 = oy * 2;
            let y1 = (y0 + 1).min(h - 1);
            for ox in 0..dst.width as usize {
                let x0 = ox * 2;
                let x1 = (x0 + 1).min(w - 1);
                let px = [
                    words[s0 + y0 * sp + x0],
                    words[s0 + y0 * sp + x1],
                    words[s0 + y1 * sp + x0],
                    words[s0 + y1 * sp + x1],
                ];
                words[d0 + oy * dp + ox] = average4(px);
            }
        }
        Ok(out)
    }

    fn header(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<BufferHeader> {
        BufferHeader::read(memory, buffer)
    }
}

impl ComputeModule for NativeModule {
    fn create_image_buffer(&mut self, env: &mut dyn Imports, width: u32, height: u32) -> Result<EngineBuffer> {
        self.allocate_buffer(env, width, height, width)
    }

    fn reset(&mut self, _env: &mut dyn Imports) {
        self.alloc.reset();
    }

    fn width(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        Ok(self.header(memory, buffer)?.width)
    }

    fn height(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        Ok(self.header(memory, buffer)?.height)
    }

    fn pitch(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        Ok(self.header(memory, buffer)?.pitch)
    }

    fn pixels(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        Ok(self.header(memory, buffer)?.pixels)
    }

    fn num_pixels(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        let h = self.header(memory, buffer)?;
        h.width.checked_mul(h.height).ok_or_else(|| {
            EngineError::MarshalMismatch(format!("{}x{} pixel count overflows", h.width, h.height))
        })
    }

    fn find_overlap(&mut self, env: &mut dyn Imports, a: EngineBuffer, b: EngineBuffer) -> Result<EngineBuffer> {
        search::find_overlap(self, env, a, b)
    }

    fn mip(&mut self, env: &mut dyn Imports, buffer: EngineBuffer) -> Result<EngineBuffer> {
        self.mip_buffer(env, buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{marshal, Host, PixelImage};

    fn setup() -> (Host, NativeModule) {
        let mut host = Host::new(LinearMemory::new(2, 1024).unwrap());
        let module = NativeModule::instantiate(&mut host).unwrap();
        (host, module)
    }

    // ── buffers ───────────────────────────────────────────────────────────

    #[test]
    fn input_buffers_are_tight() {
        let (mut host, mut module) = setup();
        let buf = module.create_image_buffer(&mut host, 5, 3).unwrap();
        assert_eq!(buf.addr(), HEAP_BASE);
        assert_eq!(module.pitch(host.memory(), buf).unwrap(), 5);
        assert_eq!(module.num_pixels(host.memory(), buf).unwrap(), 15);
        assert_eq!(module.pixels(host.memory(), buf).unwrap(), HEAP_BASE + 16);
    }

    #[test]
    fn padded_buffers_round_pitch_up() {
        let (mut host, mut module) = setup();
        let buf = module.create_padded_buffer(&mut host, 13, 2).unwrap();
        assert_eq!(module.width(host.memory(), buf).unwrap(), 13);
        assert_eq!(module.pitch(host.memory(), buf).unwrap(), 16);
    }

    #[test]
    fn reset_reuses_the_heap() {
        let (mut host, mut module) = setup();
        module.create_image_buffer(&mut host, 8, 8).unwrap();
        module.reset(&mut host);
        let buf = module.create_image_buffer(&mut host, 1, 1).unwrap();
        assert_eq!(buf.addr(), HEAP_BASE);
    }

    #[test]
    fn padded_buffer_reads_back_through_pitch() {
        let (mut host, mut module) = setup();
        let buf = module.create_padded_buffer(&mut host, 3, 2).unwrap();
        let base = module.pixels(host.memory(), buf).unwrap() as usize / 4;
        let pitch = module.pitch(host.memory(), buf).unwrap() as usize;
        {
            let words = host.memory_mut().words_mut();
            for y in 0..2 {
                for x in 0..3 {
                    words[base + y * pitch + x] = u32::from_ne_bytes([x as u8, y as u8, 7, 255]);
                }
                // Poison the padding; it must never show up in the output.
                for x in 3..pitch {
                    words[base + y * pitch + x] = u32::MAX;
                }
            }
        }
        let img = marshal::marshal_out(&module, host.memory(), buf).unwrap();
        let expected = PixelImage::from_fn(3, 2, |x, y| [x as u8, y as u8, 7, 255]).unwrap();
        assert_eq!(img, expected);
    }

    // ── mip ───────────────────────────────────────────────────────────────

    #[test]
    fn mip_halves_and_rounds_up() {
        let (mut host, mut module) = setup();
        let img = PixelImage::filled(5, 3, [200, 100, 50, 255]).unwrap();
        let buf = marshal::marshal_in(&mut module, &mut host, &img).unwrap();
        let half = module.mip(&mut host, buf).unwrap();
        let out = marshal::marshal_out(&module, host.memory(), half).unwrap();
        assert_eq!(out.dimensions(), (3, 2));
        assert_eq!(out.pixel(2, 1), Some([200, 100, 50, 255]));
    }

    #[test]
    fn mip_averages_two_by_two_blocks() {
        let (mut host, mut module) = setup();
        let img = PixelImage::from_fn(2, 2, |x, y| [((x + 2 * y) * 40) as u8, 0, 0, 255]).unwrap();
        let buf = marshal::marshal_in(&mut module, &mut host, &img).unwrap();
        let half = module.mip(&mut host, buf).unwrap();
        let out = marshal::marshal_out(&module, host.memory(), half).unwrap();
        // (0 + 40 + 80 + 120) / 4
        assert_eq!(out.pixel(0, 0), Some([60, 0, 0, 255]));
    }
}
