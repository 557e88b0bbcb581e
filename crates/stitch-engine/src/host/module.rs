use super::error::Result;
use super::imports::Imports;
use super::memory::LinearMemory;

/// Handle to an image living in the compute module's linear memory.
///
/// The value is a byte address chosen by the module. Handles are owned by the
/// module and become dangling after [`ComputeModule::reset`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EngineBuffer(pub u32);

impl EngineBuffer {
    #[inline]
    pub fn addr(self) -> u32 {
        self.0
    }
}

/// Export surface of a compute module.
///
/// The host never looks inside a module; it only moves pixels through these
/// calls. Calls that may allocate or report back receive the import surface.
/// Modules are not reentrant: the host issues one call at a time.
pub trait ComputeModule {
    /// Allocates a `width × height` buffer ready to receive pixels.
    fn create_image_buffer(&mut self, env: &mut dyn Imports, width: u32, height: u32) -> Result<EngineBuffer>;

    /// Drops all per-request state, invalidating every outstanding buffer.
    fn reset(&mut self, env: &mut dyn Imports);

    fn width(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32>;

    fn height(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32>;

    /// Row stride in pixels; at least `width`.
    fn pitch(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32>;

    /// Byte address of the first pixel.
    fn pixels(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32>;

    /// `width × height`, ignoring padding.
    fn num_pixels(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32>;

    /// Aligns `b` against `a` and returns the merged image.
    fn find_overlap(&mut self, env: &mut dyn Imports, a: EngineBuffer, b: EngineBuffer) -> Result<EngineBuffer>;

    /// Half-resolution copy of `buffer`.
    fn mip(&mut self, env: &mut dyn Imports, buffer: EngineBuffer) -> Result<EngineBuffer>;
}
