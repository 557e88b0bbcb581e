use std::time::Instant;

use super::error::Result;
use super::memory::LinearMemory;
use super::module::EngineBuffer;
use crate::logging::MODULE_TARGET;

/// Receives progress fractions for the request currently in flight.
pub type ProgressSink = Box<dyn FnMut(f64)>;

/// Placement reported by the module through the score-dump import.
///
/// Diagnostics only: `(x, y)` is the offset of the second input relative to the
/// first, `width × height` the size of the overlapping region.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OverlapResult {
    pub score: u32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub a: EngineBuffer,
    pub b: EngineBuffer,
}

/// Import surface: everything a compute module may call back into.
///
/// This is the module's only channel to the outside world.
pub trait Imports {
    fn memory(&self) -> &LinearMemory;

    fn memory_mut(&mut self) -> &mut LinearMemory;

    /// Memory size negotiation.
    ///
    /// Grows linear memory to at least `requested_bytes` and returns the capacity
    /// afterwards. `0`, or anything not above the current size, is a pure query.
    fn set_memory_size(&mut self, requested_bytes: usize) -> Result<usize>;

    fn dump_int(&mut self, value: i32);

    fn dump_quad_int(&mut self, a: i32, b: i32, c: i32, d: i32);

    /// Records the latest placement for the host to read after the call returns.
    fn dump_score(&mut self, result: OverlapResult);

    fn report_progress(&mut self, fraction: f64);
}

/// The host side of the import surface.
///
/// Owns linear memory plus the per-request state the module reports into.
pub struct Host {
    memory: LinearMemory,
    last_overlap: Option<OverlapResult>,
    progress: Option<ProgressSink>,
    started: Option<Instant>,
}

impl Host {
    pub fn new(memory: LinearMemory) -> Self {
        Self {
            memory,
            last_overlap: None,
            progress: None,
            started: None,
        }
    }

    #[inline]
    pub fn last_overlap(&self) -> Option<&OverlapResult> {
        self.last_overlap.as_ref()
    }

    pub fn clear_last_overlap(&mut self) {
        self.last_overlap = None;
    }

    /// Routes progress to `sink` until [`Host::end_request`].
    pub fn begin_request(&mut self, sink: Option<ProgressSink>) {
        self.progress = sink;
        self.started = Some(Instant::now());
    }

    /// Drops the progress sink so nothing leaks into a later request.
    pub fn end_request(&mut self) {
        self.progress = None;
        if let Some(started) = self.started.take() {
            log::debug!("request settled after {:.1} ms", started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    #[inline]
    pub fn has_progress_sink(&self) -> bool {
        self.progress.is_some()
    }
}

impl Imports for Host {
    #[inline]
    fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    #[inline]
    fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }

    fn set_memory_size(&mut self, requested_bytes: usize) -> Result<usize> {
        let before = self.memory.byte_len();
        let after = self.memory.grow_to(requested_bytes)?;
        if after > before {
            log::debug!("grew linear memory by {} KiB", (after - before) >> 10);
        }
        if requested_bytes > 0 {
            log::trace!(
                "KiB required: {}, available: {}",
                (requested_bytes + 1023) >> 10,
                (after + 1023) >> 10
            );
        }
        Ok(after)
    }

    fn dump_int(&mut self, value: i32) {
        log::debug!(target: MODULE_TARGET, "{value}");
    }

    fn dump_quad_int(&mut self, a: i32, b: i32, c: i32, d: i32) {
        log::debug!(target: MODULE_TARGET, "{a} {b} {c} {d}");
    }

    fn dump_score(&mut self, result: OverlapResult) {
        log::debug!(
            target: MODULE_TARGET,
            "score {} at ({}, {}) overlap {}x{}",
            result.score,
            result.x,
            result.y,
            result.width,
            result.height
        );
        self.last_overlap = Some(result);
    }

    fn report_progress(&mut self, fraction: f64) {
        if let Some(started) = self.started {
            log::debug!(
                "progress {fraction:.3} after {:.1} ms",
                started.elapsed().as_secs_f64() * 1000.0
            );
        }
        if let Some(sink) = &mut self.progress {
            sink(fraction);
        }
    }
}
