use super::error::{EngineError, Result};
use super::image::PixelImage;
use super::imports::{Host, Imports, OverlapResult, ProgressSink};
use super::marshal;
use super::memory::{LinearMemory, PAGE_SIZE};
use super::module::{ComputeModule, EngineBuffer};

/// Linear memory configuration for one compute-module instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Pages available before the module asks for more.
    pub initial_pages: usize,
    /// Growth ceiling; requests beyond it fail with `EngineError::Allocation`.
    pub max_pages: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            initial_pages: 2,
            // 1 GiB
            max_pages: 16384,
        }
    }
}

impl HostConfig {
    /// Caps linear memory at `mib` MiB (rounded up to whole pages).
    pub fn with_max_memory_mib(mut self, mib: usize) -> Self {
        self.max_pages = (mib.saturating_mul(1 << 20)).div_ceil(PAGE_SIZE);
        self
    }
}

/// Engine host bridge: sole owner of one compute-module instance.
///
/// Construct once per worker. All interaction with the module's memory goes
/// through `&mut self`, so calls are serialized by construction.
pub struct EngineHost<M> {
    host: Host,
    module: M,
}

impl<M: ComputeModule> EngineHost<M> {
    /// Sets up linear memory and instantiates the module through `load`.
    ///
    /// Any failure is reported as `EngineError::Initialization`; there is no retry.
    pub fn instantiate<F>(config: &HostConfig, load: F) -> Result<Self>
    where
        F: FnOnce(&mut dyn Imports) -> Result<M>,
    {
        let memory = LinearMemory::new(config.initial_pages, config.max_pages)
            .map_err(|e| EngineError::Initialization(e.to_string()))?;
        let mut host = Host::new(memory);

        let module = load(&mut host as &mut dyn Imports).map_err(|e| match e {
            EngineError::Initialization(_) => e,
            other => EngineError::Initialization(other.to_string()),
        })?;

        log::info!(
            "compute module ready ({} KiB linear memory, limit {} MiB)",
            host.memory().byte_len() >> 10,
            (host.memory().max_pages() * PAGE_SIZE) >> 20
        );
        Ok(Self { host, module })
    }

    /// Clears per-request module state; every outstanding `EngineBuffer` dies here.
    pub fn reset(&mut self) {
        self.module.reset(&mut self.host);
        self.host.clear_last_overlap();
    }

    pub fn marshal_in(&mut self, image: &PixelImage) -> Result<EngineBuffer> {
        marshal::marshal_in(&mut self.module, &mut self.host, image)
    }

    pub fn marshal_out(&self, buffer: EngineBuffer) -> Result<PixelImage> {
        marshal::marshal_out(&self.module, self.host.memory(), buffer)
    }

    /// Downsampled copy of `buffer`; diagnostics only.
    pub fn mip(&mut self, buffer: EngineBuffer) -> Result<EngineBuffer> {
        self.module.mip(&mut self.host, buffer)
    }

    /// Merges two images at their best alignment.
    ///
    /// Progress goes to `progress` while the call runs. The sink is dropped before
    /// this returns, whatever the outcome.
    pub fn overlap(&mut self, a: &PixelImage, b: &PixelImage, progress: Option<ProgressSink>) -> Result<PixelImage> {
        self.reset();
        self.host.begin_request(progress);
        let outcome = self.run_overlap(a, b);
        self.host.end_request();

        if let Err(e) = &outcome {
            log::warn!("overlap failed: {e}");
        }
        outcome
    }

    fn run_overlap(&mut self, a: &PixelImage, b: &PixelImage) -> Result<PixelImage> {
        let first = self.marshal_in(a)?;
        let second = self.marshal_in(b)?;
        let merged = self.module.find_overlap(&mut self.host, first, second)?;
        self.marshal_out(merged)
    }

    /// Placement recorded by the most recent `overlap` call, if the module reported one.
    pub fn last_overlap(&self) -> Option<&OverlapResult> {
        self.host.last_overlap()
    }

    /// Current linear memory capacity in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.host.memory().byte_len()
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn memory(&self) -> &LinearMemory {
        self.host.memory()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::native::NativeModule;

    fn engine(max_pages: usize) -> EngineHost<NativeModule> {
        let config = HostConfig {
            initial_pages: 1,
            max_pages,
        };
        EngineHost::instantiate(&config, NativeModule::instantiate).unwrap()
    }

    #[test]
    fn max_memory_mib_rounds_up_to_pages() {
        assert_eq!(HostConfig::default().with_max_memory_mib(1).max_pages, 16);
        assert_eq!(HostConfig::default().with_max_memory_mib(0).max_pages, 0);
    }

    #[test]
    fn progress_sink_is_dropped_after_success() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        let mut e = engine(256);
        let img = PixelImage::filled(8, 8, [1, 2, 3, 255]).unwrap();

        e.overlap(&img, &img, Some(Box::new(move |f: f64| sink_seen.borrow_mut().push(f))))
            .unwrap();

        assert!(!e.host.has_progress_sink());
        assert_eq!(seen.borrow().last().copied(), Some(1.0));
        // The sink's captured clone is gone with it.
        assert_eq!(Rc::strong_count(&seen), 1);
    }

    #[test]
    fn progress_sink_is_dropped_after_failure() {
        let mut e = engine(2);
        let big = PixelImage::filled(200, 200, [0, 0, 0, 255]).unwrap();
        let err = e.overlap(&big, &big, Some(Box::new(|_: f64| {}))).unwrap_err();
        assert!(matches!(err, EngineError::Allocation { .. }));
        assert!(!e.host.has_progress_sink());
    }

    #[test]
    fn module_failure_during_load_is_initialization() {
        let err = EngineHost::<NativeModule>::instantiate(&HostConfig::default(), |env| {
            env.set_memory_size(usize::MAX)?;
            NativeModule::instantiate(env)
        })
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Initialization(_)));
    }
}
