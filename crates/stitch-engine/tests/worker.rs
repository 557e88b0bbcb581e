use crossbeam_channel::{bounded, Receiver};

use stitch_engine::host::{ComputeModule, EngineBuffer, EngineError, Imports, LinearMemory, PixelImage, Result};
use stitch_engine::native::NativeModule;
use stitch_engine::worker::{StitchReply, StitchWorker, WorkerConfig};

fn red() -> PixelImage {
    PixelImage::filled(64, 64, [255, 0, 0, 255]).unwrap()
}

fn blue() -> PixelImage {
    PixelImage::filled(64, 64, [0, 0, 255, 255]).unwrap()
}

fn native_worker() -> StitchWorker {
    StitchWorker::spawn(WorkerConfig::default(), NativeModule::instantiate).unwrap()
}

/// Native module whose `find_overlap` waits for a signal first.
struct Gated {
    inner: NativeModule,
    gate: Receiver<()>,
}

impl ComputeModule for Gated {
    fn create_image_buffer(&mut self, env: &mut dyn Imports, width: u32, height: u32) -> Result<EngineBuffer> {
        self.inner.create_image_buffer(env, width, height)
    }
    fn reset(&mut self, env: &mut dyn Imports) {
        self.inner.reset(env)
    }
    fn width(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.width(memory, buffer)
    }
    fn height(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.height(memory, buffer)
    }
    fn pitch(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.pitch(memory, buffer)
    }
    fn pixels(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.pixels(memory, buffer)
    }
    fn num_pixels(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.num_pixels(memory, buffer)
    }
    fn find_overlap(&mut self, env: &mut dyn Imports, a: EngineBuffer, b: EngineBuffer) -> Result<EngineBuffer> {
        let _ = self.gate.recv();
        self.inner.find_overlap(env, a, b)
    }
    fn mip(&mut self, env: &mut dyn Imports, buffer: EngineBuffer) -> Result<EngineBuffer> {
        self.inner.mip(env, buffer)
    }
}

/// Native module whose `find_overlap` panics.
struct Faulty {
    inner: NativeModule,
}

impl ComputeModule for Faulty {
    fn create_image_buffer(&mut self, env: &mut dyn Imports, width: u32, height: u32) -> Result<EngineBuffer> {
        self.inner.create_image_buffer(env, width, height)
    }
    fn reset(&mut self, env: &mut dyn Imports) {
        self.inner.reset(env)
    }
    fn width(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.width(memory, buffer)
    }
    fn height(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.height(memory, buffer)
    }
    fn pitch(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.pitch(memory, buffer)
    }
    fn pixels(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.pixels(memory, buffer)
    }
    fn num_pixels(&self, memory: &LinearMemory, buffer: EngineBuffer) -> Result<u32> {
        self.inner.num_pixels(memory, buffer)
    }
    fn find_overlap(&mut self, _env: &mut dyn Imports, _a: EngineBuffer, _b: EngineBuffer) -> Result<EngineBuffer> {
        panic!("search table corrupted");
    }
    fn mip(&mut self, env: &mut dyn Imports, buffer: EngineBuffer) -> Result<EngineBuffer> {
        self.inner.mip(env, buffer)
    }
}

// ── protocol ──────────────────────────────────────────────────────────────

#[test]
fn progress_then_exactly_one_result() {
    let worker = native_worker();
    let mut ticket = worker.submit([red(), blue()]).unwrap();

    let mut progress = Vec::new();
    let mut results = Vec::new();
    while let Some(reply) = ticket.next_blocking() {
        match reply {
            StitchReply::Progress(f) => {
                assert!(results.is_empty(), "progress after the terminal reply");
                progress.push(f);
            }
            StitchReply::Result(image) => results.push(image),
            StitchReply::Failed(e) => panic!("overlap failed: {e}"),
        }
    }

    assert!(!progress.is_empty());
    assert!(progress.iter().all(|f| (0.0..=1.0).contains(f)));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].dimensions(), (64, 64));
    assert_eq!(ticket.try_next(), None);
}

#[test]
fn second_request_in_flight_is_rejected() {
    let (open, gate) = bounded(1);
    let worker = StitchWorker::spawn(WorkerConfig::default(), move |env: &mut dyn Imports| {
        Ok(Gated {
            inner: NativeModule::instantiate(env)?,
            gate,
        })
    })
    .unwrap();

    let first = worker.submit([red(), blue()]).unwrap();
    assert!(worker.is_busy());
    assert_eq!(worker.submit([red(), blue()]).unwrap_err(), EngineError::ProtocolViolation);

    open.send(()).unwrap();
    assert_eq!(first.wait(|_| {}).unwrap().dimensions(), (64, 64));

    // Settled: the worker takes requests again.
    assert!(!worker.is_busy());
    open.send(()).unwrap();
    let again = worker.submit([blue(), red()]).unwrap();
    assert!(again.wait(|_| {}).is_ok());
}

#[test]
fn initialization_failure_answers_every_request() {
    let worker = StitchWorker::spawn(WorkerConfig::default(), |_env: &mut dyn Imports| {
        Err::<NativeModule, _>(EngineError::Initialization("no module".into()))
    })
    .unwrap();

    for _ in 0..3 {
        let err = worker.submit([red(), blue()]).unwrap().wait(|_| {}).unwrap_err();
        assert_eq!(err, EngineError::Initialization("no module".into()));
    }
}

#[test]
fn panicking_load_is_an_initialization_failure() {
    let worker = StitchWorker::spawn(WorkerConfig::default(), |_env: &mut dyn Imports| -> Result<NativeModule> {
        panic!("module image truncated")
    })
    .unwrap();

    for _ in 0..2 {
        let err = worker.submit([red(), blue()]).unwrap().wait(|_| {}).unwrap_err();
        assert_eq!(err, EngineError::Initialization("module image truncated".into()));
        assert!(!worker.is_busy());
    }
}

#[test]
fn allocation_failure_reaches_the_ticket() {
    let mut config = WorkerConfig::default();
    config.host.initial_pages = 1;
    config.host.max_pages = 2;
    let worker = StitchWorker::spawn(config, NativeModule::instantiate).unwrap();

    let big = PixelImage::filled(256, 256, [7, 7, 7, 255]).unwrap();
    let err = worker.submit([big.clone(), big]).unwrap().wait(|_| {}).unwrap_err();
    assert!(matches!(err, EngineError::Allocation { .. }), "{err:?}");
    assert!(!worker.is_busy());
}

#[test]
fn module_panic_fails_the_request_and_retires_the_module() {
    let worker = StitchWorker::spawn(WorkerConfig::default(), |env: &mut dyn Imports| {
        Ok(Faulty {
            inner: NativeModule::instantiate(env)?,
        })
    })
    .unwrap();

    let fault = EngineError::ModuleFault("search table corrupted".into());
    let err = worker.submit([red(), blue()]).unwrap().wait(|_| {}).unwrap_err();
    assert_eq!(err, fault);
    assert!(!worker.is_busy());

    // Later requests are answered, not refused as in flight.
    for _ in 0..2 {
        let err = worker.submit([red(), blue()]).unwrap().wait(|_| {}).unwrap_err();
        assert_eq!(err, fault);
        assert!(!worker.is_busy());
    }
}

#[test]
fn dropping_the_worker_joins_it() {
    let worker = native_worker();
    let ticket = worker.submit([red(), blue()]).unwrap();
    drop(worker);
    // The in-flight request still settles before the thread exits.
    assert!(ticket.wait(|_| {}).is_ok());
}
