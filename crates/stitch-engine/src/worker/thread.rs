use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver, Sender};

use super::protocol::{StitchReply, StitchRequest, StitchTicket};
use crate::host::{ComputeModule, EngineError, EngineHost, HostConfig, Imports, PixelImage, ProgressSink, Result};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub thread_name: String,
    pub host: HostConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "stitch-worker".to_string(),
            host: HostConfig::default(),
        }
    }
}

/// Handle to the worker thread.
///
/// At most one request is in flight; [`StitchWorker::submit`] refuses a second
/// one with `ProtocolViolation`. Dropping the handle closes the request channel
/// and joins the thread.
pub struct StitchWorker {
    requests: Option<Sender<StitchRequest>>,
    busy: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StitchWorker {
    /// Starts the worker thread and instantiates the module on it with `load`.
    ///
    /// Instantiation happens on the worker, so a failure does not surface here:
    /// it is cached and returned as the reply to every request. A panic in
    /// `load` counts as such a failure; a panic inside a request is answered
    /// with `ModuleFault`, which is then cached the same way.
    pub fn spawn<M, F>(config: WorkerConfig, load: F) -> anyhow::Result<Self>
    where
        M: ComputeModule + 'static,
        F: FnOnce(&mut dyn Imports) -> Result<M> + Send + 'static,
    {
        let (tx, rx) = unbounded::<StitchRequest>();
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);
        let host_config = config.host.clone();

        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let engine = panic::catch_unwind(AssertUnwindSafe(|| EngineHost::instantiate(&host_config, load)))
                    .unwrap_or_else(|payload| Err(EngineError::Initialization(panic_message(&*payload))));
                if let Err(e) = &engine {
                    log::error!("worker has no compute module: {e}");
                }
                serve(engine, rx, &worker_busy);
            })
            .with_context(|| format!("spawning worker thread `{}`", config.thread_name))?;

        log::info!("started {}", config.thread_name);
        Ok(Self {
            requests: Some(tx),
            busy,
            thread: Some(thread),
        })
    }

    /// Sends two images for merging.
    pub fn submit(&self, images: [PixelImage; 2]) -> Result<StitchTicket> {
        // A dead thread can leave `busy` set; report it as gone, not busy.
        if self.thread.as_ref().is_none_or(JoinHandle::is_finished) {
            return Err(EngineError::WorkerGone);
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(EngineError::ProtocolViolation);
        }
        let (reply, replies) = unbounded();
        let sent = self
            .requests
            .as_ref()
            .map(|tx| tx.send(StitchRequest { images, reply }).is_ok())
            .unwrap_or(false);
        if !sent {
            self.busy.store(false, Ordering::Release);
            return Err(EngineError::WorkerGone);
        }
        Ok(StitchTicket::new(replies))
    }

    /// Whether a request is in flight.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for StitchWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("stitch worker panicked");
            }
        }
    }
}

/// Clears the single-flight flag when dropped, including during unwinding.
struct ClearOnDrop<'a>(&'a AtomicBool);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn serve<M: ComputeModule>(
    mut engine: Result<EngineHost<M>>,
    requests: Receiver<StitchRequest>,
    busy: &AtomicBool,
) {
    for StitchRequest { images: [a, b], reply } in requests.iter() {
        let in_flight = ClearOnDrop(busy);
        log::debug!(
            "overlap request {}x{} + {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        );

        let mut fault = None;
        let terminal = match &mut engine {
            Ok(host) => {
                let progress = reply.clone();
                let sink: ProgressSink = Box::new(move |f| {
                    // A dropped ticket only means nobody is listening.
                    let _ = progress.send(StitchReply::Progress(f));
                });
                // Module state after a panic is unknown, so the host is retired.
                match panic::catch_unwind(AssertUnwindSafe(|| host.overlap(&a, &b, Some(sink)))) {
                    Ok(Ok(image)) => {
                        if let Some(placed) = host.last_overlap() {
                            log::info!(
                                "merged at ({}, {}) over {}x{}, score {}",
                                placed.x,
                                placed.y,
                                placed.width,
                                placed.height,
                                placed.score
                            );
                        }
                        StitchReply::Result(image)
                    }
                    Ok(Err(e)) => StitchReply::Failed(e),
                    Err(payload) => {
                        let e = EngineError::ModuleFault(panic_message(&*payload));
                        log::error!("{e}");
                        fault = Some(e.clone());
                        StitchReply::Failed(e)
                    }
                }
            }
            Err(e) => StitchReply::Failed(e.clone()),
        };
        if let Some(e) = fault {
            engine = Err(e);
        }

        // Cleared first: whoever sees the terminal reply may submit again.
        drop(in_flight);
        if reply.send(terminal).is_err() {
            log::debug!("reply dropped, ticket is gone");
        }
    }
    log::debug!("request channel closed, worker exiting");
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::RecvError;

    use super::*;
    use crate::native::NativeModule;

    fn pair() -> [PixelImage; 2] {
        [
            PixelImage::filled(32, 32, [200, 10, 10, 255]).unwrap(),
            PixelImage::filled(32, 32, [10, 10, 200, 255]).unwrap(),
        ]
    }

    /// Runs `serve` to completion on the calling thread for one request and
    /// returns every reply up to the terminal one plus the raw reply channel.
    fn serve_one<M: ComputeModule>(
        engine: Result<EngineHost<M>>,
        busy: &AtomicBool,
    ) -> (Vec<StitchReply>, Receiver<StitchReply>) {
        let (requests, incoming) = unbounded();
        let (reply, replies) = unbounded();
        busy.store(true, Ordering::Release);
        requests.send(StitchRequest { images: pair(), reply }).unwrap();
        drop(requests);

        serve(engine, incoming, busy);

        let mut seen = Vec::new();
        loop {
            let next = replies.recv().unwrap();
            let terminal = next.is_terminal();
            seen.push(next);
            if terminal {
                break;
            }
        }
        (seen, replies)
    }

    // ── terminal reply ────────────────────────────────────────────────────

    #[test]
    fn nothing_is_sent_after_the_result() {
        let busy = AtomicBool::new(false);
        let engine = EngineHost::instantiate(&HostConfig::default(), NativeModule::instantiate);
        let (seen, replies) = serve_one(engine, &busy);

        let (last, progress) = seen.split_last().unwrap();
        assert!(matches!(last, StitchReply::Result(_)));
        assert!(!progress.is_empty());
        assert!(progress.iter().all(|r| matches!(r, StitchReply::Progress(_))));
        // Both senders are gone once `serve` returns; a stray reply would show here.
        assert_eq!(replies.recv(), Err(RecvError));
        assert!(!busy.load(Ordering::Acquire));
    }

    #[test]
    fn cached_init_error_is_the_only_reply() {
        let busy = AtomicBool::new(false);
        let engine: Result<EngineHost<NativeModule>> = Err(EngineError::Initialization("absent".into()));
        let (seen, replies) = serve_one(engine, &busy);

        assert_eq!(seen, vec![StitchReply::Failed(EngineError::Initialization("absent".into()))]);
        assert_eq!(replies.recv(), Err(RecvError));
        assert!(!busy.load(Ordering::Acquire));
    }

    // ── panics ────────────────────────────────────────────────────────────

    #[test]
    fn panic_message_reads_str_and_string() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&7_u8), "non-string panic payload");
    }

    #[test]
    fn flag_guard_clears_while_unwinding() {
        let busy = AtomicBool::new(true);
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _in_flight = ClearOnDrop(&busy);
            panic!("mid-request");
        }));
        assert!(unwound.is_err());
        assert!(!busy.load(Ordering::Acquire));
    }
}
