use crossbeam_channel::{Receiver, RecvError, Sender, TryRecvError};

use crate::host::{EngineError, PixelImage, Result};

/// One overlap request: two images moved across the boundary plus the channel
/// that receives every reply for it.
#[derive(Debug)]
pub struct StitchRequest {
    pub images: [PixelImage; 2],
    pub reply: Sender<StitchReply>,
}

/// Messages sent back for a request.
///
/// Zero or more `Progress`, then exactly one of `Result` / `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum StitchReply {
    Progress(f64),
    Result(PixelImage),
    Failed(EngineError),
}

impl StitchReply {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StitchReply::Progress(_))
    }
}

/// Receiving end of one request.
///
/// Yields nothing once a terminal reply has been handed out. If the worker
/// disappears first, the ticket produces `Failed(WorkerGone)` in its place.
#[derive(Debug)]
pub struct StitchTicket {
    replies: Receiver<StitchReply>,
    finished: bool,
}

impl StitchTicket {
    pub(crate) fn new(replies: Receiver<StitchReply>) -> Self {
        Self {
            replies,
            finished: false,
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next reply if one is ready. Never blocks.
    pub fn try_next(&mut self) -> Option<StitchReply> {
        if self.finished {
            return None;
        }
        match self.replies.try_recv() {
            Ok(reply) => Some(self.observe(reply)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.observe(StitchReply::Failed(EngineError::WorkerGone))),
        }
    }

    /// Blocks until the next reply arrives.
    pub fn next_blocking(&mut self) -> Option<StitchReply> {
        if self.finished {
            return None;
        }
        match self.replies.recv() {
            Ok(reply) => Some(self.observe(reply)),
            Err(RecvError) => Some(self.observe(StitchReply::Failed(EngineError::WorkerGone))),
        }
    }

    /// Blocks until the request settles, handing progress to `on_progress`.
    pub fn wait(mut self, mut on_progress: impl FnMut(f64)) -> Result<PixelImage> {
        while let Some(reply) = self.next_blocking() {
            match reply {
                StitchReply::Progress(f) => on_progress(f),
                StitchReply::Result(image) => return Ok(image),
                StitchReply::Failed(e) => return Err(e),
            }
        }
        Err(EngineError::WorkerGone)
    }

    fn observe(&mut self, reply: StitchReply) -> StitchReply {
        if reply.is_terminal() {
            self.finished = true;
        }
        reply
    }
}
