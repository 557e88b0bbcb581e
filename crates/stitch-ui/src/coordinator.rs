//! Request coordinator.
//!
//! Sits on the UI thread. Picks the two selected images, hands them to the
//! worker and routes what comes back: progress into a slot, the merged image
//! into the collection and the viewport.

use stitch_engine::coords::Size;
use stitch_engine::host::{EngineError, PixelImage};
use stitch_engine::worker::{StitchReply, StitchTicket, StitchWorker};

use crate::collection::ImageCollection;
use crate::scroll_zoom::ScrollZoom;

/// What a reply did to the UI state.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    Progress(f64),
    /// The merged image was appended at `index` and is now displayed.
    Finished { index: usize, width: u32, height: u32 },
    Failed(EngineError),
}

pub struct StitchCoordinator {
    worker: StitchWorker,
    pending: Option<StitchTicket>,
    progress: Option<f64>,
    displayed: Option<usize>,
}

impl StitchCoordinator {
    pub fn new(worker: StitchWorker) -> Self {
        Self {
            worker,
            pending: None,
            progress: None,
            displayed: None,
        }
    }

    /// Sends the current selection to the worker.
    ///
    /// Returns `Ok(false)` without doing anything unless exactly two images are
    /// selected. A request while another is pending is a `ProtocolViolation`.
    pub fn stitch(&mut self, collection: &ImageCollection) -> Result<bool, EngineError> {
        if self.pending.is_some() {
            log::warn!("stitch requested while a request is pending");
            return Err(EngineError::ProtocolViolation);
        }
        let Some(pair) = collection.selected_pair() else {
            log::debug!("stitch needs two selected images, have {}", collection.selected_count());
            return Ok(false);
        };
        let ticket = self.worker.submit(pair)?;
        self.pending = Some(ticket);
        self.progress = Some(0.0);
        Ok(true)
    }

    /// Applies every reply that is already waiting. Never blocks.
    pub fn poll(&mut self, collection: &mut ImageCollection, view: &mut ScrollZoom) -> Vec<CoordinatorEvent> {
        let mut events = Vec::new();
        while let Some(reply) = self.pending.as_mut().and_then(StitchTicket::try_next) {
            events.push(self.apply(reply, collection, view));
        }
        events
    }

    /// Blocks until the pending request settles.
    ///
    /// Returns the collection index of the merged image. Fails with
    /// `ProtocolViolation` if nothing is pending.
    pub fn wait(
        &mut self,
        collection: &mut ImageCollection,
        view: &mut ScrollZoom,
        mut on_progress: impl FnMut(f64),
    ) -> Result<usize, EngineError> {
        if self.pending.is_none() {
            return Err(EngineError::ProtocolViolation);
        }
        while let Some(reply) = self.pending.as_mut().and_then(StitchTicket::next_blocking) {
            match self.apply(reply, collection, view) {
                CoordinatorEvent::Progress(f) => on_progress(f),
                CoordinatorEvent::Finished { index, .. } => return Ok(index),
                CoordinatorEvent::Failed(e) => return Err(e),
            }
        }
        Err(EngineError::WorkerGone)
    }

    fn apply(&mut self, reply: StitchReply, collection: &mut ImageCollection, view: &mut ScrollZoom) -> CoordinatorEvent {
        match reply {
            StitchReply::Progress(f) => {
                self.progress = Some(f);
                CoordinatorEvent::Progress(f)
            }
            StitchReply::Result(image) => {
                self.settle();
                let (width, height) = image.dimensions();
                let index = collection.add_result(image);
                self.displayed = Some(index);
                view.set_image(Size::from((width, height)));
                log::info!("stitched {width}x{height} image added as #{index}");
                CoordinatorEvent::Finished { index, width, height }
            }
            StitchReply::Failed(e) => {
                self.settle();
                log::error!("stitch failed: {e}");
                CoordinatorEvent::Failed(e)
            }
        }
    }

    fn settle(&mut self) {
        self.pending = None;
        self.progress = None;
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Latest progress of the pending request.
    #[inline]
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// Collection index of the image in the display slot.
    #[inline]
    pub fn displayed(&self) -> Option<usize> {
        self.displayed
    }

    pub fn displayed_image<'a>(&self, collection: &'a ImageCollection) -> Option<&'a PixelImage> {
        self.displayed.and_then(|i| collection.get(i)).map(|item| item.image())
    }

    /// Puts an existing collection entry in the display slot.
    pub fn show(&mut self, index: usize, collection: &ImageCollection, view: &mut ScrollZoom) -> bool {
        let Some(item) = collection.get(index) else {
            return false;
        };
        self.displayed = Some(index);
        view.set_image(Size::from(item.image().dimensions()));
        true
    }
}
