//! Worker boundary.
//!
//! One dedicated thread owns an [`EngineHost`](crate::host::EngineHost). The UI
//! side talks to it only through channels: a request carries two images by
//! value, and replies stream back on a per-request channel.

mod protocol;
mod thread;

pub use protocol::{StitchReply, StitchRequest, StitchTicket};
pub use thread::{StitchWorker, WorkerConfig};
