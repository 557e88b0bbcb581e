//! Engine host bridge.
//!
//! Hosts one compute module per execution context: owns its linear memory,
//! answers its imports, and marshals images into and out of its buffers.
//!
//! | Item | Role |
//! |------|------|
//! | [`LinearMemory`] | growable, page-granular memory shared with the module |
//! | [`Imports`] / [`Host`] | the module's import surface |
//! | [`ComputeModule`] | the module's export surface |
//! | [`marshal`] | pitch-aware copies between `PixelImage` and module buffers |
//! | [`EngineHost`] | the per-worker service object tying it together |

mod error;
mod image;
mod imports;
pub mod marshal;
mod memory;
mod module;
mod service;

pub use error::{EngineError, Result};
pub use image::PixelImage;
pub use imports::{Host, Imports, OverlapResult, ProgressSink};
pub use marshal::BufferLayout;
pub use memory::{LinearMemory, MAX_PAGES, PAGE_SIZE};
pub use module::{ComputeModule, EngineBuffer};
pub use service::{EngineHost, HostConfig};
