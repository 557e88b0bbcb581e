//! Stitch engine crate.
//!
//! Hosts the image-merging compute module behind a worker thread and provides
//! the math shared with the UI layer.

pub mod coords;
pub mod host;
pub mod input;
pub mod logging;
pub mod native;
pub mod transform;
pub mod worker;
