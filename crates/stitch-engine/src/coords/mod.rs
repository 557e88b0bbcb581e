//! Coordinate types shared by the transform library and the viewport engine.
//!
//! Canonical space:
//! - Viewport-local logical pixels
//! - Origin top-left
//! - +X right, +Y down
//!
//! Double precision is used throughout so that repeated gesture updates do not
//! drift visibly over a long pan/zoom session.

mod size;
mod vec2;

pub use size::Size;
pub use vec2::Vec2;
