//! Input subsystem.
//!
//! Public API is platform-agnostic. Whatever delivers events (a browser-like
//! host, a native window, a test) translates them into these types first.

mod state;
mod types;

pub use state::PointerMap;
pub use types::{
    MouseButton,
    MouseWheelDelta,
    PointerEvent,
    PointerId,
    PointerKind,
    WheelEvent,
};
