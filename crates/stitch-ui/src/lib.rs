//! Stitch UI: everything between raw input and the engine's worker.
//!
//! - [`scroll_zoom`]: the viewport transform engine (pan, pinch, wheel zoom)
//! - [`painter`]: software rendering of the displayed image through the view
//! - [`collection`]: the selectable image list
//! - [`coordinator`]: turns a two-image selection into one worker request

pub mod collection;
pub mod coordinator;
pub mod event;
pub mod painter;
pub mod scroll_zoom;

/// Common imports for front ends.
pub mod prelude {
    pub use crate::collection::{ImageCollection, SelectableImage};
    pub use crate::coordinator::{CoordinatorEvent, StitchCoordinator};
    pub use crate::event::{EventResult, ViewportEvent};
    pub use crate::painter::ViewportPainter;
    pub use crate::scroll_zoom::{Geometry, ScrollZoom, ViewportConfig};

    pub use stitch_engine::coords::{Size, Vec2};
    pub use stitch_engine::host::PixelImage;
    pub use stitch_engine::input::{MouseButton, MouseWheelDelta, PointerEvent, PointerKind, WheelEvent};
    pub use stitch_engine::transform::Mat4;
}
