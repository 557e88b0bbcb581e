use stitch_engine::input::{PointerEvent, WheelEvent};

/// Input routed to the viewport, in viewport-local logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportEvent {
    /// Contact started. Registers (captures) the pointer.
    PointerDown(PointerEvent),
    /// A registered pointer moved. Unregistered pointers are ignored.
    PointerMove(PointerEvent),
    PointerUp(PointerEvent),
    /// The platform took the contact away (e.g. a system gesture).
    PointerCancel(PointerEvent),
    /// Wheel / trackpad scroll; zooms around the cursor.
    Wheel(WheelEvent),
}

/// Whether the viewport handled an event.
///
/// `Consumed` means the caller should suppress the platform default and, for
/// pointer-down, keep routing that pointer here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Consumed,
    Ignored,
}

impl EventResult {
    #[inline]
    pub fn is_consumed(self) -> bool {
        self == EventResult::Consumed
    }
}
