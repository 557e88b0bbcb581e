use crate::coords::Vec2;

/// Stable identifier of one pointer (mouse, finger, pen) for the lifetime of a contact.
pub type PointerId = u64;

/// Mouse button identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

/// Device class that produced a pointer event.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

/// One pointer sample in viewport-local logical pixels.
///
/// `button` is the button whose state changed on down/up events; it is `None` for
/// moves and for contacts without buttons (touch).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerEvent {
    pub id: PointerId,
    pub kind: PointerKind,
    pub button: Option<MouseButton>,
    pub pos: Vec2,
    /// Milliseconds on any monotonic clock chosen by the event source.
    pub timestamp_ms: f64,
}

impl PointerEvent {
    pub fn new(id: PointerId, kind: PointerKind, pos: Vec2) -> Self {
        Self {
            id,
            kind,
            button: None,
            pos,
            timestamp_ms: 0.0,
        }
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = Some(button);
        self
    }

    pub fn at_time(mut self, timestamp_ms: f64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    /// A mouse press with anything other than the primary button.
    ///
    /// Such presses never start a gesture. Touch and pen contacts always count as primary.
    pub fn is_non_primary_mouse_button(&self) -> bool {
        self.kind == PointerKind::Mouse && matches!(self.button, Some(b) if b != MouseButton::Left)
    }
}

/// Mouse wheel delta.
///
/// `Line` corresponds to "scroll lines" style input; `Pixel` is high precision.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum MouseWheelDelta {
    Line { x: f64, y: f64 },
    Pixel { x: f64, y: f64 },
}

impl MouseWheelDelta {
    /// Vertical delta in pixels; line deltas are scaled by `line_height_px`.
    pub fn y_pixels(&self, line_height_px: f64) -> f64 {
        match *self {
            MouseWheelDelta::Line { y, .. } => y * line_height_px,
            MouseWheelDelta::Pixel { y, .. } => y,
        }
    }
}

/// Wheel event at a cursor position in viewport-local logical pixels.
///
/// Positive `y` deltas scroll toward the user ("down").
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WheelEvent {
    pub pos: Vec2,
    pub delta: MouseWheelDelta,
}
