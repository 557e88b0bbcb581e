//! Viewport transform engine.
//!
//! One affine matrix maps image space to viewport space. Input drives it
//! through [`reduce`], a pure function of `(matrix, pointers, event)`:
//!
//! | active pointers | gesture |
//! |---|---|
//! | 0 | idle |
//! | 1 | pan |
//! | 2 | pinch around the other pointer |
//! | 3+ | tracked, no transform change |
//!
//! Wheel events zoom around the cursor regardless of pointer count. Every
//! update ends with [`constrain`], which keeps the image from being dragged
//! past the viewport's midlines.

use stitch_engine::coords::{Size, Vec2};
use stitch_engine::input::{PointerEvent, PointerMap};
use stitch_engine::transform::Mat4;

use crate::event::{EventResult, ViewportEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    /// Wheel pixels per doubling of the zoom.
    pub wheel_step_px: f64,
    /// Pixels per line for line-based wheel deltas.
    pub line_height_px: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            wheel_step_px: 256.0,
            line_height_px: 32.0,
        }
    }
}

/// Viewport and displayed-image extents, both in logical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Geometry {
    pub viewport: Size,
    pub image: Size,
}

/// Output of one [`reduce`] step.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduced {
    pub matrix: Mat4,
    pub pointers: PointerMap,
    pub result: EventResult,
}

/// Applies one event.
pub fn reduce(
    matrix: Mat4,
    mut pointers: PointerMap,
    event: &ViewportEvent,
    geometry: Geometry,
    config: &ViewportConfig,
) -> Reduced {
    let (matrix, result) = match *event {
        ViewportEvent::PointerDown(ev) => {
            if ev.is_non_primary_mouse_button() {
                (matrix, EventResult::Ignored)
            } else {
                pointers.record(ev);
                (matrix, EventResult::Consumed)
            }
        }
        ViewportEvent::PointerMove(ev) => match pointers.get(ev.id).copied() {
            None => (matrix, EventResult::Ignored),
            Some(last) => {
                let moved = gesture(matrix, &pointers, &last, &ev);
                pointers.record(ev);
                let moved = if moved == matrix { moved } else { constrain(moved, geometry) };
                (moved, EventResult::Consumed)
            }
        },
        ViewportEvent::PointerUp(ev) | ViewportEvent::PointerCancel(ev) => {
            if pointers.release(ev.id).is_some() {
                (matrix, EventResult::Consumed)
            } else {
                (matrix, EventResult::Ignored)
            }
        }
        ViewportEvent::Wheel(wheel) => {
            let dy = wheel.delta.y_pixels(config.line_height_px);
            let factor = (-dy / config.wheel_step_px).exp2();
            let zoomed = zoom_around(matrix, wheel.pos, factor);
            (constrain(zoomed, geometry), EventResult::Consumed)
        }
    };
    Reduced { matrix, pointers, result }
}

fn gesture(matrix: Mat4, pointers: &PointerMap, last: &PointerEvent, now: &PointerEvent) -> Mat4 {
    match pointers.len() {
        1 => Mat4::translation(now.pos - last.pos) * matrix,
        2 => match pointers.other_than(now.id) {
            Some(anchor) => pinch(matrix, anchor.pos, last.pos, now.pos),
            None => matrix,
        },
        _ => matrix,
    }
}

/// Scales around the stationary pointer `anchor` by the change in distance,
/// then shifts by whatever still separates the old midpoint from the new one.
fn pinch(matrix: Mat4, anchor: Vec2, before: Vec2, now: Vec2) -> Mat4 {
    let span = (before - anchor).length();
    if span == 0.0 || !span.is_finite() {
        return matrix;
    }
    let factor = (now - anchor).length() / span;
    if !(factor.is_finite() && factor > 0.0) {
        return matrix;
    }
    let around = Mat4::scale_around(anchor, factor);
    let residual = now.midpoint(anchor) - around.transform_point(before.midpoint(anchor));
    Mat4::translation(residual) * around * matrix
}

/// `S_anchor(factor) · matrix`; degenerate factors leave `matrix` alone.
pub fn zoom_around(matrix: Mat4, anchor: Vec2, factor: f64) -> Mat4 {
    if !(factor.is_finite() && factor > 0.0) {
        return matrix;
    }
    Mat4::scale_around(anchor, factor) * matrix
}

/// Keeps the image overlapping the viewport center.
///
/// Left/top edges may not go past the vertical/horizontal midline toward the
/// right/bottom, and right/bottom edges may not go past it toward the
/// left/top. Idempotent.
pub fn constrain(mut matrix: Mat4, geometry: Geometry) -> Mat4 {
    let Geometry { viewport, image } = geometry;
    let half = viewport.center();

    if matrix.0[12] * 2.0 > viewport.width {
        matrix.set_translation_x(half.x);
    }
    if matrix.0[13] * 2.0 > viewport.height {
        matrix.set_translation_y(half.y);
    }

    let bottom_right = matrix.transform_point(Vec2::new(image.width, image.height));
    if bottom_right.x * 2.0 < viewport.width {
        matrix.translate_by(Vec2::new(half.x - bottom_right.x, 0.0));
    }
    if bottom_right.y * 2.0 < viewport.height {
        matrix.translate_by(Vec2::new(0.0, half.y - bottom_right.y));
    }
    matrix
}

/// Moves the image's on-screen center onto the viewport center.
pub fn center_image(mut matrix: Mat4, geometry: Geometry) -> Mat4 {
    let center = matrix.transform_point(geometry.image.center());
    matrix.translate_by(geometry.viewport.center() - center);
    constrain(matrix, geometry)
}

/// Stateful wrapper around [`reduce`] for an event loop.
#[derive(Debug, Clone)]
pub struct ScrollZoom {
    matrix: Mat4,
    pointers: PointerMap,
    geometry: Geometry,
    config: ViewportConfig,
}

impl ScrollZoom {
    pub fn new(viewport: Size, config: ViewportConfig) -> Self {
        Self {
            matrix: Mat4::IDENTITY,
            pointers: PointerMap::new(),
            geometry: Geometry {
                viewport,
                image: Size::default(),
            },
            config,
        }
    }

    pub fn handle(&mut self, event: &ViewportEvent) -> EventResult {
        let pointers = std::mem::take(&mut self.pointers);
        let out = reduce(self.matrix, pointers, event, self.geometry, &self.config);
        if out.matrix != self.matrix {
            log::trace!("view {}", out.matrix.to_css());
        }
        self.matrix = out.matrix;
        self.pointers = out.pointers;
        out.result
    }

    /// Shows a new image: identity, then centered.
    pub fn set_image(&mut self, image: Size) {
        self.geometry.image = image;
        self.matrix = center_image(Mat4::IDENTITY, self.geometry);
    }

    /// Swaps the image extent while keeping the current view.
    pub fn replace_image(&mut self, image: Size) {
        self.geometry.image = image;
        self.matrix = constrain(self.matrix, self.geometry);
    }

    pub fn resize(&mut self, viewport: Size) {
        self.geometry.viewport = viewport;
        self.matrix = constrain(self.matrix, self.geometry);
    }

    pub fn center_image(&mut self) {
        self.matrix = center_image(self.matrix, self.geometry);
    }

    /// Drops every tracked pointer, e.g. when the window loses focus.
    pub fn cancel_pointers(&mut self) {
        self.pointers.clear();
    }

    #[inline]
    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    #[inline]
    pub fn pointers(&self) -> &PointerMap {
        &self.pointers
    }

    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[inline]
    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    /// CSS `matrix3d(...)` of the current view.
    pub fn css(&self) -> String {
        self.matrix.to_css()
    }
}
