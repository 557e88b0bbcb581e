use anyhow::anyhow;
use minifb::{Key, KeyRepeat, MouseMode, Window, WindowOptions};

use stitch_ui::prelude::*;

const MOUSE: u64 = 1;

/// Shows `image` in a resizable window until it is closed or Escape is pressed.
///
/// Left drag pans, the wheel zooms around the cursor, `C` re-centers.
pub fn show(title: &str, image: &PixelImage, config: ViewportConfig) -> anyhow::Result<()> {
    let (mut width, mut height) = (1024usize, 768usize);
    let mut window = Window::new(
        title,
        width,
        height,
        WindowOptions {
            resize: true,
            ..WindowOptions::default()
        },
    )
    .map_err(|e| anyhow!("opening window: {e}"))?;
    window.set_target_fps(60);

    let mut view = ScrollZoom::new(Size::new(width as f64, height as f64), config);
    view.set_image(Size::from(image.dimensions()));
    let painter = ViewportPainter::default();
    let mut frame = vec![0u32; width * height];
    let mut dragging = false;
    let mut dirty = true;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let (w, h) = window.get_size();
        if (w, h) != (width, height) && w > 0 && h > 0 {
            (width, height) = (w, h);
            frame.resize(width * height, 0);
            view.resize(Size::new(width as f64, height as f64));
            dirty = true;
        }

        let before = *view.matrix();
        if let Some((x, y)) = window.get_mouse_pos(MouseMode::Pass) {
            let pointer = PointerEvent::new(MOUSE, PointerKind::Mouse, Vec2::new(x as f64, y as f64));
            let pressed = window.get_mouse_down(minifb::MouseButton::Left);
            let event = match (dragging, pressed) {
                (false, true) => Some(ViewportEvent::PointerDown(pointer.with_button(MouseButton::Left))),
                (true, true) => Some(ViewportEvent::PointerMove(pointer)),
                (true, false) => Some(ViewportEvent::PointerUp(pointer.with_button(MouseButton::Left))),
                (false, false) => None,
            };
            if let Some(event) = event {
                view.handle(&event);
            }
            dragging = pressed;

            if let Some((_, scroll)) = window.get_scroll_wheel() {
                // minifb reports wheel-up as positive; the viewport expects the opposite.
                view.handle(&ViewportEvent::Wheel(WheelEvent {
                    pos: pointer.pos,
                    delta: MouseWheelDelta::Line { x: 0.0, y: -scroll as f64 },
                }));
            }
        }
        if window.is_key_pressed(Key::C, KeyRepeat::No) {
            view.center_image();
        }
        dirty |= *view.matrix() != before;

        if dirty {
            painter.paint(Some(image), view.matrix(), &mut frame, width, height);
            window
                .update_with_buffer(&frame, width, height)
                .map_err(|e| anyhow!("presenting frame: {e}"))?;
            dirty = false;
        } else {
            window.update();
        }
    }
    Ok(())
}
