//! Cursor compositor: draws the pointer glyph into captured frames.
//!
//! The capture sources never include the system cursor, so the recorder
//! paints a small ring where the pointer is when the frame is taken.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};
use reelcap_platform_core::{CaptureRegion, Frame, PointerSource};

pub const CURSOR_OUTER_RADIUS: i32 = 5;
pub const CURSOR_INNER_RADIUS: i32 = 3;

const OUTLINE: Rgba<u8> = Rgba([0, 0, 0, 255]);
const FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Draw the glyph at `global` if it lies inside `region`.
///
/// Returns `true` when something was drawn. Parts of the glyph that fall
/// past the frame edge are clipped.
pub fn draw_cursor_glyph(image: &mut RgbaImage, region: &CaptureRegion, global: (i32, i32)) -> bool {
    let Some((x, y)) = region.to_relative(global.0, global.1) else {
        return false;
    };
    let center = (x as i32, y as i32);
    draw_hollow_circle_mut(image, center, CURSOR_OUTER_RADIUS, OUTLINE);
    draw_filled_circle_mut(image, center, CURSOR_INNER_RADIUS, FILL);
    true
}

/// Samples the pointer and overlays it onto frames of one session.
pub struct CursorCompositor {
    pointer: Arc<dyn PointerSource>,
    enabled: bool,
    pointer_failures: u64,
}

impl CursorCompositor {
    pub fn new(pointer: Arc<dyn PointerSource>, enabled: bool) -> Self {
        Self {
            pointer,
            enabled,
            pointer_failures: 0,
        }
    }

    /// Overlay the pointer onto `frame`. Pointer read failures are swallowed;
    /// the frame is left unmodified.
    pub fn overlay(&mut self, frame: &mut Frame, region: &CaptureRegion) -> bool {
        if !self.enabled {
            return false;
        }

        match self.pointer.position() {
            Ok(position) => draw_cursor_glyph(&mut frame.image, region, position),
            Err(e) => {
                self.pointer_failures += 1;
                if self.pointer_failures == 1 {
                    tracing::warn!(
                        pointer = self.pointer.name(),
                        error = %e,
                        "Pointer unavailable; frames will be recorded without a cursor"
                    );
                } else {
                    tracing::trace!(error = %e, "Pointer read failed");
                }
                false
            }
        }
    }

    pub fn pointer_failures(&self) -> u64 {
        self.pointer_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcap_common::error::{ReelcapError, ReelcapResult};

    struct FixedPointer(Option<(i32, i32)>);

    impl PointerSource for FixedPointer {
        fn position(&self) -> ReelcapResult<(i32, i32)> {
            self.0
                .ok_or_else(|| ReelcapError::platform("no pointer in test"))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn blank(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
    }

    #[test]
    fn glyph_is_drawn_relative_to_region_origin() {
        let region = CaptureRegion::new(100, 50, 40, 40).unwrap();
        let mut image = blank(40, 40);
        assert!(draw_cursor_glyph(&mut image, &region, (120, 70)));
        assert_eq!(*image.get_pixel(20, 20), FILL);
        assert_eq!(*image.get_pixel(25, 20), OUTLINE);
        assert_eq!(*image.get_pixel(0, 0), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn pointer_outside_region_leaves_frame_untouched() {
        let region = CaptureRegion::new(100, 50, 40, 40).unwrap();
        let mut image = blank(40, 40);
        let before = image.clone();
        assert!(!draw_cursor_glyph(&mut image, &region, (140, 70)));
        assert!(!draw_cursor_glyph(&mut image, &region, (99, 70)));
        assert_eq!(image, before);
    }

    #[test]
    fn glyph_near_edge_is_clipped() {
        let region = CaptureRegion::new(0, 0, 20, 20).unwrap();
        let mut image = blank(20, 20);
        assert!(draw_cursor_glyph(&mut image, &region, (0, 19)));
        assert_eq!(*image.get_pixel(0, 19), FILL);
    }

    #[test]
    fn compositor_respects_toggle_and_swallows_errors() {
        let region = CaptureRegion::new(0, 0, 20, 20).unwrap();

        let mut frame = Frame::new(blank(20, 20));
        let mut disabled = CursorCompositor::new(Arc::new(FixedPointer(Some((5, 5)))), false);
        assert!(!disabled.overlay(&mut frame, &region));

        let mut broken = CursorCompositor::new(Arc::new(FixedPointer(None)), true);
        assert!(!broken.overlay(&mut frame, &region));
        assert!(!broken.overlay(&mut frame, &region));
        assert_eq!(broken.pointer_failures(), 2);
        assert_eq!(frame.image, blank(20, 20));

        let mut working = CursorCompositor::new(Arc::new(FixedPointer(Some((5, 5)))), true);
        assert!(working.overlay(&mut frame, &region));
        assert_eq!(*frame.image.get_pixel(5, 5), FILL);
    }

    proptest::proptest! {
        #[test]
        fn glyph_is_drawn_only_inside_region(px in -60i32..60, py in -60i32..60) {
            let region = CaptureRegion::new(-10, -10, 30, 30).unwrap();
            let mut image = blank(30, 30);
            let inside = (-10..20).contains(&px) && (-10..20).contains(&py);
            proptest::prop_assert_eq!(draw_cursor_glyph(&mut image, &region, (px, py)), inside);
            if !inside {
                proptest::prop_assert_eq!(image, blank(30, 30));
            }
        }
    }
}
