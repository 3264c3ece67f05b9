// ============================================================================
// CLIPBOARD — one copied raster plus the in-progress paste cursor
// ============================================================================

use image::RgbaImage;

use crate::geometry::PixelRect;
use crate::surface::DrawContext;

/// The copied pixels and where on the canvas they came from.
#[derive(Clone, Debug)]
pub struct Clipboard {
    pub image: RgbaImage,
    pub x: i32,
    pub y: i32,
}

/// Holds the clipboard and, while a paste is in progress, where the pasted
/// pixels currently sit on the overlay.
#[derive(Default)]
pub struct CopyManager {
    clipboard: Option<Clipboard>,
    /// Committed paste position. `Some` while pasting.
    cursor: Option<(i32, i32)>,
    /// Position last drawn, which may be ahead of `cursor` during a drag.
    drawn_at: Option<(i32, i32)>,
}

impl CopyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the clipboard with `w × h` pixels of `src` at `(x, y)`, clamped
    /// to the source bounds. Returns `false` (clipboard untouched) when
    /// nothing of the rectangle lies on the source.
    pub fn set_copy(&mut self, src: &RgbaImage, x: i32, y: i32, w: i32, h: i32) -> bool {
        let Some(r) = PixelRect::new(x, y, w, h).clamp_to(src.width(), src.height()) else {
            return false;
        };
        let image = image::imageops::crop_imm(src, r.x as u32, r.y as u32, r.w as u32, r.h as u32).to_image();
        log_info!("CopyManager: copied {}x{} at ({}, {})", r.w, r.h, r.x, r.y);
        self.clipboard = Some(Clipboard { image, x: r.x, y: r.y });
        true
    }

    /// Enter paste mode at the clipboard's original position and draw it on
    /// `dest`. Returns `false` if there is nothing to paste.
    pub fn start_paste(&mut self, dest: &mut DrawContext) -> bool {
        let Some(clip) = self.clipboard.as_ref() else {
            return false;
        };
        dest.clear();
        dest.draw_image(&clip.image, clip.x, clip.y);
        self.cursor = Some((clip.x, clip.y));
        self.drawn_at = self.cursor;
        true
    }

    /// Redraw the paste at cursor + `(dx, dy)`. With `finalize` that position
    /// becomes the new cursor, so later relative moves compose.
    pub fn move_paste(&mut self, dest: &mut DrawContext, dx: i32, dy: i32, finalize: bool) -> bool {
        let (Some(clip), Some((cx, cy))) = (self.clipboard.as_ref(), self.cursor) else {
            return false;
        };
        let (nx, ny) = (cx + dx, cy + dy);
        dest.clear();
        dest.draw_image(&clip.image, nx, ny);
        self.drawn_at = Some((nx, ny));
        if finalize {
            self.cursor = Some((nx, ny));
        }
        true
    }

    /// Leave paste mode. The overlay is the caller's to clear.
    pub fn end_paste(&mut self) {
        self.cursor = None;
        self.drawn_at = None;
    }

    /// Footprint of the paste as currently drawn.
    pub fn paste_area(&self) -> Option<PixelRect> {
        let clip = self.clipboard.as_ref()?;
        let (x, y) = self.drawn_at?;
        Some(PixelRect::new(x, y, clip.image.width() as i32, clip.image.height() as i32))
    }

    /// Whether the paste footprint intersects `area`.
    pub fn overlaps_paste(&self, area: &PixelRect) -> bool {
        self.paste_area().is_some_and(|p| p.overlaps(area))
    }

    pub fn is_pasting(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn has_copy(&self) -> bool {
        self.clipboard.is_some()
    }

    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    /// Committed paste position.
    pub fn cursor(&self) -> Option<(i32, i32)> {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{PaintState, StampMode, Surface};
    use image::Rgba;

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, y| {
            if (x + y) % 2 == 0 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) }
        })
    }

    #[test]
    fn set_copy_clamps_to_source() {
        let mut cm = CopyManager::new();
        assert!(cm.set_copy(&checker(), 8, 8, 5, 5));
        let clip = cm.clipboard().unwrap();
        assert_eq!(clip.image.dimensions(), (2, 2));
        assert_eq!((clip.x, clip.y), (8, 8));
        assert!(!cm.set_copy(&checker(), 20, 20, 5, 5));
        assert!(cm.has_copy());
    }

    #[test]
    fn move_paste_composes_after_finalize() {
        let mut cm = CopyManager::new();
        cm.set_copy(&checker(), 0, 0, 2, 2);
        let mut overlay = Surface::new(10, 10);
        let mut ctx = DrawContext::new(&mut overlay, PaintState::default(), None, StampMode::MaxAlpha);

        assert!(cm.start_paste(&mut ctx));
        assert!(cm.move_paste(&mut ctx, 3, 0, true));
        assert!(cm.move_paste(&mut ctx, 0, 2, false));
        assert_eq!(cm.cursor(), Some((3, 0)));
        assert_eq!(cm.paste_area(), Some(PixelRect::new(3, 2, 2, 2)));
        assert!(cm.overlaps_paste(&PixelRect::new(4, 3, 1, 1)));
        assert!(!cm.overlaps_paste(&PixelRect::new(0, 0, 3, 2)));
        drop(ctx);

        assert_eq!(overlay.get_pixel(3, 2), Rgba([255, 255, 255, 255]));
        assert_eq!(overlay.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn end_paste_leaves_paste_mode() {
        let mut cm = CopyManager::new();
        let mut overlay = Surface::new(4, 4);
        let mut ctx = DrawContext::new(&mut overlay, PaintState::default(), None, StampMode::MaxAlpha);
        assert!(!cm.start_paste(&mut ctx));
        cm.set_copy(&checker(), 0, 0, 1, 1);
        assert!(cm.start_paste(&mut ctx));
        assert!(cm.is_pasting());
        cm.end_paste();
        assert!(!cm.is_pasting());
        assert!(cm.paste_area().is_none());
    }
}
