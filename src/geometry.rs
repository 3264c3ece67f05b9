// ============================================================================
// PIXEL RECTANGLES — dirty rects and clip regions in canvas-pixel space
// ============================================================================

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in canvas-pixel space.
///
/// Callers may hand in negative widths/heights (a drag that went up or left);
/// every consumer calls [`PixelRect::normalized`] before using one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// The full `0, 0, width, height` rectangle of a surface.
    pub fn bounds(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Rectangle spanning two arbitrary corners (exclusive far edge).
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
    }

    /// Flip negative extents so that `w` and `h` are never negative.
    pub fn normalized(self) -> Self {
        let (x, w) = if self.w < 0 { (self.x + self.w, -self.w) } else { (self.x, self.w) };
        let (y, h) = if self.h < 0 { (self.y + self.h, -self.h) } else { (self.y, self.h) };
        Self { x, y, w, h }
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() { 0 } else { self.w as i64 * self.h as i64 }
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && py >= self.y && px < self.right() && py < self.bottom()
    }

    /// Overlapping part of two (normalized) rectangles, `None` when disjoint.
    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let a = self.normalized();
        let b = other.normalized();
        let x0 = a.x.max(b.x);
        let y0 = a.y.max(b.y);
        let x1 = a.right().min(b.right());
        let y1 = a.bottom().min(b.bottom());
        if x1 > x0 && y1 > y0 {
            Some(PixelRect::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }

    pub fn overlaps(&self, other: &PixelRect) -> bool {
        self.intersect(other).is_some()
    }

    /// Smallest rectangle covering both. Empty inputs are ignored.
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        let a = self.normalized();
        let b = other.normalized();
        if a.is_empty() {
            return b;
        }
        if b.is_empty() {
            return a;
        }
        let x0 = a.x.min(b.x);
        let y0 = a.y.min(b.y);
        let x1 = a.right().max(b.right());
        let y1 = a.bottom().max(b.bottom());
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Grow by `by` pixels on every side.
    pub fn expand(&self, by: i32) -> PixelRect {
        let r = self.normalized();
        PixelRect::new(r.x - by, r.y - by, r.w + by * 2, r.h + by * 2)
    }

    pub fn translate(&self, dx: i32, dy: i32) -> PixelRect {
        PixelRect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Clamp to a `width`×`height` surface, `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        self.intersect(&PixelRect::bounds(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_negative_extents() {
        let r = PixelRect::new(10, 10, -4, -6).normalized();
        assert_eq!(r, PixelRect::new(6, 4, 4, 6));
    }

    #[test]
    fn intersect_and_union() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), Some(PixelRect::new(5, 5, 5, 5)));
        assert_eq!(a.union(&b), PixelRect::new(0, 0, 15, 15));
        assert!(a.intersect(&PixelRect::new(10, 0, 5, 5)).is_none());
    }

    #[test]
    fn union_ignores_empty() {
        let a = PixelRect::new(3, 3, 2, 2);
        assert_eq!(a.union(&PixelRect::default()), a);
        assert_eq!(PixelRect::default().union(&a), a);
    }

    #[test]
    fn clamp_to_surface() {
        let r = PixelRect::new(-5, -5, 10, 10);
        assert_eq!(r.clamp_to(100, 100), Some(PixelRect::new(0, 0, 5, 5)));
        assert_eq!(PixelRect::new(-1000, -1000, 10, 10).clamp_to(100, 100), None);
    }

    #[test]
    fn corners_are_order_independent() {
        assert_eq!(
            PixelRect::from_corners(20, 30, 5, 2),
            PixelRect::from_corners(5, 2, 20, 30)
        );
        assert_eq!(PixelRect::from_corners(20, 30, 5, 2), PixelRect::new(5, 2, 15, 28));
    }
}
