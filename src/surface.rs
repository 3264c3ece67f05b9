// ============================================================================
// RASTER SURFACES — pixel buffers, paint state snapshots, draw contexts
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::geometry::PixelRect;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// How new paint combines with what is already on a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompositeMode {
    /// Normal alpha blending ("blend alpha").
    #[default]
    SourceOver,
    /// Paint only lands where the destination already has coverage and keeps
    /// the destination's alpha ("destination alpha").
    SourceAtop,
}

/// Immutable snapshot of the paint properties a draw call uses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintState {
    pub colour: [u8; 3],
    /// 0.0..=1.0
    pub alpha: f32,
    pub composite: CompositeMode,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            colour: [0, 0, 0],
            alpha: 1.0,
            composite: CompositeMode::SourceOver,
        }
    }
}

impl PaintState {
    /// The paint colour with `alpha` baked into the alpha channel.
    pub fn rgba(&self) -> Rgba<u8> {
        let a = (self.alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        Rgba([self.colour[0], self.colour[1], self.colour[2], a])
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }

    pub fn with_composite(self, composite: CompositeMode) -> Self {
        Self { composite, ..self }
    }
}

// ---------------------------------------------------------------------------
//  Per-pixel blending
// ---------------------------------------------------------------------------

/// Standard "source-over" blend of `top` onto `base`, `top` additionally
/// scaled by `opacity`.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: fully opaque top at full opacity just overwrites
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let top_a = (top[3] as f32 / 255.0) * opacity.min(1.0);
    if base[3] == 0 {
        return Rgba([top[0], top[1], top[2], (top_a * 255.0 + 0.5) as u8]);
    }

    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    let mix = |b: u8, t: u8| -> u8 {
        let v = (t as f32 * top_a + b as f32 * base_a * (1.0 - top_a)) / out_a;
        (v + 0.5).clamp(0.0, 255.0) as u8
    };
    Rgba([
        mix(base[0], top[0]),
        mix(base[1], top[1]),
        mix(base[2], top[2]),
        (out_a * 255.0 + 0.5).clamp(0.0, 255.0) as u8,
    ])
}

/// "Source-atop": the colour moves toward `top` by top's alpha, the alpha
/// stays the base's. Transparent base pixels are never painted.
pub fn blend_atop(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    if base[3] == 0 || top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    let t = (top[3] as f32 / 255.0) * opacity.min(1.0);
    let mix = |b: u8, c: u8| -> u8 { (b as f32 * (1.0 - t) + c as f32 * t + 0.5) as u8 };
    Rgba([mix(base[0], top[0]), mix(base[1], top[1]), mix(base[2], top[2]), base[3]])
}

#[inline]
pub fn composite_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: CompositeMode, opacity: f32) -> Rgba<u8> {
    match mode {
        CompositeMode::SourceOver => blend_over(base, top, opacity),
        CompositeMode::SourceAtop => blend_atop(base, top, opacity),
    }
}

/// Overlay stamping: repeated dabs of the same colour raise alpha to the
/// maximum instead of stacking.
#[inline]
fn stamp_max_alpha(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if base[3] == 0 || base.0[..3] == top.0[..3] {
        Rgba([top[0], top[1], top[2], base[3].max(top[3])])
    } else {
        blend_over(base, top, 1.0)
    }
}

// ---------------------------------------------------------------------------
//  Fill primitive used by the blitter
// ---------------------------------------------------------------------------

/// Destination of a nearest-neighbour blit: anything that can fill and clear
/// axis-aligned rectangles.
pub trait FillTarget {
    fn target_size(&self) -> (u32, u32);
    /// Source-over fill of a rectangle with a single colour.
    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, colour: Rgba<u8>);
    /// Reset a rectangle to fully transparent.
    fn clear_rect(&mut self, x: i32, y: i32, w: i32, h: i32);
}

// ---------------------------------------------------------------------------
//  Surface
// ---------------------------------------------------------------------------

/// An RGBA pixel buffer plus the bounding box of everything drawn onto it
/// since it was last cleared.
#[derive(Clone, Debug)]
pub struct Surface {
    image: RgbaImage,
    touched: Option<PixelRect>,
}

impl Surface {
    /// Create a fully transparent surface. Zero dimensions are clamped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = if width == 0 || height == 0 {
            log_warn!("Surface::new: degenerate size {}x{}, clamped", width, height);
            (width.max(1), height.max(1))
        } else {
            (width, height)
        };
        Self {
            image: RgbaImage::new(width, height),
            touched: None,
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image, touched: None }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn bounds(&self) -> PixelRect {
        PixelRect::bounds(self.width(), self.height())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub(crate) fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Bounding box of pixels drawn since the last clear.
    pub fn touched(&self) -> Option<PixelRect> {
        self.touched
    }

    pub(crate) fn mark_touched(&mut self, rect: PixelRect) {
        let Some(rect) = rect.clamp_to(self.width(), self.height()) else { return };
        self.touched = Some(match self.touched {
            Some(existing) => existing.union(&rect),
            None => rect,
        });
    }

    /// Read a pixel; anything outside the surface is transparent.
    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> Rgba<u8> {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return TRANSPARENT;
        }
        *self.image.get_pixel(x as u32, y as u32)
    }

    /// Replace the whole buffer (resize / scale / crop / undo).
    pub fn replace(&mut self, image: RgbaImage) {
        self.image = image;
        self.touched = None;
    }

    /// Copy `src` into this surface, reusing the allocation when the sizes match.
    pub fn copy_from(&mut self, src: &RgbaImage) {
        if self.image.dimensions() == src.dimensions() {
            self.image.copy_from_slice(src.as_raw());
        } else {
            self.image = src.clone();
        }
        self.touched = None;
    }

    /// Clear everything drawn since the last clear.
    pub fn clear(&mut self) {
        if let Some(area) = self.touched.take() {
            self.clear_rect(area.x, area.y, area.w, area.h);
        }
    }

    /// Clear the entire buffer regardless of the touched box.
    pub fn clear_all(&mut self) {
        self.image.fill(0);
        self.touched = None;
    }

    /// Copy out a region as a standalone image. `None` if it misses the surface.
    pub fn copy_region(&self, rect: PixelRect) -> Option<RgbaImage> {
        let r = rect.clamp_to(self.width(), self.height())?;
        Some(image::imageops::crop_imm(&self.image, r.x as u32, r.y as u32, r.w as u32, r.h as u32).to_image())
    }

    /// Composite `top` (same size) onto this surface inside `area`, using the
    /// composite mode and alpha of `paint`. Rows are processed in parallel.
    pub fn composite_from(&mut self, top: &Surface, area: PixelRect, paint: &PaintState) {
        debug_assert_eq!(self.image.dimensions(), top.image.dimensions());
        let Some(area) = area.clamp_to(self.width().min(top.width()), self.height().min(top.height())) else {
            return;
        };

        let row_bytes = self.width() as usize * 4;
        let top_row_bytes = top.width() as usize * 4;
        let (x0, x1) = (area.x as usize, area.right() as usize);
        let (y0, rows) = (area.y as usize, area.h as usize);
        let top_raw = top.image.as_raw();
        let mode = paint.composite;
        let opacity = paint.alpha;

        let raw: &mut [u8] = &mut self.image;
        raw.par_chunks_mut(row_bytes)
            .enumerate()
            .skip(y0)
            .take(rows)
            .for_each(|(y, row)| {
                let top_row = &top_raw[y * top_row_bytes..(y + 1) * top_row_bytes];
                for x in x0..x1 {
                    let i = x * 4;
                    let t = Rgba([top_row[i], top_row[i + 1], top_row[i + 2], top_row[i + 3]]);
                    if t[3] == 0 {
                        continue;
                    }
                    let b = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                    let out = composite_pixel(b, t, mode, opacity);
                    row[i..i + 4].copy_from_slice(&out.0);
                }
            });
        self.mark_touched(area);
    }

    /// Iterate the clamped rows/columns of `rect`, calling `f` per pixel.
    fn for_each_in(&mut self, rect: PixelRect, mut f: impl FnMut(&mut Rgba<u8>)) -> Option<PixelRect> {
        let r = rect.normalized().clamp_to(self.width(), self.height())?;
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                f(self.image.get_pixel_mut(x as u32, y as u32));
            }
        }
        Some(r)
    }
}

impl FillTarget for Surface {
    fn target_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, colour: Rgba<u8>) {
        if colour[3] == 0 {
            return;
        }
        if let Some(r) = self.for_each_in(PixelRect::new(x, y, w, h), |p| *p = blend_over(*p, colour, 1.0)) {
            self.mark_touched(r);
        }
    }

    fn clear_rect(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.for_each_in(PixelRect::new(x, y, w, h), |p| *p = TRANSPARENT);
    }
}

// ---------------------------------------------------------------------------
//  Draw context handed to tools
// ---------------------------------------------------------------------------

/// How a context's paint lands on its surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StampMode {
    /// Composite with the paint state's mode (direct drawing onto main).
    Blend,
    /// Max-alpha stamping (provisional strokes on the overlay).
    MaxAlpha,
}

/// Borrowed drawing handle over one surface. Every primitive is limited to
/// the surface bounds and the clip captured when the context was created.
pub struct DrawContext<'a> {
    surface: &'a mut Surface,
    paint: PaintState,
    clip: Option<PixelRect>,
    stamp: StampMode,
}

impl<'a> DrawContext<'a> {
    pub(crate) fn new(surface: &'a mut Surface, paint: PaintState, clip: Option<PixelRect>, stamp: StampMode) -> Self {
        Self { surface, paint, clip, stamp }
    }

    pub fn paint(&self) -> &PaintState {
        &self.paint
    }

    pub fn clip(&self) -> Option<PixelRect> {
        self.clip
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Rgba<u8> {
        self.surface.get_pixel(x, y)
    }

    pub fn pixels(&self) -> &RgbaImage {
        self.surface.image()
    }

    /// Part of `rect` this context may mutate.
    fn limit(&self, rect: PixelRect) -> Option<PixelRect> {
        let r = rect.normalized().clamp_to(self.surface.width(), self.surface.height())?;
        match self.clip {
            Some(clip) => r.intersect(&clip),
            None => Some(r),
        }
    }

    /// Fill a rectangle with the paint colour. Returns the area actually touched.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> Option<PixelRect> {
        let r = self.limit(PixelRect::new(x, y, w, h))?;
        let colour = self.paint.rgba();
        let (stamp, mode) = (self.stamp, self.paint.composite);
        for py in r.y..r.bottom() {
            for px in r.x..r.right() {
                let dst = self.surface.image.get_pixel_mut(px as u32, py as u32);
                *dst = match stamp {
                    StampMode::MaxAlpha => stamp_max_alpha(*dst, colour),
                    StampMode::Blend => composite_pixel(*dst, colour, mode, 1.0),
                };
            }
        }
        self.surface.mark_touched(r);
        Some(r)
    }

    /// Paint a single pixel.
    pub fn plot(&mut self, x: i32, y: i32) -> Option<PixelRect> {
        self.fill_rect(x, y, 1, 1)
    }

    /// Square dab of `size` pixels centred on `(cx, cy)`.
    pub fn stamp(&mut self, cx: i32, cy: i32, size: u32) -> Option<PixelRect> {
        let size = size.max(1) as i32;
        let half = size / 2;
        self.fill_rect(cx - half, cy - half, size, size)
    }

    /// Bresenham line of square dabs. Returns the bounding box of the dabs.
    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, size: u32) -> Option<PixelRect> {
        let mut area: Option<PixelRect> = None;
        walk_line(x0, y0, x1, y1, |x, y| {
            if let Some(r) = self.stamp(x, y, size) {
                area = Some(area.map_or(r, |a| a.union(&r)));
            }
        });
        area
    }

    /// Outline of a rectangle drawn with `size`-wide edges.
    pub fn stroke_rect(&mut self, rect: PixelRect, size: u32) -> Option<PixelRect> {
        let r = rect.normalized();
        let s = (size.max(1) as i32).min(r.w.max(1)).min(r.h.max(1));
        if r.w <= s * 2 || r.h <= s * 2 {
            return self.fill_rect(r.x, r.y, r.w.max(1), r.h.max(1));
        }
        let mut area: Option<PixelRect> = None;
        for edge in [
            PixelRect::new(r.x, r.y, r.w, s),
            PixelRect::new(r.x, r.bottom() - s, r.w, s),
            PixelRect::new(r.x, r.y + s, s, r.h - s * 2),
            PixelRect::new(r.right() - s, r.y + s, s, r.h - s * 2),
        ] {
            if let Some(t) = self.fill_rect(edge.x, edge.y, edge.w, edge.h) {
                area = Some(area.map_or(t, |a| a.union(&t)));
            }
        }
        area
    }

    /// Make a rectangle fully transparent.
    pub fn clear_rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> Option<PixelRect> {
        let r = self.limit(PixelRect::new(x, y, w, h))?;
        self.surface.clear_rect(r.x, r.y, r.w, r.h);
        Some(r)
    }

    /// Clear everything this context may touch.
    pub fn clear(&mut self) {
        match self.clip {
            None => self.surface.clear(),
            Some(_) => {
                let full = self.surface.bounds();
                self.clear_rect(full.x, full.y, full.w, full.h);
            }
        }
    }

    /// Draw `img` with its top-left at `(x, y)`. Paint alpha is not applied.
    pub fn draw_image(&mut self, img: &RgbaImage, x: i32, y: i32) -> Option<PixelRect> {
        let r = self.limit(PixelRect::new(x, y, img.width() as i32, img.height() as i32))?;
        for py in r.y..r.bottom() {
            for px in r.x..r.right() {
                let src = *img.get_pixel((px - x) as u32, (py - y) as u32);
                let dst = self.surface.image.get_pixel_mut(px as u32, py as u32);
                *dst = blend_over(*dst, src, 1.0);
            }
        }
        self.surface.mark_touched(r);
        Some(r)
    }
}

/// Visit every integer point on the line from `(x0, y0)` to `(x1, y1)`.
pub fn walk_line(x0: i32, y0: i32, x1: i32, y1: i32, mut visit: impl FnMut(i32, i32)) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    loop {
        visit(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
