// ============================================================================
// NEAREST-NEIGHBOUR BLITTING — exact preview rendering and the cheap pass
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::geometry::PixelRect;
use crate::surface::{FillTarget, TRANSPARENT, blend_atop, blend_over};

/// Bias added to the far edge of a region when the scale is non-integral, so
/// float error cannot drop the last row/column.
const END_BIAS: f32 = 1.0e-4;

/// Parameters for [`copy_nearest_neighbour`].
#[derive(Clone, Copy, Debug)]
pub struct BlitRequest<'a> {
    pub src: &'a RgbaImage,
    /// Composited over `src` pixel-for-pixel (same coordinate space as `src`).
    pub overlay: Option<&'a RgbaImage>,
    /// Region of `src` to copy. Negative extents are flipped.
    pub src_rect: PixelRect,
    /// Destination position of the region's top-left corner.
    pub dest_x: f32,
    pub dest_y: f32,
    /// Destination size of one source pixel.
    pub pixel_width: f32,
    pub pixel_height: f32,
    /// Mask the overlay by the source's coverage instead of its own alpha.
    pub force_src_alpha: bool,
}

impl<'a> BlitRequest<'a> {
    /// Copy `src_rect` of `src` at a uniform `zoom`, no overlay.
    pub fn new(src: &'a RgbaImage, src_rect: PixelRect, dest_x: f32, dest_y: f32, zoom: f32) -> Self {
        Self {
            src,
            overlay: None,
            src_rect,
            dest_x,
            dest_y,
            pixel_width: zoom,
            pixel_height: zoom,
            force_src_alpha: false,
        }
    }

    pub fn with_overlay(self, overlay: Option<&'a RgbaImage>, force_src_alpha: bool) -> Self {
        Self { overlay, force_src_alpha, ..self }
    }
}

/// Fast rounding for destination edges: `+0.5` then truncate, which is exact
/// for the non-negative coordinates the preview uses.
#[inline]
fn snap(v: f32) -> i32 {
    if v >= 0.0 { (v + 0.5) as i32 } else { v.round() as i32 }
}

#[inline]
fn sample(img: &RgbaImage, x: i32, y: i32) -> Rgba<u8> {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return TRANSPARENT;
    }
    *img.get_pixel(x as u32, y as u32)
}

/// Composite one source pixel with its overlay pixel. `None` means "leave the
/// destination cleared".
#[inline]
fn composite(src: Rgba<u8>, overlay: Rgba<u8>, force_src_alpha: bool) -> Option<Rgba<u8>> {
    if force_src_alpha {
        if src[3] == 0 {
            return None;
        }
        Some(blend_atop(src, overlay, 1.0))
    } else {
        if src[3] == 0 && overlay[3] == 0 {
            return None;
        }
        Some(blend_over(src, overlay, 1.0))
    }
}

/// Destination edges for `count` source cells starting at `origin`, each
/// `step` wide, clamped to `lo..=hi`. Entry `i..i+1` is the span of cell `i`.
fn edges(origin: f32, step: f32, count: i32, end_bias: f32, lo: i32, hi: i32) -> Vec<i32> {
    let mut out: Vec<i32> = (0..count).map(|i| snap(origin + i as f32 * step).clamp(lo, hi)).collect();
    out.push(snap(origin + count as f32 * step + end_bias).clamp(lo, hi));
    out
}

/// Copy a region of `req.src` (optionally composited with `req.overlay`) into
/// `dest`, scaling every source pixel to `pixel_width × pixel_height`.
///
/// The destination region is cleared first. Without an overlay, horizontally
/// adjacent identical pixels are merged into a single `fill_rect`. Returns
/// `false` for degenerate requests.
pub fn copy_nearest_neighbour<T: FillTarget + ?Sized>(dest: &mut T, req: &BlitRequest) -> bool {
    let (pw, ph) = (req.pixel_width, req.pixel_height);
    if !(pw > 0.0 && ph > 0.0 && pw.is_finite() && ph.is_finite()) {
        return false;
    }
    if !(req.dest_x.is_finite() && req.dest_y.is_finite()) {
        return false;
    }
    let Some(r) = req.src_rect.normalized().clamp_to(req.src.width(), req.src.height()) else {
        return false;
    };

    let integral = pw.fract() == 0.0 && ph.fract() == 0.0;
    let bias = if integral { 0.0 } else { END_BIAS };

    let (tw, th) = dest.target_size();
    let x0 = snap(req.dest_x).clamp(0, tw as i32);
    let y0 = snap(req.dest_y).clamp(0, th as i32);
    let x1 = snap(req.dest_x + r.w as f32 * pw + bias).clamp(0, tw as i32);
    let y1 = snap(req.dest_y + r.h as f32 * ph + bias).clamp(0, th as i32);
    if x1 <= x0 || y1 <= y0 {
        return false;
    }
    dest.clear_rect(x0, y0, x1 - x0, y1 - y0);

    let cols = edges(req.dest_x, pw, r.w, bias, x0, x1);
    let rows = edges(req.dest_y, ph, r.h, bias, y0, y1);

    for j in 0..r.h as usize {
        let (dy0, dy1) = (rows[j], rows[j + 1]);
        if dy1 <= dy0 {
            continue;
        }
        let sy = r.y + j as i32;

        match req.overlay {
            None => {
                // (start, end, colour) of the run being accumulated
                let mut run: Option<(i32, i32, Rgba<u8>)> = None;
                for i in 0..r.w as usize {
                    let (dx0, dx1) = (cols[i], cols[i + 1]);
                    if dx1 <= dx0 {
                        continue;
                    }
                    let px = sample(req.src, r.x + i as i32, sy);
                    if px[3] == 0 {
                        if let Some((s, e, c)) = run.take() {
                            dest.fill_rect(s, dy0, e - s, dy1 - dy0, c);
                        }
                        continue;
                    }
                    match run.as_mut() {
                        Some((_, end, colour)) if *colour == px && *end == dx0 => *end = dx1,
                        _ => {
                            if let Some((s, e, c)) = run.replace((dx0, dx1, px)) {
                                dest.fill_rect(s, dy0, e - s, dy1 - dy0, c);
                            }
                        }
                    }
                }
                if let Some((s, e, c)) = run {
                    dest.fill_rect(s, dy0, e - s, dy1 - dy0, c);
                }
            }
            Some(overlay) => {
                for i in 0..r.w as usize {
                    let (dx0, dx1) = (cols[i], cols[i + 1]);
                    if dx1 <= dx0 {
                        continue;
                    }
                    let sx = r.x + i as i32;
                    let Some(out) = composite(sample(req.src, sx, sy), sample(overlay, sx, sy), req.force_src_alpha)
                    else {
                        continue;
                    };
                    if out[3] != 0 {
                        dest.fill_rect(dx0, dy0, dx1 - dx0, dy1 - dy0, out);
                    }
                }
            }
        }
    }
    true
}

/// Destination-sampled nearest blit: every pixel of `dest_rect` in `dest`
/// takes the source pixel under its centre. `src_origin` is the canvas
/// position of `dest` pixel (0, 0). Cheaper than [`copy_nearest_neighbour`]
/// when zoomed out, and used as the immediate pass before tiled refreshes.
pub fn draw_scaled(
    dest: &mut RgbaImage,
    dest_rect: PixelRect,
    src: &RgbaImage,
    overlay: Option<&RgbaImage>,
    src_origin: (f32, f32),
    zoom: f32,
    force_src_alpha: bool,
) -> bool {
    if !(zoom > 0.0 && zoom.is_finite()) {
        return false;
    }
    let Some(r) = dest_rect.normalized().clamp_to(dest.width(), dest.height()) else {
        return false;
    };

    let row_bytes = dest.width() as usize * 4;
    let (x0, x1) = (r.x, r.right());
    let inv = 1.0 / zoom;
    let (ox, oy) = src_origin;
    // Source column per destination column, shared by every row.
    let src_cols: Vec<i32> = (x0..x1).map(|px| (ox + (px as f32 + 0.5) * inv).floor() as i32).collect();

    let raw: &mut [u8] = dest;
    raw.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(r.y as usize)
        .take(r.h as usize)
        .for_each(|(py, row)| {
            let sy = (oy + (py as f32 + 0.5) * inv).floor() as i32;
            for (k, &sx) in src_cols.iter().enumerate() {
                let s = sample(src, sx, sy);
                let out = match overlay {
                    Some(ov) => composite(s, sample(ov, sx, sy), force_src_alpha).unwrap_or(TRANSPARENT),
                    None => s,
                };
                let i = (x0 as usize + k) * 4;
                row[i..i + 4].copy_from_slice(&out.0);
            }
        });
    true
}
