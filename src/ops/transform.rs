// ============================================================================
// TRANSFORM OPERATIONS — resize, scale, crop, drawn-area detection
// ============================================================================

use image::{RgbaImage, imageops};
use rayon::prelude::*;

use crate::geometry::PixelRect;
use crate::ops::blit::{BlitRequest, copy_nearest_neighbour};
use crate::surface::Surface;

/// Change the canvas bounds without rescaling. Content stays anchored at the
/// top-left; new area is transparent.
pub fn resize_canvas(src: &RgbaImage, new_w: u32, new_h: u32) -> RgbaImage {
    let (new_w, new_h) = (new_w.max(1), new_h.max(1));
    let mut out = RgbaImage::new(new_w, new_h);
    let copy_w = src.width().min(new_w) as usize * 4;
    let copy_h = src.height().min(new_h) as usize;
    let src_row = src.width() as usize * 4;
    let dst_row = new_w as usize * 4;
    let src_raw = src.as_raw();

    let raw: &mut [u8] = &mut out;
    raw.par_chunks_mut(dst_row)
        .take(copy_h)
        .enumerate()
        .for_each(|(y, row)| {
            row[..copy_w].copy_from_slice(&src_raw[y * src_row..y * src_row + copy_w]);
        });
    out
}

/// Rescale content to `new_w × new_h`: triangle filter when `smooth`,
/// nearest-neighbour blit otherwise.
pub fn scale_image(src: &RgbaImage, new_w: u32, new_h: u32, smooth: bool) -> RgbaImage {
    let (new_w, new_h) = (new_w.max(1), new_h.max(1));
    if smooth {
        return imageops::resize(src, new_w, new_h, imageops::FilterType::Triangle);
    }

    let mut dest = Surface::new(new_w, new_h);
    let req = BlitRequest {
        src,
        overlay: None,
        src_rect: PixelRect::bounds(src.width(), src.height()),
        dest_x: 0.0,
        dest_y: 0.0,
        pixel_width: new_w as f32 / src.width().max(1) as f32,
        pixel_height: new_h as f32 / src.height().max(1) as f32,
        force_src_alpha: false,
    };
    copy_nearest_neighbour(&mut dest, &req);
    dest.into_image()
}

/// Cut `rect` out of `src`. `None` if the rectangle misses the image.
pub fn crop_image(src: &RgbaImage, rect: PixelRect) -> Option<RgbaImage> {
    let r = rect.clamp_to(src.width(), src.height())?;
    Some(imageops::crop_imm(src, r.x as u32, r.y as u32, r.w as u32, r.h as u32).to_image())
}

/// Tightest bounding box of non-transparent pixels, `None` for an empty image.
pub fn drawn_area(img: &RgbaImage) -> Option<PixelRect> {
    let w = img.width() as usize;
    if w == 0 {
        return None;
    }
    let row_bytes = w * 4;

    // (min_x, max_x) per non-empty row, reduced across rows.
    let (min_x, max_x, min_y, max_y) = img
        .as_raw()
        .par_chunks(row_bytes)
        .enumerate()
        .filter_map(|(y, row)| {
            let first = (0..w).find(|&x| row[x * 4 + 3] != 0)?;
            let last = (0..w).rev().find(|&x| row[x * 4 + 3] != 0)?;
            Some((first, last, y, y))
        })
        .reduce_with(|a, b| (a.0.min(b.0), a.1.max(b.1), a.2.min(b.2), a.3.max(b.3)))?;

    Some(PixelRect::new(
        min_x as i32,
        min_y as i32,
        (max_x - min_x + 1) as i32,
        (max_y - min_y + 1) as i32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn resize_anchors_top_left() {
        let src = RgbaImage::from_pixel(3, 3, Rgba([1, 1, 1, 255]));
        let grown = resize_canvas(&src, 5, 4);
        assert_eq!(grown.dimensions(), (5, 4));
        assert_eq!(*grown.get_pixel(2, 2), Rgba([1, 1, 1, 255]));
        assert_eq!(grown.get_pixel(3, 0)[3], 0);
        assert_eq!(grown.get_pixel(0, 3)[3], 0);

        let shrunk = resize_canvas(&src, 2, 1);
        assert_eq!(shrunk.dimensions(), (2, 1));
        assert_eq!(*shrunk.get_pixel(1, 0), Rgba([1, 1, 1, 255]));
    }

    #[test]
    fn nearest_scale_duplicates_pixels() {
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(1, 0, Rgba([9, 8, 7, 255]));
        let out = scale_image(&src, 4, 2, false);
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(out.get_pixel(1, 1)[3], 0);
        assert_eq!(*out.get_pixel(2, 1), Rgba([9, 8, 7, 255]));
        assert_eq!(*out.get_pixel(3, 0), Rgba([9, 8, 7, 255]));
    }

    #[test]
    fn drawn_area_is_tight() {
        let mut img = RgbaImage::new(10, 10);
        assert_eq!(drawn_area(&img), None);
        img.put_pixel(2, 7, Rgba([0, 0, 0, 1]));
        img.put_pixel(6, 3, Rgba([0, 0, 0, 255]));
        assert_eq!(drawn_area(&img), Some(PixelRect::new(2, 3, 5, 5)));
    }

    #[test]
    fn crop_clamps() {
        let img = RgbaImage::new(4, 4);
        assert_eq!(crop_image(&img, PixelRect::new(2, 2, 9, 9)).map(|i| i.dimensions()), Some((2, 2)));
        assert!(crop_image(&img, PixelRect::new(5, 5, 1, 1)).is_none());
    }
}
