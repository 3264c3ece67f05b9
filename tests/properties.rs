use image::{Rgba, RgbaImage};

use rasterpad::geometry::PixelRect;
use rasterpad::ops::blit::{BlitRequest, copy_nearest_neighbour};
use rasterpad::surface::{FillTarget, Surface};
use rasterpad::{CanvasManager, EngineSettings};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn canvas(w: u32, h: u32, undo_steps: usize) -> CanvasManager {
    let settings = EngineSettings {
        max_undo_steps: undo_steps,
        ..EngineSettings::default()
    };
    let mut c = CanvasManager::with_settings(w, h, settings);
    c.set_colour([255, 0, 0]);
    c
}

fn dot(c: &mut CanvasManager, x: i32, y: i32) -> bool {
    let area = c.get_context().plot(x, y);
    c.end_draw(area)
}

#[test]
fn undo_depth_is_bounded() {
    let mut c = canvas(16, 16, 3);
    for i in 0..10 {
        assert!(dot(&mut c, i, 0));
    }
    assert_eq!(c.history().undo_count(), 3);

    let mut undos = 0;
    while c.undo() {
        undos += 1;
    }
    assert_eq!(undos, 3);
    // Oldest surviving state: dots 0..=6 drawn.
    assert_eq!(*c.main_pixels().get_pixel(6, 0), RED);
    assert_eq!(c.main_pixels().get_pixel(7, 0)[3], 0);
}

#[test]
fn new_draw_discards_redo() {
    let mut c = canvas(8, 8, 10);
    dot(&mut c, 0, 0);
    dot(&mut c, 1, 0);
    assert!(c.undo());
    assert!(c.has_redo());
    dot(&mut c, 2, 0);
    assert!(!c.has_redo());
    assert!(!c.redo());
    assert_eq!(c.main_pixels().get_pixel(1, 0)[3], 0);
    assert_eq!(*c.main_pixels().get_pixel(2, 0), RED);
}

#[test]
fn end_draw_leaves_clip_alone() {
    let mut c = canvas(20, 20, 10);
    c.set_clip(2, 3, 10, 10);
    let before = c.get_clip();
    let area = c.get_context().fill_rect(0, 0, 20, 20);
    assert!(c.end_draw(area));
    assert_eq!(c.get_clip(), before);
    assert_eq!(c.main_pixels().get_pixel(1, 1)[3], 0);
    assert_eq!(*c.main_pixels().get_pixel(5, 5), RED);
}

#[test]
fn end_draw_outside_canvas_is_a_no_op() {
    let mut c = canvas(100, 100, 10);
    let before = c.main_pixels().clone();
    let index = c.history().undo_count();
    assert!(!c.end_draw(Some(PixelRect::new(150, 150, 10, 10))));
    assert_eq!(c.main_pixels(), &before);
    assert_eq!(c.history().undo_count(), index);

    // Partially outside still commits.
    c.get_context().fill_rect(90, 90, 20, 20);
    assert!(c.end_draw(Some(PixelRect::new(90, 90, 20, 20))));
    assert_eq!(*c.main_pixels().get_pixel(99, 99), RED);
    assert_eq!(c.history().undo_count(), index + 1);
}

#[test]
fn end_draw_outside_clip_is_a_no_op() {
    let mut c = canvas(50, 50, 10);
    c.set_clip(0, 0, 10, 10);
    let index = c.history().undo_count();
    assert!(!c.end_draw(Some(PixelRect::new(30, 30, 5, 5))));
    assert_eq!(c.history().undo_count(), index);
}

#[test]
fn forced_source_alpha_masks_overlay() {
    let src = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 255, 128]));
    let overlay = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
    let mut target = Surface::new(1, 1);
    let req = BlitRequest::new(&src, PixelRect::new(0, 0, 1, 1), 0.0, 0.0, 1.0).with_overlay(Some(&overlay), true);
    assert!(copy_nearest_neighbour(&mut target, &req));
    let px = *target.image().get_pixel(0, 0);
    assert_eq!(px[3], 128);
    assert_eq!([px[0], px[1], px[2]], [255, 0, 0]);
}

#[derive(Default)]
struct CountingTarget {
    fills: Vec<(i32, i32, i32, i32)>,
}

impl FillTarget for CountingTarget {
    fn target_size(&self) -> (u32, u32) {
        (200, 200)
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, _colour: Rgba<u8>) {
        self.fills.push((x, y, w, h));
    }

    fn clear_rect(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) {}
}

#[test]
fn identical_row_is_one_fill() {
    let mut src = RgbaImage::new(30, 1);
    for x in 5..20 {
        src.put_pixel(x, 0, RED);
    }
    let mut target = CountingTarget::default();
    let req = BlitRequest::new(&src, PixelRect::new(5, 0, 15, 1), 0.0, 0.0, 4.0);
    assert!(copy_nearest_neighbour(&mut target, &req));
    assert_eq!(target.fills, vec![(0, 0, 60, 4)]);
}

#[test]
fn paste_round_trip_with_offset() {
    let mut c = canvas(40, 40, 10);
    c.get_direct_context().fill_rect(2, 2, 4, 3);
    c.end_draw(Some(PixelRect::new(2, 2, 4, 3)));
    let original = c.main_pixels().clone();

    c.set_clip(2, 2, 4, 3);
    assert!(c.copy());
    assert!(c.paste());
    assert!(c.move_paste(10, 5, true));
    assert!(c.draw_and_end_paste());
    assert!(!c.is_pasting());

    for y in 0..3 {
        for x in 0..4 {
            let src = original.get_pixel(2 + x, 2 + y);
            assert_eq!(c.main_pixels().get_pixel(12 + x, 7 + y), src);
        }
    }
    // Original pixels are untouched.
    assert_eq!(*c.main_pixels().get_pixel(2, 2), RED);
}

#[test]
fn marquee_selection_becomes_the_clip() {
    let mut c = canvas(64, 48, 10);
    for &(x, y, x2, y2) in &[(5, 5, 20, 30), (20, 30, 5, 5), (-10, 40, 70, 10)] {
        c.marquee_mut().select(x, y, x2, y2);
        let expected = PixelRect::from_corners(x, y, x2, y2).clamp_to(64, 48);
        assert_eq!(c.stop_highlight(), expected);
        assert_eq!(c.get_clip(), expected);
    }

    // A selection entirely off the canvas removes the clip.
    c.marquee_mut().select(100, 100, 120, 120);
    assert_eq!(c.stop_highlight(), None);
    assert_eq!(c.get_clip(), None);
}
