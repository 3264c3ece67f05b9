use egui::Pos2;
use image::Rgba;

use rasterpad::{CanvasManager, ToolKind, ToolSession};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Canvas laid out at zoom 1 with its origin at (0, 0), so screen and canvas
/// coordinates coincide.
fn setup(w: u32, h: u32) -> (CanvasManager, ToolSession) {
    let mut canvas = CanvasManager::new(w, h);
    canvas.set_colour([255, 0, 0]);
    (canvas, ToolSession::default())
}

fn at(x: f32, y: f32) -> Pos2 {
    Pos2::new(x + 0.5, y + 0.5)
}

#[test]
fn pencil_stroke_commits_on_release() {
    let (mut canvas, mut tools) = setup(20, 20);
    tools.pointer_down(&mut canvas, at(2.0, 2.0));
    tools.pointer_move(&mut canvas, at(8.0, 2.0));
    assert_eq!(canvas.main_pixels().get_pixel(5, 2)[3], 0);
    assert_eq!(*canvas.overlay_pixels().get_pixel(5, 2), RED);

    tools.pointer_up(&mut canvas, at(8.0, 2.0));
    for x in 2..=8 {
        assert_eq!(*canvas.main_pixels().get_pixel(x, 2), RED);
    }
    assert!(canvas.overlay_pixels().pixels().all(|p| p[3] == 0));
    assert_eq!(canvas.history().undo_count(), 1);
}

#[test]
fn line_is_redrawn_while_dragging() {
    let (mut canvas, mut tools) = setup(20, 20);
    tools.select(&mut canvas, ToolKind::Line);
    tools.pointer_down(&mut canvas, at(0.0, 0.0));
    tools.pointer_move(&mut canvas, at(10.0, 0.0));
    tools.pointer_move(&mut canvas, at(0.0, 10.0));
    // Only the latest line survives on the overlay.
    assert_eq!(canvas.overlay_pixels().get_pixel(10, 0)[3], 0);
    tools.pointer_up(&mut canvas, at(0.0, 10.0));
    assert_eq!(*canvas.main_pixels().get_pixel(0, 10), RED);
    assert_eq!(canvas.main_pixels().get_pixel(10, 0)[3], 0);
}

#[test]
fn shift_constrains_line() {
    let (mut canvas, mut tools) = setup(20, 20);
    tools.select(&mut canvas, ToolKind::Line);
    tools.pointer_down(&mut canvas, at(1.0, 5.0));
    tools.set_shift(&mut canvas, true);
    tools.pointer_up(&mut canvas, at(12.0, 6.0));
    assert_eq!(*canvas.main_pixels().get_pixel(12, 5), RED);
    assert_eq!(canvas.main_pixels().get_pixel(12, 6)[3], 0);
}

#[test]
fn filled_rectangle_is_inclusive() {
    let (mut canvas, mut tools) = setup(20, 20);
    tools.select(&mut canvas, ToolKind::Rectangle);
    tools.properties.filled = true;
    tools.pointer_down(&mut canvas, at(2.0, 3.0));
    tools.pointer_up(&mut canvas, at(5.0, 7.0));
    assert_eq!(*canvas.main_pixels().get_pixel(5, 7), RED);
    assert_eq!(*canvas.main_pixels().get_pixel(2, 3), RED);
    assert_eq!(canvas.main_pixels().get_pixel(6, 7)[3], 0);
    assert_eq!(canvas.get_drawn_area().map(|r| (r.w, r.h)), Some((4, 5)));
}

#[test]
fn fill_respects_clip() {
    let (mut canvas, mut tools) = setup(10, 10);
    canvas.set_clip(0, 0, 5, 10);
    tools.select(&mut canvas, ToolKind::Fill);
    tools.pointer_down(&mut canvas, at(1.0, 1.0));
    tools.pointer_up(&mut canvas, at(1.0, 1.0));
    assert_eq!(*canvas.main_pixels().get_pixel(4, 9), RED);
    assert_eq!(canvas.main_pixels().get_pixel(5, 0)[3], 0);
    assert!(canvas.has_undo());
}

#[test]
fn alt_picks_colour_then_restores_tool() {
    let (mut canvas, mut tools) = setup(10, 10);
    canvas.set_colour([0, 0, 255]);
    tools.pointer_down(&mut canvas, at(3.0, 3.0));
    tools.pointer_up(&mut canvas, at(3.0, 3.0));
    assert_eq!(*canvas.main_pixels().get_pixel(3, 3), BLUE);

    canvas.set_colour([255, 0, 0]);
    tools.set_alt(&mut canvas, true);
    assert_eq!(tools.current(), ToolKind::Picker);
    tools.pointer_down(&mut canvas, at(3.0, 3.0));
    tools.pointer_up(&mut canvas, at(3.0, 3.0));
    assert_eq!(canvas.get_colour(), [0, 0, 255]);

    tools.set_alt(&mut canvas, false);
    assert_eq!(tools.current(), ToolKind::Pencil);
}

#[test]
fn eraser_toggle_clears_main() {
    let (mut canvas, mut tools) = setup(10, 10);
    tools.select(&mut canvas, ToolKind::Rectangle);
    tools.properties.filled = true;
    tools.pointer_down(&mut canvas, at(0.0, 0.0));
    tools.pointer_up(&mut canvas, at(9.0, 9.0));

    tools.toggle_eraser(&mut canvas);
    assert_eq!(tools.current(), ToolKind::Eraser);
    tools.pointer_down(&mut canvas, at(2.0, 4.0));
    tools.pointer_up(&mut canvas, at(7.0, 4.0));
    assert_eq!(canvas.main_pixels().get_pixel(5, 4)[3], 0);
    assert_eq!(*canvas.main_pixels().get_pixel(5, 5), RED);

    tools.toggle_eraser(&mut canvas);
    assert_eq!(tools.current(), ToolKind::Rectangle);
    assert!(canvas.undo());
    assert_eq!(*canvas.main_pixels().get_pixel(5, 4), RED);
}

#[test]
fn drawing_flattens_running_paste() {
    let (mut canvas, mut tools) = setup(20, 20);
    tools.pointer_down(&mut canvas, at(1.0, 1.0));
    tools.pointer_up(&mut canvas, at(1.0, 1.0));
    canvas.set_clip(0, 0, 3, 3);
    canvas.copy();
    canvas.paste();
    canvas.move_paste(10, 10, true);
    assert!(canvas.is_pasting());

    tools.pointer_down(&mut canvas, at(18.0, 18.0));
    assert!(!canvas.is_pasting());
    assert_eq!(*canvas.main_pixels().get_pixel(11, 11), RED);
    tools.pointer_up(&mut canvas, at(18.0, 18.0));
    assert_eq!(*canvas.main_pixels().get_pixel(18, 18), RED);
}

#[test]
fn clicks_that_draw_nothing_leave_history_alone() {
    let (mut canvas, mut tools) = setup(10, 10);
    for kind in [ToolKind::Pencil, ToolKind::Eraser, ToolKind::Line, ToolKind::Rectangle] {
        tools.select(&mut canvas, kind);
        tools.pointer_down(&mut canvas, at(50.0, 50.0));
        tools.pointer_up(&mut canvas, at(50.0, 50.0));
        assert_eq!(canvas.history().undo_count(), 0, "{}", kind.label());
    }
    assert!(!canvas.has_undo());

    // Same for a stroke that stays outside the clip.
    canvas.set_clip(0, 0, 3, 3);
    tools.select(&mut canvas, ToolKind::Pencil);
    tools.pointer_down(&mut canvas, at(6.0, 6.0));
    tools.pointer_move(&mut canvas, at(8.0, 6.0));
    tools.pointer_up(&mut canvas, at(8.0, 6.0));
    assert_eq!(canvas.history().undo_count(), 0);
    assert!(canvas.main_pixels().pixels().all(|p| p[3] == 0));
}
