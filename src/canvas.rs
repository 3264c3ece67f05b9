use egui::{Pos2, Rect, Vec2};
use image::{Rgba, RgbaImage};

use crate::components::grid::{GridLine, GridManager};
use crate::components::history::UndoStack;
use crate::components::marquee::{Marquee, MarqueeView};
use crate::error::ExportError;
use crate::events::{CanvasEvent, EventBus};
use crate::geometry::PixelRect;
use crate::io::{ImageType, encode_data_url};
use crate::ops::blit::{BlitRequest, copy_nearest_neighbour, draw_scaled};
use crate::ops::clipboard::CopyManager;
use crate::ops::transform;
use crate::scheduler::{FrameQueue, TaskHandle, Timers};
use crate::settings::EngineSettings;
use crate::surface::{CompositeMode, DrawContext, PaintState, StampMode, Surface};

/// Zoom factor applied by `zoom_in` / `zoom_out`.
const ZOOM_STEP: f32 = 2.0;

/// Work deferred to `tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Deferred {
    RebuildPreview,
    Reflow,
}

/// One exact preview tile, queued after a cheap full-region pass.
#[derive(Clone, Copy, Debug)]
struct Tile {
    rect: PixelRect,
    include_overlay: bool,
}

// ============================================================================
// CANVAS MANAGER — surfaces, draw protocol, layout, clip, paste, undo
// ============================================================================

/// Owns the main, overlay and preview surfaces and everything that mutates
/// them. Tools only ever get a [`DrawContext`] borrow.
///
/// Draw protocol: draw provisional pixels through [`CanvasManager::get_context`]
/// (the overlay), then call [`CanvasManager::end_draw`] with the dirty rect.
/// Tools that commit immediately use [`CanvasManager::get_direct_context`]
/// and still finish with `end_draw`.
pub struct CanvasManager {
    settings: EngineSettings,
    main: Surface,
    overlay: Surface,
    preview: Surface,
    paint: PaintState,
    clip: Option<PixelRect>,
    undo: UndoStack,
    copy: CopyManager,
    marquee: Marquee,
    grid: GridManager,

    // -- layout ---------------------------------------------------------
    zoom: f32,
    /// Screen rect the canvas is laid out in.
    viewport: Rect,
    /// Viewport waiting for the debounced reflow.
    pending_viewport: Option<Rect>,
    /// Image centre offset from the viewport centre, screen pixels.
    pan_offset: Vec2,

    // -- preview ----------------------------------------------------------
    /// Canvas region the preview surface covers.
    preview_area: Option<PixelRect>,
    preview_visible: bool,

    // -- deferred work --------------------------------------------------
    now_ms: u64,
    timers: Timers<Deferred>,
    pending_rebuild: Option<TaskHandle>,
    pending_reflow: Option<TaskHandle>,
    tiles: FrameQueue<Tile>,

    events: EventBus,
}

impl CanvasManager {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_settings(width, height, EngineSettings::default())
    }

    pub fn with_settings(width: u32, height: u32, settings: EngineSettings) -> Self {
        let main = Surface::new(width, height);
        let (w, h) = (main.width(), main.height());
        let undo = UndoStack::new(settings.max_undo_steps, main.image());
        let grid = GridManager::new(settings.grid_width, settings.grid_height);
        let mut canvas = Self {
            main,
            overlay: Surface::new(w, h),
            preview: Surface::new(w, h),
            paint: PaintState::default(),
            clip: None,
            undo,
            copy: CopyManager::new(),
            marquee: Marquee::new(),
            grid,
            zoom: 1.0,
            viewport: Rect::from_min_size(Pos2::ZERO, Vec2::new(w as f32, h as f32)),
            pending_viewport: None,
            pan_offset: Vec2::ZERO,
            preview_area: None,
            preview_visible: false,
            now_ms: 0,
            timers: Timers::new(),
            pending_rebuild: None,
            pending_reflow: None,
            tiles: FrameQueue::new(),
            events: EventBus::default(),
            settings,
        };
        canvas.sync_grid();
        canvas.rebuild_preview();
        canvas
    }

    /// Replace the canvas content with `image` and start a fresh history.
    pub fn load_image(&mut self, image: RgbaImage) {
        self.end_paste_without_commit();
        self.replace_main(image, false);
        self.undo.reset(self.main.image());
        log_info!("Canvas: loaded {}x{} image", self.main.width(), self.main.height());
    }

    // ========================================================================
    // DRAW PROTOCOL
    // ========================================================================

    /// Overlay context for provisional strokes. Paint is always source-over
    /// here; the composite mode applies when the overlay is committed.
    pub fn get_context(&mut self) -> DrawContext<'_> {
        let paint = self.paint.with_composite(CompositeMode::SourceOver);
        DrawContext::new(&mut self.overlay, paint, self.clip, StampMode::MaxAlpha)
    }

    /// Main-surface context for tools that commit immediately.
    pub fn get_direct_context(&mut self) -> DrawContext<'_> {
        DrawContext::new(&mut self.main, self.paint, self.clip, StampMode::Blend)
    }

    /// Commit the overlay onto main, snapshot, notify, and refresh the preview
    /// over `area ∩ clip`. With `None` nothing is refreshed.
    ///
    /// Returns `false` without compositing or snapshotting when `area` lies
    /// entirely outside the canvas or the clip.
    pub fn end_draw(&mut self, area: Option<PixelRect>) -> bool {
        let dirty = match area {
            Some(a) => {
                let on_canvas = a.normalized().intersect(&self.main.bounds());
                let within = match (on_canvas, self.clip) {
                    (Some(r), Some(clip)) => r.intersect(&clip),
                    (r, _) => r,
                };
                let Some(within) = within else {
                    self.discard_overlay();
                    return false;
                };
                Some(within)
            }
            None => None,
        };

        self.composite_overlay();
        if self.copy.is_pasting() {
            self.copy.end_paste();
        }
        self.undo.add(self.main.image());
        self.events.emit(CanvasEvent::Draw);
        if let Some(d) = dirty {
            let buffer = self.settings.upscale_buffer;
            self.redraw_upscale(d.x, d.y, d.w, d.h, false, buffer);
        }
        true
    }

    /// Overlay → main with alpha 1.0 and the current composite mode, limited
    /// to the clip. Leaves the overlay clear.
    fn composite_overlay(&mut self) {
        if let Some(touched) = self.overlay.touched() {
            let area = match self.clip {
                Some(clip) => touched.intersect(&clip),
                None => Some(touched),
            };
            if let Some(area) = area {
                let paint = self.paint.with_alpha(1.0);
                self.main.composite_from(&self.overlay, area, &paint);
            }
        }
        self.overlay.clear();
    }

    /// Clear the overlay without committing, refreshing what it covered.
    fn discard_overlay(&mut self) {
        let touched = self.overlay.touched();
        self.overlay.clear();
        if let Some(t) = touched {
            self.redraw_upscale(t.x, t.y, t.w, t.h, false, 0);
        }
    }

    // ========================================================================
    // PREVIEW
    // ========================================================================

    /// Refresh the preview for a canvas region, grown by `buffer` pixels on
    /// every side. Negative sizes extend in the negative direction; a zero
    /// extent counts as one pixel. Returns `false` when the preview is hidden
    /// or the region misses the visible canvas.
    pub fn redraw_upscale(&mut self, x: i32, y: i32, w: i32, h: i32, include_overlay: bool, buffer: i32) -> bool {
        if !self.preview_visible {
            return false;
        }
        let Some(view) = self.preview_area else {
            return false;
        };
        let w = if w == 0 { 1 } else { w };
        let h = if h == 0 { 1 } else { h };
        let region = PixelRect::new(x, y, w, h).normalized().expand(buffer.max(0));
        let Some(r) = region.intersect(&self.main.bounds()).and_then(|r| r.intersect(&view)) else {
            return false;
        };

        // Queued tiles predate this refresh and would paint over it.
        let dropped = self.tiles.cancel_all();
        if dropped > 0 {
            log_info!("Canvas: cancelled {} stale preview tiles", dropped);
        }

        let zoom = self.zoom;
        let force_src_alpha = self.paint.composite == CompositeMode::SourceAtop;
        let overlay = include_overlay.then(|| self.overlay.image());

        if zoom <= 1.0 {
            let dest = Self::preview_rect(view, r, zoom);
            return draw_scaled(
                self.preview.image_mut(),
                dest,
                self.main.image(),
                overlay,
                (view.x as f32, view.y as f32),
                zoom,
                force_src_alpha,
            );
        }

        let dest_area = r.area() as f64 * (zoom as f64) * (zoom as f64);
        if dest_area > self.settings.upscale_divide_area as f64 {
            // Cheap pass now, exact tiles over the next frames.
            let dest = Self::preview_rect(view, r, zoom);
            draw_scaled(
                self.preview.image_mut(),
                dest,
                self.main.image(),
                overlay,
                (view.x as f32, view.y as f32),
                zoom,
                force_src_alpha,
            );
            let tile = self.settings.upscale_tile_size.max(1) as i32;
            let mut ty = r.y;
            while ty < r.bottom() {
                let mut tx = r.x;
                while tx < r.right() {
                    if let Some(t) = PixelRect::new(tx, ty, tile, tile).intersect(&r) {
                        self.tiles.request(Tile { rect: t, include_overlay });
                    }
                    tx += tile;
                }
                ty += tile;
            }
            return true;
        }

        let req = BlitRequest {
            src: self.main.image(),
            overlay,
            src_rect: r,
            dest_x: (r.x - view.x) as f32 * zoom,
            dest_y: (r.y - view.y) as f32 * zoom,
            pixel_width: zoom,
            pixel_height: zoom,
            force_src_alpha,
        };
        copy_nearest_neighbour(&mut self.preview, &req)
    }

    /// Preview-pixel rect covering canvas rect `r`.
    fn preview_rect(view: PixelRect, r: PixelRect, zoom: f32) -> PixelRect {
        let x0 = ((r.x - view.x) as f32 * zoom).floor() as i32;
        let y0 = ((r.y - view.y) as f32 * zoom).floor() as i32;
        let x1 = ((r.right() - view.x) as f32 * zoom).ceil() as i32;
        let y1 = ((r.bottom() - view.y) as f32 * zoom).ceil() as i32;
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Resize the preview to the visible area and redraw all of it.
    fn rebuild_preview(&mut self) {
        self.tiles.cancel_all();
        let Some(view) = self.visible_area() else {
            self.preview_area = None;
            self.preview_visible = false;
            return;
        };
        let pw = ((view.w as f32 * self.zoom).ceil() as u32).max(1);
        let ph = ((view.h as f32 * self.zoom).ceil() as u32).max(1);
        if self.preview.width() != pw || self.preview.height() != ph {
            self.preview = Surface::new(pw, ph);
        } else {
            self.preview.clear_all();
        }
        self.preview_area = Some(view);
        self.preview_visible = true;
        self.redraw_upscale(view.x, view.y, view.w, view.h, true, 0);
    }

    /// Run one queued exact tile. Returns `false` when nothing was pending.
    pub fn run_animation_frame(&mut self) -> bool {
        let Some(tile) = self.tiles.next() else {
            return false;
        };
        let Some(view) = self.preview_area.filter(|_| self.preview_visible) else {
            return false;
        };
        let Some(r) = tile.rect.intersect(&view) else {
            return true;
        };
        let req = BlitRequest {
            src: self.main.image(),
            overlay: tile.include_overlay.then(|| self.overlay.image()),
            src_rect: r,
            dest_x: (r.x - view.x) as f32 * self.zoom,
            dest_y: (r.y - view.y) as f32 * self.zoom,
            pixel_width: self.zoom,
            pixel_height: self.zoom,
            force_src_alpha: self.paint.composite == CompositeMode::SourceAtop,
        };
        copy_nearest_neighbour(&mut self.preview, &req);
        true
    }

    pub fn pending_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Advance the clock and run every debounced task that is due.
    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        for task in self.timers.take_due(self.now_ms) {
            match task {
                Deferred::RebuildPreview => {
                    self.pending_rebuild = None;
                    self.rebuild_preview();
                }
                Deferred::Reflow => {
                    self.pending_reflow = None;
                    if let Some(viewport) = self.pending_viewport.take() {
                        self.viewport = viewport;
                    }
                    self.sync_grid();
                    self.rebuild_preview();
                }
            }
        }
    }

    pub fn preview(&self) -> &RgbaImage {
        self.preview.image()
    }

    pub fn is_preview_visible(&self) -> bool {
        self.preview_visible
    }

    /// Screen position of preview pixel (0, 0).
    pub fn preview_origin(&self) -> Option<Pos2> {
        let view = self.preview_area?;
        let origin = self.canvas_origin();
        Some(Pos2::new(
            origin.x + view.x as f32 * self.zoom,
            origin.y + view.y as f32 * self.zoom,
        ))
    }

    // ========================================================================
    // LAYOUT
    // ========================================================================

    /// Screen position of canvas pixel (0, 0): the image is centred in the
    /// viewport, shifted by the pan offset, snapped to whole pixels.
    pub fn canvas_origin(&self) -> Pos2 {
        let size = Vec2::new(self.main.width() as f32, self.main.height() as f32) * self.zoom;
        let center = self.viewport.center() + self.pan_offset;
        let min = center - size / 2.0;
        Pos2::new(min.x.round(), min.y.round())
    }

    /// Screen rect of the whole canvas.
    pub fn image_rect(&self) -> Rect {
        let size = Vec2::new(self.main.width() as f32, self.main.height() as f32) * self.zoom;
        Rect::from_min_size(self.canvas_origin(), size)
    }

    /// Canvas pixels currently inside the viewport.
    pub fn visible_area(&self) -> Option<PixelRect> {
        let origin = self.canvas_origin();
        let visible = self.image_rect().intersect(self.viewport);
        if !visible.is_positive() {
            return None;
        }
        let x0 = ((visible.min.x - origin.x) / self.zoom).floor() as i32;
        let y0 = ((visible.min.y - origin.y) / self.zoom).floor() as i32;
        let x1 = ((visible.max.x - origin.x) / self.zoom).ceil() as i32;
        let y1 = ((visible.max.y - origin.y) / self.zoom).ceil() as i32;
        PixelRect::new(x0, y0, x1 - x0, y1 - y0).clamp_to(self.main.width(), self.main.height())
    }

    /// Screen → canvas coordinates. Every tool goes through this.
    pub fn translate_location(&self, pos: Pos2) -> (f32, f32) {
        let origin = self.canvas_origin();
        ((pos.x - origin.x) / self.zoom, (pos.y - origin.y) / self.zoom)
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// New viewport size/position. Applied by the debounced reflow.
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.pending_viewport = Some(viewport);
        self.request_reflow();
    }

    /// Schedule a layout pass, replacing any pending one.
    pub fn request_reflow(&mut self) {
        if let Some(h) = self.pending_reflow.take() {
            self.timers.cancel(h);
        }
        self.pending_reflow = Some(self.timers.schedule(self.now_ms, self.settings.reflow_delay_ms, Deferred::Reflow));
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        let max = self.settings.max_zoom.max(1.0);
        let z = if zoom.is_finite() { zoom.clamp(1.0 / max, max) } else { self.zoom };
        if z != self.zoom {
            self.zoom = z;
            self.layout_changed();
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / ZOOM_STEP);
    }

    /// Zoom by `factor` keeping the screen point `anchor` over the same canvas
    /// pixel.
    pub fn zoom_around(&mut self, factor: f32, anchor: Pos2) {
        let old_zoom = self.zoom;
        self.set_zoom(self.zoom * factor);
        let actual = self.zoom / old_zoom;
        if actual == 1.0 {
            return;
        }
        let old_center = self.viewport.center() + self.pan_offset;
        let new_center = anchor + (old_center - anchor) * actual;
        self.pan_offset = new_center - self.viewport.center();
        self.sync_grid();
    }

    /// Pan by a screen-space delta.
    pub fn scroll_by(&mut self, delta: Vec2) {
        if delta != Vec2::ZERO {
            self.pan_offset += delta;
            self.layout_changed();
        }
    }

    /// Hide the preview and debounce its rebuild; stale tiles are dropped.
    fn layout_changed(&mut self) {
        self.preview_visible = false;
        self.tiles.cancel_all();
        self.sync_grid();
        if let Some(h) = self.pending_rebuild.take() {
            self.timers.cancel(h);
        }
        self.pending_rebuild = Some(self.timers.schedule(
            self.now_ms,
            self.settings.upscale_refresh_delay_ms,
            Deferred::RebuildPreview,
        ));
    }

    fn sync_grid(&mut self) {
        let origin = self.canvas_origin();
        let size = (self.main.width(), self.main.height());
        self.grid.set_layout(origin, self.zoom, size, self.viewport);
    }

    pub fn grid(&self) -> &GridManager {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut GridManager {
        &mut self.grid
    }

    pub fn grid_lines(&mut self) -> &[GridLine] {
        self.grid.lines()
    }

    // ========================================================================
    // CLIP & MARQUEE
    // ========================================================================

    pub fn get_clip(&self) -> Option<PixelRect> {
        self.clip
    }

    /// Replace the clip. The rect is normalized and clamped to the canvas; an
    /// empty result removes the clip. An in-progress paste is flattened first.
    pub fn set_clip(&mut self, x: i32, y: i32, w: i32, h: i32) -> Option<PixelRect> {
        self.draw_and_end_paste();
        self.clip = None;
        self.clip = PixelRect::new(x, y, w, h)
            .normalized()
            .clamp_to(self.main.width(), self.main.height());
        self.events.emit(CanvasEvent::Clip(self.clip));
        self.clip
    }

    pub fn remove_clip(&mut self) {
        self.draw_and_end_paste();
        if self.clip.take().is_some() {
            self.events.emit(CanvasEvent::Clip(None));
        }
    }

    pub fn marquee(&self) -> &Marquee {
        &self.marquee
    }

    pub fn marquee_mut(&mut self) -> &mut Marquee {
        &mut self.marquee
    }

    /// Finish a marquee drag: the clamped selection becomes the clip, or the
    /// clip is removed when nothing is selected on the canvas.
    pub fn stop_highlight(&mut self) -> Option<PixelRect> {
        match self.marquee.stop_highlight(self.main.width(), self.main.height()) {
            Some(r) => self.set_clip(r.x, r.y, r.w, r.h),
            None => {
                self.remove_clip();
                None
            }
        }
    }

    /// Select a rectangle by corners and apply it as the clip.
    pub fn select_area(&mut self, x: i32, y: i32, x2: i32, y2: i32) -> Option<PixelRect> {
        self.marquee.select(x, y, x2, y2);
        self.stop_highlight()
    }

    pub fn marquee_view(&self) -> MarqueeView {
        self.marquee.update(self.main.width(), self.main.height())
    }

    pub fn clear_marquee(&mut self) {
        self.marquee.clear();
        self.remove_clip();
    }

    // ========================================================================
    // CLIPBOARD
    // ========================================================================

    /// Copy the clip (or the whole canvas) to the clipboard.
    pub fn copy(&mut self) -> bool {
        self.draw_and_end_paste();
        let r = self.clip.unwrap_or(self.main.bounds());
        let ok = self.copy.set_copy(self.main.image(), r.x, r.y, r.w, r.h);
        self.clear_marquee();
        if ok {
            self.events.emit(CanvasEvent::Copy);
        }
        ok
    }

    /// Copy, then clear the copied area of main and commit.
    pub fn cut(&mut self) -> bool {
        self.draw_and_end_paste();
        let r = self.clip.unwrap_or(self.main.bounds());
        if !self.copy.set_copy(self.main.image(), r.x, r.y, r.w, r.h) {
            return false;
        }
        self.get_direct_context().clear_rect(r.x, r.y, r.w, r.h);
        self.end_draw(Some(r));
        self.clear_marquee();
        self.events.emit(CanvasEvent::Copy);
        true
    }

    /// Flatten any running paste, then start pasting the clipboard at the
    /// position it was copied from.
    pub fn paste(&mut self) -> bool {
        if !self.copy.has_copy() {
            return false;
        }
        self.draw_and_end_paste();
        let paint = self.paint.with_composite(CompositeMode::SourceOver);
        let mut ctx = DrawContext::new(&mut self.overlay, paint, self.clip, StampMode::MaxAlpha);
        if !self.copy.start_paste(&mut ctx) {
            return false;
        }
        if let Some(area) = self.copy.paste_area() {
            self.redraw_upscale(area.x, area.y, area.w, area.h, true, 0);
        }
        self.events.emit(CanvasEvent::Paste);
        true
    }

    /// Move the running paste by `(dx, dy)` from the paste cursor. With
    /// `finalize` the new position becomes the cursor. Never commits.
    pub fn move_paste(&mut self, dx: i32, dy: i32, finalize: bool) -> bool {
        if !self.copy.is_pasting() {
            return false;
        }
        let before = self.copy.paste_area();
        let paint = self.paint.with_composite(CompositeMode::SourceOver);
        let mut ctx = DrawContext::new(&mut self.overlay, paint, self.clip, StampMode::MaxAlpha);
        let moved = self.copy.move_paste(&mut ctx, dx, dy, finalize);
        let after = self.copy.paste_area();
        let dirty = match (before, after) {
            (Some(b), Some(a)) => Some(b.union(&a)),
            (b, a) => b.or(a),
        };
        if let Some(d) = dirty {
            self.redraw_upscale(d.x, d.y, d.w, d.h, true, 0);
        }
        moved
    }

    /// Commit a running paste when it overlaps the clip (or there is no
    /// clip), then leave paste mode. Returns whether anything was committed.
    pub fn draw_and_end_paste(&mut self) -> bool {
        if !self.copy.is_pasting() {
            return false;
        }
        let footprint = self.copy.paste_area();
        let overlaps = match self.clip {
            Some(clip) => self.copy.overlaps_paste(&clip),
            None => true,
        };
        self.copy.end_paste();
        if overlaps && footprint.is_some() {
            self.end_draw(footprint)
        } else {
            self.discard_overlay();
            false
        }
    }

    /// Drop a running paste without committing it.
    fn end_paste_without_commit(&mut self) -> bool {
        if !self.copy.is_pasting() {
            return false;
        }
        self.copy.end_paste();
        self.discard_overlay();
        true
    }

    pub fn is_pasting(&self) -> bool {
        self.copy.is_pasting()
    }

    pub fn has_copy(&self) -> bool {
        self.copy.has_copy()
    }

    pub fn copy_manager(&self) -> &CopyManager {
        &self.copy
    }

    // ========================================================================
    // SURFACE REPLACEMENT — resize / scale / crop / undo of a different size
    // ========================================================================

    /// Swap in a new main surface. The clip is captured, removed and then
    /// reapplied clamped to the new bounds.
    fn replace_main(&mut self, image: RgbaImage, record: bool) {
        let clip = self.clip.take();
        let (w, h) = image.dimensions();
        self.main.replace(image);
        self.overlay = Surface::new(w, h);
        if record {
            self.undo.add(self.main.image());
            self.events.emit(CanvasEvent::Draw);
        }
        self.clip = clip.and_then(|c| c.clamp_to(w, h));
        if self.clip != clip {
            self.events.emit(CanvasEvent::Clip(self.clip));
        }
        self.sync_grid();
        self.rebuild_preview();
    }

    /// Change the canvas size without scaling; new area is transparent.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.draw_and_end_paste();
        if (width, height) == self.main.image().dimensions() {
            return false;
        }
        log_info!("Canvas: resize {}x{} -> {}x{}", self.main.width(), self.main.height(), width, height);
        let image = transform::resize_canvas(self.main.image(), width, height);
        self.replace_main(image, true);
        true
    }

    /// Rescale the content, smooth (triangle filter) or nearest-neighbour.
    pub fn scale(&mut self, width: u32, height: u32, smooth: bool) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.draw_and_end_paste();
        if (width, height) == self.main.image().dimensions() {
            return false;
        }
        log_info!(
            "Canvas: scale {}x{} -> {}x{} ({})",
            self.main.width(),
            self.main.height(),
            width,
            height,
            if smooth { "smooth" } else { "nearest" }
        );
        let image = transform::scale_image(self.main.image(), width, height, smooth);
        self.replace_main(image, true);
        true
    }

    /// Crop to the marquee selection, or to the drawn pixels when nothing is
    /// selected. No-op when already tight or the canvas is empty.
    pub fn crop(&mut self) -> bool {
        self.draw_and_end_paste();
        let (w, h) = (self.main.width(), self.main.height());
        let selected = self.marquee.clamped(w, h);
        let Some(target) = selected.or_else(|| transform::drawn_area(self.main.image())) else {
            return false;
        };
        if target == self.main.bounds() {
            return false;
        }
        let Some(image) = transform::crop_image(self.main.image(), target) else {
            return false;
        };
        if selected.is_some() {
            // The selection no longer means anything in the new bounds.
            self.clear_marquee();
        }
        log_info!("Canvas: crop {}x{} -> {:?}", w, h, target);
        self.replace_main(image, true);
        true
    }

    /// Tightest box around non-transparent pixels of main.
    pub fn get_drawn_area(&self) -> Option<PixelRect> {
        transform::drawn_area(self.main.image())
    }

    // ========================================================================
    // UNDO / REDO
    // ========================================================================

    /// Undo one step. A running paste is cancelled instead, consuming no
    /// history.
    pub fn undo(&mut self) -> bool {
        if self.end_paste_without_commit() {
            return true;
        }
        let Some(snapshot) = self.undo.undo() else {
            return false;
        };
        if snapshot.dimensions() == self.main.image().dimensions() {
            self.main.copy_from(snapshot);
            self.redraw_all();
        } else {
            let image = snapshot.clone();
            self.replace_main(image, false);
        }
        true
    }

    pub fn redo(&mut self) -> bool {
        self.end_paste_without_commit();
        let Some(snapshot) = self.undo.redo() else {
            return false;
        };
        if snapshot.dimensions() == self.main.image().dimensions() {
            self.main.copy_from(snapshot);
            self.redraw_all();
        } else {
            let image = snapshot.clone();
            self.replace_main(image, false);
        }
        true
    }

    fn redraw_all(&mut self) {
        if let Some(view) = self.preview_area {
            self.redraw_upscale(view.x, view.y, view.w, view.h, true, 0);
        }
    }

    pub fn has_undo(&self) -> bool {
        self.copy.is_pasting() || self.undo.has_undo()
    }

    pub fn has_redo(&self) -> bool {
        self.undo.has_redo()
    }

    pub fn history(&self) -> &UndoStack {
        &self.undo
    }

    // ========================================================================
    // PAINT STATE
    // ========================================================================

    pub fn paint(&self) -> PaintState {
        self.paint
    }

    pub fn set_colour(&mut self, colour: [u8; 3]) {
        self.paint.colour = colour;
    }

    pub fn get_colour(&self) -> [u8; 3] {
        self.paint.colour
    }

    /// Paint colour with the current alpha applied.
    pub fn get_rgb(&self) -> Rgba<u8> {
        self.paint.rgba()
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() {
            self.paint.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    pub fn get_alpha(&self) -> f32 {
        self.paint.alpha
    }

    pub fn use_blend_alpha(&mut self) {
        self.paint.composite = CompositeMode::SourceOver;
    }

    pub fn use_destination_alpha(&mut self) {
        self.paint.composite = CompositeMode::SourceAtop;
    }

    /// Main-surface pixel at canvas `(x, y)`, `None` outside the canvas.
    pub fn colour_pick(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if !self.main.bounds().contains(x, y) {
            return None;
        }
        Some(self.main.get_pixel(x, y))
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn get_width(&self) -> u32 {
        self.main.width()
    }

    pub fn get_height(&self) -> u32 {
        self.main.height()
    }

    pub fn get_zoom(&self) -> f32 {
        self.zoom
    }

    pub fn main_pixels(&self) -> &RgbaImage {
        self.main.image()
    }

    pub fn overlay_pixels(&self) -> &RgbaImage {
        self.overlay.image()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&CanvasEvent) + 'static) {
        self.events.subscribe(listener);
    }

    /// Encode main (never overlay or preview) as a data URL.
    pub fn to_data_url(&self, format: ImageType) -> Result<String, ExportError> {
        encode_data_url(self.main.image(), format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::TRANSPARENT;
    use std::cell::RefCell;
    use std::rc::Rc;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn red_canvas(w: u32, h: u32) -> CanvasManager {
        let mut c = CanvasManager::new(w, h);
        c.set_colour([255, 0, 0]);
        c
    }

    #[test]
    fn end_draw_commits_and_clears_overlay() {
        let mut c = red_canvas(10, 10);
        let area = c.get_context().fill_rect(2, 2, 3, 3);
        assert!(c.end_draw(area));
        assert_eq!(*c.main_pixels().get_pixel(3, 3), RED);
        assert!(c.overlay_pixels().pixels().all(|p| p[3] == 0));
        assert!(c.has_undo());
        assert_eq!(*c.preview().get_pixel(3, 3), RED);
    }

    #[test]
    fn overlay_is_painted_then_committed_at_full_alpha() {
        let mut c = red_canvas(4, 4);
        c.set_alpha(0.5);
        let a = c.get_context().fill_rect(0, 0, 2, 2);
        c.get_context().fill_rect(1, 1, 2, 2);
        c.end_draw(a);
        assert_eq!(c.main_pixels().get_pixel(1, 1)[3], 128);
    }

    #[test]
    fn destination_alpha_only_paints_existing_pixels() {
        let mut c = red_canvas(4, 1);
        c.set_colour([0, 0, 255]);
        let a = c.get_direct_context().fill_rect(0, 0, 2, 1);
        c.end_draw(a);
        c.set_colour([255, 0, 0]);
        c.use_destination_alpha();
        let a = c.get_context().fill_rect(0, 0, 4, 1);
        c.end_draw(a);
        assert_eq!(*c.main_pixels().get_pixel(0, 0), RED);
        assert_eq!(*c.main_pixels().get_pixel(3, 0), TRANSPARENT);
    }

    #[test]
    fn undo_redo_restore_pixels() {
        let mut c = red_canvas(5, 5);
        let a = c.get_context().plot(1, 1);
        c.end_draw(a);
        assert!(c.undo());
        assert_eq!(*c.main_pixels().get_pixel(1, 1), TRANSPARENT);
        assert!(!c.undo());
        assert!(c.redo());
        assert_eq!(*c.main_pixels().get_pixel(1, 1), RED);
        assert!(!c.redo());
    }

    #[test]
    fn undo_across_resize_restores_size() {
        let mut c = red_canvas(6, 4);
        assert!(c.resize(10, 8));
        assert_eq!((c.get_width(), c.get_height()), (10, 8));
        assert!(c.undo());
        assert_eq!((c.get_width(), c.get_height()), (6, 4));
        assert_eq!(c.overlay_pixels().dimensions(), (6, 4));
    }

    #[test]
    fn resize_keeps_clip_clamped() {
        let mut c = red_canvas(20, 20);
        c.set_clip(10, 10, 8, 8);
        c.resize(14, 30);
        assert_eq!(c.get_clip(), Some(PixelRect::new(10, 10, 4, 8)));
    }

    #[test]
    fn set_clip_normalizes_and_empty_removes() {
        let mut c = red_canvas(10, 10);
        assert_eq!(c.set_clip(8, 8, -5, -20), Some(PixelRect::new(3, 0, 5, 8)));
        assert_eq!(c.set_clip(20, 20, 5, 5), None);
        assert_eq!(c.get_clip(), None);
    }

    #[test]
    fn clip_limits_direct_drawing() {
        let mut c = red_canvas(10, 10);
        c.set_clip(0, 0, 5, 5);
        let a = c.get_direct_context().fill_rect(0, 0, 10, 10);
        assert_eq!(a, Some(PixelRect::new(0, 0, 5, 5)));
        c.end_draw(a);
        assert_eq!(c.main_pixels().get_pixel(6, 6)[3], 0);
    }

    #[test]
    fn crop_to_drawn_area_and_selection() {
        let mut c = red_canvas(20, 20);
        assert!(!c.crop());
        let a = c.get_direct_context().fill_rect(4, 5, 3, 2);
        c.end_draw(a);
        assert!(c.crop());
        assert_eq!((c.get_width(), c.get_height()), (3, 2));
        assert!(!c.crop());

        let mut c = red_canvas(20, 20);
        c.select_area(2, 2, 12, 7);
        assert!(c.crop());
        assert_eq!((c.get_width(), c.get_height()), (10, 5));
        assert_eq!(c.get_clip(), None);
    }

    #[test]
    fn scale_nearest_and_smooth() {
        let mut c = red_canvas(2, 2);
        let a = c.get_direct_context().plot(0, 0);
        c.end_draw(a);
        assert!(c.scale(4, 4, false));
        assert_eq!(*c.main_pixels().get_pixel(1, 1), RED);
        assert_eq!(c.main_pixels().get_pixel(2, 2)[3], 0);
        assert!(c.scale(8, 8, true));
        assert_eq!(c.main_pixels().dimensions(), (8, 8));
    }

    #[test]
    fn undo_while_pasting_cancels_paste() {
        let mut c = red_canvas(10, 10);
        let a = c.get_direct_context().fill_rect(0, 0, 2, 2);
        c.end_draw(a);
        assert!(c.copy());
        assert!(c.paste());
        assert!(c.is_pasting());
        let index = c.history().undo_count();
        assert!(c.undo());
        assert!(!c.is_pasting());
        assert_eq!(c.history().undo_count(), index);
        assert!(c.overlay_pixels().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn cut_clears_and_commits() {
        let mut c = red_canvas(10, 10);
        let a = c.get_direct_context().fill_rect(0, 0, 10, 10);
        c.end_draw(a);
        c.set_clip(2, 2, 3, 3);
        assert!(c.cut());
        assert_eq!(c.get_clip(), None);
        assert_eq!(c.main_pixels().get_pixel(3, 3)[3], 0);
        assert_eq!(c.main_pixels().get_pixel(1, 1)[3], 255);
        assert_eq!(c.copy_manager().clipboard().map(|cb| cb.image.dimensions()), Some((3, 3)));
    }

    #[test]
    fn events_follow_state_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut c = red_canvas(10, 10);
        let log = Rc::clone(&seen);
        c.subscribe(move |e| log.borrow_mut().push(*e));

        let a = c.get_context().plot(1, 1);
        c.end_draw(a);
        c.set_clip(0, 0, 4, 4);
        c.copy();
        c.paste();
        assert_eq!(
            *seen.borrow(),
            vec![
                CanvasEvent::Draw,
                CanvasEvent::Clip(Some(PixelRect::new(0, 0, 4, 4))),
                CanvasEvent::Clip(None),
                CanvasEvent::Copy,
                CanvasEvent::Paste,
            ]
        );
    }

    #[test]
    fn zoom_hides_preview_until_debounce_expires() {
        let mut c = red_canvas(8, 8);
        c.set_viewport(Rect::from_min_size(Pos2::ZERO, Vec2::splat(200.0)));
        c.tick(1_000);
        assert!(c.is_preview_visible());

        c.zoom_in();
        assert!(!c.is_preview_visible());
        c.tick(1_050);
        c.zoom_in();
        c.tick(1_120);
        assert!(!c.is_preview_visible());
        c.tick(1_150);
        assert!(c.is_preview_visible());
        assert_eq!(c.get_zoom(), 4.0);
        assert_eq!(c.preview().dimensions(), (32, 32));
    }

    #[test]
    fn translate_location_inverts_layout() {
        let mut c = red_canvas(10, 10);
        c.set_viewport(Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(200.0, 100.0)));
        c.tick(10_000);
        c.set_zoom(2.0);
        // Canvas is 20x20 on screen, centred at (200, 100).
        assert_eq!(c.canvas_origin(), Pos2::new(190.0, 90.0));
        assert_eq!(c.translate_location(Pos2::new(195.0, 97.0)), (2.5, 3.5));
    }

    #[test]
    fn zoom_around_keeps_anchor_fixed() {
        let mut c = red_canvas(10, 10);
        c.set_viewport(Rect::from_min_size(Pos2::ZERO, Vec2::splat(100.0)));
        c.tick(10_000);
        let anchor = Pos2::new(48.0, 46.0);
        let before = c.translate_location(anchor);
        c.zoom_around(2.0, anchor);
        let after = c.translate_location(anchor);
        assert!((before.0 - after.0).abs() < 0.5 && (before.1 - after.1).abs() < 0.5);
    }

    /// 8x8 canvas at zoom 2 where a full refresh splits into four tiles.
    fn tiled_canvas() -> CanvasManager {
        let settings = EngineSettings {
            upscale_divide_area: 100,
            upscale_tile_size: 4,
            ..EngineSettings::default()
        };
        let mut c = CanvasManager::with_settings(8, 8, settings);
        c.set_colour([255, 0, 0]);
        c.set_viewport(Rect::from_min_size(Pos2::ZERO, Vec2::splat(64.0)));
        c.tick(10_000);
        c.set_zoom(2.0);
        c.tick(20_000);
        while c.run_animation_frame() {}
        c
    }

    #[test]
    fn large_refresh_is_tiled() {
        let mut c = tiled_canvas();
        let a = c.get_direct_context().fill_rect(0, 0, 8, 8);
        c.end_draw(a);
        assert_eq!(c.pending_tiles(), 4);
        // Cheap pass already shows the pixels.
        assert_eq!(*c.preview().get_pixel(15, 15), RED);
        let mut frames = 0;
        while c.run_animation_frame() {
            frames += 1;
        }
        assert_eq!(frames, 4);
        assert_eq!(c.pending_tiles(), 0);
    }

    #[test]
    fn new_refresh_drops_queued_tiles() {
        let mut c = tiled_canvas();
        let a = c.get_direct_context().fill_rect(0, 0, 8, 8);
        c.end_draw(a);
        assert!(c.run_animation_frame());
        assert_eq!(c.pending_tiles(), 3);

        // A second divided refresh replaces the batch instead of adding to it.
        assert!(c.redraw_upscale(0, 0, 8, 8, false, 0));
        assert_eq!(c.pending_tiles(), 4);

        // So does a small synchronous one; its overlay pixels must survive.
        c.set_colour([0, 0, 255]);
        c.get_context().plot(1, 1);
        assert!(c.redraw_upscale(1, 1, 1, 1, true, 0));
        assert_eq!(c.pending_tiles(), 0);
        while c.run_animation_frame() {}
        assert_eq!(*c.preview().get_pixel(2, 2), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn layout_changes_drop_queued_tiles() {
        let mut c = tiled_canvas();
        let a = c.get_direct_context().fill_rect(0, 0, 8, 8);
        c.end_draw(a);
        assert!(c.pending_tiles() > 0);
        c.scroll_by(Vec2::new(3.0, 0.0));
        assert_eq!(c.pending_tiles(), 0);

        c.tick(30_000);
        assert!(c.is_preview_visible());
        assert!(c.pending_tiles() > 0);
        c.zoom_in();
        assert_eq!(c.pending_tiles(), 0);
        assert!(!c.run_animation_frame());
    }

    #[test]
    fn zoomed_out_refresh_masks_overlay_by_destination_alpha() {
        let mut c = red_canvas(4, 1);
        c.set_colour([0, 0, 255]);
        let a = c.get_direct_context().plot(0, 0);
        c.end_draw(a);

        c.set_colour([255, 0, 0]);
        c.use_destination_alpha();
        c.get_context().fill_rect(0, 0, 4, 1);
        assert!(c.redraw_upscale(0, 0, 4, 1, true, 0));
        assert_eq!(*c.preview().get_pixel(0, 0), RED);
        assert_eq!(c.preview().get_pixel(3, 0)[3], 0);

        c.use_blend_alpha();
        assert!(c.redraw_upscale(0, 0, 4, 1, true, 0));
        assert_eq!(*c.preview().get_pixel(3, 0), RED);
    }

    #[test]
    fn redraw_upscale_rejects_outside_regions() {
        let mut c = red_canvas(10, 10);
        assert!(!c.redraw_upscale(-50, -50, 10, 10, true, 0));
        assert!(c.redraw_upscale(5, 5, 0, 0, true, 0));
        assert!(c.redraw_upscale(5, 5, -3, -3, true, 1));
    }

    #[test]
    fn data_url_exports_main() {
        let c = red_canvas(3, 3);
        assert!(c.to_data_url(ImageType::Png).unwrap().starts_with("data:image/png;base64,"));
    }
}
