use egui::Pos2;
use image::Rgba;

use crate::canvas::CanvasManager;
use crate::components::controls::{Control, ControlSet};
use crate::error::ControlError;
use crate::geometry::PixelRect;
use crate::surface::DrawContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolKind {
    #[default]
    Pencil,
    Eraser,
    Line,
    Rectangle,
    Fill,
    Picker,
}

impl ToolKind {
    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Pencil,
            ToolKind::Eraser,
            ToolKind::Line,
            ToolKind::Rectangle,
            ToolKind::Fill,
            ToolKind::Picker,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Pencil => "Pencil",
            ToolKind::Eraser => "Eraser",
            ToolKind::Line => "Line",
            ToolKind::Rectangle => "Rectangle",
            ToolKind::Fill => "Fill",
            ToolKind::Picker => "Colour Picker",
        }
    }
}

/// Settings shared by every tool; each tool exposes the subset it uses
/// through [`ToolKind::controls`].
#[derive(Clone, Debug, PartialEq)]
pub struct ToolProperties {
    /// Dab / stroke width in canvas pixels.
    pub size: f32,
    /// Flood-fill colour tolerance, 0..=255 per channel.
    pub tolerance: f32,
    /// Rectangle: filled instead of outlined.
    pub filled: bool,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            size: 1.0,
            tolerance: 0.0,
            filled: false,
        }
    }
}

const FILL_MODES: &[&str] = &["Outline", "Filled"];

fn size_control() -> Control<ToolProperties> {
    Control::Slider {
        name: "Size",
        min: 1.0,
        max: 64.0,
        step: 1.0,
        get: |p: &ToolProperties| p.size,
        set: |p: &mut ToolProperties, v: f32| p.size = v,
    }
}

impl ToolKind {
    /// The controls a GUI should build for this tool.
    pub fn controls(&self) -> Result<ControlSet<ToolProperties>, ControlError> {
        let controls: Vec<Control<ToolProperties>> = match self {
            ToolKind::Pencil | ToolKind::Eraser | ToolKind::Line => vec![size_control()],
            ToolKind::Rectangle => vec![
                size_control(),
                Control::Toggle {
                    name: "Mode",
                    options: FILL_MODES,
                    get: |p: &ToolProperties| p.filled as usize,
                    set: |p: &mut ToolProperties, v: usize| p.filled = v == 1,
                },
            ],
            ToolKind::Fill => vec![Control::Slider {
                name: "Tolerance",
                min: 0.0,
                max: 255.0,
                step: 1.0,
                get: |p: &ToolProperties| p.tolerance,
                set: |p: &mut ToolProperties, v: f32| p.tolerance = v,
            }],
            ToolKind::Picker => Vec::new(),
        };
        ControlSet::new(controls)
    }
}

// ============================================================================
// DRAW AREA — tool-local dirty-rect accumulation
// ============================================================================

/// Accumulates the canvas area a tool has drawn over during one stroke.
#[derive(Clone, Copy, Debug, Default)]
pub struct DrawArea {
    area: Option<PixelRect>,
}

impl DrawArea {
    pub fn set(&mut self, rect: Option<PixelRect>) {
        self.area = rect.map(|r| r.normalized());
    }

    pub fn add(&mut self, rect: Option<PixelRect>) {
        if let Some(r) = rect {
            self.area = Some(match self.area {
                Some(a) => a.union(&r),
                None => r.normalized(),
            });
        }
    }

    pub fn get(&self) -> Option<PixelRect> {
        self.area
    }

    pub fn take(&mut self) -> Option<PixelRect> {
        self.area.take()
    }
}

#[inline]
fn pixel(v: f32) -> i32 {
    v.floor() as i32
}

/// Shift-constrained line end: horizontal, vertical or 45°.
fn constrain_line(start: (f32, f32), end: (f32, f32)) -> (f32, f32) {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    if dx.abs() > dy.abs() * 2.0 {
        (end.0, start.1)
    } else if dy.abs() > dx.abs() * 2.0 {
        (start.0, end.1)
    } else {
        let side = dx.abs().max(dy.abs());
        (start.0 + side * dx.signum(), start.1 + side * dy.signum())
    }
}

/// Shift-constrained rectangle corner: 1:1 aspect ratio.
fn constrain_square(start: (f32, f32), end: (f32, f32)) -> (f32, f32) {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let side = dx.abs().max(dy.abs());
    (start.0 + side * dx.signum(), start.1 + side * dy.signum())
}

fn refresh(canvas: &mut CanvasManager, rect: Option<PixelRect>, include_overlay: bool) {
    if let Some(r) = rect {
        let buffer = canvas.settings().upscale_buffer;
        canvas.redraw_upscale(r.x, r.y, r.w, r.h, include_overlay, buffer);
    }
}

// ============================================================================
// TOOLS
// ============================================================================

/// Freehand overlay strokes.
#[derive(Clone, Debug, Default)]
pub struct Pencil {
    last: Option<(f32, f32)>,
    area: DrawArea,
}

impl Pencil {
    fn down(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, x: f32, y: f32) {
        let dab = canvas.get_context().stamp(pixel(x), pixel(y), props.size as u32);
        self.area.set(dab);
        self.last = Some((x, y));
        refresh(canvas, dab, true);
    }

    fn moved(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, x: f32, y: f32) {
        let Some((lx, ly)) = self.last else { return };
        // Sub-pixel movement would redraw the same dabs.
        if (x - lx).abs() < 0.5 && (y - ly).abs() < 0.5 {
            return;
        }
        let seg = canvas
            .get_context()
            .line(pixel(lx), pixel(ly), pixel(x), pixel(y), props.size as u32);
        self.area.add(seg);
        self.last = Some((x, y));
        refresh(canvas, seg, true);
    }

    fn up(&mut self, canvas: &mut CanvasManager) {
        // A stroke that touched nothing leaves no history entry.
        if self.last.take().is_some()
            && let Some(area) = self.area.take()
        {
            canvas.end_draw(Some(area));
        }
    }
}

/// Hard erase straight on the main surface.
#[derive(Clone, Debug, Default)]
pub struct Eraser {
    last: Option<(f32, f32)>,
    area: DrawArea,
}

impl Eraser {
    fn erase_segment(ctx: &mut DrawContext, from: (i32, i32), to: (i32, i32), size: u32) -> Option<PixelRect> {
        let size = size.max(1) as i32;
        let half = size / 2;
        let mut area: Option<PixelRect> = None;
        crate::surface::walk_line(from.0, from.1, to.0, to.1, |x, y| {
            if let Some(r) = ctx.clear_rect(x - half, y - half, size, size) {
                area = Some(area.map_or(r, |a| a.union(&r)));
            }
        });
        area
    }

    fn down(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, x: f32, y: f32) {
        let p = (pixel(x), pixel(y));
        let erased = Self::erase_segment(&mut canvas.get_direct_context(), p, p, props.size as u32);
        self.area.set(erased);
        self.last = Some((x, y));
        refresh(canvas, erased, false);
    }

    fn moved(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, x: f32, y: f32) {
        let Some((lx, ly)) = self.last else { return };
        if (x - lx).abs() < 0.5 && (y - ly).abs() < 0.5 {
            return;
        }
        let erased = Self::erase_segment(
            &mut canvas.get_direct_context(),
            (pixel(lx), pixel(ly)),
            (pixel(x), pixel(y)),
            props.size as u32,
        );
        self.area.add(erased);
        self.last = Some((x, y));
        refresh(canvas, erased, false);
    }

    fn up(&mut self, canvas: &mut CanvasManager) {
        // A stroke that touched nothing leaves no history entry.
        if self.last.take().is_some()
            && let Some(area) = self.area.take()
        {
            canvas.end_draw(Some(area));
        }
    }
}

/// Line and rectangle: the shape is cleared and redrawn on the overlay on
/// every move, then committed on release.
#[derive(Clone, Debug, Default)]
pub struct Shape {
    start: Option<(f32, f32)>,
    current: (f32, f32),
    shift: bool,
    area: DrawArea,
}

impl Shape {
    fn down(&mut self, x: f32, y: f32) {
        self.start = Some((x, y));
        self.current = (x, y);
        self.area.set(None);
    }

    fn redraw(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, rectangle: bool) {
        let Some(start) = self.start else { return };
        let previous = self.area.take();
        let drawn = {
            let mut ctx = canvas.get_context();
            ctx.clear();
            if rectangle {
                let end = if self.shift { constrain_square(start, self.current) } else { self.current };
                let r = PixelRect::from_corners(pixel(start.0), pixel(start.1), pixel(end.0), pixel(end.1));
                // Corners are inclusive for shapes.
                let r = PixelRect::new(r.x, r.y, r.w + 1, r.h + 1);
                if props.filled {
                    ctx.fill_rect(r.x, r.y, r.w, r.h)
                } else {
                    ctx.stroke_rect(r, props.size as u32)
                }
            } else {
                let end = if self.shift { constrain_line(start, self.current) } else { self.current };
                ctx.line(pixel(start.0), pixel(start.1), pixel(end.0), pixel(end.1), props.size as u32)
            }
        };
        self.area.set(drawn);
        let mut dirty = DrawArea::default();
        dirty.set(previous);
        dirty.add(drawn);
        refresh(canvas, dirty.get(), true);
    }

    fn moved(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, x: f32, y: f32, rectangle: bool) {
        if self.start.is_none() {
            return;
        }
        self.current = (x, y);
        self.redraw(canvas, props, rectangle);
    }

    fn shift(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, held: bool, rectangle: bool) {
        self.shift = held;
        if self.start.is_some() {
            self.redraw(canvas, props, rectangle);
        }
    }

    fn up(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, rectangle: bool) {
        if self.start.is_none() {
            return;
        }
        // A click without a drag still leaves a one-pixel shape.
        if self.area.get().is_none() {
            self.redraw(canvas, props, rectangle);
        }
        self.start = None;
        if let Some(area) = self.area.take() {
            canvas.end_draw(Some(area));
        }
    }
}

/// Flood fill on the main surface.
#[derive(Clone, Debug, Default)]
pub struct Fill;

impl Fill {
    fn down(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, x: f32, y: f32) {
        let filled = {
            let mut ctx = canvas.get_direct_context();
            fill_region(&mut ctx, pixel(x), pixel(y), props.tolerance)
        };
        if filled.is_some() {
            canvas.end_draw(filled);
        }
    }
}

/// Picks the main-surface colour under the pointer.
#[derive(Clone, Debug, Default)]
pub struct Picker;

impl Picker {
    fn pick(&mut self, canvas: &mut CanvasManager, x: f32, y: f32) {
        if let Some(px) = canvas.colour_pick(pixel(x), pixel(y))
            && px[3] > 0
        {
            canvas.set_colour([px[0], px[1], px[2]]);
        }
    }
}

/// Channel-wise colour match with a tolerance.
#[inline(always)]
fn matches(p: [u8; 4], tc: [u8; 4], tol: f32) -> bool {
    if tc[3] == 0 && p[3] == 0 {
        return true;
    }
    if tc[3] == 0 || p[3] == 0 {
        return (tc[3] as f32 - p[3] as f32).abs() <= tol;
    }
    let r = (tc[0] as f32 - p[0] as f32).abs();
    let g = (tc[1] as f32 - p[1] as f32).abs();
    let b = (tc[2] as f32 - p[2] as f32).abs();
    let a = (tc[3] as f32 - p[3] as f32).abs();
    r.max(g).max(b).max(a) <= tol
}

/// 4-connected flood fill of the region around `(x, y)` with the context's
/// paint, limited to its clip. Returns the filled bounding box.
pub fn fill_region(ctx: &mut DrawContext, x: i32, y: i32, tolerance: f32) -> Option<PixelRect> {
    let (w, h) = (ctx.width() as i32, ctx.height() as i32);
    let limit = match ctx.clip() {
        Some(c) => c.clamp_to(w as u32, h as u32)?,
        None => PixelRect::new(0, 0, w, h),
    };
    if !limit.contains(x, y) {
        return None;
    }

    let wu = w as usize;
    let flat = ctx.pixels().as_raw();
    let pix = |idx: usize| -> [u8; 4] {
        let o = idx * 4;
        [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
    };
    let seed = y as usize * wu + x as usize;
    let tc = pix(seed);
    // Filling with the exact colour already there would change nothing.
    if ctx.paint().rgba() == Rgba(tc) {
        return None;
    }

    // mask doubles as the visited array and the output
    let mut mask = vec![false; wu * h as usize];
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    mask[seed] = true;
    stack.push(seed as u32);
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);

    while let Some(idx) = stack.pop() {
        let px = (idx as usize % wu) as i32;
        let py = (idx as usize / wu) as i32;
        min_x = min_x.min(px);
        max_x = max_x.max(px);
        min_y = min_y.min(py);
        max_y = max_y.max(py);

        for (nx, ny) in [(px - 1, py), (px + 1, py), (px, py - 1), (px, py + 1)] {
            if !limit.contains(nx, ny) {
                continue;
            }
            let ni = ny as usize * wu + nx as usize;
            if !mask[ni] && matches(pix(ni), tc, tolerance) {
                mask[ni] = true;
                stack.push(ni as u32);
            }
        }
    }

    // Fill horizontal runs of the mask.
    for py in min_y..=max_y {
        let row = py as usize * wu;
        let mut px = min_x;
        while px <= max_x {
            if !mask[row + px as usize] {
                px += 1;
                continue;
            }
            let start = px;
            while px <= max_x && mask[row + px as usize] {
                px += 1;
            }
            ctx.fill_rect(start, py, px - start, 1);
        }
    }

    Some(PixelRect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

// ============================================================================
// TOOL — closed set of tools behind one capability interface
// ============================================================================

pub enum Tool {
    Pencil(Pencil),
    Eraser(Eraser),
    Line(Shape),
    Rectangle(Shape),
    Fill(Fill),
    Picker(Picker),
}

impl Tool {
    pub fn new(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Pencil => Tool::Pencil(Pencil::default()),
            ToolKind::Eraser => Tool::Eraser(Eraser::default()),
            ToolKind::Line => Tool::Line(Shape::default()),
            ToolKind::Rectangle => Tool::Rectangle(Shape::default()),
            ToolKind::Fill => Tool::Fill(Fill),
            ToolKind::Picker => Tool::Picker(Picker),
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Tool::Pencil(_) => ToolKind::Pencil,
            Tool::Eraser(_) => ToolKind::Eraser,
            Tool::Line(_) => ToolKind::Line,
            Tool::Rectangle(_) => ToolKind::Rectangle,
            Tool::Fill(_) => ToolKind::Fill,
            Tool::Picker(_) => ToolKind::Picker,
        }
    }

    pub fn on_down(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, x: f32, y: f32) {
        match self {
            Tool::Pencil(t) => t.down(canvas, props, x, y),
            Tool::Eraser(t) => t.down(canvas, props, x, y),
            Tool::Line(t) | Tool::Rectangle(t) => t.down(x, y),
            Tool::Fill(t) => t.down(canvas, props, x, y),
            Tool::Picker(t) => t.pick(canvas, x, y),
        }
    }

    pub fn on_move(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, x: f32, y: f32) {
        match self {
            Tool::Pencil(t) => t.moved(canvas, props, x, y),
            Tool::Eraser(t) => t.moved(canvas, props, x, y),
            Tool::Line(t) => t.moved(canvas, props, x, y, false),
            Tool::Rectangle(t) => t.moved(canvas, props, x, y, true),
            Tool::Fill(_) => {}
            Tool::Picker(t) => t.pick(canvas, x, y),
        }
    }

    pub fn on_up(&mut self, canvas: &mut CanvasManager, props: &ToolProperties) {
        match self {
            Tool::Pencil(t) => t.up(canvas),
            Tool::Eraser(t) => t.up(canvas),
            Tool::Line(t) => t.up(canvas, props, false),
            Tool::Rectangle(t) => t.up(canvas, props, true),
            Tool::Fill(_) | Tool::Picker(_) => {}
        }
    }

    pub fn on_shift(&mut self, canvas: &mut CanvasManager, props: &ToolProperties, held: bool) {
        match self {
            Tool::Line(t) => t.shift(canvas, props, held, false),
            Tool::Rectangle(t) => t.shift(canvas, props, held, true),
            _ => {}
        }
    }
}

// ============================================================================
// TOOL SESSION — current tool and modifier state
// ============================================================================

/// Input-handling state: which tool is active, which one to return to after
/// a temporary switch, and the held modifiers.
pub struct ToolSession {
    pub properties: ToolProperties,
    current: Tool,
    /// Tool to restore after the picker (alt) or eraser switch ends.
    previous: Option<ToolKind>,
    shift: bool,
    alt: bool,
    pointer_down: bool,
}

impl Default for ToolSession {
    fn default() -> Self {
        Self::new(ToolKind::default())
    }
}

impl ToolSession {
    pub fn new(kind: ToolKind) -> Self {
        Self {
            properties: ToolProperties::default(),
            current: Tool::new(kind),
            previous: None,
            shift: false,
            alt: false,
            pointer_down: false,
        }
    }

    pub fn current(&self) -> ToolKind {
        self.current.kind()
    }

    pub fn previous(&self) -> Option<ToolKind> {
        self.previous
    }

    pub fn is_shift_held(&self) -> bool {
        self.shift
    }

    pub fn is_alt_held(&self) -> bool {
        self.alt
    }

    /// Switch tools. An unfinished stroke is committed first.
    pub fn select(&mut self, canvas: &mut CanvasManager, kind: ToolKind) {
        if self.pointer_down {
            self.current.on_up(canvas, &self.properties);
            self.pointer_down = false;
        }
        self.current = Tool::new(kind);
        self.previous = None;
    }

    pub fn pointer_down(&mut self, canvas: &mut CanvasManager, pos: Pos2) {
        if canvas.is_pasting() {
            canvas.draw_and_end_paste();
        }
        let (x, y) = canvas.translate_location(pos);
        self.pointer_down = true;
        self.current.on_down(canvas, &self.properties, x, y);
    }

    pub fn pointer_move(&mut self, canvas: &mut CanvasManager, pos: Pos2) {
        if !self.pointer_down {
            return;
        }
        let (x, y) = canvas.translate_location(pos);
        self.current.on_move(canvas, &self.properties, x, y);
    }

    pub fn pointer_up(&mut self, canvas: &mut CanvasManager, pos: Pos2) {
        if !self.pointer_down {
            return;
        }
        self.pointer_move(canvas, pos);
        self.pointer_down = false;
        self.current.on_up(canvas, &self.properties);
        // Modifier changes during the stroke take effect now.
        self.apply_alt(canvas);
    }

    pub fn set_shift(&mut self, canvas: &mut CanvasManager, held: bool) {
        if self.shift != held {
            self.shift = held;
            self.current.on_shift(canvas, &self.properties, held);
        }
    }

    /// Holding alt switches to the picker; releasing it restores the tool.
    pub fn set_alt(&mut self, canvas: &mut CanvasManager, held: bool) {
        if self.alt == held {
            return;
        }
        self.alt = held;
        if !self.pointer_down {
            self.apply_alt(canvas);
        }
    }

    fn apply_alt(&mut self, canvas: &mut CanvasManager) {
        let kind = self.current.kind();
        if self.alt && kind != ToolKind::Picker {
            self.previous = Some(kind);
            self.current = Tool::new(ToolKind::Picker);
        } else if !self.alt
            && kind == ToolKind::Picker
            && let Some(prev) = self.previous.take()
        {
            self.current = Tool::new(prev);
            self.current.on_shift(canvas, &self.properties, self.shift);
        }
    }

    /// Eraser switch: into the eraser, or back to the tool used before it.
    pub fn toggle_eraser(&mut self, canvas: &mut CanvasManager) {
        if self.pointer_down {
            return;
        }
        if self.current.kind() == ToolKind::Eraser {
            let back = self.previous.take().unwrap_or_default();
            self.current = Tool::new(back);
            self.current.on_shift(canvas, &self.properties, self.shift);
        } else {
            self.previous = Some(self.current.kind());
            self.current = Tool::new(ToolKind::Eraser);
        }
    }
}
