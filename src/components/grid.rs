use egui::{Pos2, Rect, Vec2};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// One screen-space grid line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLine {
    pub orientation: Orientation,
    pub from: Pos2,
    pub to: Pos2,
}

/// Passive grid overlay kept in lockstep with the canvas layout.
///
/// Any change only marks the grid dirty; lines are regenerated on the next
/// [`GridManager::lines`] call while the grid is shown.
pub struct GridManager {
    cell: (u32, u32),
    /// Canvas-pixel offset of the first grid line.
    offset: (i32, i32),
    zoom: f32,
    /// Screen position of canvas pixel (0, 0).
    origin: Pos2,
    canvas_size: (u32, u32),
    viewport: Rect,
    shown: bool,
    dirty: bool,
    lines: Vec<GridLine>,
}

impl GridManager {
    pub fn new(cell_w: u32, cell_h: u32) -> Self {
        Self {
            cell: (cell_w.max(1), cell_h.max(1)),
            offset: (0, 0),
            zoom: 1.0,
            origin: Pos2::ZERO,
            canvas_size: (0, 0),
            viewport: Rect::NOTHING,
            shown: false,
            dirty: true,
            lines: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> (u32, u32) {
        self.cell
    }

    pub fn set_cell_size(&mut self, cell_w: u32, cell_h: u32) {
        let cell = (cell_w.max(1), cell_h.max(1));
        if cell != self.cell {
            self.cell = cell;
            self.dirty = true;
        }
    }

    pub fn set_offset(&mut self, x: i32, y: i32) {
        if (x, y) != self.offset {
            self.offset = (x, y);
            self.dirty = true;
        }
    }

    /// Follow the canvas: its screen origin, zoom, size and the visible viewport.
    pub fn set_layout(&mut self, origin: Pos2, zoom: f32, canvas_size: (u32, u32), viewport: Rect) {
        if origin != self.origin || zoom != self.zoom || canvas_size != self.canvas_size || viewport != self.viewport {
            self.origin = origin;
            self.zoom = zoom;
            self.canvas_size = canvas_size;
            self.viewport = viewport;
            self.dirty = true;
        }
    }

    pub fn show(&mut self) {
        self.shown = true;
    }

    pub fn hide(&mut self) {
        self.shown = false;
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current lines; empty while hidden.
    pub fn lines(&mut self) -> &[GridLine] {
        if !self.shown {
            return &[];
        }
        if self.dirty {
            self.regenerate();
        }
        &self.lines
    }

    /// Outline / centre stroke widths, thinner as the zoom grows.
    pub fn stroke_widths(&self) -> (f32, f32) {
        let (base_outline, base_center) = (1.2_f32, 0.6_f32);
        let reference_zoom = 8.0;
        let cell_px = self.zoom * self.cell.0.min(self.cell.1) as f32;
        let outline = (base_outline * reference_zoom / cell_px).clamp(0.5, base_outline);
        let center = (base_center * reference_zoom / cell_px).clamp(0.3, base_center);
        (outline, center)
    }

    fn regenerate(&mut self) {
        self.lines.clear();
        self.dirty = false;

        let size = Vec2::new(self.canvas_size.0 as f32, self.canvas_size.1 as f32) * self.zoom;
        let image_rect = Rect::from_min_size(self.origin, size);
        let visible = image_rect.intersect(self.viewport);
        let zoom = self.zoom;
        if !visible.is_positive() || zoom <= 0.0 {
            return;
        }

        let axis = |cell: u32, offset: i32, extent: u32, screen_min: f32, vis_min: f32, vis_max: f32| -> Vec<f32> {
            let cell = cell as i32;
            let mut c = offset.rem_euclid(cell);
            // Skip straight to the first visible line.
            let first_visible = ((vis_min - screen_min) / zoom).floor() as i32;
            if first_visible > c {
                c += (first_visible - c) / cell * cell;
            }
            let mut out = Vec::new();
            while c <= extent as i32 {
                let s = screen_min + c as f32 * zoom;
                if s > vis_max {
                    break;
                }
                if s >= vis_min {
                    out.push(s);
                }
                c += cell;
            }
            out
        };

        for x in axis(self.cell.0, self.offset.0, self.canvas_size.0, image_rect.min.x, visible.min.x, visible.max.x) {
            self.lines.push(GridLine {
                orientation: Orientation::Vertical,
                from: Pos2::new(x, visible.min.y),
                to: Pos2::new(x, visible.max.y),
            });
        }
        for y in axis(self.cell.1, self.offset.1, self.canvas_size.1, image_rect.min.y, visible.min.y, visible.max.y) {
            self.lines.push(GridLine {
                orientation: Orientation::Horizontal,
                from: Pos2::new(visible.min.x, y),
                to: Pos2::new(visible.max.x, y),
            });
        }
    }
}
