use crate::geometry::PixelRect;

/// Corner handles of the marquee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    BottomRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Drag {
    Select,
    Handle(Handle),
}

/// What the host should draw for the marquee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarqueeView {
    Hidden,
    Visible(PixelRect),
    /// A selection exists but none of it lies on the canvas.
    OutsideCanvas(PixelRect),
}

/// Rectangle selector: drag to select, then resize from either corner.
///
/// Corners are kept exactly as dragged (they may be in any order); everything
/// that reads the selection goes through [`Marquee::selection`].
#[derive(Clone, Debug, Default)]
pub struct Marquee {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    drag: Option<Drag>,
}

impl Marquee {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a drag-to-select at `(x, y)`.
    pub fn start_highlight(&mut self, x: i32, y: i32) {
        self.x0 = x;
        self.y0 = y;
        self.x1 = x;
        self.y1 = y;
        self.drag = Some(Drag::Select);
    }

    /// Move whatever is being dragged to `(x, y)`.
    pub fn highlight(&mut self, x: i32, y: i32) {
        match self.drag {
            Some(Drag::Select) => {
                self.x1 = x;
                self.y1 = y;
            }
            Some(Drag::Handle(_)) => self.drag_handle(x, y),
            None => {}
        }
    }

    /// Set both corners directly.
    pub fn select(&mut self, x: i32, y: i32, x2: i32, y2: i32) -> &mut Self {
        self.x0 = x;
        self.y0 = y;
        self.x1 = x2;
        self.y1 = y2;
        self
    }

    /// Grab a corner. Corners are normalized first so `TopLeft` really is the
    /// minimum corner.
    pub fn start_handle_drag(&mut self, handle: Handle) {
        let r = self.selection();
        self.x0 = r.x;
        self.y0 = r.y;
        self.x1 = r.right();
        self.y1 = r.bottom();
        self.drag = Some(Drag::Handle(handle));
    }

    pub fn drag_handle(&mut self, x: i32, y: i32) {
        match self.drag {
            Some(Drag::Handle(Handle::TopLeft)) => {
                self.x0 = x;
                self.y0 = y;
            }
            Some(Drag::Handle(Handle::BottomRight)) => {
                self.x1 = x;
                self.y1 = y;
            }
            _ => {}
        }
    }

    /// Which handle, if any, lies within `tolerance` canvas pixels of `(x, y)`.
    pub fn handle_at(&self, x: i32, y: i32, tolerance: i32) -> Option<Handle> {
        let r = self.selection();
        if r.is_empty() {
            return None;
        }
        let near = |hx: i32, hy: i32| (x - hx).abs() <= tolerance && (y - hy).abs() <= tolerance;
        if near(r.x, r.y) {
            Some(Handle::TopLeft)
        } else if near(r.right(), r.bottom()) {
            Some(Handle::BottomRight)
        } else {
            None
        }
    }

    /// Finish the drag. Returns the selection clamped to a `width × height`
    /// canvas, or `None` when nothing of it is on the canvas.
    pub fn stop_highlight(&mut self, width: u32, height: u32) -> Option<PixelRect> {
        self.drag = None;
        self.clamped(width, height)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Normalized selection, unclamped.
    pub fn selection(&self) -> PixelRect {
        PixelRect::from_corners(self.x0, self.y0, self.x1, self.y1)
    }

    pub fn clamped(&self, width: u32, height: u32) -> Option<PixelRect> {
        self.selection().clamp_to(width, height)
    }

    /// A real, in-bounds, non-degenerate selection.
    pub fn has_clip_area(&self, width: u32, height: u32) -> bool {
        self.clamped(width, height).is_some()
    }

    pub fn update(&self, width: u32, height: u32) -> MarqueeView {
        let sel = self.selection();
        if sel.is_empty() {
            MarqueeView::Hidden
        } else if self.has_clip_area(width, height) {
            MarqueeView::Visible(sel)
        } else {
            MarqueeView::OutsideCanvas(sel)
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
