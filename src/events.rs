use crate::geometry::PixelRect;

/// Notifications fired after a canvas state change has committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanvasEvent {
    /// A draw was composited onto main and snapshotted.
    Draw,
    /// A paste started on the overlay.
    Paste,
    /// The clipboard was replaced by copy or cut.
    Copy,
    /// The clip region changed; `None` means it was removed.
    Clip(Option<PixelRect>),
}

pub type Listener = Box<dyn FnMut(&CanvasEvent)>;

/// Passive observer list. Listeners may not call back into the canvas.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn subscribe(&mut self, listener: impl FnMut(&CanvasEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: CanvasEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
