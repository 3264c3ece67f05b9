use image::RgbaImage;
use std::collections::VecDeque;

// ============================================================================
// UNDO STACK - bounded ring of full-canvas snapshots
// ============================================================================

/// Bounded history of main-surface snapshots.
///
/// Slot 0 holds the state at the last [`UndoStack::reset`]. `undo_index` is the
/// slot matching the canvas right now; slots `undo_index + 1 ..= max_redo` are
/// reachable by redo. Slots past `max_redo` are stale and get overwritten in
/// place by the next [`UndoStack::add`], so their allocations are reused.
pub struct UndoStack {
    snapshots: VecDeque<RgbaImage>,
    /// Steps of undo kept, plus one slot for the current state.
    max_size: usize,
    undo_index: usize,
    max_redo: usize,
}

impl UndoStack {
    /// `max_undo_steps` undos will be available once the history fills up.
    pub fn new(max_undo_steps: usize, seed: &RgbaImage) -> Self {
        let max_size = max_undo_steps + 1;
        let mut snapshots = VecDeque::with_capacity(max_size);
        snapshots.push_back(seed.clone());
        Self {
            snapshots,
            max_size,
            undo_index: 0,
            max_redo: 0,
        }
    }

    /// Discard all history and seed slot 0 with `seed`.
    pub fn reset(&mut self, seed: &RgbaImage) {
        let mut first = self.snapshots.pop_front();
        self.snapshots.clear();
        match first.as_mut() {
            Some(buf) => store_into(buf, seed),
            None => first = Some(seed.clone()),
        }
        self.snapshots.extend(first);
        self.undo_index = 0;
        self.max_redo = 0;
    }

    /// Record `image` as the newest state. Redo history is always dropped.
    pub fn add(&mut self, image: &RgbaImage) {
        let full = self.snapshots.len() == self.max_size && self.undo_index + 1 == self.max_size;
        if full {
            // Oldest undo falls off; its buffer becomes the new tail.
            match self.snapshots.pop_front() {
                Some(mut oldest) => {
                    store_into(&mut oldest, image);
                    self.snapshots.push_back(oldest);
                }
                None => self.snapshots.push_back(image.clone()),
            }
            log_info!(
                "UndoStack: history full ({} slots), evicted oldest snapshot",
                self.max_size
            );
            self.max_redo = self.undo_index;
            return;
        }

        self.undo_index += 1;
        self.max_redo = self.undo_index;
        match self.snapshots.get_mut(self.undo_index) {
            Some(stale) => store_into(stale, image),
            None => self.snapshots.push_back(image.clone()),
        }
    }

    /// Step back one state. `None` (and no change) at the oldest entry.
    pub fn undo(&mut self) -> Option<&RgbaImage> {
        if self.undo_index == 0 {
            return None;
        }
        self.undo_index -= 1;
        self.snapshots.get(self.undo_index)
    }

    /// Step forward one state. `None` (and no change) when there is nothing to redo.
    pub fn redo(&mut self) -> Option<&RgbaImage> {
        if self.undo_index >= self.max_redo {
            return None;
        }
        self.undo_index += 1;
        self.snapshots.get(self.undo_index)
    }

    /// Snapshot matching the current canvas state.
    pub fn current(&self) -> Option<&RgbaImage> {
        self.snapshots.get(self.undo_index)
    }

    pub fn has_undo(&self) -> bool {
        self.undo_index > 0
    }

    pub fn has_redo(&self) -> bool {
        self.undo_index < self.max_redo
    }

    pub fn undo_count(&self) -> usize {
        self.undo_index
    }

    pub fn redo_count(&self) -> usize {
        self.max_redo - self.undo_index
    }

    /// Bytes held by all snapshot buffers, stale slots included.
    pub fn memory_usage(&self) -> usize {
        self.snapshots.iter().map(|s| s.as_raw().len()).sum()
    }
}

/// Copy `src` into `dst`, reusing `dst`'s allocation when the sizes agree.
fn store_into(dst: &mut RgbaImage, src: &RgbaImage) {
    if dst.dimensions() == src.dimensions() {
        dst.copy_from_slice(src.as_raw());
    } else {
        *dst = src.clone();
    }
}
