//! RasterPad: a pixel-painting canvas engine.
//!
//! Three surfaces back every canvas: `main` holds committed pixels, `overlay`
//! holds provisional strokes and pastes, and `preview` is the zoomed image the
//! host draws. [`canvas::CanvasManager`] owns all three; tools draw through
//! [`surface::DrawContext`] borrows and commit with `end_draw`.
#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod components;
pub mod error;
pub mod events;
pub mod geometry;
pub mod io;
pub mod ops;
pub mod scheduler;
pub mod settings;
pub mod surface;

pub use canvas::CanvasManager;
pub use components::tools::{ToolKind, ToolSession};
pub use events::CanvasEvent;
pub use geometry::PixelRect;
pub use settings::EngineSettings;
