pub mod blit;
pub mod clipboard;
pub mod transform;
