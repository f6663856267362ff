pub mod render;

pub use render::{FrameView, SkiaRenderer};
