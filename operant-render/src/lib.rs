pub mod render;
pub mod text;

pub use render::{CANVAS_HEIGHT, CANVAS_WIDTH, SkiaSurface, Viewport};
pub use text::{TextCache, render_text_pixmap};
