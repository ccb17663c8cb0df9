mod render_list;
pub use render_list::*;

mod viewport;

pub use viewport::{Rect, Viewport};
