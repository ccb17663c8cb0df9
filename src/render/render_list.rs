//! Render list and display items.
//!
//! The page paints into a flat [`RenderList`] of [`DisplayItem`] commands. Placeholders reserve
//! space without drawing anything visible, mounted visuals contribute their own items.
//!
//! # Example
//!
//! ```rust
//! use landing_mount::render::{Color, DisplayItem, PointerEvents, RenderList};
//!
//! let mut list = RenderList::new();
//!
//! list.add_command(DisplayItem::Clear { color: Color::from_u8(5, 8, 20, 255) });
//! list.add_command(DisplayItem::Placeholder {
//!     y: 1800.0,
//!     w: 1280.0,
//!     min_height: 800.0,
//!     pointer_events: PointerEvents::None,
//! });
//! assert_eq!(list.items.len(), 2);
//! ```

/// RGBA color used for drawing commands.
///
/// Channels are represented as `f32` in the range `0.0 ..= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel (opacity)
    pub a: f32,
}

impl Color {
    /// Creates a new color from `u8` channel values in the range `0 ..= 255`.
    pub fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: f32) -> Color {
        Color { a, ..self }
    }
}

/// Whether a box takes part in hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerEvents {
    #[default]
    Auto,
    /// Box is transparent to pointer input.
    None,
}

/// A single display item representing a drawing command.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayItem {
    /// Clear the entire surface with the given color.
    Clear {
        /// The color to clear the surface with.
        color: Color,
    },

    /// Draw a filled circle centered at `(cx, cy)`.
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
        color: Color,
    },

    /// Reserve layout space without painting.
    Placeholder {
        y: f32,
        w: f32,
        min_height: f32,
        pointer_events: PointerEvents,
    },
}

/// A list of display items to be rendered.
#[derive(Clone, Debug, Default)]
pub struct RenderList {
    /// Sequence of drawing commands to execute.
    pub items: Vec<DisplayItem>,
}

impl RenderList {
    /// Creates a new, empty render list.
    pub fn new() -> Self {
        RenderList { items: Vec::new() }
    }

    /// Adds a new display item (drawing command) to the list.
    pub fn add_command(&mut self, command: DisplayItem) {
        self.items.push(command);
    }

    /// Appends several items at once.
    pub fn extend(&mut self, items: impl IntoIterator<Item = DisplayItem>) {
        self.items.extend(items);
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &DisplayItem> {
        self.items.iter().filter(|i| matches!(i, DisplayItem::Placeholder { .. }))
    }
}
