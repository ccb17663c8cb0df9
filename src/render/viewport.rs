//! Viewport and document geometry.
//!
//! A [`Viewport`] is the visible scroll region of a page. Its `(x, y)` is the scroll offset in
//! document pixels and `width`/`height` its size. A [`Rect`] is a box in the same document
//! coordinate space, used for host elements.
//!
//! # Examples
//!
//! Scrolling and checking proximity:
//! ```
//! use landing_mount::render::{Rect, Viewport};
//!
//! let mut vp = Viewport::new(0, 0, 1280, 800);
//! let host = Rect::new(0, 1800, 1280, 800);
//!
//! // 1000px below the fold, outside a 200px margin
//! assert!(!vp.is_near(&host, 200));
//!
//! vp.translate(0, 900);
//! assert!(vp.is_near(&host, 200));
//! ```

/// Axis-aligned box in document pixels.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> i64 {
        self.x as i64
    }

    pub fn top(&self) -> i64 {
        self.y as i64
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Grows the rect by `margin` pixels on every side.
    pub fn expand(&self, margin: u32) -> Rect {
        let m = margin as i64;
        let clamp = |v: i64| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        let grow = |v: u32| (v as i64 + 2 * m).min(u32::MAX as i64) as u32;

        Rect {
            x: clamp(self.left() - m),
            y: clamp(self.top() - m),
            width: grow(self.width),
            height: grow(self.height),
        }
    }

    /// Edge-inclusive intersection test. Touching boxes count as intersecting, so a host sitting
    /// exactly on the margin boundary triggers.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() <= other.right()
            && other.left() <= self.right()
            && self.top() <= other.bottom()
            && other.top() <= self.bottom()
    }
}

/// Represents the visible scroll region of a page.
#[derive(Clone, Eq, PartialEq, Copy, Default)]
pub struct Viewport {
    /// Horizontal scroll offset in pixels.
    pub x: i32,

    /// Vertical scroll offset in pixels.
    pub y: i32,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Viewport {{ x: {}, y: {}, width: {}, height: {} }}",
            self.x, self.y, self.width, self.height
        )
    }
}

impl Viewport {
    /// Creates a new [`Viewport`] with the given scroll offset and size.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Resizes the viewport to the given width and height.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Moves the viewport's scroll offset to `(x, y)` in pixels.
    pub fn translate(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    /// The visible region as a document rect.
    pub fn as_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Returns true when `target` lies within `margin` pixels of the visible region.
    pub fn is_near(&self, target: &Rect, margin: u32) -> bool {
        self.as_rect().expand(margin).intersects(target)
    }
}
