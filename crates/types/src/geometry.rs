use serde::Serialize;

/// A point in page space. Origin is the top-left corner, y grows downwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns a copy shifted by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Returns a copy shrunk by `inset` on every side. Never produces negative sizes.
    pub fn inset(&self, inset: f32) -> Self {
        Self {
            x: self.x + inset,
            y: self.y + inset,
            width: (self.width - 2.0 * inset).max(0.0),
            height: (self.height - 2.0 * inset).max(0.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn zero() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Returns the size with width and height swapped.
    pub fn swapped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges_and_translate() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0).translate(5.0, -5.0);
        assert_eq!(r.x, 15.0);
        assert_eq!(r.y, 15.0);
        assert_eq!(r.right(), 45.0);
        assert_eq!(r.bottom(), 55.0);
    }

    #[test]
    fn test_inset_clamps_to_zero() {
        let r = Rect::new(0.0, 0.0, 4.0, 10.0).inset(3.0);
        assert_eq!(r.width, 0.0);
        assert_eq!(r.height, 4.0);
    }

    #[test]
    fn test_rect_is_finite() {
        assert!(Rect::new(1.0, 2.0, 3.0, 4.0).is_finite());
        assert!(!Rect::new(f32::NAN, 2.0, 3.0, 4.0).is_finite());
    }

    #[test]
    fn test_size_orientation() {
        let a4 = Size::new(595.0, 842.0);
        assert!(!a4.is_landscape());
        assert!(a4.swapped().is_landscape());
    }
}
