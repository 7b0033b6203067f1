use serde::Serialize;

/// Tolerance used when comparing coordinates that come from different
/// drawing operators.
pub(crate) const GEOMETRY_EPSILON: f64 = 0.5;

/// Axis-aligned box in page space (origin bottom-left, y grows upward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    #[must_use]
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    #[must_use]
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            bbox.x0 = bbox.x0.min(x);
            bbox.y0 = bbox.y0.min(y);
            bbox.x1 = bbox.x1.max(x);
            bbox.y1 = bbox.y1.max(y);
        }
        Some(bbox)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// True when `other` lies inside `self` once `self` is grown by `tolerance`.
    #[must_use]
    pub fn contains_box(&self, other: &Self, tolerance: f64) -> bool {
        other.x0 >= self.x0 - tolerance
            && other.x1 <= self.x1 + tolerance
            && other.y0 >= self.y0 - tolerance
            && other.y1 <= self.y1 + tolerance
    }

    #[must_use]
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        self.x0 <= other.x1 + tolerance
            && other.x0 <= self.x1 + tolerance
            && self.y0 <= other.y1 + tolerance
            && other.y0 <= self.y1 + tolerance
    }
}

/// PDF affine matrix `[a b c d e f]`, applied to row vectors `[x y 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    #[must_use]
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    #[must_use]
    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    #[must_use]
    pub fn then(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Length of the unit y vector after transformation; the effective
    /// vertical scale for glyphs.
    #[must_use]
    pub fn vertical_scale(&self) -> f64 {
        self.c.hypot(self.d)
    }

    #[must_use]
    pub fn transform_box(&self, bbox: &BBox) -> BBox {
        let corners = [
            self.apply(bbox.x0, bbox.y0),
            self.apply(bbox.x1, bbox.y0),
            self.apply(bbox.x0, bbox.y1),
            self.apply(bbox.x1, bbox.y1),
        ];
        BBox::from_points(&corners).unwrap_or(*bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::{BBox, Matrix};

    #[test]
    fn normalizes_inverted_corners() {
        let bbox = BBox::new(10.0, 50.0, 0.0, 20.0);
        assert_eq!(bbox, BBox::new(0.0, 20.0, 10.0, 50.0));
        assert!((bbox.height() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn concatenation_applies_left_operand_first() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translate(5.0, 7.0);
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (7.0, 9.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (12.0, 16.0));
    }

    #[test]
    fn maps_unit_square_through_image_matrix() {
        let placement = Matrix::new(100.0, 0.0, 0.0, 50.0, 20.0, 30.0);
        let bbox = placement.transform_box(&BBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(bbox, BBox::new(20.0, 30.0, 120.0, 80.0));
    }

    #[test]
    fn containment_honours_tolerance() {
        let outer = BBox::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains_box(&BBox::new(-0.4, 0.0, 100.3, 50.0), 0.5));
        assert!(!outer.contains_box(&BBox::new(-2.0, 0.0, 50.0, 50.0), 0.5));
    }
}
