//! Axis-aligned and rotated rectangles.
//!
//! These describe image views, detection bounding boxes, and the regions of interest the landmark
//! network is run on.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

use super::AspectRatio;

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Rectangles may have zero width and/or height. Negative dimensions are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Vector2<f32>,
    size: Vector2<f32>,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vector2::new(x_center, y_center),
            size: Vector2::new(width, height),
        }
    }

    /// Creates a rectangle extending right and down from its top left corner.
    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_center(x + width * 0.5, y + height * 0.5, width, height)
    }

    /// Computes the smallest rectangle containing all `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let [x, y] = iter.next()?;
        let (mut min, mut max) = (Vector2::new(x, y), Vector2::new(x, y));
        for [x, y] in iter {
            let pt = Vector2::new(x, y);
            min = min.inf(&pt);
            max = max.sup(&pt);
        }

        let size = max - min;
        Some(Self::from_top_left(min.x, min.y, size.x, size.y))
    }

    /// Scales width and height by `scale`, keeping the center in place.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * scale,
        }
    }

    /// Adds `amount * width` to the left and right, and `amount * height` to the top and bottom.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.scale(1.0 + 2.0 * amount)
    }

    /// Symmetrically extends the shorter dimension so that the result has the `target_aspect`
    /// ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let mut res = *self;
        let target_width = self.height() * target_aspect.as_f32();
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / target_aspect.as_f32();
        }
        res
    }

    /// X coordinate of the left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.center.x - self.size.x * 0.5
    }

    /// Y coordinate of the top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.center.y - self.size.y * 0.5
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.center.x
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.center.y
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.center.x, self.center.y)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self {
            center: self.center + Vector2::new(dx, dy),
            ..*self
        }
    }

    #[must_use]
    pub fn move_to(&self, x: f32, y: f32) -> Self {
        Self::from_top_left(x, y, self.width(), self.height())
    }

    /// Computes the overlapping area of `self` and `other`, or [`None`] if they do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x().max(other.x());
        let y_min = self.y().max(other.y());
        let x_max = (self.x() + self.width()).min(other.x() + other.width());
        let y_max = (self.y() + self.height()).min(other.y() + other.height());
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Rect::from_top_left(x_min, y_min, x_max - x_min, y_max - y_min))
    }

    fn intersection_area(&self, other: &Rect) -> f32 {
        self.intersection(other).map_or(0.0, |rect| rect.area())
    }

    /// Computes the intersection over union of `self` and `other`.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        self.x() <= x
            && self.y() <= y
            && self.x() + self.width() >= x
            && self.y() + self.height() >= y
    }

    /// Returns the corners in the order top left, top right, bottom right, bottom left.
    pub fn corners(&self) -> [[f32; 2]; 4] {
        let (x, y, w, h) = (self.x(), self.y(), self.width(), self.height());
        [[x, y], [x + w, y], [x + w, y + h], [x, y + h]]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.center.x, self.center.y, self.size.x, self.size.y
        )
    }
}

/// A [`Rect`] rotated around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    /// Creates a rectangle rotated clockwise (as seen on screen) by `radians`.
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes the smallest rectangle with rotation `radians` that contains all `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(radians: f32, points: I) -> Option<Self> {
        // Undo the rotation, compute the axis-aligned bounds there, then rotate the center back.
        let inverse = Rotation2::new(-radians);
        let aligned = Rect::bounding(points.into_iter().map(|[x, y]| {
            let p = inverse * Vector2::new(x, y);
            [p.x, p.y]
        }))?;

        let center = Rotation2::new(radians) * aligned.center;
        Some(Self::new(
            Rect::from_center(center.x, center.y, aligned.width(), aligned.height()),
            radians,
        ))
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Returns the underlying rectangle without the rotation.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Applies `f` to the underlying non-rotated rectangle.
    #[must_use]
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        self.rect.center()
    }

    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.map(|rect| rect.grow_rel(amount))
    }

    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        self.map(|rect| rect.grow_to_fit_aspect(target_aspect))
    }

    /// Returns the corners in the parent coordinate system.
    ///
    /// The order matches [`Rect::corners`] of the unrotated rectangle.
    pub fn rotated_corners(&self) -> [[f32; 2]; 4] {
        let rot = Rotation2::new(self.radians);
        let center = self.rect.center;
        self.rect.corners().map(|[x, y]| {
            let p = rot * (Vector2::new(x, y) - center) + center;
            [p.x, p.y]
        })
    }

    /// Returns the axis-aligned rectangle enclosing the rotated one.
    pub fn bounding_rect(&self) -> Rect {
        match Rect::bounding(self.rotated_corners()) {
            Some(rect) => rect,
            None => unreachable!("rectangle without corners"),
        }
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        let [x, y] = self.transform_in(x, y);
        self.rect.move_to(0.0, 0.0).contains_point(x, y)
    }

    /// Transforms a point from the parent coordinate system into the rectangle's own system, whose
    /// origin is the rectangle's top left corner.
    pub fn transform_in(&self, x: f32, y: f32) -> [f32; 2] {
        let half = self.rect.size * 0.5;
        let top_left = self.rect.center - half;
        let p = Rotation2::new(-self.radians) * (Vector2::new(x, y) - top_left - half) + half;
        [p.x, p.y]
    }

    /// Transforms a point from the rectangle's own coordinate system into the parent system.
    pub fn transform_out(&self, x: f32, y: f32) -> [f32; 2] {
        let half = self.rect.size * 0.5;
        let top_left = self.rect.center - half;
        let p = Rotation2::new(self.radians) * (Vector2::new(x, y) - half) + half + top_left;
        [p.x, p.y]
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use approx::assert_abs_diff_eq;

    use super::*;

    #[track_caller]
    fn assert_point_eq(actual: [f32; 2], expected: [f32; 2]) {
        assert_abs_diff_eq!(actual[0], expected[0], epsilon = 1e-5);
        assert_abs_diff_eq!(actual[1], expected[1], epsilon = 1e-5);
    }

    #[test]
    fn test_iou() {
        let smaller = Rect::from_center(9.0, 9.0, 1.0, 1.0);
        let bigger = Rect::from_center(9.0, 9.0, 2.0, 2.0);

        assert_eq!(smaller.intersection(&bigger), Some(smaller));
        assert_eq!(smaller.iou(&bigger), 0.25);
        assert_eq!(bigger.iou(&smaller), 0.25);

        let disjoint = Rect::from_center(20.0, 9.0, 1.0, 1.0);
        assert_eq!(smaller.intersection(&disjoint), None);
        assert_eq!(smaller.iou(&disjoint), 0.0);

        let empty = Rect::from_center(0.0, 0.0, 0.0, 0.0);
        assert_eq!(empty.iou(&empty), 0.0);
    }

    #[test]
    fn test_bounding() {
        assert_eq!(
            Rect::bounding([[0.0, 0.0], [1.0, 1.0], [-1.0, -1.0]]),
            Some(Rect::from_center(0.0, 0.0, 2.0, 2.0)),
        );
        assert_eq!(
            Rect::bounding([[1.0, 1.0], [2.0, 2.0]]),
            Some(Rect::from_center(1.5, 1.5, 1.0, 1.0)),
        );
        assert_eq!(
            Rect::bounding([[0.0, 0.0], [10.0, 0.0]]),
            Some(Rect::from_center(5.0, 0.0, 10.0, 0.0)),
        );
        assert_eq!(Rect::bounding([]), None);
    }

    #[test]
    fn test_grow() {
        let rect = Rect::from_center(10.0, 10.0, 50.0, 100.0);
        assert_eq!(
            rect.grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
        assert_eq!(
            Rect::from_center(10.0, 10.0, 100.0, 50.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
        assert_eq!(rect.grow_rel(0.5), Rect::from_center(10.0, 10.0, 100.0, 200.0));
    }

    #[test]
    fn test_contains_point() {
        let rect = Rect::from_top_left(-5.0, 5.0, 10.0, 5.0);
        assert!(rect.contains_point(-5.0, 5.0));
        assert!(rect.contains_point(4.0, 9.0));
        assert!(!rect.contains_point(6.0, 9.0));
        assert!(!rect.contains_point(4.0, 11.0));
    }

    #[test]
    fn test_rotated_rect_transform() {
        let null = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 1.0, 1.0), 0.0);
        assert_point_eq(null.transform_in(1.0, -1.0), [1.0, -1.0]);
        assert_point_eq(null.transform_out(1.0, -1.0), [1.0, -1.0]);

        let offset = RotatedRect::new(Rect::from_top_left(10.0, 20.0, 1.0, 1.0), 0.0);
        assert_point_eq(offset.transform_in(0.0, 0.0), [-10.0, -20.0]);
        assert_point_eq(offset.transform_out(0.0, 0.0), [10.0, 20.0]);

        // Quarter turn clockwise on screen.
        let right = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 1.0, 1.0), TAU / 4.0);
        assert_point_eq(right.transform_in(0.5, 0.5), [0.5, 0.5]);
        assert_point_eq(right.transform_in(0.0, 0.0), [0.0, 1.0]);
        assert_point_eq(right.transform_out(0.0, 0.0), [1.0, 0.0]);
        assert_point_eq(right.transform_out(0.0, -1.0), [2.0, 0.0]);

        let flipped = RotatedRect::new(Rect::from_top_left(10.0, 20.0, 1.0, 1.0), TAU / 2.0);
        assert_point_eq(flipped.transform_in(11.0, 21.0), [0.0, 0.0]);
        assert_point_eq(flipped.transform_out(0.0, 0.0), [11.0, 21.0]);
    }

    #[test]
    fn test_transform_roundtrip() {
        let rect = RotatedRect::new(Rect::from_center(40.0, 30.0, 20.0, 10.0), 0.7);
        for _ in 0..50 {
            let (x, y) = (fastrand::f32() * 100.0, fastrand::f32() * 100.0);
            let [ix, iy] = rect.transform_in(x, y);
            assert_point_eq(rect.transform_out(ix, iy), [x, y]);
        }
    }

    #[test]
    fn test_rotated_contains_point() {
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 51.0, 1.0), TAU / 4.0);
        assert!(rect.contains_point(0.0, 0.0));
        assert!(rect.contains_point(0.0, 25.0));
        assert!(!rect.contains_point(0.0, 26.0));
        assert!(rect.contains_point(0.0, -25.0));
        assert!(!rect.contains_point(1.0, 0.0));
        assert!(!rect.contains_point(-1.0, 0.0));
    }

    #[test]
    fn test_rotated_bounding() {
        assert!(RotatedRect::bounding(0.0, []).is_none());

        let rect = RotatedRect::bounding(0.0, [[0.0, 0.0], [10.0, 5.0]]).unwrap();
        assert_eq!(rect, Rect::from_top_left(0.0, 0.0, 10.0, 5.0).into());

        // A quarter turn swaps the dimensions of the bounding box.
        let rect = RotatedRect::bounding(TAU / 4.0, [[0.0, 0.0], [10.0, 5.0]]).unwrap();
        assert_abs_diff_eq!(rect.rect().width(), 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(rect.rect().height(), 10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(rect.rect().x_center(), 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(rect.rect().y_center(), 2.5, epsilon = 1e-4);
    }

    #[test]
    fn test_bounding_rect() {
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 4.0, 2.0), TAU / 4.0);
        let aabb = rect.bounding_rect();
        assert_abs_diff_eq!(aabb.width(), 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(aabb.height(), 4.0, epsilon = 1e-5);
        assert_abs_diff_eq!(aabb.x_center(), 0.0, epsilon = 1e-5);
    }
}
