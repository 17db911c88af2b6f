use cgmath::prelude::*;
use cgmath::{BaseFloat, Point2, Vector2};

pub type Line2f = Line2<f32>;

/// A 2D line through `origin`, extending along `displace`. Doubles as a
/// directed segment from `origin` to `origin + displace`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Line2<T> {
    pub origin: Point2<T>,
    pub displace: Vector2<T>,
}

impl<T: BaseFloat> Line2<T> {
    pub fn from_origin_and_displace(origin: Point2<T>, displace: Vector2<T>) -> Line2<T> {
        Line2 { origin, displace }
    }

    pub fn from_two_points(origin: Point2<T>, towards: Point2<T>) -> Line2<T> {
        Line2 {
            origin,
            displace: towards - origin,
        }
    }

    pub fn inverted_halfspaces(&self) -> Line2<T> {
        Line2 {
            origin: self.origin,
            displace: -self.displace,
        }
    }

    /// Positive on the right of the line, negative on the left, zero on it.
    pub fn signed_distance(&self, to: Point2<T>) -> T {
        let relative = to - self.origin;
        relative.x * self.displace.y - relative.y * self.displace.x
    }

    /// Orthogonal projection of `from` onto this segment, with the projection
    /// parameter clamped to `[0, 1]`. A degenerate segment (zero displacement)
    /// maps everything to the origin point `(0, 0)`.
    pub fn nearest_point_on_segment(&self, from: Point2<T>) -> Point2<T> {
        let length2 = self.displace.magnitude2();
        if length2 == T::zero() {
            return Point2::new(T::zero(), T::zero());
        }
        let offset = (from - self.origin).dot(self.displace) / length2;
        let clamped = offset.max(T::zero()).min(T::one());
        self.origin + self.displace * clamped
    }
}
