mod line;

pub use self::line::{Line2, Line2f};
pub use cgmath::{Point2, Vector2};

pub mod prelude {
    pub use cgmath::prelude::*;
}

pub type Pnt2f = Point2<f32>;
pub type Vec2f = Vector2<f32>;
