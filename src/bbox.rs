use nalgebra as na;
use num_traits::Float;
use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct BBox<F: BBoxFormat>([f32; 4], PhantomData<F>);

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    /// Coordinate-wise linear blend, `t = 0` gives `self`, `t = 1` gives `other`.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let mut out = [0.0; 4];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = lerp(*a, *b, t);
        }

        BBox(out, Default::default())
    }
}

#[inline]
pub fn lerp<T: Float>(a: T, b: T, t: T) -> T {
    a + (b - a) * t
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], Default::default())
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        na::Point2::new(
            (self.0[0] + self.0[2]) / 2.0,
            (self.0[1] + self.0[3]) / 2.0,
        )
    }

    /// Ground contact point of an upright actor.
    #[inline]
    pub fn bottom_center(&self) -> na::Point2<f32> {
        na::Point2::new((self.0[0] + self.0[2]) / 2.0, self.0[3])
    }

    #[inline]
    pub fn top_center(&self) -> na::Point2<f32> {
        na::Point2::new((self.0[0] + self.0[2]) / 2.0, self.0[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent() {
        let b = BBox::ltrb(10.0, 20.0, 30.0, 60.0);

        assert_eq!(b.width(), 20.0);
        assert_eq!((b.left(), b.top(), b.right(), b.bottom()), (10.0, 20.0, 30.0, 60.0));
    }

    #[test]
    fn anchors() {
        let b = BBox::ltrb(10.0, 20.0, 30.0, 60.0);

        assert_eq!(b.bottom_center(), na::Point2::new(20.0, 60.0));
        assert_eq!(b.top_center(), na::Point2::new(20.0, 20.0));
        assert_eq!(b.center(), na::Point2::new(20.0, 40.0));
    }

    #[test]
    fn lerp_is_coordinate_wise() {
        let a = BBox::ltrb(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltrb(30.0, 60.0, 40.0, 70.0);

        assert_eq!(a.lerp(&b, 0.5).as_slice(), &[15.0, 30.0, 25.0, 40.0]);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
    }
}
