use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_polygon_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect as PixelRect;
use nalgebra as na;

use crate::color::Color;
use crate::error::Error;

/// Integer pixel rectangle, `x`/`y` is the top left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    #[inline(always)]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    #[inline(always)]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Inclusive of the right and bottom edges.
    #[inline]
    pub fn contains(&self, p: na::Point2<i32>) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            Rect::new(x1, y1, 0, 0)
        } else {
            Rect::from_corners(x1, y1, x2, y2)
        }
    }
}

/// Drawing and sampling surface for a single video frame.
///
/// Implemented by the software [`FrameBuffer`] and, with the `video`
/// feature, by OpenCV's `Mat`.
pub trait Canvas {
    fn size(&self) -> (i32, i32);

    fn pixel(&self, x: i32, y: i32) -> Option<Color>;

    /// `out = frame * alpha + color * (1 - alpha)` inside `rect`, untouched elsewhere.
    fn blend_rect(&mut self, rect: Rect, color: Color, alpha: f32) -> Result<(), Error>;

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), Error>;

    fn draw_rect(&mut self, rect: Rect, color: Color, thickness: i32) -> Result<(), Error>;

    fn draw_line(
        &mut self,
        from: na::Point2<i32>,
        to: na::Point2<i32>,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error>;

    fn fill_circle(&mut self, center: na::Point2<i32>, radius: i32, color: Color)
        -> Result<(), Error>;

    /// Elliptic arc, angles in degrees clockwise from the positive x axis.
    fn draw_ellipse(
        &mut self,
        center: na::Point2<i32>,
        axes: (i32, i32),
        start_angle: f64,
        end_angle: f64,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error>;

    fn fill_polygon(&mut self, points: &[na::Point2<i32>], color: Color) -> Result<(), Error>;

    fn text_size(&self, text: &str, scale: f64) -> (i32, i32);

    /// `origin` is the bottom left corner of the text.
    fn put_text(
        &mut self,
        text: &str,
        origin: na::Point2<i32>,
        scale: f64,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error>;

    #[inline]
    fn bounds(&self) -> Rect {
        let (w, h) = self.size();
        Rect::new(0, 0, w, h)
    }

    /// Mean (hue, saturation) over `roi`, `None` when the clipped region is empty.
    fn mean_hue_saturation(&self, roi: Rect) -> Option<(f32, f32)> {
        let roi = roi.intersect(&self.bounds());
        if roi.is_empty() {
            return None;
        }

        let (mut h_sum, mut s_sum, mut n) = (0.0f64, 0.0f64, 0usize);
        for y in roi.y..roi.bottom() {
            for x in roi.x..roi.right() {
                if let Some(c) = self.pixel(x, y) {
                    let (h, s) = c.hue_saturation();
                    h_sum += h as f64;
                    s_sum += s as f64;
                    n += 1;
                }
            }
        }

        if n == 0 {
            return None;
        }

        Some(((h_sum / n as f64) as f32, (s_sum / n as f64) as f32))
    }
}

#[inline]
fn rgb(c: Color) -> Rgb<u8> {
    Rgb([c.r, c.g, c.b])
}

#[inline]
fn pixel_rect(r: Rect) -> Option<PixelRect> {
    if r.is_empty() {
        return None;
    }

    Some(PixelRect::at(r.x, r.y).of_size(r.width as u32, r.height as u32))
}

/// Owned RGB image drawn with `imageproc`.
///
/// Carries no font, so `put_text` only reports the text extent and draws nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    image: RgbImage,
}

impl FrameBuffer {
    pub fn new(width: i32, height: i32, fill: Color) -> Self {
        Self {
            image: RgbImage::from_pixel(width.max(0) as u32, height.max(0) as u32, rgb(fill)),
        }
    }

    #[inline]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

impl From<RgbImage> for FrameBuffer {
    fn from(image: RgbImage) -> Self {
        Self { image }
    }
}

impl Canvas for FrameBuffer {
    #[inline]
    fn size(&self) -> (i32, i32) {
        (self.image.width() as i32, self.image.height() as i32)
    }

    #[inline]
    fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        if x < 0 || y < 0 {
            return None;
        }

        let Rgb([r, g, b]) = *self.image.get_pixel_checked(x as u32, y as u32)?;
        Some(Color::rgb(r, g, b))
    }

    fn blend_rect(&mut self, rect: Rect, color: Color, alpha: f32) -> Result<(), Error> {
        let rect = rect.intersect(&self.bounds());
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let px = self.image.get_pixel_mut(x as u32, y as u32);
                let Rgb([r, g, b]) = *px;
                *px = rgb(Color::rgb(r, g, b).blend(color, alpha));
            }
        }

        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), Error> {
        if let Some(r) = pixel_rect(rect) {
            draw_filled_rect_mut(&mut self.image, r, rgb(color));
        }

        Ok(())
    }

    fn draw_rect(&mut self, rect: Rect, color: Color, thickness: i32) -> Result<(), Error> {
        let t = thickness.max(1);
        let half = (t - 1) / 2;

        // nested one pixel outlines centered on the edge
        for k in 0..t {
            let grow = half - k;
            let ring = Rect::new(rect.x - grow, rect.y - grow, rect.width + 2 * grow, rect.height + 2 * grow);
            if let Some(r) = pixel_rect(ring) {
                draw_hollow_rect_mut(&mut self.image, r, rgb(color));
            }
        }

        Ok(())
    }

    fn draw_line(
        &mut self,
        from: na::Point2<i32>,
        to: na::Point2<i32>,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error> {
        let t = thickness.max(1);
        let half = (t - 1) / 2;

        for dy in -half..t - half {
            for dx in -half..t - half {
                draw_line_segment_mut(
                    &mut self.image,
                    ((from.x + dx) as f32, (from.y + dy) as f32),
                    ((to.x + dx) as f32, (to.y + dy) as f32),
                    rgb(color),
                );
            }
        }

        Ok(())
    }

    fn fill_circle(
        &mut self,
        center: na::Point2<i32>,
        radius: i32,
        color: Color,
    ) -> Result<(), Error> {
        draw_filled_circle_mut(&mut self.image, (center.x, center.y), radius.max(0), rgb(color));

        Ok(())
    }

    fn draw_ellipse(
        &mut self,
        center: na::Point2<i32>,
        axes: (i32, i32),
        start_angle: f64,
        end_angle: f64,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error> {
        let point_at = |deg: f64| {
            let rad = deg.to_radians();
            na::Point2::new(
                center.x + (axes.0 as f64 * rad.cos()).round() as i32,
                center.y + (axes.1 as f64 * rad.sin()).round() as i32,
            )
        };

        // 5 degree chords
        let mut prev = point_at(start_angle);
        let mut deg = start_angle;
        while deg < end_angle {
            deg = (deg + 5.0).min(end_angle);
            let next = point_at(deg);
            self.draw_line(prev, next, color, thickness)?;
            prev = next;
        }

        Ok(())
    }

    fn fill_polygon(&mut self, points: &[na::Point2<i32>], color: Color) -> Result<(), Error> {
        let mut poly: Vec<Point<i32>> = points.iter().map(|p| Point::new(p.x, p.y)).collect();
        poly.dedup();
        if poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }

        if poly.len() < 3 {
            return Ok(());
        }

        draw_polygon_mut(&mut self.image, &poly, rgb(color));

        Ok(())
    }

    fn text_size(&self, text: &str, scale: f64) -> (i32, i32) {
        // roughly FONT_HERSHEY_SIMPLEX metrics
        let w = (text.chars().count() as f64 * 20.0 * scale).round() as i32;
        let h = (22.0 * scale).round() as i32;

        (w, h)
    }

    fn put_text(
        &mut self,
        _text: &str,
        _origin: na::Point2<i32>,
        _scale: f64,
        _color: Color,
        _thickness: i32,
    ) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_intersection_clips() {
        let a = Rect::new(0, 0, 100, 50);
        let b = Rect::new(80, 40, 100, 100);

        assert_eq!(a.intersect(&b), Rect::new(80, 40, 20, 10));
        assert!(a.intersect(&Rect::new(200, 200, 5, 5)).is_empty());
    }

    #[test]
    fn blend_only_touches_region() {
        let mut fb = FrameBuffer::new(10, 10, Color::BLACK);
        fb.blend_rect(Rect::new(2, 2, 3, 3), Color::WHITE, 0.5).unwrap();

        assert_eq!(fb.pixel(3, 3), Some(Color::rgb(128, 128, 128)));
        assert_eq!(fb.pixel(1, 1), Some(Color::BLACK));
        assert_eq!(fb.pixel(5, 5), Some(Color::BLACK));
    }

    #[test]
    fn mean_hue_saturation_over_patch() {
        let mut fb = FrameBuffer::new(10, 10, Color::rgb(0, 0, 255));
        fb.fill_rect(Rect::new(0, 0, 10, 5), Color::rgb(255, 0, 0)).unwrap();

        let (h, s) = fb.mean_hue_saturation(Rect::new(0, 0, 10, 10)).unwrap();
        assert!((h - 60.0).abs() < 1e-4);
        assert!((s - 255.0).abs() < 1e-4);

        assert!(fb.mean_hue_saturation(Rect::new(20, 20, 4, 4)).is_none());
    }

    #[test]
    fn filled_triangle() {
        let mut fb = FrameBuffer::new(20, 20, Color::BLACK);
        let tri = [
            na::Point2::new(10, 18),
            na::Point2::new(2, 2),
            na::Point2::new(18, 2),
        ];
        fb.fill_polygon(&tri, Color::WHITE).unwrap();

        assert_eq!(fb.pixel(10, 8), Some(Color::WHITE));
        assert_eq!(fb.pixel(1, 18), Some(Color::BLACK));
    }

    #[test]
    fn thick_line_covers_neighbours() {
        let mut fb = FrameBuffer::new(20, 20, Color::BLACK);
        fb.draw_line(na::Point2::new(2, 10), na::Point2::new(16, 10), Color::WHITE, 3)
            .unwrap();

        assert_eq!(fb.pixel(2, 10), Some(Color::WHITE));
        assert_eq!(fb.pixel(9, 9), Some(Color::WHITE));
        assert_eq!(fb.pixel(9, 11), Some(Color::WHITE));
        assert_eq!(fb.pixel(9, 13), Some(Color::BLACK));
    }

    #[test]
    fn thick_rect_is_centered_on_the_edge() {
        let mut fb = FrameBuffer::new(40, 40, Color::BLACK);
        fb.draw_rect(Rect::new(10, 10, 20, 20), Color::WHITE, 3).unwrap();

        assert_eq!(fb.pixel(9, 20), Some(Color::WHITE));
        assert_eq!(fb.pixel(11, 20), Some(Color::WHITE));
        assert_eq!(fb.pixel(15, 20), Some(Color::BLACK));
        assert_eq!(fb.pixel(5, 20), Some(Color::BLACK));
    }

    #[test]
    fn backed_by_rgb_image() {
        let fb = FrameBuffer::new(4, 2, Color::rgb(10, 20, 30));

        assert_eq!(fb.size(), (4, 2));
        assert_eq!(fb.image().get_pixel(3, 1), &Rgb([10, 20, 30]));
        assert_eq!(fb.pixel(4, 0), None);
        assert_eq!(fb.pixel(-1, 0), None);
    }
}
