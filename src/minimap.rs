use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::canvas::{Canvas, Rect};
use crate::color::Color;
use crate::error::Error;

/// Distance of each attack line from the net, in meters.
const ATTACK_LINE_M: f32 = 3.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct MinimapConfig {
    /// Overlay width in pixels; the height follows from the court's aspect ratio.
    pub width: i32,
    /// Gap between the overlay and the frame's top and right edges.
    pub margin: i32,
    /// Inset of the court drawing inside the overlay.
    pub padding: i32,
    /// Weight of the original frame when blending the overlay background.
    pub alpha: f32,
    pub point_radius: i32,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            width: 250,
            margin: 50,
            padding: 50,
            alpha: 0.5,
            point_radius: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourtLine {
    pub from: na::Point2<i32>,
    pub to: na::Point2<i32>,
    pub thickness: i32,
}

/// Overlay geometry in frame pixels, fixed for the whole run.
///
/// The court's length axis runs down the overlay and its width axis runs
/// across, so the court appears upright in a frame corner.
#[derive(Debug, Clone, PartialEq)]
pub struct MiniCourtLayout {
    pub overlay: Rect,
    pub court: Rect,
    pub court_width: f32,
    pub court_length: f32,
    /// Pixels per meter across the overlay (court width axis).
    pub scale_x: f32,
    /// Pixels per meter down the overlay (court length axis).
    pub scale_y: f32,
    pub lines: Vec<CourtLine>,
}

impl MiniCourtLayout {
    pub fn new(frame_size: (i32, i32), config: &MinimapConfig, court_width: f32, court_length: f32) -> Self {
        let (frame_w, _) = frame_size;
        let padding = config.padding.max(0);
        let inner_w = config.width.saturating_sub(padding.saturating_mul(2)).max(1);
        // float to int casts saturate, NaN becomes 0
        let inner_h = ((inner_w as f32 * court_length / court_width).round() as i32).max(1);

        let overlay = Rect::new(
            frame_w.saturating_sub(config.width).saturating_sub(config.margin),
            config.margin,
            inner_w.saturating_add(padding.saturating_mul(2)),
            inner_h.saturating_add(padding.saturating_mul(2)),
        );
        let court = Rect::new(
            overlay.x.saturating_add(padding),
            overlay.y.saturating_add(padding),
            inner_w,
            inner_h,
        );

        let scale_x = inner_w as f32 / court_width;
        let scale_y = inner_h as f32 / court_length;

        let horizontal = |y: i32, thickness| CourtLine {
            from: na::Point2::new(court.x, y),
            to: na::Point2::new(court.right(), y),
            thickness,
        };

        let net_y = court.y.saturating_add(inner_h / 2);
        let attack = (ATTACK_LINE_M * scale_y).round() as i32;
        let (l, t, r, b) = (court.x, court.y, court.right(), court.bottom());

        let lines = vec![
            CourtLine { from: na::Point2::new(l, t), to: na::Point2::new(r, t), thickness: 2 },
            CourtLine { from: na::Point2::new(r, t), to: na::Point2::new(r, b), thickness: 2 },
            CourtLine { from: na::Point2::new(r, b), to: na::Point2::new(l, b), thickness: 2 },
            CourtLine { from: na::Point2::new(l, b), to: na::Point2::new(l, t), thickness: 2 },
            horizontal(net_y, 2),
            horizontal(net_y.saturating_sub(attack), 1),
            horizontal(net_y.saturating_add(attack), 1),
        ];

        Self {
            overlay,
            court,
            court_width,
            court_length,
            scale_x,
            scale_y,
            lines,
        }
    }

    /// Frame pixel of a court position, `None` if it lands outside the overlay.
    pub fn to_pixel(&self, point: &na::Point2<f32>) -> Option<na::Point2<i32>> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }

        let local_x = (self.court.x - self.overlay.x) as f32 + point.y * self.scale_x;
        let local_y = (self.court.y - self.overlay.y) as f32 + point.x * self.scale_y;

        let local = na::Point2::new(local_x.round() as i32, local_y.round() as i32);
        if !Rect::new(0, 0, self.overlay.width, self.overlay.height).contains(local) {
            return None;
        }

        Some(na::Point2::new(self.overlay.x + local.x, self.overlay.y + local.y))
    }
}

/// Top-down court overlay drawn into a frame corner.
#[derive(Debug, Clone)]
pub struct MiniCourt {
    layout: MiniCourtLayout,
    alpha: f32,
    point_radius: i32,
    line_color: Color,
}

impl MiniCourt {
    pub fn new(frame_size: (i32, i32), config: &MinimapConfig, court_width: f32, court_length: f32) -> Self {
        Self {
            layout: MiniCourtLayout::new(frame_size, config, court_width, court_length),
            alpha: config.alpha,
            point_radius: config.point_radius,
            line_color: Color::BLACK,
        }
    }

    #[inline]
    pub fn layout(&self) -> &MiniCourtLayout {
        &self.layout
    }

    /// Copy of `frame` with the overlay area washed toward white.
    pub fn render_background<C: Canvas + Clone>(&self, frame: &C) -> Result<C, Error> {
        let mut out = frame.clone();
        out.blend_rect(self.layout.overlay, Color::WHITE, self.alpha)?;

        Ok(out)
    }

    /// Boundary, net and both attack lines.
    pub fn render_lines<C: Canvas>(&self, frame: &mut C) -> Result<(), Error> {
        for line in &self.layout.lines {
            frame.draw_line(line.from, line.to, self.line_color, line.thickness)?;
        }

        Ok(())
    }

    /// Draws a marker per court position; returns how many landed inside the overlay.
    pub fn render_points<C: Canvas>(
        &self,
        frame: &mut C,
        points: &[na::Point2<f32>],
        color: Color,
    ) -> Result<usize, Error> {
        let mut drawn = 0;
        for p in points {
            if let Some(px) = self.layout.to_pixel(p) {
                frame.fill_circle(px, self.point_radius, color)?;
                drawn += 1;
            }
        }

        Ok(drawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::FrameBuffer;

    fn layout() -> MiniCourtLayout {
        MiniCourtLayout::new((1280, 720), &MinimapConfig::default(), 9.0, 18.0)
    }

    #[test]
    fn overlay_sits_in_top_right_corner() {
        let l = layout();

        assert_eq!(l.overlay, Rect::new(980, 50, 250, 400));
        assert_eq!(l.court, Rect::new(1030, 100, 150, 300));
    }

    #[test]
    fn inner_court_keeps_aspect_ratio() {
        let l = layout();
        let ratio = l.court.height as f32 / l.court.width as f32;

        assert!((ratio - 2.0).abs() < 1e-3);
        assert!((l.scale_x - l.scale_y).abs() < 1e-3);
    }

    #[test]
    fn corners_map_to_inner_court_corners() {
        let l = layout();

        assert_eq!(l.to_pixel(&na::Point2::new(0.0, 0.0)), Some(na::Point2::new(1030, 100)));
        assert_eq!(
            l.to_pixel(&na::Point2::new(18.0, 9.0)),
            Some(na::Point2::new(l.court.right(), l.court.bottom()))
        );
        assert_eq!(l.to_pixel(&na::Point2::new(9.0, 4.5)), Some(na::Point2::new(1105, 250)));
    }

    #[test]
    fn points_outside_overlay_are_dropped() {
        let l = layout();

        assert!(l.to_pixel(&na::Point2::new(-4.0, 2.0)).is_none());
        assert!(l.to_pixel(&na::Point2::new(3.0, -4.0)).is_none());
        assert!(l.to_pixel(&na::Point2::new(30.0, 2.0)).is_none());
        assert!(l.to_pixel(&na::Point2::new(f32::NAN, 2.0)).is_none());
        // bounds are the overlay, not the court: a slightly negative
        // coordinate still lands in the padding and is drawn
        assert!(l.to_pixel(&na::Point2::new(-0.2, 9.1)).is_some());
    }

    #[test]
    fn degenerate_court_does_not_overflow() {
        for (width, length) in [(0.0, 18.0), (9.0, f32::INFINITY), (f32::NAN, 18.0)] {
            let l = MiniCourtLayout::new((1280, 720), &MinimapConfig::default(), width, length);

            assert!(l.overlay.height >= 1);
            assert!(l.court.height >= 1);
            assert!(l.to_pixel(&na::Point2::new(1.0, 1.0)).map_or(true, |p| l.overlay.contains(p)));
        }
    }

    #[test]
    fn net_and_attack_lines() {
        let l = layout();
        let ys: Vec<i32> = l.lines[4..].iter().map(|line| line.from.y).collect();

        assert_eq!(ys, vec![250, 200, 300]);
    }

    #[test]
    fn background_is_non_destructive() {
        let court = MiniCourt::new((1280, 720), &MinimapConfig::default(), 9.0, 18.0);
        let frame = FrameBuffer::new(1280, 720, Color::BLACK);
        let out = court.render_background(&frame).unwrap();

        assert_eq!(frame.pixel(1000, 60), Some(Color::BLACK));
        assert_eq!(out.pixel(1000, 60), Some(Color::rgb(128, 128, 128)));
        assert_eq!(out.pixel(10, 10), Some(Color::BLACK));
    }

    #[test]
    fn points_are_composited() {
        let court = MiniCourt::new((1280, 720), &MinimapConfig::default(), 9.0, 18.0);
        let mut frame = FrameBuffer::new(1280, 720, Color::BLACK);
        let red = Color::rgb(255, 0, 0);
        let blue = Color::rgb(0, 0, 255);

        let drawn = court
            .render_points(&mut frame, &[na::Point2::new(0.0, 0.0), na::Point2::new(-5.0, 0.0)], red)
            .unwrap();
        court.render_points(&mut frame, &[na::Point2::new(18.0, 9.0)], blue).unwrap();

        assert_eq!(drawn, 1);
        assert_eq!(frame.pixel(1030, 100), Some(red));
        assert_eq!(frame.pixel(1180, 400), Some(blue));
    }
}
