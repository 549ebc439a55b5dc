use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::canvas::{Canvas, Rect};
use crate::circular_queue::CircularQueue;
use crate::color::{Color, Palette};
use crate::detection::Detection;
use crate::error::Error;

const LABEL_SCALE: f64 = 0.5;
const LABEL_PADDING: i32 = 10;
const COORD_PADDING: i32 = 5;

/// Inverted triangle drawn above the ball.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct BallMarker {
    pub offset: i32,
    pub height: i32,
    pub width: i32,
}

impl Default for BallMarker {
    fn default() -> Self {
        Self {
            offset: 15,
            height: 30,
            width: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPosition {
    /// Above the box's top edge.
    TopCenter,
    /// Below the box's bottom edge.
    BottomCenter,
}

/// Black or white, whichever reads better on `bg`.
fn text_color_for(bg: Color) -> Color {
    let luma = 0.299 * bg.r as f32 + 0.587 * bg.g as f32 + 0.114 * bg.b as f32;
    if luma > 140.0 {
        Color::BLACK
    } else {
        Color::WHITE
    }
}

/// Text on a filled background box anchored to a detection.
pub fn draw_label<C: Canvas>(
    canvas: &mut C,
    text: &str,
    bbox: &BBox<Ltrb>,
    position: LabelPosition,
    bg: Color,
    padding: i32,
) -> Result<(), Error> {
    let (tw, th) = canvas.text_size(text, LABEL_SCALE);
    let (w, h) = (tw + 2 * padding, th + 2 * padding);

    let anchor = match position {
        LabelPosition::TopCenter => bbox.top_center(),
        LabelPosition::BottomCenter => bbox.bottom_center(),
    };
    let x = anchor.x as i32 - w / 2;
    let y = match position {
        LabelPosition::TopCenter => anchor.y as i32 - h,
        LabelPosition::BottomCenter => anchor.y as i32,
    };

    canvas.fill_rect(Rect::new(x, y, w, h), bg)?;
    canvas.put_text(
        text,
        na::Point2::new(x + padding, y + padding + th),
        LABEL_SCALE,
        text_color_for(bg),
        1,
    )
}

/// Per-actor drawing on the full frame; keeps the ball's recent path.
pub struct Annotator {
    palette: Palette,
    marker: BallMarker,
    trace: CircularQueue<na::Point2<i32>>,
}

impl Annotator {
    pub fn new(palette: Palette, marker: BallMarker, trace_length: usize) -> Self {
        Self {
            palette,
            marker,
            trace: CircularQueue::with_capacity(trace_length),
        }
    }

    /// Ball centers currently in the trace, oldest first.
    pub fn trace(&self) -> Vec<na::Point2<i32>> {
        self.trace.asc_iter().copied().collect()
    }

    /// Ground ellipse and `#id` label.
    pub fn player<C: Canvas>(&self, canvas: &mut C, det: &Detection, color: Color) -> Result<(), Error> {
        let b = &det.bbox;
        let foot = b.bottom_center();
        let w = b.width();

        canvas.draw_ellipse(
            na::Point2::new(foot.x as i32, foot.y as i32),
            (w as i32, (0.35 * w) as i32),
            -45.0,
            235.0,
            color,
            2,
        )?;

        if let Some(id) = det.track_id {
            draw_label(canvas, &format!("#{}", id), b, LabelPosition::BottomCenter, color, LABEL_PADDING)?;
        }

        Ok(())
    }

    /// Box and `Ref id` label.
    pub fn referee<C: Canvas>(&self, canvas: &mut C, det: &Detection) -> Result<(), Error> {
        let b = &det.bbox;
        let color = self.palette.referee;

        canvas.draw_rect(
            Rect::from_corners(b.left() as i32, b.top() as i32, b.right() as i32, b.bottom() as i32),
            color,
            4,
        )?;

        if let Some(id) = det.track_id {
            draw_label(canvas, &format!("Ref {}", id), b, LabelPosition::TopCenter, color, LABEL_PADDING)?;
        }

        Ok(())
    }

    /// Court position label in meters above the player.
    pub fn coordinates<C: Canvas>(
        &self,
        canvas: &mut C,
        det: &Detection,
        meters: &na::Point2<f32>,
    ) -> Result<(), Error> {
        let text = format!("({:.1}m, {:.1}m)", meters.x, meters.y);
        draw_label(canvas, &text, &det.bbox, LabelPosition::TopCenter, Color::WHITE, COORD_PADDING)
    }

    /// Extends the trace with the ball center and draws trace, dot and marker.
    pub fn ball<C: Canvas>(&mut self, canvas: &mut C, bbox: &BBox<Ltrb>) -> Result<(), Error> {
        let c = bbox.center();
        let center = na::Point2::new(c.x as i32, c.y as i32);
        let color = self.palette.ball;

        self.trace.push(center);

        let path: Vec<_> = self.trace.asc_iter().copied().collect();
        for pair in path.windows(2) {
            canvas.draw_line(pair[0], pair[1], color, 2)?;
        }

        canvas.fill_circle(center, 4, color)?;

        let top = bbox.top() as i32 - self.marker.offset;
        let half = self.marker.width / 2;
        let triangle = [
            na::Point2::new(center.x, top),
            na::Point2::new(center.x - half, top - self.marker.height),
            na::Point2::new(center.x + half, top - self.marker.height),
        ];

        canvas.fill_polygon(&triangle, color)
    }

    /// Progress banner for frame `index` of the calibration window.
    pub fn calibrating<C: Canvas>(&self, canvas: &mut C, index: usize, window: usize) -> Result<(), Error> {
        canvas.put_text(
            &calibration_label(index, window),
            na::Point2::new(50, 50),
            1.0,
            Color::RED,
            2,
        )
    }
}

/// One-based, so the window reads `1/N` through `N/N`.
pub fn calibration_label(index: usize, window: usize) -> String {
    format!("Calibrating... {}/{}", index + 1, window)
}
