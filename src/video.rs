use std::path::{Path, PathBuf};

use nalgebra as na;
use opencv::{
    core::{self, Mat, Scalar, Vector},
    imgproc,
    prelude::*,
    videoio,
};
use tracing::{debug, info};

use crate::canvas::{Canvas, Rect};
use crate::color::Color;
use crate::error::Error;
use crate::source::{VideoInfo, VideoSink, VideoSource};

const FONT: i32 = imgproc::FONT_HERSHEY_SIMPLEX;

#[inline]
fn scalar(c: Color) -> Scalar {
    Scalar::new(c.b as f64, c.g as f64, c.r as f64, 0.0)
}

#[inline]
fn point(p: na::Point2<i32>) -> core::Point {
    core::Point::new(p.x, p.y)
}

#[inline]
fn cv_rect(r: Rect) -> core::Rect {
    core::Rect::new(r.x, r.y, r.width, r.height)
}

impl Canvas for Mat {
    #[inline]
    fn size(&self) -> (i32, i32) {
        (self.cols(), self.rows())
    }

    fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        if x < 0 || y < 0 || x >= self.cols() || y >= self.rows() {
            return None;
        }

        let px = self.at_2d::<core::Vec3b>(y, x).ok()?;
        Some(Color::bgr(px[0], px[1], px[2]))
    }

    fn blend_rect(&mut self, rect: Rect, color: Color, alpha: f32) -> Result<(), Error> {
        let rect = rect.intersect(&self.bounds());
        if rect.is_empty() {
            return Ok(());
        }

        let roi = Mat::roi(self, cv_rect(rect))?;
        let overlay = Mat::new_rows_cols_with_default(rect.height, rect.width, core::CV_8UC3, scalar(color))?;

        let mut blended = Mat::default();
        core::add_weighted(&roi, alpha as f64, &overlay, 1.0 - alpha as f64, 0.0, &mut blended, -1)?;

        let mut target = Mat::roi(self, cv_rect(rect))?;
        blended.copy_to(&mut target)?;

        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), Error> {
        imgproc::rectangle(self, cv_rect(rect), scalar(color), imgproc::FILLED, imgproc::LINE_8, 0)?;

        Ok(())
    }

    fn draw_rect(&mut self, rect: Rect, color: Color, thickness: i32) -> Result<(), Error> {
        imgproc::rectangle(self, cv_rect(rect), scalar(color), thickness, imgproc::LINE_8, 0)?;

        Ok(())
    }

    fn draw_line(
        &mut self,
        from: na::Point2<i32>,
        to: na::Point2<i32>,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error> {
        imgproc::line(self, point(from), point(to), scalar(color), thickness, imgproc::LINE_8, 0)?;

        Ok(())
    }

    fn fill_circle(&mut self, center: na::Point2<i32>, radius: i32, color: Color) -> Result<(), Error> {
        imgproc::circle(self, point(center), radius, scalar(color), imgproc::FILLED, imgproc::LINE_8, 0)?;

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
        imgproc::ellipse(
            self,
            point(center),
            core::Size::new(axes.0, axes.1),
            0.0,
            start_angle,
            end_angle,
            scalar(color),
            thickness,
            imgproc::LINE_4,
            0,
        )?;

        Ok(())
    }

    fn fill_polygon(&mut self, points: &[na::Point2<i32>], color: Color) -> Result<(), Error> {
        let mut contour = Vector::<core::Point>::new();
        for p in points {
            contour.push(point(*p));
        }

        let mut contours = Vector::<Vector<core::Point>>::new();
        contours.push(contour);

        imgproc::fill_poly(
            self,
            &contours,
            scalar(color),
            imgproc::LINE_8,
            0,
            core::Point::new(0, 0),
        )?;

        Ok(())
    }

    fn text_size(&self, text: &str, scale: f64) -> (i32, i32) {
        let mut baseline = 0;
        match imgproc::get_text_size(text, FONT, scale, 1, &mut baseline) {
            Ok(size) => (size.width, size.height),
            Err(_) => (0, 0),
        }
    }

    fn put_text(
        &mut self,
        text: &str,
        origin: na::Point2<i32>,
        scale: f64,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error> {
        imgproc::put_text(
            self,
            text,
            point(origin),
            FONT,
            scale,
            scalar(color),
            thickness,
            imgproc::LINE_AA,
            false,
        )?;

        Ok(())
    }

    fn mean_hue_saturation(&self, roi: Rect) -> Option<(f32, f32)> {
        let roi = roi.intersect(&self.bounds());
        if roi.is_empty() {
            return None;
        }

        let patch = Mat::roi(self, cv_rect(roi)).ok()?;
        let mut hsv = Mat::default();
        imgproc::cvt_color(&patch, &mut hsv, imgproc::COLOR_BGR2HSV, 0).ok()?;

        let mean = core::mean(&hsv, &Mat::default()).ok()?;
        Some((mean[0] as f32, mean[1] as f32))
    }
}

/// Video file read through `VideoCapture`, rewound by reopening.
pub struct OpenCvSource {
    path: PathBuf,
    capture: videoio::VideoCapture,
    info: VideoInfo,
    position: usize,
}

impl OpenCvSource {
    fn open_capture(path: &Path) -> Result<videoio::VideoCapture, Error> {
        let name = path
            .to_str()
            .ok_or_else(|| Error::SourceUnavailable(format!("non utf-8 path {}", path.display())))?;

        let capture = videoio::VideoCapture::from_file(name, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::SourceUnavailable(format!("unable to open {}", path.display())));
        }

        Ok(capture)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let capture = Self::open_capture(&path)?;

        let info = VideoInfo {
            frame_count: capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as usize,
            fps: capture.get(videoio::CAP_PROP_FPS)?,
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
        };

        info!(
            "video {} {}x{} {} frames @ {:.2} fps",
            path.display(),
            info.width,
            info.height,
            info.frame_count,
            info.fps
        );

        Ok(Self {
            path,
            capture,
            info,
            position: 0,
        })
    }
}

impl VideoSource for OpenCvSource {
    type Frame = Mat;

    #[inline]
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.capture.release()?;
        self.capture = Self::open_capture(&self.path)?;
        self.position = 0;

        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Mat>, Error> {
        let index = self.position;
        let mut frame = Mat::default();

        let grabbed = self.capture.read(&mut frame).map_err(|e| Error::FrameRead {
            index,
            reason: e.to_string(),
        })?;

        if !grabbed {
            // past the reported count this is the normal end of stream
            if index < self.info.frame_count {
                debug!("capture stopped at frame {} of {}", index, self.info.frame_count);
            }
            return Ok(None);
        }

        if frame.cols() == 0 || frame.rows() == 0 {
            return Err(Error::FrameRead {
                index,
                reason: "empty frame".into(),
            });
        }

        self.position += 1;
        Ok(Some(frame))
    }
}

/// `mp4v` writer, reopened whenever the frame size changes.
pub struct OpenCvSink {
    writer: Option<videoio::VideoWriter>,
    size: Option<(i32, i32)>,
    out_file: String,
    fps: f64,
}

impl OpenCvSink {
    pub fn new<P: AsRef<Path>>(out_file: P, fps: f64) -> Self {
        Self {
            writer: None,
            size: None,
            out_file: out_file.as_ref().to_string_lossy().into_owned(),
            fps: if fps > 0.0 { fps } else { 24.0 },
        }
    }

    pub fn release(&mut self) -> Result<(), Error> {
        if let Some(mut w) = self.writer.take() {
            w.release()?;
        }

        Ok(())
    }

    fn reinit(&mut self, size: (i32, i32)) -> Result<(), Error> {
        self.release()?;
        debug!("video writer {} at {:?}", self.out_file, size);

        self.size = Some(size);
        self.writer = Some(videoio::VideoWriter::new(
            &self.out_file,
            videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)?,
            self.fps,
            core::Size::new(size.0, size.1),
            true,
        )?);

        Ok(())
    }
}

impl VideoSink<Mat> for OpenCvSink {
    fn write(&mut self, frame: &Mat) -> Result<(), Error> {
        let size = (frame.cols(), frame.rows());

        if self.writer.is_none() || self.size != Some(size) {
            self.reinit(size)?;
        }

        if let Some(w) = self.writer.as_mut() {
            w.write(frame)?;
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.release()
    }
}
