use crate::canvas::Canvas;
use crate::detection::Detection;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// As reported by the container, may be off for damaged files.
    pub frame_count: usize,
    pub fps: f64,
    pub width: i32,
    pub height: i32,
}

/// Sequential frame reader that can be restarted from the first frame.
pub trait VideoSource {
    type Frame: Canvas + Clone;

    fn info(&self) -> VideoInfo;

    fn rewind(&mut self) -> Result<(), Error>;

    /// `Ok(None)` at end of stream, `Err` for a frame that could not be decoded.
    fn next_frame(&mut self) -> Result<Option<Self::Frame>, Error>;
}

pub trait VideoSink<F> {
    fn write(&mut self, frame: &F) -> Result<(), Error>;

    fn finish(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// External detector plus tracker; identities must be stable across frames.
pub trait Detector<F> {
    fn detect(&mut self, index: usize, frame: &F) -> Result<Vec<Detection>, Error>;
}
