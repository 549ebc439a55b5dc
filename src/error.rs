use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("failed to read frame {index}: {reason}")]
    FrameRead { index: usize, reason: String },

    #[error("not enough color samples to train (left: {left}, right: {right})")]
    Untrainable { left: usize, right: usize },

    #[error("video contains no readable frames")]
    EmptyVideo,

    #[cfg(feature = "video")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
