pub mod annotate;
pub mod bbox;
pub mod canvas;
pub mod color;
pub mod config;
pub mod detection;
pub mod detections_log;
pub mod error;
pub mod frame;
pub mod homography;
pub mod interpolate;
pub mod kmeans;
pub mod minimap;
pub mod pipeline;
pub mod source;
pub mod team;

#[cfg(feature = "video")]
pub mod video;

mod circular_queue;

pub use canvas::{Canvas, FrameBuffer, Rect};
pub use color::{Color, Palette};
pub use config::Config;
pub use detection::{ActorClass, Detection};
pub use error::Error;
pub use frame::FrameDetections;
pub use homography::{Homography, ViewTransformer};
pub use interpolate::BallTrack;
pub use pipeline::{Pipeline, RunReport};
pub use source::{Detector, VideoInfo, VideoSink, VideoSource};
pub use team::{Team, TeamClassifier};
