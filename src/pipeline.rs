use std::collections::HashMap;

use nalgebra as na;
use tracing::{debug, info, warn};

use crate::annotate::Annotator;
use crate::bbox::{BBox, Ltrb};
use crate::canvas::Canvas;
use crate::config::Config;
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::FrameDetections;
use crate::homography::ViewTransformer;
use crate::interpolate::BallTrack;
use crate::minimap::MiniCourt;
use crate::source::{Detector, VideoSink, VideoSource};
use crate::team::{ClassifierState, HalfFrameSplit, SideHeuristic, Team, TeamClassifier};

/// Everything the first pass buffers for the rest of the run.
#[derive(Debug, Clone)]
pub struct Ingest {
    pub frames: Vec<FrameDetections>,
    pub ball: BallTrack,
    /// Size of the first frame, fixes the minimap layout.
    pub frame_size: (i32, i32),
}

/// Court positions in meters, grouped the way the minimap colors them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projected {
    pub team_1: Vec<na::Point2<f32>>,
    pub team_2: Vec<na::Point2<f32>>,
    pub referees: Vec<na::Point2<f32>>,
    pub ball: Option<na::Point2<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    pub index: usize,
    /// Team of every identified player in the frame, `Team::Unknown` while calibrating.
    pub teams: Vec<(u32, Team)>,
    pub ball: Option<BBox<Ltrb>>,
    pub projected: Projected,
    /// Markers that landed inside the minimap overlay.
    pub minimap_points: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub frames_ingested: usize,
    pub frames_rendered: usize,
    pub ball_track: BallTrack,
    pub fallback_calibration: bool,
    pub classifier_state: ClassifierState,
    pub assignments: HashMap<u32, Team>,
    pub frames: Vec<FrameSummary>,
}

/// Three sequential passes over one video: ingest, interpolate, render.
pub struct Pipeline<D, H: SideHeuristic = HalfFrameSplit> {
    config: Config,
    detector: D,
    view: ViewTransformer,
    classifier: TeamClassifier<H>,
}

impl<D> Pipeline<D, HalfFrameSplit> {
    pub fn new(config: Config, detector: D, view: ViewTransformer) -> Self {
        let classifier = TeamClassifier::new(config.kmeans);

        Self::with_classifier(config, detector, view, classifier)
    }
}

impl<D, H: SideHeuristic> Pipeline<D, H> {
    pub fn with_classifier(
        config: Config,
        detector: D,
        view: ViewTransformer,
        classifier: TeamClassifier<H>,
    ) -> Self {
        Self {
            config,
            detector,
            view,
            classifier,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn view(&self) -> &ViewTransformer {
        &self.view
    }

    #[inline]
    pub fn classifier(&self) -> &TeamClassifier<H> {
        &self.classifier
    }

    /// First pass: detections and the raw ball box for every readable frame.
    ///
    /// A frame that fails to decode ends the pass early with what was gathered.
    pub fn ingest<S>(&mut self, source: &mut S) -> Result<Ingest, Error>
    where
        S: VideoSource,
        D: Detector<S::Frame>,
    {
        let total = source.info().frame_count;
        let mut frames = Vec::with_capacity(total);
        let mut ball = BallTrack::with_capacity(total);
        let mut frame_size = None;

        info!("ingest pass: {} frames expected", total);

        loop {
            let index = frames.len();
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    warn!("ingest pass truncated at frame {}: {}", index, err);
                    break;
                }
            };

            frame_size.get_or_insert_with(|| frame.size());

            let detections = self.detector.detect(index, &frame)?;
            let partitioned = FrameDetections::partition(index, detections);

            ball.push(partitioned.ball);
            frames.push(partitioned);

            if self.config.progress_interval > 0 && (index + 1) % self.config.progress_interval == 0 {
                info!("ingested {}/{} frames", index + 1, total);
            }
        }

        let frame_size = frame_size.ok_or(Error::EmptyVideo)?;

        info!(
            "ingest pass done: {} frames, ball seen in {}",
            frames.len(),
            ball.known()
        );

        Ok(Ingest {
            frames,
            ball,
            frame_size,
        })
    }

    /// Second pass: fills internal gaps of the ball track in place.
    pub fn interpolate(&self, ingest: &mut Ingest) {
        let before = ingest.ball.known();
        ingest.ball.interpolate();

        info!(
            "interpolation pass: ball known in {} of {} frames ({} filled)",
            ingest.ball.known(),
            ingest.ball.len(),
            ingest.ball.known() - before
        );
    }

    fn project(&self, group: &[&Detection]) -> Vec<na::Point2<f32>> {
        let anchors: Vec<_> = group.iter().map(|d| d.bbox.bottom_center()).collect();

        self.view.transform_points(&anchors)
    }

    /// Third pass: re-reads the video and writes one composed frame per ingested frame.
    pub fn render<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        ingest: &Ingest,
    ) -> Result<Vec<FrameSummary>, Error>
    where
        S: VideoSource,
        K: VideoSink<S::Frame>,
    {
        source.rewind()?;

        let window = self.config.calibration_frames;
        let palette = self.config.palette;
        let minimap = MiniCourt::new(
            ingest.frame_size,
            &self.config.minimap,
            self.config.court_width,
            self.config.court_length,
        );
        let mut annotator = Annotator::new(palette, self.config.ball_marker, self.config.trace_length);
        let mut summaries = Vec::with_capacity(ingest.frames.len());

        info!("render pass: {} frames, calibration window {}", ingest.frames.len(), window);

        for detections in &ingest.frames {
            let index = detections.index;
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    warn!("render pass: video ended early at frame {}", index);
                    break;
                }
                Err(err) => {
                    warn!("render pass truncated at frame {}: {}", index, err);
                    break;
                }
            };

            let calibrating = index < window;

            // teams are resolved on the untouched frame
            let teams: Vec<Team> = if calibrating {
                self.classifier.collect_samples(&frame, &detections.players);
                detections.players.iter().map(|_| Team::Unknown).collect()
            } else {
                if self.classifier.state() == ClassifierState::Collecting {
                    if let Err(err) = self.classifier.fit() {
                        debug!("drawing players neutral: {}", err);
                    }
                }

                detections
                    .players
                    .iter()
                    .map(|p| self.classifier.get_team(p.track_id, &frame, &p.bbox))
                    .collect()
            };

            let team_players = |team: Team| -> Vec<&Detection> {
                detections
                    .players
                    .iter()
                    .zip(&teams)
                    .filter(|(_, t)| **t == team)
                    .map(|(p, _)| p)
                    .collect()
            };

            let team_1 = team_players(Team::One);
            let team_2 = team_players(Team::Two);
            let referees: Vec<&Detection> = detections.referees.iter().collect();
            let ball = ingest.ball.get(index);

            let projected = Projected {
                team_1: self.project(&team_1),
                team_2: self.project(&team_2),
                referees: self.project(&referees),
                ball: ball.and_then(|b| self.view.transform_points(&[b.center()]).pop()),
            };

            let mut out = minimap.render_background(&frame)?;
            minimap.render_lines(&mut out)?;

            let mut minimap_points = 0;
            if !calibrating {
                minimap_points += minimap.render_points(&mut out, &projected.team_1, palette.team_1)?;
                minimap_points += minimap.render_points(&mut out, &projected.team_2, palette.team_2)?;
                minimap_points += minimap.render_points(&mut out, &projected.referees, palette.referee)?;
                if let Some(p) = projected.ball {
                    minimap_points += minimap.render_points(&mut out, &[p], palette.ball)?;
                }
            }

            for (player, team) in detections.players.iter().zip(&teams) {
                let color = match team {
                    Team::One => palette.team_1,
                    Team::Two => palette.team_2,
                    Team::Unknown => palette.neutral,
                };
                annotator.player(&mut out, player, color)?;
            }

            for (player, meters) in team_1.iter().zip(&projected.team_1) {
                annotator.coordinates(&mut out, player, meters)?;
            }
            for (player, meters) in team_2.iter().zip(&projected.team_2) {
                annotator.coordinates(&mut out, player, meters)?;
            }

            for referee in &detections.referees {
                annotator.referee(&mut out, referee)?;
            }

            if let Some(b) = ball {
                annotator.ball(&mut out, &b)?;
            }

            if calibrating {
                annotator.calibrating(&mut out, index, window)?;
            }

            sink.write(&out)?;

            summaries.push(FrameSummary {
                index,
                teams: detections
                    .players
                    .iter()
                    .zip(&teams)
                    .filter_map(|(p, t)| p.track_id.map(|id| (id, *t)))
                    .collect(),
                ball,
                projected,
                minimap_points,
            });

            if self.config.progress_interval > 0 && (index + 1) % self.config.progress_interval == 0 {
                info!("rendered {}/{} frames", index + 1, ingest.frames.len());
            }
        }

        sink.finish()?;

        if self.classifier.state() == ClassifierState::Collecting {
            warn!("video ended inside the calibration window, teams were never assigned");
        }

        info!("render pass done: {} frames written", summaries.len());

        Ok(summaries)
    }

    /// Runs all three passes and reports what happened.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunReport, Error>
    where
        S: VideoSource,
        K: VideoSink<S::Frame>,
        D: Detector<S::Frame>,
    {
        self.config.validate()?;

        if self.view.is_fallback() {
            warn!("running with placeholder calibration, court coordinates are not meaningful");
        }

        let mut ingest = self.ingest(source)?;
        self.interpolate(&mut ingest);
        let frames = self.render(source, sink, &ingest)?;

        Ok(RunReport {
            frames_ingested: ingest.frames.len(),
            frames_rendered: frames.len(),
            ball_track: ingest.ball,
            fallback_calibration: self.view.is_fallback(),
            classifier_state: self.classifier.state(),
            assignments: self.classifier.assignments().clone(),
            frames,
        })
    }
}
