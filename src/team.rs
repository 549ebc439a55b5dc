use std::collections::HashMap;
use std::fmt;

use ndarray::prelude::*;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::bbox::{BBox, Ltrb};
use crate::canvas::{Canvas, Rect};
use crate::detection::Detection;
use crate::error::Error;
use crate::kmeans::{KMeans, KMeansConfig};

/// Vertical offset of the jersey patch center, as a fraction of box height.
const TORSO_OFFSET: f32 = 0.2;
/// Patch size as a fraction of box width and height.
const PATCH_FRACTION: f32 = 0.2;
/// Buckets smaller than this are averaged instead of clustered.
const MIN_CLUSTER_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Team {
    Unknown = 0,
    One = 1,
    Two = 2,
}

impl Team {
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Decides which bootstrap bucket a player's sample lands in during calibration.
pub trait SideHeuristic {
    fn side(&self, frame_width: i32, bbox: &BBox<Ltrb>) -> Side;
}

/// Assumes the two teams stand on opposite halves of the frame while calibrating.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfFrameSplit;

impl SideHeuristic for HalfFrameSplit {
    #[inline]
    fn side(&self, frame_width: i32, bbox: &BBox<Ltrb>) -> Side {
        if bbox.center().x < frame_width as f32 / 2.0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// Mean (hue, saturation) of a jersey patch with the side bucket it was collected for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSample {
    pub hue: f32,
    pub saturation: f32,
    pub side: Side,
}

impl ColorSample {
    #[inline]
    fn descriptor(&self) -> [f32; 2] {
        [self.hue, self.saturation]
    }
}

/// Upper-torso patch of a player box, horizontally centered.
pub fn jersey_patch(bbox: &BBox<Ltrb>) -> Rect {
    let (x1, y1, x2, y2) = (
        bbox.left() as i32,
        bbox.top() as i32,
        bbox.right() as i32,
        bbox.bottom() as i32,
    );
    let (w, h) = ((x2 - x1) as f32, (y2 - y1) as f32);

    let cx = (x1 as f32 + w / 2.0) as i32;
    let cy = (y1 as f32 + h * TORSO_OFFSET) as i32;
    let half_w = (w * PATCH_FRACTION) as i32 / 2;
    let half_h = (h * PATCH_FRACTION) as i32 / 2;

    Rect::from_corners(
        (cx - half_w).max(0),
        (cy - half_h).max(0),
        cx + half_w,
        cy + half_h,
    )
}

/// (hue, saturation) descriptor of a player's jersey, `None` if the patch falls outside the frame.
pub fn color_descriptor<C: Canvas>(frame: &C, bbox: &BBox<Ltrb>) -> Option<[f32; 2]> {
    frame
        .mean_hue_saturation(jersey_patch(bbox))
        .map(|(h, s)| [h, s])
}

fn mean_color(samples: ArrayView2<'_, f32>) -> [f32; 2] {
    match samples.mean_axis(Axis(0)) {
        Some(m) => [m[0], m[1]],
        None => [0.0, 0.0],
    }
}

/// Color of the bucket's majority cluster, plain mean for small buckets.
pub fn dominant_color(samples: &[[f32; 2]], config: &KMeansConfig, rng: &mut StdRng) -> [f32; 2] {
    let mut data = Array2::zeros((samples.len(), 2));
    for (mut row, s) in data.outer_iter_mut().zip(samples) {
        row[0] = s[0];
        row[1] = s[1];
    }

    if samples.len() < MIN_CLUSTER_SAMPLES {
        return mean_color(data.view());
    }

    let model = match KMeans::fit(data.view(), 2, config, rng) {
        Some(model) => model,
        None => return mean_color(data.view()),
    };

    let sizes = model.cluster_sizes();
    let majority = if sizes[0] > sizes[1] { 0 } else { 1 };
    let center = model.centers().row(majority).to_owned();

    [center[0], center[1]]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    Collecting,
    Trained,
    /// Calibration ended with an empty bucket, stays here until `reset`.
    Failed,
}

/// Two-team jersey color classifier that bootstraps its own training set.
///
/// Samples are bucketed by a [`SideHeuristic`] while `Collecting`. `fit` turns
/// each bucket's dominant color into a team center exactly once. After that,
/// every track identity is classified on first sight and cached for the rest
/// of the run.
pub struct TeamClassifier<H = HalfFrameSplit> {
    heuristic: H,
    kmeans: KMeansConfig,
    rng: StdRng,
    left: Vec<ColorSample>,
    right: Vec<ColorSample>,
    state: ClassifierState,
    model: Option<KMeans>,
    assignments: HashMap<u32, Team>,
}

impl TeamClassifier<HalfFrameSplit> {
    pub fn new(kmeans: KMeansConfig) -> Self {
        Self::with_heuristic(HalfFrameSplit, kmeans)
    }
}

impl<H: SideHeuristic> TeamClassifier<H> {
    pub fn with_heuristic(heuristic: H, kmeans: KMeansConfig) -> Self {
        Self {
            heuristic,
            rng: kmeans.rng(),
            kmeans,
            left: Vec::new(),
            right: Vec::new(),
            state: ClassifierState::Collecting,
            model: None,
            assignments: HashMap::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> ClassifierState {
        self.state
    }

    #[inline]
    pub fn is_trained(&self) -> bool {
        self.state == ClassifierState::Trained
    }

    #[inline]
    pub fn sample_counts(&self) -> (usize, usize) {
        (self.left.len(), self.right.len())
    }

    #[inline]
    pub fn samples(&self) -> impl Iterator<Item = &ColorSample> {
        self.left.iter().chain(self.right.iter())
    }

    /// Identity to team cache built so far.
    #[inline]
    pub fn assignments(&self) -> &HashMap<u32, Team> {
        &self.assignments
    }

    /// Team color centers (hue, saturation), once trained.
    pub fn team_colors(&self) -> Option<[[f32; 2]; 2]> {
        let centers = self.model.as_ref()?.centers();
        Some([
            [centers[[0, 0]], centers[[0, 1]]],
            [centers[[1, 0]], centers[[1, 1]]],
        ])
    }

    /// Buckets one color sample per player; returns how many were added.
    pub fn collect_samples<C: Canvas>(&mut self, frame: &C, players: &[Detection]) -> usize {
        if self.state != ClassifierState::Collecting {
            return 0;
        }

        let (frame_width, _) = frame.size();
        let mut added = 0;

        for player in players {
            let Some([hue, saturation]) = color_descriptor(frame, &player.bbox) else {
                continue;
            };

            let side = self.heuristic.side(frame_width, &player.bbox);
            let sample = ColorSample {
                hue,
                saturation,
                side,
            };

            match side {
                Side::Left => self.left.push(sample),
                Side::Right => self.right.push(sample),
            }

            added += 1;
        }

        added
    }

    /// One-shot `Collecting -> Trained` transition; left bucket seeds team 1, right seeds team 2.
    pub fn fit(&mut self) -> Result<(), Error> {
        let (left, right) = self.sample_counts();
        info!("team samples: left {} | right {}", left, right);

        match self.state {
            ClassifierState::Trained => return Ok(()),
            ClassifierState::Failed => return Err(Error::Untrainable { left, right }),
            ClassifierState::Collecting => {}
        }

        if left == 0 || right == 0 {
            warn!(
                "missing color samples for one side (left {}, right {}), teams stay unknown",
                left, right
            );
            self.state = ClassifierState::Failed;
            return Err(Error::Untrainable { left, right });
        }

        let left: Vec<_> = self.left.iter().map(ColorSample::descriptor).collect();
        let right: Vec<_> = self.right.iter().map(ColorSample::descriptor).collect();

        let color_left = dominant_color(&left, &self.kmeans, &mut self.rng);
        let color_right = dominant_color(&right, &self.kmeans, &mut self.rng);
        debug!("dominant colors: left {:?}, right {:?}", color_left, color_right);

        let seeds = array![
            [color_left[0], color_left[1]],
            [color_right[0], color_right[1]]
        ];
        self.model = Some(KMeans::fit_from(seeds.view(), seeds.clone(), 1));
        self.state = ClassifierState::Trained;

        Ok(())
    }

    /// Team for a player, decided once per identity and cached.
    ///
    /// Players without an identity are classified every time and never cached.
    pub fn get_team<C: Canvas>(
        &mut self,
        identity: Option<u32>,
        frame: &C,
        bbox: &BBox<Ltrb>,
    ) -> Team {
        if self.state != ClassifierState::Trained {
            return Team::Unknown;
        }

        if let Some(team) = identity.and_then(|id| self.assignments.get(&id)) {
            return *team;
        }

        let (Some(model), Some(color)) = (self.model.as_ref(), color_descriptor(frame, bbox)) else {
            return Team::Unknown;
        };

        let team = match model.predict(aview1(&color)) {
            0 => Team::One,
            _ => Team::Two,
        };

        if let Some(id) = identity {
            self.assignments.insert(id, team);
        }

        team
    }

    /// Back to an empty `Collecting` classifier.
    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.assignments.clear();
        self.model = None;
        self.rng = self.kmeans.rng();
        self.state = ClassifierState::Collecting;
    }
}
