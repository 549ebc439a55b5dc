use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct KMeansConfig {
    /// Fixed seed for reproducible clustering, entropy seeded when `None`.
    pub seed: Option<u64>,
    pub restarts: usize,
    pub max_iterations: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            seed: None,
            restarts: 10,
            max_iterations: 300,
        }
    }
}

impl KMeansConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    centers: Array2<f32>,
    labels: Vec<usize>,
    inertia: f32,
}

#[inline]
fn sq_dist(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the nearest center and the squared distance to it, lowest index on ties.
fn nearest(centers: ArrayView2<'_, f32>, sample: ArrayView1<'_, f32>) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (idx, center) in centers.outer_iter().enumerate() {
        let d = sq_dist(center, sample);
        if d < best.1 {
            best = (idx, d);
        }
    }

    best
}

fn plus_plus_init<R: Rng>(samples: ArrayView2<'_, f32>, k: usize, rng: &mut R) -> Array2<f32> {
    let n = samples.nrows();
    let mut centers = Array2::zeros((k, samples.ncols()));
    centers.row_mut(0).assign(&samples.row(rng.gen_range(0..n)));

    let mut dists: Vec<f32> = samples
        .outer_iter()
        .map(|s| sq_dist(s, centers.row(0)))
        .collect();

    for c in 1..k {
        let total: f32 = dists.iter().sum();
        let pick = if total > 0.0 {
            let mut target = rng.gen::<f32>() * total;
            let mut pick = n - 1;
            for (idx, d) in dists.iter().enumerate() {
                if target < *d {
                    pick = idx;
                    break;
                }
                target -= d;
            }
            pick
        } else {
            // all samples coincide with the chosen centers
            rng.gen_range(0..n)
        };

        centers.row_mut(c).assign(&samples.row(pick));
        for (d, s) in dists.iter_mut().zip(samples.outer_iter()) {
            *d = d.min(sq_dist(s, centers.row(c)));
        }
    }

    centers
}

fn lloyd(samples: ArrayView2<'_, f32>, mut centers: Array2<f32>, max_iterations: usize) -> KMeans {
    let k = centers.nrows();
    let mut labels = vec![usize::MAX; samples.nrows()];

    for _ in 0..max_iterations.max(1) {
        let mut changed = false;
        for (label, s) in labels.iter_mut().zip(samples.outer_iter()) {
            let (idx, _) = nearest(centers.view(), s);
            if *label != idx {
                *label = idx;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        for c in 0..k {
            let members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == c).collect();
            // empty clusters keep their previous center
            if let Some(mean) = samples.select(Axis(0), &members).mean_axis(Axis(0)) {
                centers.row_mut(c).assign(&mean);
            }
        }
    }

    let inertia = samples
        .outer_iter()
        .zip(labels.iter())
        .map(|(s, &l)| sq_dist(s, centers.row(l)))
        .sum();

    KMeans {
        centers,
        labels,
        inertia,
    }
}

impl KMeans {
    /// Lloyd's algorithm from k-means++ seeds, best of `config.restarts` runs by inertia.
    ///
    /// Returns `None` when there are fewer samples than clusters.
    pub fn fit<R: Rng>(
        samples: ArrayView2<'_, f32>,
        k: usize,
        config: &KMeansConfig,
        rng: &mut R,
    ) -> Option<Self> {
        if k == 0 || samples.nrows() < k {
            return None;
        }

        let mut best: Option<KMeans> = None;
        for _ in 0..config.restarts.max(1) {
            let init = plus_plus_init(samples, k, rng);
            let model = lloyd(samples, init, config.max_iterations);

            if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
                best = Some(model);
            }
        }

        best
    }

    /// Single Lloyd run from the given centers.
    pub fn fit_from(samples: ArrayView2<'_, f32>, centers: Array2<f32>, max_iterations: usize) -> Self {
        lloyd(samples, centers, max_iterations)
    }

    #[inline]
    pub fn centers(&self) -> ArrayView2<'_, f32> {
        self.centers.view()
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    #[inline]
    pub fn inertia(&self) -> f32 {
        self.inertia
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centers.nrows()];
        for &l in &self.labels {
            sizes[l] += 1;
        }

        sizes
    }

    #[inline]
    pub fn predict(&self, sample: ArrayView1<'_, f32>) -> usize {
        nearest(self.centers.view(), sample).0
    }
}
