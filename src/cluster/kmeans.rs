//! Weighted k-means and DP-means over Euclidean points.
//!
//! DP-means is k-means with a penalty `λ` per cluster: a point farther than
//! `sqrt(λ)` from every center opens a new cluster. Both share the Lloyd
//! iteration below; the cost is `Σ w_i ‖x_i - c(i)‖² (+ λ·k)`.

use nalgebra::DVector;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::cluster::Clusterer;

const DEFAULT_MAX_ITERS: usize = 100;

#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    penalty: Option<f64>,
    max_iters: usize,
    points: Vec<DVector<f64>>,
    weights: Vec<f64>,
    centers: Vec<DVector<f64>>,
    labels: Vec<usize>,
    iters: usize,
    cost: f64,
}

impl KMeans {
    /// Plain k-means with `k` clusters and unit weights.
    pub fn new(k: usize, points: Vec<DVector<f64>>) -> Self {
        let weights = vec![1.0; points.len()];
        Self {
            k,
            penalty: None,
            max_iters: DEFAULT_MAX_ITERS,
            points,
            weights,
            centers: Vec::new(),
            labels: Vec::new(),
            iters: 0,
            cost: f64::NAN,
        }
    }

    /// DP-means starting from `k` centers with per-cluster penalty `lambda`.
    pub fn dp_means(lambda: f64, k: usize, points: Vec<DVector<f64>>) -> Self {
        Self {
            penalty: Some(lambda),
            ..Self::new(k, points)
        }
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        debug_assert_eq!(weights.len(), self.points.len());
        self.weights = weights;
        self
    }

    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters.max(1);
        self
    }

    pub fn centers(&self) -> &[DVector<f64>] {
        &self.centers
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn iters(&self) -> usize {
        self.iters
    }

    fn init_centers<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let k = self.k.clamp(1, self.points.len());
        self.centers.clear();
        self.centers.push(self.points[pick(&self.weights, rng)].clone());

        // k-means++ seeding: sample proportionally to w·d².
        while self.centers.len() < k {
            let scores: Vec<f64> = self
                .points
                .iter()
                .zip(&self.weights)
                .map(|(p, w)| w * nearest(&self.centers, p).1)
                .collect();
            self.centers.push(self.points[pick(&scores, rng)].clone());
        }
    }

    fn assign(&mut self) -> bool {
        let mut changed = self.labels.len() != self.points.len();
        self.labels.resize(self.points.len(), 0);

        for idx in 0..self.points.len() {
            let (mut label, d2) = nearest(&self.centers, &self.points[idx]);
            if let Some(lambda) = self.penalty {
                if d2 > lambda {
                    self.centers.push(self.points[idx].clone());
                    label = self.centers.len() - 1;
                }
            }
            if self.labels[idx] != label {
                self.labels[idx] = label;
                changed = true;
            }
        }
        changed
    }

    fn update_centers(&mut self) {
        let dim = self.points[0].len();
        let mut sums = vec![DVector::<f64>::zeros(dim); self.centers.len()];
        let mut mass = vec![0.0; self.centers.len()];
        for ((p, w), &label) in self.points.iter().zip(&self.weights).zip(&self.labels) {
            sums[label].axpy(*w, p, 1.0);
            mass[label] += w;
        }
        // Empty clusters keep their previous center.
        for (c, (sum, m)) in sums.into_iter().zip(mass).enumerate() {
            if m > 0.0 {
                self.centers[c] = sum / m;
            }
        }
    }

    fn compute_cost(&self) -> f64 {
        let sse: f64 = self
            .points
            .iter()
            .zip(&self.weights)
            .zip(&self.labels)
            .map(|((p, w), &label)| w * (p - &self.centers[label]).norm_squared())
            .sum();
        sse + self.penalty.unwrap_or(0.0) * self.centers.len() as f64
    }
}

impl Clusterer for KMeans {
    fn proto(&self) -> Self {
        Self {
            centers: Vec::new(),
            labels: Vec::new(),
            iters: 0,
            cost: f64::NAN,
            ..self.clone()
        }
    }

    fn run<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        if self.points.is_empty() {
            self.cost = 0.0;
            return self;
        }

        self.init_centers(rng);
        for iter in 0..self.max_iters {
            self.iters = iter + 1;
            let changed = self.assign();
            self.update_centers();
            if !changed {
                break;
            }
        }
        self.cost = self.compute_cost();
        self
    }

    fn cost(&self) -> f64 {
        self.cost
    }
}

/// Index and squared distance of the closest center.
fn nearest(centers: &[DVector<f64>], p: &DVector<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, c) in centers.iter().enumerate() {
        let d2 = (p - c).norm_squared();
        if d2 < best.1 {
            best = (idx, d2);
        }
    }
    best
}

/// Weighted random index; uniform when every score is zero.
pub(crate) fn pick<R: Rng + ?Sized>(scores: &[f64], rng: &mut R) -> usize {
    match WeightedIndex::new(scores.iter().map(|s| s.max(0.0))) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.gen_range(0..scores.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::restarts;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn blobs() -> Vec<DVector<f64>> {
        let mut points = Vec::new();
        for &(cx, cy) in &[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)] {
            for dx in [-0.5, 0.0, 0.5] {
                for dy in [-0.5, 0.0, 0.5] {
                    points.push(DVector::from_vec(vec![cx + dx, cy + dy]));
                }
            }
        }
        points
    }

    fn sorted_centers(km: &KMeans) -> Vec<(f64, f64)> {
        let mut out: Vec<(f64, f64)> = km.centers().iter().map(|c| (c[0], c[1])).collect();
        out.sort_by(|a, b| a.partial_cmp(b).unwrap());
        out
    }

    #[test]
    fn restarted_kmeans_finds_separated_blobs() {
        let km = KMeans::new(3, blobs());
        let best = restarts(&km, 10, &mut StdRng::seed_from_u64(5)).unwrap();
        let centers = sorted_centers(&best);
        let expected = [(0.0, 0.0), (0.0, 10.0), (10.0, 0.0)];
        for (c, e) in centers.iter().zip(expected) {
            assert!((c.0 - e.0).abs() < 1e-9 && (c.1 - e.1).abs() < 1e-9);
        }
        // 27 points each 0.5 or 0.707 away from their blob center.
        assert!((best.cost() - 3.0 * 3.0).abs() < 1e-9);
    }

    #[test]
    fn dp_means_opens_clusters_beyond_radius() {
        let dpm = KMeans::dp_means(4.0, 1, blobs());
        let best = restarts(&dpm, 5, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(best.centers().len(), 3);
        assert!((best.cost() - (9.0 + 3.0 * 4.0)).abs() < 1e-9);
    }

    #[test]
    fn weights_pull_the_center() {
        let points = vec![DVector::from_vec(vec![0.0]), DVector::from_vec(vec![4.0])];
        let km = KMeans::new(1, points).with_weights(vec![3.0, 1.0]);
        let fit = km.run(&mut StdRng::seed_from_u64(0));
        assert!((fit.centers()[0][0] - 1.0).abs() < 1e-12);
        assert!((fit.cost() - (3.0 * 1.0 + 9.0)).abs() < 1e-12);
    }

    #[test]
    fn iteration_budget_is_respected() {
        let converged = KMeans::new(1, blobs()).run(&mut StdRng::seed_from_u64(3));
        // One pass to assign, one to confirm nothing moved.
        assert_eq!(converged.iters(), 2);

        let capped = KMeans::new(1, blobs())
            .with_max_iters(0)
            .run(&mut StdRng::seed_from_u64(3));
        assert_eq!(capped.iters(), 1);
        assert_eq!(capped.labels(), converged.labels());
    }

    #[test]
    fn empty_input_converges_immediately() {
        let fit = KMeans::new(2, Vec::new()).run(&mut StdRng::seed_from_u64(0));
        assert_eq!(fit.cost(), 0.0);
        assert!(fit.centers().is_empty());
    }
}
