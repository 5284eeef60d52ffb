//! Weighted k-means on axes.
//!
//! Points are unit orientations with sign ambiguity and a mass each. The
//! distance to a center is `1 - (u·c)²` and centers are the principal axes of
//! their members' mass-weighted dyadic sums.

use nalgebra::Vector3;
use rand::Rng;

use crate::cluster::Clusterer;
use crate::cluster::kmeans::pick;
use crate::estimate::AxialAccumulator;

const DEFAULT_MAX_ITERS: usize = 50;

#[derive(Debug, Clone)]
pub struct AxialKMeans {
    k: usize,
    max_iters: usize,
    dirs: Vec<Vector3<f64>>,
    masses: Vec<f64>,
    centers: Vec<Vector3<f64>>,
    labels: Vec<usize>,
    cost: f64,
}

impl AxialKMeans {
    /// Directions are normalized; zero directions should be filtered by the caller.
    pub fn new(k: usize, dirs: Vec<Vector3<f64>>, masses: Vec<f64>) -> Self {
        debug_assert_eq!(dirs.len(), masses.len());
        let dirs = dirs.into_iter().map(|d| d.normalize()).collect();
        Self {
            k,
            max_iters: DEFAULT_MAX_ITERS,
            dirs,
            masses,
            centers: Vec::new(),
            labels: Vec::new(),
            cost: f64::NAN,
        }
    }

    pub fn centers(&self) -> &[Vector3<f64>] {
        &self.centers
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Total member mass per center.
    pub fn cluster_masses(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.centers.len()];
        for (m, &label) in self.masses.iter().zip(&self.labels) {
            out[label] += m;
        }
        out
    }

    fn init_centers<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let k = self.k.clamp(1, self.dirs.len());
        self.centers.clear();
        self.centers.push(self.dirs[pick(&self.masses, rng)]);
        while self.centers.len() < k {
            let scores: Vec<f64> = self
                .dirs
                .iter()
                .zip(&self.masses)
                .map(|(u, m)| m * nearest(&self.centers, u).1)
                .collect();
            self.centers.push(self.dirs[pick(&scores, rng)]);
        }
    }

    fn assign(&mut self) -> bool {
        let mut changed = self.labels.len() != self.dirs.len();
        self.labels.resize(self.dirs.len(), 0);
        for (label, u) in self.labels.iter_mut().zip(&self.dirs) {
            let best = nearest(&self.centers, u).0;
            if *label != best {
                *label = best;
                changed = true;
            }
        }
        changed
    }

    fn update_centers(&mut self) {
        let mut accs = vec![AxialAccumulator::new(); self.centers.len()];
        for ((u, m), &label) in self.dirs.iter().zip(&self.masses).zip(&self.labels) {
            accs[label].update(*m, u);
        }
        for (center, acc) in self.centers.iter_mut().zip(&accs) {
            if let Some(stats) = acc.compile() {
                *center = stats.mean;
            }
        }
    }
}

impl Clusterer for AxialKMeans {
    fn proto(&self) -> Self {
        Self {
            centers: Vec::new(),
            labels: Vec::new(),
            cost: f64::NAN,
            ..self.clone()
        }
    }

    fn run<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        if self.dirs.is_empty() {
            self.cost = 0.0;
            return self;
        }
        self.init_centers(rng);
        for _ in 0..self.max_iters {
            let changed = self.assign();
            self.update_centers();
            if !changed {
                break;
            }
        }
        self.cost = self
            .dirs
            .iter()
            .zip(&self.masses)
            .zip(&self.labels)
            .map(|((u, m), &label)| m * axial_cost(u, &self.centers[label]))
            .sum();
        self
    }

    fn cost(&self) -> f64 {
        self.cost
    }
}

fn axial_cost(u: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    (1.0 - u.dot(c).powi(2)).max(0.0)
}

fn nearest(centers: &[Vector3<f64>], u: &Vector3<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, c) in centers.iter().enumerate() {
        let d = axial_cost(u, c);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::restarts;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn separates_two_crossing_bundles_regardless_of_sign() {
        let dirs = vec![
            Vector3::new(1.0, 0.05, 0.0),
            Vector3::new(-1.0, 0.05, 0.0),
            Vector3::new(1.0, -0.05, 0.0),
            Vector3::new(0.0, 1.0, 0.05),
            Vector3::new(0.0, -1.0, 0.05),
        ];
        let km = AxialKMeans::new(2, dirs, vec![1.0; 5]);
        let best = restarts(&km, 5, &mut StdRng::seed_from_u64(3)).unwrap();

        let labels = best.labels();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);

        let x_center = best.centers()[labels[0]];
        assert!(x_center.x.abs() > 0.99);
        let masses = best.cluster_masses();
        assert_eq!(masses[labels[0]], 3.0);
        assert_eq!(masses[labels[3]], 2.0);
    }

    #[test]
    fn single_cluster_finds_the_principal_axis() {
        let dirs = vec![Vector3::z(), -Vector3::z(), Vector3::new(0.0, 0.1, 1.0)];
        let fit = AxialKMeans::new(1, dirs, vec![1.0, 1.0, 1.0]).run(&mut StdRng::seed_from_u64(0));
        assert!(fit.centers()[0].z > 0.99);
        assert!(fit.cost() < 0.01);
    }
}
