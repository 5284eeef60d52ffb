//! Landmark extraction from a point cloud.
//!
//! The cloud is optionally subsampled, then clustered: DP-means when a radius
//! is given (penalty `radius²`), plain k-means with `num` centers otherwise.
//! The centers of the best restart are the landmarks.

use nalgebra::{DVector, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

use crate::cluster::{KMeans, par_restarts};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkOptions {
    /// Number of landmarks when no radius is given.
    pub num: usize,
    /// Cluster radius; switches to DP-means.
    pub radius: Option<f64>,
    pub restarts: usize,
    pub seed: u64,
    /// Cluster at most this many randomly chosen points.
    pub subsample: Option<usize>,
}

impl Default for LandmarkOptions {
    fn default() -> Self {
        Self {
            num: 2,
            radius: None,
            restarts: 5,
            seed: 42,
            subsample: Some(1000),
        }
    }
}

pub fn landmarks(points: &[Vector3<f64>], opts: &LandmarkOptions) -> Result<Vec<Vector3<f64>>> {
    if opts.num == 0 && opts.radius.is_none() {
        return Err(Error::config("landmark count must be >= 1"));
    }
    if let Some(r) = opts.radius {
        if !(r.is_finite() && r > 0.0) {
            return Err(Error::config(format!("landmark radius must be > 0, got {r}")));
        }
    }
    if points.is_empty() {
        return Ok(Vec::new());
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let chosen: Vec<DVector<f64>> = match opts.subsample {
        Some(n) if n > 0 && n < points.len() => index::sample(&mut rng, points.len(), n)
            .into_iter()
            .map(|idx| to_dvector(&points[idx]))
            .collect(),
        _ => points.iter().map(to_dvector).collect(),
    };
    log::debug!(
        "landmarks: clustering {} of {} points ({} restarts)",
        chosen.len(),
        points.len(),
        opts.restarts
    );

    let cluster = match opts.radius {
        Some(r) => KMeans::dp_means(r * r, 1, chosen),
        None => KMeans::new(opts.num, chosen),
    };
    let best = par_restarts(&cluster, opts.restarts, opts.seed)
        .ok_or_else(|| Error::config("every landmark clustering attempt failed"))?;

    Ok(best
        .centers()
        .iter()
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect())
}

fn to_dvector(p: &Vector3<f64>) -> DVector<f64> {
    DVector::from_column_slice(p.as_slice())
}
