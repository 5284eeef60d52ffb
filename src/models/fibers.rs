//! Multi-compartment fiber encoding.
//!
//! Layout: `[base, diff, frac_1, x_1, y_1, z_1, …, frac_n, x_n, y_n, z_n]`.

use nalgebra::Vector3;

/// Index of the first compartment within the encoding.
const HEADER: usize = 2;
/// Values per compartment.
const STRIDE: usize = 4;

/// One compartment: volume fraction and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compartment {
    pub frac: f64,
    pub line: Vector3<f64>,
}

/// Decoded fibers model.
#[derive(Debug, Clone, PartialEq)]
pub struct Fibers {
    pub base: f64,
    pub diff: f64,
    pub comps: Vec<Compartment>,
}

impl Fibers {
    /// Empty model with `n` zero compartments.
    pub fn new(n: usize) -> Self {
        Self {
            base: 0.0,
            diff: 0.0,
            comps: vec![
                Compartment {
                    frac: 0.0,
                    line: Vector3::zeros(),
                };
                n
            ],
        }
    }

    pub fn encoding_size(n: usize) -> usize {
        HEADER + STRIDE * n
    }

    /// Number of compartments held by an encoding of `dim` values.
    pub fn count_for(dim: usize) -> usize {
        dim.saturating_sub(HEADER) / STRIDE
    }

    pub fn decode(v: &[f64]) -> Self {
        let n = Self::count_for(v.len());
        let comps = (0..n)
            .map(|c| {
                let at = HEADER + STRIDE * c;
                Compartment {
                    frac: v[at],
                    line: Vector3::new(v[at + 1], v[at + 2], v[at + 3]),
                }
            })
            .collect();
        Self {
            base: v.first().copied().unwrap_or(0.0),
            diff: v.get(1).copied().unwrap_or(0.0),
            comps,
        }
    }

    pub fn encode(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(Self::encoding_size(self.comps.len()));
        out.push(self.base);
        out.push(self.diff);
        for comp in &self.comps {
            out.push(comp.frac);
            out.extend_from_slice(comp.line.as_slice());
        }
        out
    }

    /// Pad with empty compartments or truncate to exactly `n`.
    pub fn convert(&self, n: usize) -> Self {
        let mut out = self.clone();
        out.comps.truncate(n);
        while out.comps.len() < n {
            out.comps.push(Compartment {
                frac: 0.0,
                line: Vector3::zeros(),
            });
        }
        out
    }

    /// Compartments that carry volume and a usable orientation.
    pub fn active(&self) -> impl Iterator<Item = &Compartment> {
        self.comps
            .iter()
            .filter(|c| c.frac > 0.0 && c.frac.is_finite() && c.line.norm() > 0.0)
    }

    pub fn frac_sum(&self) -> f64 {
        self.active().map(|c| c.frac).sum()
    }
}

/// `1 - |u·v|` for unit-normalized orientations; 1 when either is zero.
pub fn axial_distance(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    let (nu, nv) = (u.norm(), v.norm());
    if nu == 0.0 || nv == 0.0 {
        return 1.0;
    }
    1.0 - (u.dot(v) / (nu * nv)).abs().min(1.0)
}

/// Symmetric frac-weighted matching distance between two fiber models.
///
/// Each compartment of one model is matched to the closest orientation of the
/// other; the two directed averages are themselves averaged.
pub fn fibers_distance(a: &Fibers, b: &Fibers) -> f64 {
    0.5 * (directed_distance(a, b) + directed_distance(b, a))
}

fn directed_distance(from: &Fibers, to: &Fibers) -> f64 {
    let total = from.frac_sum();
    if total <= 0.0 {
        return if to.frac_sum() > 0.0 { 1.0 } else { 0.0 };
    }
    let mut acc = 0.0;
    for comp in from.active() {
        let best = to
            .active()
            .map(|other| axial_distance(&comp.line, &other.line))
            .fold(1.0, f64::min);
        acc += comp.frac * best;
    }
    acc / total
}
