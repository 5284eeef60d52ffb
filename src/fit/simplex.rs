//! Bounded derivative-free minimization (Nelder–Mead).
//!
//! Every trial point is projected into the box before it is evaluated, so the
//! objective is never called outside the bounds. Objective values that are not
//! finite are treated as `+∞`.
//!
//! The run stops when the simplex fits inside a cube of edge `rhoend` around
//! its best vertex (`converged = true`) or when `maxiter` objective evaluations
//! have been spent (`converged = false`, best point so far). The objective is
//! never called more than `maxiter` times.

use crate::domain::FitConfig;
use crate::error::{Error, Result};

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexOptions {
    /// Initial simplex edge length.
    pub rhobeg: f64,
    /// Terminal simplex size.
    pub rhoend: f64,
    /// Maximum number of objective evaluations.
    pub maxiter: usize,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self::from_config(&FitConfig::default())
    }
}

impl SimplexOptions {
    pub fn from_config(config: &FitConfig) -> Self {
        Self {
            rhobeg: config.rhobeg,
            rhoend: config.rhoend,
            maxiter: config.maxiter,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rhobeg.is_finite() && self.rhobeg > 0.0) {
            return Err(Error::config(format!("rhobeg must be > 0, got {}", self.rhobeg)));
        }
        if !(self.rhoend.is_finite() && self.rhoend > 0.0 && self.rhoend <= self.rhobeg) {
            return Err(Error::config(format!(
                "rhoend must be in (0, rhobeg], got {}",
                self.rhoend
            )));
        }
        if self.maxiter == 0 {
            return Err(Error::config("maxiter must be >= 1"));
        }
        Ok(())
    }
}

/// Box constraints `lower ≤ x ≤ upper` (infinite entries allowed).
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(Error::config(format!(
                "bounds have {} lower and {} upper entries",
                lower.len(),
                upper.len()
            )));
        }
        for (i, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(Error::config(format!("invalid bounds [{lo}, {hi}] for parameter {i}")));
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn project(&self, x: &mut [f64]) {
        for ((v, lo), hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.clamp(*lo, *hi);
        }
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .all(|((v, lo), hi)| *lo <= *v && *v <= *hi)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub evals: usize,
    pub converged: bool,
}

struct Objective<F> {
    f: F,
    evals: usize,
    budget: usize,
}

impl<F: FnMut(&[f64]) -> f64> Objective<F> {
    /// `None` once the evaluation budget is spent.
    fn eval(&mut self, x: &[f64]) -> Option<f64> {
        if self.evals >= self.budget {
            return None;
        }
        self.evals += 1;
        let v = (self.f)(x);
        Some(if v.is_finite() { v } else { f64::INFINITY })
    }
}

/// Minimize `f` from `x0` inside `bounds`.
pub fn minimize<F>(f: F, x0: &[f64], bounds: &Bounds, options: &SimplexOptions) -> Result<Minimum>
where
    F: FnMut(&[f64]) -> f64,
{
    options.validate()?;
    if bounds.len() != x0.len() {
        return Err(Error::config(format!(
            "start point has {} parameters, bounds have {}",
            x0.len(),
            bounds.len()
        )));
    }
    if x0.iter().any(|v| !v.is_finite()) {
        return Err(Error::config("start point must be finite"));
    }

    let n = x0.len();
    let mut obj = Objective {
        f,
        evals: 0,
        budget: options.maxiter,
    };

    let mut start = x0.to_vec();
    bounds.project(&mut start);
    let Some(value) = obj.eval(&start) else {
        return Err(Error::config("maxiter must be >= 1"));
    };
    let mut simplex = vec![(start.clone(), value)];

    for i in 0..n {
        let mut vertex = start.clone();
        vertex[i] += options.rhobeg;
        if vertex[i] > bounds.upper[i] {
            vertex[i] = start[i] - options.rhobeg;
        }
        bounds.project(&mut vertex);
        let Some(value) = obj.eval(&vertex) else {
            break;
        };
        simplex.push((vertex, value));
    }

    let mut converged = false;
    'search: while simplex.len() == n + 1 {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        if simplex_size(&simplex) <= options.rhoend {
            converged = true;
            break;
        }

        let worst = simplex[n].clone();
        let second_worst = simplex[n.saturating_sub(1)].1;
        let best = simplex[0].1;
        let centroid = centroid(&simplex[..n], n);

        let reflected = towards(&centroid, &worst.0, -REFLECT, bounds);
        let Some(fr) = obj.eval(&reflected) else {
            break;
        };

        if fr < best {
            let expanded = towards(&centroid, &reflected, EXPAND, bounds);
            simplex[n] = match obj.eval(&expanded) {
                Some(fe) if fe < fr => (expanded, fe),
                _ => (reflected, fr),
            };
            continue;
        }
        if fr < second_worst {
            simplex[n] = (reflected, fr);
            continue;
        }

        let (target, limit) = if fr < worst.1 {
            (&reflected, fr)
        } else {
            (&worst.0, worst.1)
        };
        let contracted = towards(&centroid, target, CONTRACT, bounds);
        let Some(fc) = obj.eval(&contracted) else {
            if fr < worst.1 {
                simplex[n] = (reflected, fr);
            }
            break;
        };
        // Inside contraction accepts ties with the reflected point.
        let accept = if fr < worst.1 { fc <= limit } else { fc < limit };
        if accept {
            simplex[n] = (contracted, fc);
            continue;
        }

        let anchor = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = towards(&anchor, &vertex.0, SHRINK, bounds);
            let Some(value) = obj.eval(&shrunk) else {
                break 'search;
            };
            *vertex = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);
    Ok(Minimum {
        x,
        value,
        evals: obj.evals,
        converged,
    })
}

/// `from + t · (to - from)`, projected into the bounds.
fn towards(from: &[f64], to: &[f64], t: f64, bounds: &Bounds) -> Vec<f64> {
    let mut out: Vec<f64> = from.iter().zip(to).map(|(a, b)| a + t * (b - a)).collect();
    bounds.project(&mut out);
    out
}

fn centroid(vertices: &[(Vec<f64>, f64)], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    for (x, _) in vertices {
        for (o, v) in out.iter_mut().zip(x) {
            *o += v;
        }
    }
    let count = vertices.len().max(1) as f64;
    out.iter_mut().for_each(|o| *o /= count);
    out
}

/// Largest coordinate distance of any vertex from the best one.
fn simplex_size(simplex: &[(Vec<f64>, f64)]) -> f64 {
    let best = &simplex[0].0;
    simplex[1..]
        .iter()
        .flat_map(|(x, _)| x.iter().zip(best).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight() -> SimplexOptions {
        SimplexOptions {
            rhobeg: 0.5,
            rhoend: 1e-8,
            maxiter: 5000,
        }
    }

    #[test]
    fn recovers_the_minimum_of_a_quadratic() {
        let f = |x: &[f64]| (x[0] - 1.0).powi(2) + 10.0 * (x[1] + 2.0).powi(2);
        let min = minimize(f, &[0.0, 0.0], &Bounds::unbounded(2), &tight()).unwrap();
        assert!(min.converged);
        assert!((min.x[0] - 1.0).abs() < 1e-6);
        assert!((min.x[1] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn active_bound_holds_the_solution() {
        let bounds = Bounds::new(vec![0.0], vec![2.0]).unwrap();
        let min = minimize(|x| (x[0] - 3.0).powi(2), &[1.0], &bounds, &tight()).unwrap();
        assert!((min.x[0] - 2.0).abs() < 1e-6);
        assert!(bounds.contains(&min.x));
    }

    #[test]
    fn start_outside_bounds_is_projected() {
        let bounds = Bounds::new(vec![-1.0, -1.0], vec![1.0, 1.0]).unwrap();
        let mut seen_outside = false;
        let f = |x: &[f64]| {
            seen_outside |= !(-1.0..=1.0).contains(&x[0]) || !(-1.0..=1.0).contains(&x[1]);
            x[0] * x[0] + x[1] * x[1]
        };
        let min = minimize(f, &[5.0, -5.0], &bounds, &tight()).unwrap();
        assert!(!seen_outside);
        assert!(min.x.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn non_finite_values_are_avoided() {
        let f = |x: &[f64]| if x[0] < 0.5 { f64::NAN } else { (x[0] - 0.7).powi(2) };
        let min = minimize(f, &[2.0], &Bounds::unbounded(1), &tight()).unwrap();
        assert!((min.x[0] - 0.7).abs() < 1e-6);
        assert!(min.value.is_finite());
    }

    #[test]
    fn budget_exhaustion_returns_the_best_point() {
        let options = SimplexOptions {
            rhobeg: 0.1,
            rhoend: 1e-12,
            maxiter: 20,
        };
        let f = |x: &[f64]| (x[0] - 100.0).powi(2) + (x[1] - 100.0).powi(2);
        let min = minimize(f, &[0.0, 0.0], &Bounds::unbounded(2), &options).unwrap();
        assert!(!min.converged);
        assert_eq!(min.evals, options.maxiter);
        assert!(min.value < f(&[0.0, 0.0]));
    }

    #[test]
    fn flat_objective_terminates_inside_the_bounds() {
        let bounds = Bounds::new(vec![0.0, 0.0], vec![10.0, 1.0]).unwrap();
        let options = SimplexOptions::default();
        let min = minimize(|_| 0.0, &[1.0, 0.5], &bounds, &options).unwrap();
        assert!(min.evals <= options.maxiter);
        assert!(bounds.contains(&min.x));
    }

    #[test]
    fn objective_calls_never_exceed_maxiter() {
        // Small budgets stop inside the initial simplex, a shrink and a contraction.
        for maxiter in 1..40 {
            let options = SimplexOptions {
                rhobeg: 1.0,
                rhoend: 1e-12,
                maxiter,
            };
            let mut calls = 0;
            let f = |x: &[f64]| {
                calls += 1;
                (x[0] - 0.3).abs() + (x[1] + 0.1).abs() + (x[2] * x[0]).abs()
            };
            let min = minimize(f, &[2.0, 2.0, 2.0], &Bounds::unbounded(3), &options).unwrap();
            assert!(calls <= maxiter);
            assert_eq!(min.evals, calls);
            assert!(min.value.is_finite());
        }
    }

    #[test]
    fn configuration_errors_are_reported() {
        let bounds = Bounds::unbounded(1);
        let mut options = tight();
        options.rhoend = 1.0;
        assert!(minimize(|x| x[0], &[0.0], &bounds, &options).is_err());
        assert!(minimize(|x| x[0], &[0.0, 1.0], &bounds, &tight()).is_err());
        assert!(Bounds::new(vec![1.0], vec![0.0]).is_err());
    }
}
