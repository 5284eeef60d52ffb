//! Sphere sampling and the real symmetric spherical harmonic basis.
//!
//! Only even orders are used (antipodally symmetric functions). Coefficients
//! for order `L` are laid out by increasing `l ∈ {0, 2, …, L}` and, within a
//! degree, by `m = -l..=l`, giving `(L+1)(L+2)/2` terms:
//!
//! - `m < 0`: `√2 · K(l,|m|) · P_l^|m|(cos θ) · sin(|m| φ)`
//! - `m = 0`: `K(l,0) · P_l(cos θ)`
//! - `m > 0`: `√2 · K(l,m) · P_l^m(cos θ) · cos(m φ)`
//!
//! with `K(l,m) = sqrt((2l+1)/(4π) · (l-m)!/(l+m)!)`.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector, Vector3};

use crate::math::solve_least_squares;

/// Number of coefficients for even order `order`.
pub fn spharm_size(order: usize) -> usize {
    (order + 1) * (order + 2) / 2
}

/// Even order matching a coefficient count, if any.
pub fn spharm_order(dim: usize) -> Option<usize> {
    (0..=32)
        .step_by(2)
        .find(|&order| spharm_size(order) == dim)
}

/// Evaluate every basis function at a (not necessarily unit) direction.
pub fn spharm_basis(order: usize, dir: &Vector3<f64>) -> Vec<f64> {
    let n = dir.norm();
    let (x, y, z) = if n > 0.0 {
        (dir.x / n, dir.y / n, dir.z / n)
    } else {
        (0.0, 0.0, 1.0)
    };
    let cos_theta = z.clamp(-1.0, 1.0);
    let phi = y.atan2(x);
    let legendre = associated_legendre(order, cos_theta);

    let mut out = Vec::with_capacity(spharm_size(order));
    for l in (0..=order).step_by(2) {
        for m in -(l as i64)..=(l as i64) {
            let am = m.unsigned_abs() as usize;
            let p = legendre[l][am] * norm_factor(l, am);
            let value = match m.signum() {
                -1 => std::f64::consts::SQRT_2 * p * (am as f64 * phi).sin(),
                0 => p,
                _ => std::f64::consts::SQRT_2 * p * (am as f64 * phi).cos(),
            };
            out.push(value);
        }
    }
    out
}

/// Evaluate a spherical function given by its coefficients.
pub fn spharm_eval(coeffs: &[f64], dir: &Vector3<f64>) -> f64 {
    let Some(order) = spharm_order(coeffs.len()) else {
        return f64::NAN;
    };
    spharm_basis(order, dir)
        .iter()
        .zip(coeffs)
        .map(|(b, c)| b * c)
        .sum()
}

/// Least-squares projection of sampled values onto the basis of `order`.
pub fn spharm_fit(order: usize, dirs: &[Vector3<f64>], values: &[f64]) -> Option<Vec<f64>> {
    let cols = spharm_size(order);
    if dirs.len() != values.len() || dirs.len() < cols {
        return None;
    }
    let mut x = DMatrix::<f64>::zeros(dirs.len(), cols);
    for (r, dir) in dirs.iter().enumerate() {
        for (c, b) in spharm_basis(order, dir).into_iter().enumerate() {
            x[(r, c)] = b;
        }
    }
    let y = DVector::from_column_slice(values);
    solve_least_squares(&x, &y).map(|beta| beta.iter().copied().collect())
}

/// Quasi-uniform directions on the upper hemisphere (`z ≥ 0`).
pub fn fibonacci_hemisphere(n: usize) -> Vec<Vector3<f64>> {
    let golden = PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let z = (i as f64 + 0.5) / n as f64;
            let r = (1.0 - z * z).max(0.0).sqrt();
            let phi = golden * i as f64;
            Vector3::new(r * phi.cos(), r * phi.sin(), z)
        })
        .collect()
}

fn norm_factor(l: usize, m: usize) -> f64 {
    // (l-m)!/(l+m)! as a running product to stay in range.
    let mut ratio = 1.0;
    for v in (l - m + 1)..=(l + m) {
        ratio /= v as f64;
    }
    ((2 * l + 1) as f64 / (4.0 * PI) * ratio).sqrt()
}

/// `P_l^m(x)` for all `0 ≤ m ≤ l ≤ order`, indexed `[l][m]`.
fn associated_legendre(order: usize, x: f64) -> Vec<Vec<f64>> {
    let mut p = vec![vec![0.0; order + 1]; order + 1];
    let s = (1.0 - x * x).max(0.0).sqrt();

    let mut pmm = 1.0;
    for m in 0..=order {
        if m > 0 {
            pmm *= -((2 * m - 1) as f64) * s;
        }
        p[m][m] = pmm;
        if m < order {
            p[m + 1][m] = x * (2 * m + 1) as f64 * pmm;
        }
        for l in (m + 2)..=order {
            p[l][m] = ((2 * l - 1) as f64 * x * p[l - 1][m] - (l + m - 1) as f64 * p[l - 2][m])
                / (l - m) as f64;
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_orders_agree() {
        assert_eq!(spharm_size(0), 1);
        assert_eq!(spharm_size(2), 6);
        assert_eq!(spharm_size(4), 15);
        assert_eq!(spharm_size(8), 45);
        assert_eq!(spharm_order(45), Some(8));
        assert_eq!(spharm_order(10), None);
    }

    #[test]
    fn constant_term_matches_normalization() {
        let b = spharm_basis(0, &Vector3::new(0.3, -0.2, 0.9));
        assert!((b[0] - 0.5 / PI.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn basis_is_antipodally_symmetric() {
        let d = Vector3::new(0.2, -0.5, 0.7);
        let a = spharm_basis(6, &d);
        let b = spharm_basis(6, &(-d));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn fit_recovers_a_degree_four_polynomial() {
        let axis = Vector3::new(1.0, 1.0, 0.0).normalize();
        let dirs = fibonacci_hemisphere(200);
        let values: Vec<f64> = dirs.iter().map(|d| d.dot(&axis).powi(4)).collect();
        let coeffs = spharm_fit(4, &dirs, &values).unwrap();
        for d in dirs.iter().step_by(17) {
            assert!((spharm_eval(&coeffs, d) - d.dot(&axis).powi(4)).abs() < 1e-8);
        }
    }

    #[test]
    fn hemisphere_points_are_unit_and_upper() {
        for d in fibonacci_hemisphere(50) {
            assert!((d.norm() - 1.0).abs() < 1e-12);
            assert!(d.z >= 0.0);
        }
    }
}
