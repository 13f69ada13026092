//! Equilibrium concentration solver: given per-complex free energies and
//! total strand concentrations, find the complex concentrations that
//! satisfy mass-action equilibrium and mass conservation.
//!
//! Works in log-concentration space (`x_c = ln [complex c]`) so that
//! concentrations stay positive by construction. The per-complex
//! equilibrium condition is linear in `x`:
//! `x_c = ln(K_c) + sum_s (count of strand s in c) * x_s`
//! for complexes `c` built from monomer strands `s`; conservation is the
//! nonlinear residual driven to zero by one of three root-finding
//! strategies, chosen via [`Method`]:
//!
//! - [`Method::Cd`] (default): coordinate-descent-flavored Newton, using
//!   only the diagonal of the conservation Jacobian as a cheap
//!   per-iteration approximation.
//! - [`Method::Fit`]: full dense Newton on the log-space residual, solving
//!   the exact Jacobian system each iteration.
//! - [`Method::Dogleg`]: trust-region dogleg combining the steepest-descent
//!   (Cauchy) and full-Newton directions, with the trust-region radius
//!   adapted each iteration by the ratio `rho` of actual to predicted
//!   residual-norm reduction: expanded when `rho > 0.75`, shrunk when
//!   `rho < 0.25`.
//!
//! All three converge to the same fixed point for a well-posed system; the
//! tests check cross-method agreement rather than hand-deriving closed-form
//! answers.

use crate::error::{Error, Result};

/// One row of the complex-composition table: how many copies of each
/// monomer strand this complex contains, and its equilibrium constant
/// (`exp(-G / RT)`, already normalized against the unfolded reference
/// state).
#[derive(Debug, Clone)]
pub struct ComplexSpec {
    /// Strand counts, indexed by monomer strand id.
    pub counts: Vec<u32>,
    /// Equilibrium constant for forming this complex from its monomers.
    pub equilibrium_constant: f64,
}

/// Which numerical strategy [`solve`] uses to drive the conservation
/// residual to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Coordinate-descent-flavored diagonal Newton (cheapest, the default).
    Cd,
    /// Full dense Newton on the log-space residual.
    Fit,
    /// Trust-region dogleg with an adaptive radius.
    Dogleg,
}

impl Default for Method {
    fn default() -> Self {
        Self::Cd
    }
}

/// Solve for equilibrium complex concentrations given total strand
/// concentrations and a list of candidate complexes (including the
/// monomers themselves, each with a single count of 1 and constant 1.0).
///
/// Returns the log-concentration of every complex in `complexes`, in the
/// same order.
pub fn solve(
    total_strand_concentration: &[f64],
    complexes: &[ComplexSpec],
    max_iters: usize,
    tolerance: f64,
    method: Method,
) -> Result<Vec<f64>> {
    let n_strands = total_strand_concentration.len();
    if complexes.iter().any(|c| c.counts.len() != n_strands) {
        return Err(Error::InvalidInput(
            "complex strand-count vector length mismatch".into(),
        ));
    }

    match method {
        Method::Cd => solve_cd(total_strand_concentration, complexes, max_iters, tolerance),
        Method::Fit => solve_fit(total_strand_concentration, complexes, max_iters, tolerance),
        Method::Dogleg => solve_dogleg(total_strand_concentration, complexes, max_iters, tolerance),
    }
}

fn initial_log_strand(total_strand_concentration: &[f64]) -> Vec<f64> {
    total_strand_concentration.iter().map(|c| c.max(1e-300).ln()).collect()
}

fn converged(
    log_strand: &[f64],
    complexes: &[ComplexSpec],
    total_strand_concentration: &[f64],
    tolerance: f64,
) -> (Vec<f64>, Vec<f64>, f64, bool) {
    let log_complex = complex_log_concentrations(log_strand, complexes);
    let residual = conservation_residual(total_strand_concentration, &log_complex, complexes);
    let norm = residual.iter().map(|r| r * r).sum::<f64>().sqrt();
    (log_complex, residual, norm, norm < tolerance)
}

/// Coordinate-descent-flavored Newton: approximates the Jacobian's diagonal
/// (dominant term for dilute, weakly-coupled systems) rather than a full
/// dense solve, matching the reference's preference for a cheap
/// per-iteration cost with a uniform trust-region fallback absorbing the
/// error from dropping the off-diagonal terms.
fn solve_cd(
    total_strand_concentration: &[f64],
    complexes: &[ComplexSpec],
    max_iters: usize,
    tolerance: f64,
) -> Result<Vec<f64>> {
    let n_strands = total_strand_concentration.len();
    let mut log_strand = initial_log_strand(total_strand_concentration);

    for iter in 0..max_iters {
        let (log_complex, residual, norm, done) =
            converged(&log_strand, complexes, total_strand_concentration, tolerance);
        if done {
            return Ok(log_complex);
        }

        let diag = diagonal_jacobian(&log_strand, complexes, n_strands);
        let step: Vec<f64> = residual
            .iter()
            .zip(diag.iter())
            .map(|(&r, &d)| if d.abs() < 1e-300 { 0.0 } else { -r / d })
            .collect();
        let step = clamp_to_radius(&step, 1.0);
        for (x, d) in log_strand.iter_mut().zip(step.iter()) {
            *x += d;
        }
        log::trace!("cd solve iteration {iter}: residual norm {norm:e}");
        if iter + 1 == max_iters {
            log::warn!("cd solve did not converge within {max_iters} iterations, residual {norm:e}");
            return Err(Error::EquilibriumSolve {
                iterations: max_iters,
                reason: format!("residual norm {norm:e} did not reach tolerance {tolerance:e}"),
            });
        }
    }
    Err(Error::EquilibriumSolve {
        iterations: max_iters,
        reason: "solver made no progress".into(),
    })
}

/// Full dense Newton: solves the exact linearized conservation system each
/// iteration (an LSE-style Newton step on the log-space residual), rather
/// than the diagonal approximation [`solve_cd`] uses.
fn solve_fit(
    total_strand_concentration: &[f64],
    complexes: &[ComplexSpec],
    max_iters: usize,
    tolerance: f64,
) -> Result<Vec<f64>> {
    let n_strands = total_strand_concentration.len();
    let mut log_strand = initial_log_strand(total_strand_concentration);

    for iter in 0..max_iters {
        let (log_complex, residual, norm, done) =
            converged(&log_strand, complexes, total_strand_concentration, tolerance);
        if done {
            return Ok(log_complex);
        }

        let jacobian = full_jacobian(&log_strand, complexes, n_strands);
        let neg_residual: Vec<f64> = residual.iter().map(|r| -r).collect();
        let step = solve_linear(jacobian, neg_residual).unwrap_or_else(|| {
            let diag = diagonal_jacobian(&log_strand, complexes, n_strands);
            residual
                .iter()
                .zip(diag.iter())
                .map(|(&r, &d)| if d.abs() < 1e-300 { 0.0 } else { -r / d })
                .collect()
        });
        let step = clamp_to_radius(&step, 2.0);
        for (x, d) in log_strand.iter_mut().zip(step.iter()) {
            *x += d;
        }
        log::trace!("fit solve iteration {iter}: residual norm {norm:e}");
        if iter + 1 == max_iters {
            log::warn!("fit solve did not converge within {max_iters} iterations, residual {norm:e}");
            return Err(Error::EquilibriumSolve {
                iterations: max_iters,
                reason: format!("residual norm {norm:e} did not reach tolerance {tolerance:e}"),
            });
        }
    }
    Err(Error::EquilibriumSolve {
        iterations: max_iters,
        reason: "solver made no progress".into(),
    })
}

/// Trust-region dogleg: combines the steepest-descent (Cauchy) direction
/// with the full Newton direction, taking whichever point on the path
/// between them lands on the trust-region boundary when the full Newton
/// step would overshoot it. The radius expands when the step's actual
/// residual-norm reduction tracks its quadratic model well (`rho > 0.75`)
/// and shrinks when it doesn't (`rho < 0.25`).
fn solve_dogleg(
    total_strand_concentration: &[f64],
    complexes: &[ComplexSpec],
    max_iters: usize,
    tolerance: f64,
) -> Result<Vec<f64>> {
    let n_strands = total_strand_concentration.len();
    let mut log_strand = initial_log_strand(total_strand_concentration);
    let mut radius = 1.0_f64;
    const RADIUS_MIN: f64 = 1e-4;
    const RADIUS_MAX: f64 = 1e3;

    for iter in 0..max_iters {
        let (log_complex, residual, norm, done) =
            converged(&log_strand, complexes, total_strand_concentration, tolerance);
        if done {
            return Ok(log_complex);
        }

        let jacobian = full_jacobian(&log_strand, complexes, n_strands);
        let gradient = jt_times(&jacobian, &residual);
        let newton = solve_linear(jacobian.clone(), residual.iter().map(|r| -r).collect());

        let step = dogleg_step(&gradient, newton.as_deref(), &jacobian, radius);

        let mut trial = log_strand.clone();
        for (x, d) in trial.iter_mut().zip(step.iter()) {
            *x += d;
        }
        let (_, trial_residual, trial_norm, _) =
            converged(&trial, complexes, total_strand_concentration, tolerance);

        let predicted_reduction = predicted_model_reduction(&residual, &jacobian, &step);
        let actual_reduction = 0.5 * (norm * norm - trial_norm * trial_norm);
        let rho = if predicted_reduction.abs() < 1e-300 {
            0.0
        } else {
            actual_reduction / predicted_reduction
        };

        if rho > 0.0 {
            log_strand = trial;
        }
        if rho > 0.75 {
            radius = (radius * 2.0).min(RADIUS_MAX);
        } else if rho < 0.25 {
            radius = (radius * 0.5).max(RADIUS_MIN);
        }

        log::trace!("dogleg solve iteration {iter}: residual norm {norm:e}, rho {rho:.3}, radius {radius:e}");
        let _ = trial_residual;
        if iter + 1 == max_iters {
            log::warn!("dogleg solve did not converge within {max_iters} iterations, residual {norm:e}");
            return Err(Error::EquilibriumSolve {
                iterations: max_iters,
                reason: format!("residual norm {norm:e} did not reach tolerance {tolerance:e}"),
            });
        }
    }
    Err(Error::EquilibriumSolve {
        iterations: max_iters,
        reason: "solver made no progress".into(),
    })
}

fn complex_log_concentrations(log_strand: &[f64], complexes: &[ComplexSpec]) -> Vec<f64> {
    complexes
        .iter()
        .map(|c| {
            c.equilibrium_constant.ln()
                + c.counts
                    .iter()
                    .zip(log_strand.iter())
                    .map(|(&n, &x)| f64::from(n) * x)
                    .sum::<f64>()
        })
        .collect()
}

fn conservation_residual(
    total_strand_concentration: &[f64],
    log_complex: &[f64],
    complexes: &[ComplexSpec],
) -> Vec<f64> {
    let n_strands = total_strand_concentration.len();
    let mut total_by_strand = vec![0.0; n_strands];
    for (spec, &lc) in complexes.iter().zip(log_complex.iter()) {
        let conc = lc.exp();
        for (s, &count) in spec.counts.iter().enumerate() {
            total_by_strand[s] += f64::from(count) * conc;
        }
    }
    total_by_strand
        .iter()
        .zip(total_strand_concentration.iter())
        .map(|(&have, &want)| have - want)
        .collect()
}

fn complex_concentrations(log_strand: &[f64], complexes: &[ComplexSpec]) -> Vec<f64> {
    complex_log_concentrations(log_strand, complexes)
        .into_iter()
        .map(f64::exp)
        .collect()
}

/// Diagonal of the conservation Jacobian: `d residual_s / d x_s`.
fn diagonal_jacobian(log_strand: &[f64], complexes: &[ComplexSpec], n_strands: usize) -> Vec<f64> {
    let concs = complex_concentrations(log_strand, complexes);
    let mut diag = vec![0.0; n_strands];
    for (spec, &conc) in complexes.iter().zip(concs.iter()) {
        for (s, &count) in spec.counts.iter().enumerate() {
            diag[s] += f64::from(count) * f64::from(count) * conc;
        }
    }
    diag
}

/// Full conservation Jacobian: `J[s][t] = d residual_s / d x_t = sum_c
/// count_c,s * count_c,t * conc_c`.
fn full_jacobian(log_strand: &[f64], complexes: &[ComplexSpec], n_strands: usize) -> Vec<Vec<f64>> {
    let concs = complex_concentrations(log_strand, complexes);
    let mut j = vec![vec![0.0; n_strands]; n_strands];
    for (spec, &conc) in complexes.iter().zip(concs.iter()) {
        for s in 0..n_strands {
            if spec.counts[s] == 0 {
                continue;
            }
            for t in 0..n_strands {
                if spec.counts[t] == 0 {
                    continue;
                }
                j[s][t] += f64::from(spec.counts[s]) * f64::from(spec.counts[t]) * conc;
            }
        }
    }
    j
}

fn jt_times(jacobian: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    let n = jacobian.len();
    let mut out = vec![0.0; n];
    for (s, row) in jacobian.iter().enumerate() {
        for t in 0..n {
            out[t] += row[t] * v[s];
        }
    }
    out
}

fn mat_vec(jacobian: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    jacobian.iter().map(|row| row.iter().zip(v.iter()).map(|(a, b)| a * b).sum()).collect()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Gaussian elimination with partial pivoting. Returns `None` if the
/// system is (numerically) singular.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 {
        return Some(Vec::new());
    }
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| a[r1][col].abs().partial_cmp(&a[r2][col].abs()).unwrap())?;
        if a[pivot_row][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let sum: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - sum) / a[row][row];
    }
    Some(x)
}

/// Clamp a proposed step to a trust-region radius, rescaling uniformly
/// (dogleg-style) rather than per-component so direction is preserved.
fn clamp_to_radius(step: &[f64], radius: f64) -> Vec<f64> {
    let n = norm(step);
    if n <= radius || n == 0.0 {
        step.to_vec()
    } else {
        let scale = radius / n;
        step.iter().map(|d| d * scale).collect()
    }
}

/// Classic dogleg path: full Newton step if it fits in the trust region,
/// else the Cauchy point scaled to the boundary if even the Cauchy point
/// overshoots, else the point where the segment from the Cauchy point to
/// the Newton point crosses the trust-region boundary.
fn dogleg_step(gradient: &[f64], newton: Option<&[f64]>, jacobian: &[Vec<f64>], radius: f64) -> Vec<f64> {
    let Some(newton) = newton else {
        return cauchy_point(gradient, jacobian, radius);
    };
    if norm(newton) <= radius {
        return newton.to_vec();
    }

    let cauchy = cauchy_point(gradient, jacobian, f64::INFINITY);
    let cauchy_norm = norm(&cauchy);
    if cauchy_norm >= radius {
        return clamp_to_radius(&cauchy, radius);
    }

    // Solve ||cauchy + tau * (newton - cauchy)|| = radius for tau in [0, 1].
    let diff: Vec<f64> = newton.iter().zip(cauchy.iter()).map(|(n, c)| n - c).collect();
    let a = diff.iter().map(|d| d * d).sum::<f64>();
    let b = 2.0 * cauchy.iter().zip(diff.iter()).map(|(c, d)| c * d).sum::<f64>();
    let c = cauchy_norm * cauchy_norm - radius * radius;
    let tau = if a.abs() < 1e-300 {
        1.0
    } else {
        let disc = (b * b - 4.0 * a * c).max(0.0).sqrt();
        ((-b + disc) / (2.0 * a)).clamp(0.0, 1.0)
    };
    cauchy.iter().zip(diff.iter()).map(|(c, d)| c + tau * d).collect()
}

/// Unconstrained steepest-descent minimizer of the quadratic model along
/// `-gradient`, clamped to `radius`.
fn cauchy_point(gradient: &[f64], jacobian: &[Vec<f64>], radius: f64) -> Vec<f64> {
    let g_norm_sq = gradient.iter().map(|g| g * g).sum::<f64>();
    if g_norm_sq < 1e-300 {
        return vec![0.0; gradient.len()];
    }
    let jg = mat_vec(jacobian, gradient);
    let denom = jg.iter().map(|v| v * v).sum::<f64>();
    let scale = if denom.abs() < 1e-300 { 1.0 } else { g_norm_sq / denom };
    let step: Vec<f64> = gradient.iter().map(|g| -scale * g).collect();
    clamp_to_radius(&step, radius)
}

fn predicted_model_reduction(residual: &[f64], jacobian: &[Vec<f64>], step: &[f64]) -> f64 {
    let jstep = mat_vec(jacobian, step);
    let linear: f64 = residual.iter().zip(jstep.iter()).map(|(r, j)| r * j).sum();
    let quadratic: f64 = jstep.iter().map(|j| j * j).sum();
    -(linear + 0.5 * quadratic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monomer_only_system_reproduces_input_concentration() {
        let complexes = vec![ComplexSpec {
            counts: vec![1],
            equilibrium_constant: 1.0,
        }];
        let out = solve(&[1e-6], &complexes, 200, 1e-12, Method::Cd).unwrap();
        assert!((out[0].exp() - 1e-6).abs() / 1e-6 < 1e-6);
    }

    #[test]
    fn rejects_mismatched_strand_count_vectors() {
        let complexes = vec![ComplexSpec {
            counts: vec![1, 0],
            equilibrium_constant: 1.0,
        }];
        let err = solve(&[1e-6], &complexes, 10, 1e-9, Method::Cd).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    fn duplex_system() -> ([f64; 2], Vec<ComplexSpec>) {
        (
            [1e-6, 1e-6],
            vec![
                ComplexSpec { counts: vec![1, 0], equilibrium_constant: 1.0 },
                ComplexSpec { counts: vec![0, 1], equilibrium_constant: 1.0 },
                ComplexSpec { counts: vec![1, 1], equilibrium_constant: 1e10 },
            ],
        )
    }

    #[test]
    fn dimerization_favors_duplex_when_constant_is_large() {
        let (total, complexes) = duplex_system();
        let out = solve(&total, &complexes, 500, 1e-12, Method::Cd).unwrap();
        let duplex = out[2].exp();
        let monomer_a = out[0].exp();
        assert!(duplex > monomer_a);
    }

    #[test]
    fn e6_two_strand_tube_conserves_mass_at_equilibrium_across_methods() {
        let (total, complexes) = duplex_system();
        for method in [Method::Cd, Method::Fit, Method::Dogleg] {
            let log_conc = solve(&total, &complexes, 1000, 1e-10, method).unwrap();
            let conc_a = log_conc[0].exp();
            let conc_ab = log_conc[2].exp();
            assert!(
                (conc_a + conc_ab - total[0]).abs() / total[0] < 1e-4,
                "mass not conserved under {method:?}"
            );
        }
    }

    #[test]
    fn all_three_methods_agree_on_equilibrium_concentrations() {
        let (total, complexes) = duplex_system();
        let cd = solve(&total, &complexes, 1000, 1e-12, Method::Cd).unwrap();
        let fit = solve(&total, &complexes, 1000, 1e-12, Method::Fit).unwrap();
        let dogleg = solve(&total, &complexes, 1000, 1e-12, Method::Dogleg).unwrap();
        for i in 0..cd.len() {
            assert!((cd[i] - fit[i]).abs() < 1e-4, "cd vs fit disagree at {i}");
            assert!((cd[i] - dogleg[i]).abs() < 1e-4, "cd vs dogleg disagree at {i}");
        }
    }
}
