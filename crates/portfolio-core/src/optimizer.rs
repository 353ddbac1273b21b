//! Constrained Category Optimizer
//!
//! Maximizes the Sharpe ratio of one category's sub-portfolio subject to
//! per-asset bounds and full investment (weights sum to one).
//!
//! ```text
//! Prepare ──▶ Optimize ──┬──▶ Accept     (solver converged)
//!                        └──▶ Fallback   (no convergence, infeasible or degenerate)
//! ```
//!
//! The solver is projected-gradient ascent with backtracking. Every iterate is
//! projected exactly onto `{ Σw = 1, lo ≤ w ≤ hi }`, so the constraints hold
//! at every step, not just at the end.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::error::AllocationError;
use crate::model::AssetCategory;
use crate::risk::WeightBounds;

const FEASIBILITY_EPS: f64 = 1e-9;
const MIN_STEP: f64 = 1e-14;
const PROJECTION_ROUNDS: usize = 100;
/// Annualized variance at or below this counts as riskless
const MIN_VARIANCE: f64 = 1e-12;
/// Gradient steps are capped to this norm so iterates stay O(1)
const MAX_GRADIENT_NORM: f64 = 1.0;

/// Everything the solver needs for one category
#[derive(Clone, Debug)]
pub struct CategoryProblem {
    pub category: AssetCategory,
    pub asset_ids: Vec<String>,
    pub returns: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub bounds: Vec<WeightBounds>,
    /// Starting point; projected onto the bounds before use
    pub initial: DVector<f64>,
}

impl CategoryProblem {
    pub fn len(&self) -> usize {
        self.asset_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asset_ids.is_empty()
    }

    /// Whether some weight vector satisfies both the bounds and Σw = 1
    pub fn is_feasible(&self) -> bool {
        let lo: f64 = self.bounds.iter().map(|b| b.lower).sum();
        let hi: f64 = self.bounds.iter().map(|b| b.upper).sum();
        lo <= 1.0 + FEASIBILITY_EPS && hi >= 1.0 - FEASIBILITY_EPS
    }
}

/// Solver outcome for one category
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryOptimization {
    pub category: AssetCategory,
    pub asset_ids: Vec<String>,
    pub weights: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
    /// Sharpe ratio of the category sub-portfolio at the chosen weights
    pub sharpe: f64,
}

/// Stateless Sharpe maximizer
#[derive(Clone, Debug)]
pub struct SharpeOptimizer {
    risk_free_rate: f64,
    solver: SolverConfig,
}

impl SharpeOptimizer {
    pub fn new(risk_free_rate: f64, solver: SolverConfig) -> Self {
        Self {
            risk_free_rate,
            solver,
        }
    }

    /// Solve one category. Returns `None` for a category without assets.
    ///
    /// Never fails: anything that stops the solver routes to [`fallback_weights`].
    pub fn optimize(&self, problem: &CategoryProblem) -> Option<CategoryOptimization> {
        if problem.is_empty() {
            return None;
        }

        if problem.len() == 1 {
            let w = DVector::from_element(1, 1.0);
            return Some(self.outcome(problem, &w, true, 0));
        }

        let solved = self.solve(problem).and_then(|(w, iterations)| {
            if satisfies_constraints(&w, &problem.bounds) {
                Ok((w, iterations))
            } else {
                Err(("solution violates bounds or full investment".to_string(), iterations))
            }
        });

        match solved {
            Ok((w, iterations)) => {
                tracing::debug!(
                    "{} optimizer converged after {} iterations",
                    problem.category,
                    iterations
                );
                Some(self.outcome(problem, &w, true, iterations))
            }
            Err((reason, iterations)) => {
                tracing::warn!(
                    "{}; using minimum-weight fallback",
                    AllocationError::OptimizationNonConvergent {
                        category: problem.category,
                        reason,
                    }
                );
                let w = DVector::from_vec(fallback_weights(&problem.bounds));
                Some(self.outcome(problem, &w, false, iterations))
            }
        }
    }

    fn solve(&self, problem: &CategoryProblem) -> Result<(DVector<f64>, usize), (String, usize)> {
        if !problem.is_feasible() {
            return Err(("bounds admit no fully invested portfolio".into(), 0));
        }
        if problem.returns.iter().any(|v| !v.is_finite())
            || problem.covariance.iter().any(|v| !v.is_finite())
        {
            return Err(("non-finite return statistics".into(), 0));
        }

        let mut w = project_onto_bounds(&problem.initial, &problem.bounds);
        let mut sharpe = self
            .sharpe(problem, &w)
            .ok_or_else(|| ("zero portfolio volatility".to_string(), 0))?;
        let mut step = self.solver.step_size;

        for iteration in 1..=self.solver.max_iterations {
            let mut gradient = self
                .gradient(problem, &w)
                .ok_or_else(|| ("zero portfolio volatility".to_string(), iteration))?;
            let norm = gradient.norm();
            if !norm.is_finite() {
                return Err(("non-finite gradient".into(), iteration));
            }
            if norm > MAX_GRADIENT_NORM {
                gradient *= MAX_GRADIENT_NORM / norm;
            }

            // Backtrack until the projected step does not lower the Sharpe ratio
            let (candidate, candidate_sharpe) = loop {
                let trial = project_onto_bounds(&(&w + &gradient * step), &problem.bounds);
                match self.sharpe(problem, &trial) {
                    Some(s) if s >= sharpe => break (trial, s),
                    _ if step < MIN_STEP => break (w.clone(), sharpe),
                    _ => step *= 0.5,
                }
            };

            let moved = (&candidate - &w).norm();
            w = candidate;
            sharpe = candidate_sharpe;

            if moved < self.solver.tolerance {
                return Ok((w, iteration));
            }
            step = (step * 2.0).min(self.solver.step_size);
        }

        Err((
            format!("no convergence within {} iterations", self.solver.max_iterations),
            self.solver.max_iterations,
        ))
    }

    /// Sharpe ratio of weights `w`; `None` when volatility vanishes
    fn sharpe(&self, problem: &CategoryProblem, w: &DVector<f64>) -> Option<f64> {
        let variance = w.dot(&(&problem.covariance * w));
        if !(variance > MIN_VARIANCE) {
            return None;
        }
        Some((w.dot(&problem.returns) - self.risk_free_rate) / variance.sqrt())
    }

    /// ∇S = μ/σ − (w·μ − rf)·Σw/σ³
    fn gradient(&self, problem: &CategoryProblem, w: &DVector<f64>) -> Option<DVector<f64>> {
        let sigma_w = &problem.covariance * w;
        let variance = w.dot(&sigma_w);
        if !(variance > MIN_VARIANCE) {
            return None;
        }
        let vol = variance.sqrt();
        let excess = w.dot(&problem.returns) - self.risk_free_rate;
        Some(&problem.returns / vol - sigma_w * (excess / (variance * vol)))
    }

    fn outcome(
        &self,
        problem: &CategoryProblem,
        w: &DVector<f64>,
        converged: bool,
        iterations: usize,
    ) -> CategoryOptimization {
        CategoryOptimization {
            category: problem.category,
            asset_ids: problem.asset_ids.clone(),
            weights: w.iter().copied().collect(),
            converged,
            iterations,
            sharpe: self.sharpe(problem, w).unwrap_or(0.0),
        }
    }
}

/// Fully invested and inside every bound, up to rounding
fn satisfies_constraints(w: &DVector<f64>, bounds: &[WeightBounds]) -> bool {
    (w.sum() - 1.0).abs() < FEASIBILITY_EPS
        && w.iter().zip(bounds).all(|(wi, b)| b.contains(*wi, FEASIBILITY_EPS))
}

/// Euclidean projection onto `{ Σw = 1, lo ≤ w ≤ hi }`.
///
/// Finds the shift τ with Σ clamp(vᵢ − τ, loᵢ, hiᵢ) = 1 by bisection. The caller
/// guarantees the set is non-empty.
pub fn project_onto_bounds(v: &DVector<f64>, bounds: &[WeightBounds]) -> DVector<f64> {
    let shifted = |tau: f64| -> DVector<f64> {
        DVector::from_fn(v.len(), |i, _| (v[i] - tau).clamp(bounds[i].lower, bounds[i].upper))
    };

    let mut low = bounds
        .iter()
        .enumerate()
        .map(|(i, b)| v[i] - b.upper)
        .fold(f64::INFINITY, f64::min);
    let mut high = bounds
        .iter()
        .enumerate()
        .map(|(i, b)| v[i] - b.lower)
        .fold(f64::NEG_INFINITY, f64::max);

    for _ in 0..PROJECTION_ROUNDS {
        let mid = 0.5 * (low + high);
        if shifted(mid).sum() > 1.0 {
            low = mid;
        } else {
            high = mid;
        }
    }

    shifted(0.5 * (low + high))
}

/// Deterministic, always-feasible allocation proportional to the lower bounds.
///
/// Starts every asset at its lower bound and hands out the remaining mass in
/// proportion to the lower bounds, capping at upper bounds. With infeasible
/// bounds the lower bounds are simply normalized.
pub fn fallback_weights(bounds: &[WeightBounds]) -> Vec<f64> {
    let n = bounds.len();
    if n == 0 {
        return Vec::new();
    }

    let lower_sum: f64 = bounds.iter().map(|b| b.lower).sum();
    let upper_sum: f64 = bounds.iter().map(|b| b.upper).sum();
    let equal = 1.0 / n as f64;

    if lower_sum > 1.0 + FEASIBILITY_EPS || upper_sum < 1.0 - FEASIBILITY_EPS {
        if lower_sum <= 0.0 {
            return vec![equal; n];
        }
        return bounds.iter().map(|b| b.lower / lower_sum).collect();
    }

    let mut w: Vec<f64> = bounds.iter().map(|b| b.lower).collect();
    let mut open: Vec<usize> = (0..n).filter(|&i| bounds[i].upper > w[i]).collect();

    // Each pass caps at least one asset or places all remaining mass
    for _ in 0..n {
        let remaining = 1.0 - w.iter().sum::<f64>();
        if remaining <= FEASIBILITY_EPS || open.is_empty() {
            break;
        }

        let share_total: f64 = open.iter().map(|&i| bounds[i].lower).sum();
        let share = |i: usize| {
            if share_total > 0.0 {
                bounds[i].lower / share_total
            } else {
                1.0 / open.len() as f64
            }
        };

        let mut capped = Vec::new();
        for &i in &open {
            let target = w[i] + remaining * share(i);
            if target >= bounds[i].upper {
                w[i] = bounds[i].upper;
                capped.push(i);
            } else {
                w[i] = target;
            }
        }
        open.retain(|i| !capped.contains(i));
    }

    w
}
