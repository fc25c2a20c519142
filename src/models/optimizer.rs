//! Derivative-free minimiser for the likelihood fits
//!
//! Nelder–Mead simplex with standard coefficients (reflection 1, expansion 2,
//! contraction 0.5, shrink 0.5). Infeasible points are expressed by the
//! objective returning a large finite penalty. Every run is bounded by
//! `max_evaluations`, so a fit can never spin indefinitely.

use std::cell::Cell;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Value returned by objectives for infeasible parameter vectors
pub const PENALTY: f64 = 1e30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Hard cap on objective evaluations
    pub max_evaluations: usize,
    /// Relative tolerance on the spread of objective values across the simplex
    pub f_tol: f64,
    /// Relative tolerance on the spread of simplex vertices
    pub x_tol: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            max_evaluations: 2000,
            f_tol: 1e-10,
            x_tol: 1e-8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// Minimise `f` starting from `x0`
pub fn minimize<F>(f: F, x0: &[f64], config: &OptimizerConfig) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let evaluations = Cell::new(0usize);
    let eval = |x: &[f64]| {
        evaluations.set(evaluations.get() + 1);
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            PENALTY
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut v = x0.to_vec();
        v[i] = if v[i] != 0.0 { v[i] * 1.05 } else { 0.00025 };
        simplex.push(v);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();
    let mut converged = false;

    while evaluations.get() < config.max_evaluations {
        // order vertices best to worst
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by_key(|&i| OrderedFloat(values[i]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let f_spread = values[n] - values[0];
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| {
                v.iter()
                    .zip(simplex[0].iter())
                    .map(|(a, b)| (a - b).abs() / (b.abs() + 1e-12))
            })
            .fold(0.0_f64, f64::max);
        // both the values and the vertices must have collapsed
        if f_spread <= config.f_tol * (values[0].abs() + config.f_tol) && x_spread <= config.x_tol {
            converged = values[0] < PENALTY;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let worst = simplex[n].clone();
        let toward = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(worst.iter())
                .map(|(c, w)| c + coef * (c - w))
                .collect()
        };

        let reflected = toward(1.0);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = toward(2.0);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[n] {
            let c = toward(0.5);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = toward(-0.5);
            let fc = eval(&c);
            (c, fc)
        };

        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        // shrink toward the best vertex
        let best = simplex[0].clone();
        for i in 1..=n {
            let shrunk: Vec<f64> = best
                .iter()
                .zip(simplex[i].iter())
                .map(|(b, v)| b + 0.5 * (v - b))
                .collect();
            values[i] = eval(&shrunk);
            simplex[i] = shrunk;
        }
    }

    let best = (0..=n)
        .min_by_key(|&i| OrderedFloat(values[i]))
        .unwrap_or(0);
    Minimum {
        x: simplex[best].clone(),
        value: values[best],
        evaluations: evaluations.get(),
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_quadratic_minimum() {
        let f = |x: &[f64]| (x[0] - 1.5).powi(2) + 4.0 * (x[1] + 0.5).powi(2);
        let m = minimize(f, &[0.0, 0.0], &OptimizerConfig::default());
        assert!(m.converged);
        assert_abs_diff_eq!(m.x[0], 1.5, epsilon = 1e-3);
        assert_abs_diff_eq!(m.x[1], -0.5, epsilon = 1e-3);
    }

    #[test]
    fn rosenbrock_within_budget() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let config = OptimizerConfig {
            max_evaluations: 5000,
            ..Default::default()
        };
        let m = minimize(f, &[-1.2, 1.0], &config);
        assert!(m.evaluations <= 5000 + 3);
        assert_abs_diff_eq!(m.x[0], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn respects_evaluation_cap() {
        let f = |x: &[f64]| x.iter().map(|v| v.abs()).sum::<f64>();
        let config = OptimizerConfig {
            max_evaluations: 20,
            f_tol: 0.0,
            x_tol: 0.0,
        };
        let m = minimize(f, &[10.0, -7.0, 3.0], &config);
        // one iteration may overshoot the cap by the shrink step at most
        assert!(m.evaluations <= 20 + 4);
        assert!(!m.converged);
    }

    #[test]
    fn penalised_start_neighbourhood_still_moves() {
        let f = |x: &[f64]| if x[0] < 0.0 { PENALTY } else { (x[0] - 2.0).powi(2) };
        let m = minimize(f, &[1.0], &OptimizerConfig::default());
        assert!(m.converged);
        assert_abs_diff_eq!(m.x[0], 2.0, epsilon = 1e-3);
    }

    #[test]
    fn equal_values_straddling_minimum_keep_searching() {
        // the starting simplex {0, 0.00025} sits symmetrically around the minimum
        let centre = 0.000125;
        let f = |x: &[f64]| (x[0] - centre).powi(2);
        assert_eq!(f(&[0.0]), f(&[0.00025]));

        let m = minimize(f, &[0.0], &OptimizerConfig::default());
        assert!(m.converged);
        assert_abs_diff_eq!(m.x[0], centre, epsilon = 1e-6);
    }

    #[test]
    fn penalty_plateau_is_not_converged() {
        let f = |_: &[f64]| PENALTY;
        let m = minimize(f, &[0.5, 0.2], &OptimizerConfig::default());
        assert!(!m.converged);
        assert_eq!(m.value, PENALTY);
        assert!(m.evaluations > 3);
        assert!(m.evaluations <= OptimizerConfig::default().max_evaluations + 2);
    }
}
