//! Exponential GARCH
//!
//! ln σ²_t = ω + Σ α_i (|z_{t−i}| − √(2/π)) + Σ γ_j z_{t−j} + Σ β_k ln σ²_{t−k}

use serde::{Deserialize, Serialize};

use super::{ModelFamily, VarianceProcess};
use crate::error::{PipelineError, Result};

const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4; // sqrt(2/π)

/// Log-variance is clamped to keep `exp` finite
const LN_SIGMA2_MAX: f64 = 700.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgarchOrder {
    pub p: usize,
    pub o: usize,
    pub q: usize,
}

impl Default for EgarchOrder {
    fn default() -> Self {
        EgarchOrder { p: 1, o: 1, q: 1 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EgarchProcess {
    order: EgarchOrder,
}

impl EgarchProcess {
    pub fn new(order: EgarchOrder) -> Result<Self> {
        if order.p == 0 && order.o == 0 {
            return Err(PipelineError::model_fit(
                ModelFamily::Egarch,
                "at least one magnitude or sign lag is required",
            ));
        }
        Ok(EgarchProcess { order })
    }

    fn split<'a>(&self, params: &'a [f64]) -> (f64, &'a [f64], &'a [f64], &'a [f64]) {
        let (alpha, rest) = params[1..].split_at(self.order.p);
        let (gamma, beta) = rest.split_at(self.order.o);
        (params[0], alpha, gamma, beta)
    }
}

impl VarianceProcess for EgarchProcess {
    fn family(&self) -> ModelFamily {
        ModelFamily::Egarch
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = vec!["omega".to_string()];
        names.extend((1..=self.order.p).map(|i| format!("alpha[{i}]")));
        names.extend((1..=self.order.o).map(|i| format!("gamma[{i}]")));
        names.extend((1..=self.order.q).map(|i| format!("beta[{i}]")));
        names
    }

    fn starting_values(&self, sample_variance: f64) -> Vec<f64> {
        let EgarchOrder { p, o, q } = self.order;
        let beta_total = if q > 0 { 0.95 } else { 0.0 };
        let mut x = vec![sample_variance.ln() * (1.0 - beta_total)];
        x.extend(std::iter::repeat(0.1 / p.max(1) as f64).take(p));
        x.extend(std::iter::repeat(-0.05 / o.max(1) as f64).take(o));
        x.extend(std::iter::repeat(beta_total / q.max(1) as f64).take(q));
        x
    }

    fn is_feasible(&self, params: &[f64]) -> bool {
        let EgarchOrder { p, o, q } = self.order;
        if params.len() != 1 + p + o + q || params.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let (_, _, _, beta) = self.split(params);
        beta.iter().sum::<f64>().abs() < 1.0
    }

    /// Backcast in log-variance units
    fn backcast(&self, resids: &[f64]) -> f64 {
        super::backcast(resids).max(f64::MIN_POSITIVE).ln()
    }

    fn variance(&self, params: &[f64], resids: &[f64], backcast: f64, sigma2: &mut [f64]) {
        let (omega, alpha, gamma, beta) = self.split(params);
        let n = sigma2.len();
        let mut ln_sigma2 = vec![0.0_f64; n];
        let mut std_resids = vec![0.0_f64; resids.len()];

        for t in 0..n {
            let mut ln = omega;
            for (i, a) in alpha.iter().enumerate() {
                if t > i {
                    ln += a * (std_resids[t - 1 - i].abs() - SQRT_2_OVER_PI);
                }
            }
            for (i, g) in gamma.iter().enumerate() {
                if t > i {
                    ln += g * std_resids[t - 1 - i];
                }
            }
            for (i, b) in beta.iter().enumerate() {
                ln += b * if t > i { ln_sigma2[t - 1 - i] } else { backcast };
            }
            let ln = ln.clamp(-LN_SIGMA2_MAX, LN_SIGMA2_MAX);
            ln_sigma2[t] = ln;
            sigma2[t] = ln.exp();
            if t < resids.len() {
                std_resids[t] = resids[t] / sigma2[t].sqrt();
            }
        }
    }

    /// Σβ, the decay rate of log-variance shocks
    fn persistence(&self, params: &[f64]) -> Option<f64> {
        let (_, _, _, beta) = self.split(params);
        Some(beta.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_step_uses_log_backcast() {
        let process = EgarchProcess::new(EgarchOrder::default()).unwrap();
        let params = [-0.5, 0.1, -0.05, 0.95];
        let backcast = (1e-4_f64).ln();
        let mut sigma2 = [0.0; 2];
        process.variance(&params, &[0.01], backcast, &mut sigma2);

        assert_relative_eq!(sigma2[0].ln(), -0.5 + 0.95 * backcast, epsilon = 1e-12);
        let z = 0.01 / sigma2[0].sqrt();
        let expected =
            -0.5 + 0.1 * (z.abs() - SQRT_2_OVER_PI) - 0.05 * z + 0.95 * sigma2[0].ln();
        assert_relative_eq!(sigma2[1].ln(), expected, epsilon = 1e-12);
    }

    #[test]
    fn negative_gamma_raises_variance_after_losses() {
        let process = EgarchProcess::new(EgarchOrder::default()).unwrap();
        let params = [-0.5, 0.1, -0.1, 0.95];
        let backcast = (1e-4_f64).ln();
        let mut up = [0.0; 2];
        let mut down = [0.0; 2];
        process.variance(&params, &[0.02], backcast, &mut up);
        process.variance(&params, &[-0.02], backcast, &mut down);
        assert!(down[1] > up[1]);
    }

    #[test]
    fn persistence_is_beta_sum() {
        let process = EgarchProcess::new(EgarchOrder::default()).unwrap();
        assert_relative_eq!(process.persistence(&[-0.5, 0.1, -0.05, 0.97]).unwrap(), 0.97);
        assert!(!process.is_feasible(&[-0.5, 0.1, -0.05, 1.0]));
    }

    #[test]
    fn extreme_parameters_stay_finite() {
        let process = EgarchProcess::new(EgarchOrder::default()).unwrap();
        let mut sigma2 = [0.0; 50];
        let resids = [0.5; 50];
        process.variance(&[50.0, 5.0, 0.0, 0.99], &resids, 0.0, &mut sigma2);
        assert!(sigma2.iter().all(|v| v.is_finite()));
    }
}
