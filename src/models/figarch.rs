//! Fractionally integrated GARCH
//!
//! The variance is the truncated ARCH(∞) form
//! σ²_t = ω / (1 − β) + Σ_{i<T} λ_i ε²_{t−1−i}, with lag weights λ generated by
//! the fractional difference operator (1 − L)^d and the optional φ and β
//! polynomials. Pre-sample squared residuals are replaced by the backcast.

use serde::{Deserialize, Serialize};

use super::{ModelFamily, VarianceProcess};
use crate::error::{PipelineError, Result};

/// FIGARCH(p, d, q) with `p, q ∈ {0, 1}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigarchOrder {
    pub p: usize,
    pub q: usize,
    /// Number of ARCH(∞) lags kept
    pub truncation: usize,
}

impl Default for FigarchOrder {
    fn default() -> Self {
        FigarchOrder {
            p: 1,
            q: 1,
            truncation: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FigarchProcess {
    order: FigarchOrder,
}

struct FigarchParams {
    omega: f64,
    phi: f64,
    d: f64,
    beta: f64,
}

impl FigarchProcess {
    pub fn new(order: FigarchOrder) -> Result<Self> {
        if order.p > 1 || order.q > 1 {
            return Err(PipelineError::model_fit(
                ModelFamily::Figarch,
                format!("orders p={} q={} unsupported, each must be 0 or 1", order.p, order.q),
            ));
        }
        if order.truncation == 0 {
            return Err(PipelineError::model_fit(
                ModelFamily::Figarch,
                "truncation lag must be positive",
            ));
        }
        Ok(FigarchProcess { order })
    }

    fn unpack(&self, params: &[f64]) -> FigarchParams {
        let mut it = params.iter().copied();
        let omega = it.next().unwrap_or(f64::NAN);
        let phi = if self.order.p == 1 { it.next().unwrap_or(f64::NAN) } else { 0.0 };
        let d = it.next().unwrap_or(f64::NAN);
        let beta = if self.order.q == 1 { it.next().unwrap_or(f64::NAN) } else { 0.0 };
        FigarchParams { omega, phi, d, beta }
    }

    fn n_params(&self) -> usize {
        2 + self.order.p + self.order.q
    }
}

/// ARCH(∞) lag weights λ_0..λ_{T−1}
pub fn figarch_weights(phi: f64, d: f64, beta: f64, truncation: usize) -> Vec<f64> {
    let mut lam = vec![0.0; truncation];
    if truncation == 0 {
        return lam;
    }
    let mut delta_prev = d;
    lam[0] = phi - beta + d;
    for i in 1..truncation {
        let delta = (i as f64 - d) / (i as f64 + 1.0) * delta_prev;
        lam[i] = beta * lam[i - 1] + delta - phi * delta_prev;
        delta_prev = delta;
    }
    lam
}

impl VarianceProcess for FigarchProcess {
    fn family(&self) -> ModelFamily {
        ModelFamily::Figarch
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = vec!["omega".to_string()];
        if self.order.p == 1 {
            names.push("phi".to_string());
        }
        names.push("d".to_string());
        if self.order.q == 1 {
            names.push("beta".to_string());
        }
        names
    }

    fn starting_values(&self, sample_variance: f64) -> Vec<f64> {
        let phi = if self.order.p == 1 { 0.1 } else { 0.0 };
        let d = 0.5;
        let beta = if self.order.q == 1 { 0.3 } else { 0.0 };
        let weight_sum: f64 = figarch_weights(phi, d, beta, self.order.truncation).iter().sum();
        let omega = sample_variance * (1.0 - weight_sum).max(0.01) * (1.0 - beta);

        let mut x = vec![omega];
        if self.order.p == 1 {
            x.push(phi);
        }
        x.push(d);
        if self.order.q == 1 {
            x.push(beta);
        }
        x
    }

    fn is_feasible(&self, params: &[f64]) -> bool {
        if params.len() != self.n_params() {
            return false;
        }
        let FigarchParams { omega, phi, d, beta } = self.unpack(params);
        omega > 0.0
            && (0.0..=1.0).contains(&d)
            && phi >= 0.0
            && phi <= (1.0 - d) / 2.0
            && beta >= 0.0
            && beta <= d + phi
            && beta < 1.0
    }

    fn variance(&self, params: &[f64], resids: &[f64], backcast: f64, sigma2: &mut [f64]) {
        let FigarchParams { omega, phi, d, beta } = self.unpack(params);
        let truncation = self.order.truncation;
        let lam = figarch_weights(phi, d, beta, truncation);

        // tail[k] = Σ_{i ≥ k} λ_i, the weight carried by pre-sample lags
        let mut tail = vec![0.0_f64; truncation + 1];
        for k in (0..truncation).rev() {
            tail[k] = tail[k + 1] + lam[k];
        }

        let omega_tilde = omega / (1.0 - beta);
        let squared: Vec<f64> = resids.iter().map(|e| e * e).collect();
        for t in 0..sigma2.len() {
            let observed = t.min(truncation);
            let mut s = omega_tilde + backcast * tail[observed];
            for (i, l) in lam[..observed].iter().enumerate() {
                s += l * squared[t - 1 - i];
            }
            sigma2[t] = s;
        }
    }

    fn persistence(&self, _params: &[f64]) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_follow_fractional_recursion() {
        let lam = figarch_weights(0.1, 0.4, 0.2, 3);
        let delta1 = (1.0 - 0.4) / 2.0 * 0.4;
        let delta2 = (2.0 - 0.4) / 3.0 * delta1;
        assert_relative_eq!(lam[0], 0.1 - 0.2 + 0.4);
        assert_relative_eq!(lam[1], 0.2 * lam[0] + delta1 - 0.1 * 0.4);
        assert_relative_eq!(lam[2], 0.2 * lam[1] + delta2 - 0.1 * delta1);
    }

    #[test]
    fn weights_are_non_negative_inside_constraints() {
        let lam = figarch_weights(0.2, 0.45, 0.5, 500);
        assert!(lam.iter().all(|l| *l >= -1e-12));
        let total: f64 = lam.iter().sum();
        assert!(total < 1.0 && total > 0.5);
    }

    #[test]
    fn pre_sample_lags_use_backcast() {
        let process = FigarchProcess::new(FigarchOrder {
            p: 0,
            q: 0,
            truncation: 4,
        })
        .unwrap();
        let params = [1e-6, 0.5];
        let lam = figarch_weights(0.0, 0.5, 0.0, 4);
        let resids = [0.01, 0.02];
        let mut sigma2 = [0.0; 2];
        process.variance(&params, &resids, 1e-4, &mut sigma2);

        let all_backcast: f64 = lam.iter().sum::<f64>() * 1e-4;
        assert_relative_eq!(sigma2[0], 1e-6 + all_backcast);
        let second = 1e-6 + lam[0] * 1e-4 + (lam[1] + lam[2] + lam[3]) * 1e-4;
        assert_relative_eq!(sigma2[1], second);
    }

    #[test]
    fn feasibility_bounds() {
        let process = FigarchProcess::new(FigarchOrder::default()).unwrap();
        assert!(process.is_feasible(&[1e-6, 0.1, 0.5, 0.3]));
        // phi above (1 - d) / 2
        assert!(!process.is_feasible(&[1e-6, 0.3, 0.5, 0.3]));
        // beta above d + phi
        assert!(!process.is_feasible(&[1e-6, 0.1, 0.5, 0.7]));
        assert!(!process.is_feasible(&[1e-6, 0.1, 1.2, 0.3]));
    }

    #[test]
    fn unsupported_orders_fail_with_family() {
        let err = FigarchProcess::new(FigarchOrder {
            p: 2,
            q: 1,
            truncation: 10,
        })
        .unwrap_err();
        assert!(err.to_string().starts_with("FIGARCH fit failed"));
    }
}
