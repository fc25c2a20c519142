//! GARCH(p, q) and the GJR threshold extension
//!
//! σ²_t = ω + Σ α_i ε²_{t−i} + Σ γ_j ε²_{t−j}·1[ε_{t−j} < 0] + Σ β_k σ²_{t−k}

use serde::{Deserialize, Serialize};

use super::{ModelFamily, VarianceProcess};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarchOrder {
    pub p: usize,
    pub q: usize,
}

impl Default for GarchOrder {
    fn default() -> Self {
        GarchOrder { p: 1, q: 1 }
    }
}

/// GJR-GARCH order; `o` is the number of asymmetric lags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GjrOrder {
    pub p: usize,
    pub o: usize,
    pub q: usize,
}

impl Default for GjrOrder {
    fn default() -> Self {
        GjrOrder { p: 1, o: 1, q: 1 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GarchProcess {
    family: ModelFamily,
    p: usize,
    o: usize,
    q: usize,
}

impl GarchProcess {
    pub fn garch(order: GarchOrder) -> Result<Self> {
        if order.p == 0 {
            return Err(PipelineError::model_fit(
                ModelFamily::Garch,
                "at least one ARCH lag is required",
            ));
        }
        Ok(GarchProcess {
            family: ModelFamily::Garch,
            p: order.p,
            o: 0,
            q: order.q,
        })
    }

    pub fn gjr(order: GjrOrder) -> Result<Self> {
        if order.p == 0 || order.o == 0 {
            return Err(PipelineError::model_fit(
                ModelFamily::GjrGarch,
                "ARCH and asymmetric orders must both be positive",
            ));
        }
        Ok(GarchProcess {
            family: ModelFamily::GjrGarch,
            p: order.p,
            o: order.o,
            q: order.q,
        })
    }

    fn split<'a>(&self, params: &'a [f64]) -> (f64, &'a [f64], &'a [f64], &'a [f64]) {
        let (alpha, rest) = params[1..].split_at(self.p);
        let (gamma, beta) = rest.split_at(self.o);
        (params[0], alpha, gamma, beta)
    }
}

impl VarianceProcess for GarchProcess {
    fn family(&self) -> ModelFamily {
        self.family
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = vec!["omega".to_string()];
        names.extend((1..=self.p).map(|i| format!("alpha[{i}]")));
        names.extend((1..=self.o).map(|i| format!("gamma[{i}]")));
        names.extend((1..=self.q).map(|i| format!("beta[{i}]")));
        names
    }

    fn starting_values(&self, sample_variance: f64) -> Vec<f64> {
        let alpha_total = if self.o > 0 { 0.05 } else { 0.1 };
        let gamma_total = if self.o > 0 { 0.1 } else { 0.0 };
        let beta_total = if self.q > 0 { 0.85 } else { 0.0 };
        let persistence = alpha_total + 0.5 * gamma_total + beta_total;

        let mut x = vec![sample_variance * (1.0 - persistence)];
        x.extend(std::iter::repeat(alpha_total / self.p as f64).take(self.p));
        if self.o > 0 {
            x.extend(std::iter::repeat(gamma_total / self.o as f64).take(self.o));
        }
        if self.q > 0 {
            x.extend(std::iter::repeat(beta_total / self.q as f64).take(self.q));
        }
        x
    }

    fn is_feasible(&self, params: &[f64]) -> bool {
        if params.len() != 1 + self.p + self.o + self.q {
            return false;
        }
        let (omega, alpha, gamma, beta) = self.split(params);
        if !(omega > 0.0) || alpha.iter().chain(beta).any(|v| !(*v >= 0.0)) {
            return false;
        }
        // asymmetric response must stay non-negative on the downside
        let gamma_ok = gamma.iter().enumerate().all(|(j, g)| {
            let a = alpha.get(j).copied().unwrap_or(0.0);
            a + g >= 0.0
        });
        gamma_ok && self.persistence(params).is_some_and(|p| p < 1.0)
    }

    fn variance(&self, params: &[f64], resids: &[f64], backcast: f64, sigma2: &mut [f64]) {
        let (omega, alpha, gamma, beta) = self.split(params);
        for t in 0..sigma2.len() {
            let mut s = omega;
            for (i, a) in alpha.iter().enumerate() {
                s += a * if t > i {
                    let e = resids[t - 1 - i];
                    e * e
                } else {
                    backcast
                };
            }
            for (i, g) in gamma.iter().enumerate() {
                s += g * if t > i {
                    let e = resids[t - 1 - i];
                    if e < 0.0 {
                        e * e
                    } else {
                        0.0
                    }
                } else {
                    0.5 * backcast
                };
            }
            for (i, b) in beta.iter().enumerate() {
                s += b * if t > i { sigma2[t - 1 - i] } else { backcast };
            }
            sigma2[t] = s;
        }
    }

    /// Σα + 0.5·Σγ + Σβ
    fn persistence(&self, params: &[f64]) -> Option<f64> {
        let (_, alpha, gamma, beta) = self.split(params);
        Some(alpha.iter().sum::<f64>() + 0.5 * gamma.iter().sum::<f64>() + beta.iter().sum::<f64>())
    }
}
