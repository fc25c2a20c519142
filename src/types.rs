//! Core data types used across the research pipeline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Validation errors for a per-ticker return series
#[derive(Debug, Error, PartialEq)]
pub enum SeriesValidationError {
    #[error("dates ({dates}) and returns ({returns}) differ in length")]
    LengthMismatch { dates: usize, returns: usize },

    #[error("dates must be strictly increasing: {prev} followed by {next}")]
    NotIncreasing { prev: NaiveDate, next: NaiveDate },
}

/// Equity ticker using Arc<str> for cheap cloning
///
/// Tickers are cloned into every result row, window record and table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Ticker {
    pub fn new(s: impl AsRef<str>) -> Self {
        Ticker(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the input dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    pub date: NaiveDate,
    pub ticker: Ticker,
    pub log_return: f64,
}

/// Time-ordered log returns of a single ticker
///
/// Dates are strictly increasing. Returns may contain non-finite values; every
/// consumer scrubs them at the point of use.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub ticker: Ticker,
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
}

impl ReturnSeries {
    /// Create a new series with validation
    pub fn new(
        ticker: Ticker,
        dates: Vec<NaiveDate>,
        returns: Vec<f64>,
    ) -> Result<Self, SeriesValidationError> {
        let series = Self {
            ticker,
            dates,
            returns,
        };
        series.validate()?;
        Ok(series)
    }

    pub fn validate(&self) -> Result<(), SeriesValidationError> {
        if self.dates.len() != self.returns.len() {
            return Err(SeriesValidationError::LengthMismatch {
                dates: self.dates.len(),
                returns: self.returns.len(),
            });
        }
        for pair in self.dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(SeriesValidationError::NotIncreasing {
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Index range of observations with `start <= date < end`
    pub fn range_indices(&self, start: NaiveDate, end: NaiveDate) -> std::ops::Range<usize> {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d < end);
        lo..hi.max(lo)
    }

    /// Finite returns only, in original order
    pub fn finite_returns(&self) -> Vec<f64> {
        self.returns.iter().copied().filter(|r| r.is_finite()).collect()
    }
}

/// Date-aligned return matrix for a set of tickers
///
/// `values[t][j]` is the return of `tickers[j]` on `dates[t]`, `None` when the
/// ticker has no (finite) observation on that date.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPanel {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<Ticker>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl ReturnPanel {
    /// Outer-join the given series on date
    pub fn from_series(series: &[&ReturnSeries]) -> Self {
        let mut rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for (j, s) in series.iter().enumerate() {
            for (date, &r) in s.dates.iter().zip(s.returns.iter()) {
                let row = rows
                    .entry(*date)
                    .or_insert_with(|| vec![None; series.len()]);
                if r.is_finite() {
                    row[j] = Some(r);
                }
            }
        }

        let (dates, values): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        ReturnPanel {
            dates,
            tickers: series.iter().map(|s| s.ticker.clone()).collect(),
            values,
        }
    }

    /// Keep only dates on which every ticker has a return
    pub fn complete_rows(&self) -> Self {
        let (dates, values): (Vec<_>, Vec<_>) = self
            .dates
            .iter()
            .zip(self.values.iter())
            .filter(|(_, row)| row.iter().all(Option::is_some))
            .map(|(d, row)| (*d, row.clone()))
            .unzip();
        ReturnPanel {
            dates,
            tickers: self.tickers.clone(),
            values,
        }
    }

    /// Column `j` as a sequence of optional returns
    pub fn column(&self, j: usize) -> Vec<Option<f64>> {
        self.values.iter().map(|row| row[j]).collect()
    }

    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// A dated return series with its compounded equity curve
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EquityPoint {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Return")]
    pub ret: f64,
    #[serde(rename = "Equity")]
    pub equity: f64,
}

/// Annualised performance statistics over a return series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(rename = "Annual Return")]
    pub annual_return: f64,
    #[serde(rename = "Annual Volatility")]
    pub annual_volatility: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
    #[serde(rename = "Observations")]
    pub observations: usize,
}

/// One row of a two-column `Metric,Value` summary table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    #[serde(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl MetricRow {
    pub fn new(metric: impl Into<String>, value: impl ToString) -> Self {
        MetricRow {
            metric: metric.into(),
            value: value.to_string(),
        }
    }
}

impl PerformanceMetrics {
    pub fn to_rows(&self) -> Vec<MetricRow> {
        vec![
            MetricRow::new("Annual Return", self.annual_return),
            MetricRow::new("Annual Volatility", self.annual_volatility),
            MetricRow::new("Sharpe Ratio", self.sharpe_ratio),
            MetricRow::new("Max Drawdown", self.max_drawdown),
        ]
    }
}
