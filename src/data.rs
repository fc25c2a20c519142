//! Return data loading and CSV output
//!
//! Input is a long-format CSV with at least `Date`, `Ticker` and `log_return`
//! columns. Rows without a parseable return (the first row of each ticker
//! after differencing) are skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::types::{ReturnObservation, ReturnPanel, ReturnSeries, Ticker};

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    log_return: Option<f64>,
}

/// Per-ticker return series keyed by ticker
#[derive(Debug, Clone, Default)]
pub struct ReturnDataset {
    series: BTreeMap<Ticker, ReturnSeries>,
}

impl ReturnDataset {
    /// Group observations per ticker and sort each group by date
    ///
    /// Two observations of one ticker on the same date are rejected.
    pub fn from_observations(mut observations: Vec<ReturnObservation>) -> Result<Self> {
        observations.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));

        let mut series = BTreeMap::new();
        for (ticker, group) in &observations.iter().chunk_by(|o| o.ticker.clone()) {
            let (dates, returns): (Vec<NaiveDate>, Vec<f64>) =
                group.map(|o| (o.date, o.log_return)).unzip();
            if let Some(pair) = dates.windows(2).find(|w| w[0] == w[1]) {
                return Err(PipelineError::Data(format!(
                    "duplicate date {} for {}",
                    pair[0], ticker
                )));
            }
            let s = ReturnSeries::new(ticker.clone(), dates, returns)
                .map_err(|e| PipelineError::Data(format!("{ticker}: {e}")))?;
            series.insert(ticker, s);
        }
        Ok(ReturnDataset { series })
    }

    pub fn get(&self, ticker: &str) -> Result<&ReturnSeries> {
        self.series
            .get(&Ticker::new(ticker))
            .ok_or_else(|| PipelineError::UnknownTicker(ticker.to_string()))
    }

    pub fn tickers(&self) -> impl Iterator<Item = &Ticker> {
        self.series.keys()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Date-aligned panel of the requested tickers, in request order
    pub fn panel(&self, tickers: &[String]) -> Result<ReturnPanel> {
        let series = tickers
            .iter()
            .map(|t| self.get(t))
            .collect::<Result<Vec<_>>>()?;
        Ok(ReturnPanel::from_series(&series))
    }
}

/// Load a long-format returns CSV
pub fn load_returns(path: impl AsRef<Path>) -> Result<ReturnDataset> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let mut observations = Vec::new();
    let mut dropped = 0usize;
    for row in reader.deserialize::<RawRow>() {
        let row = row?;
        match row.log_return {
            Some(r) => observations.push(ReturnObservation {
                date: row.date,
                ticker: Ticker::new(row.ticker.trim()),
                log_return: r,
            }),
            None => dropped += 1,
        }
    }
    debug!(dropped, "Rows without a return skipped");

    let dataset = ReturnDataset::from_observations(observations)?;
    info!(
        path = %path.display(),
        tickers = dataset.len(),
        "Loaded return data"
    );
    Ok(dataset)
}

/// Serialize `rows` to a CSV file, creating parent directories
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}
