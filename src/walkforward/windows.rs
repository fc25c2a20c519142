//! Rolling train/test window generation
//!
//! Every boundary is an offset in whole months from the first date, so the
//! test end of window k is the test start of window k + 1 even when month-end
//! clamping shortens a step.

use chrono::{Months, NaiveDate};
use serde::Serialize;

/// One walk-forward window
///
/// Train covers `[train_start, train_end)` and test covers
/// `[test_start, test_end)`, with `train_end == test_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RollingWindow {
    pub id: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
}

/// Window layout over a fixed date span
///
/// `Copy`, so each `into_iter` call starts a fresh sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    /// `None` when there is nothing to iterate
    first: Option<NaiveDate>,
    last: NaiveDate,
    train_months: u32,
    test_months: u32,
}

impl WindowSpec {
    /// Layout over sorted `dates`
    ///
    /// An empty date list or a zero-length test step yields no windows.
    pub fn new(dates: &[NaiveDate], train_years: u32, test_months: u32) -> Self {
        let (first, last) = match (dates.first(), dates.last()) {
            (Some(f), Some(l)) if test_months > 0 => (Some(*f), *l),
            (_, Some(l)) => (None, *l),
            _ => (None, NaiveDate::MIN),
        };
        WindowSpec {
            first,
            last,
            train_months: train_years.saturating_mul(12),
            test_months,
        }
    }

    /// Window `k`, or `None` once its test end passes the last date
    pub fn window(&self, k: usize) -> Option<RollingWindow> {
        let first = self.first?;
        let step = u32::try_from(k).ok()?.checked_mul(self.test_months)?;
        let offset = |months: u32| first.checked_add_months(Months::new(months));

        let train_start = offset(step)?;
        let test_start = offset(self.train_months.checked_add(step)?)?;
        let test_end = offset(
            self.train_months
                .checked_add(step)?
                .checked_add(self.test_months)?,
        )?;
        if test_end > self.last {
            return None;
        }
        Some(RollingWindow {
            id: k,
            train_start,
            train_end: test_start,
            test_start,
            test_end,
        })
    }
}

impl IntoIterator for WindowSpec {
    type Item = RollingWindow;
    type IntoIter = RollingWindows;

    fn into_iter(self) -> RollingWindows {
        RollingWindows { spec: self, next: 0 }
    }
}

/// Lazy window sequence produced by [`WindowSpec`]
#[derive(Debug, Clone)]
pub struct RollingWindows {
    spec: WindowSpec,
    next: usize,
}

impl RollingWindows {
    pub fn spec(&self) -> WindowSpec {
        self.spec
    }
}

impl Iterator for RollingWindows {
    type Item = RollingWindow;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.spec.window(self.next)?;
        self.next += 1;
        Some(window)
    }
}

/// Windows over `dates`, which must be sorted
pub fn generate_rolling_windows(
    dates: &[NaiveDate],
    train_years: u32,
    test_months: u32,
) -> RollingWindows {
    WindowSpec::new(dates, train_years, test_months).into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn windows_roll_by_test_length() {
        let dates = vec![d(2015, 1, 1), d(2019, 1, 1)];
        let windows: Vec<_> = generate_rolling_windows(&dates, 3, 3).collect();

        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].train_start, d(2015, 1, 1));
        assert_eq!(windows[0].train_end, d(2018, 1, 1));
        assert_eq!(windows[0].test_end, d(2018, 4, 1));
        assert_eq!(windows[1].train_start, d(2015, 4, 1));
        // last window ends exactly on the last date
        assert_eq!(windows[3].test_end, d(2019, 1, 1));
        assert_eq!(windows.iter().map(|w| w.id).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn short_span_yields_nothing() {
        let dates = vec![d(2020, 1, 1), d(2022, 12, 31)];
        assert_eq!(generate_rolling_windows(&dates, 3, 3).count(), 0);
        assert_eq!(generate_rolling_windows(&[], 3, 3).count(), 0);
    }

    #[test]
    fn month_end_clamps() {
        let dates = vec![d(2016, 1, 31), d(2020, 1, 1)];
        let first = generate_rolling_windows(&dates, 1, 1).next().unwrap();
        assert_eq!(first.test_end, d(2017, 2, 28));
    }

    #[test]
    fn month_end_start_does_not_overlap() {
        let dates = vec![d(2016, 11, 30), d(2021, 1, 1)];
        let windows: Vec<_> = generate_rolling_windows(&dates, 3, 3).collect();

        assert_eq!(windows[0].test_start, d(2019, 11, 30));
        assert_eq!(windows[0].test_end, d(2020, 2, 29));
        assert_eq!(windows[1].test_start, d(2020, 2, 29));
        // clamping does not carry into later windows
        assert_eq!(windows[1].test_end, d(2020, 5, 30));
        assert_eq!(windows[1].train_start, d(2017, 2, 28));
        assert_eq!(windows[2].train_start, d(2017, 5, 30));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].test_end, pair[1].test_start);
        }
    }

    #[test]
    fn spec_replays_from_the_start() {
        let dates = vec![d(2010, 1, 1), d(2020, 1, 1)];
        let spec = WindowSpec::new(&dates, 3, 6);
        let a: Vec<_> = spec.into_iter().collect();
        let b: Vec<_> = spec.into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 14);

        let mut partial = spec.into_iter();
        partial.next();
        assert_eq!(partial.spec().into_iter().next(), a.first().copied());
    }

    #[test]
    fn window_by_index_matches_iteration() {
        let dates = vec![d(2012, 8, 31), d(2020, 1, 1)];
        let spec = WindowSpec::new(&dates, 2, 5);
        for (k, w) in spec.into_iter().enumerate() {
            assert_eq!(spec.window(k), Some(w));
        }
    }

    #[test]
    fn zero_test_step_terminates() {
        let dates = vec![d(2010, 1, 1), d(2020, 1, 1)];
        assert_eq!(generate_rolling_windows(&dates, 3, 0).count(), 0);
    }
}
