//! Feature engineering over an ordered time series.
//!
//! Produces one row per input point, in input order, never dropping rows:
//! - cyclical hour / day-of-week encodings and seasonal flags
//! - trailing rolling statistics (window inclusive of the current row,
//!   `min_periods = 1`)
//! - first difference, percent change and rolling z-score
//!
//! Values that cannot be computed (first-row diff, std of a single sample)
//! are back-filled, then forward-filled; a column with no computable value
//! at all becomes 0.

use chrono::{Datelike, TimeDelta, Timelike};
use ndarray::{Array2, ArrayView1, s};
use std::f64::consts::PI;

use crate::domain::ml::feature_registry::engineered_feature_names;
use crate::domain::types::{SeriesKind, TimeSeriesPoint, Timestamp};

const ZSCORE_EPSILON: f64 = 1e-8;

/// Engineered feature matrix with named columns, keyed 1:1 to input points.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    timestamps: Vec<Timestamp>,
    values: Vec<f64>,
    matrix: Array2<f64>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    /// Raw series values, one per row.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(self.matrix.column(idx))
    }

    /// Builds a matrix of the requested columns, in the requested order.
    ///
    /// Returns the names that this table does not contain as the error.
    pub fn select(&self, columns: &[String]) -> Result<Array2<f64>, Vec<String>> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut missing = Vec::new();
        for col in columns {
            match self.names.iter().position(|n| n == col) {
                Some(idx) => indices.push(idx),
                None => missing.push(col.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(Array2::from_shape_fn((self.len(), indices.len()), |(r, c)| {
            self.matrix[[r, indices[c]]]
        }))
    }

    /// Rows from `start` to the end, preserving order.
    pub fn slice_from(&self, start: usize) -> FeatureTable {
        let start = start.min(self.len());
        FeatureTable {
            names: self.names.clone(),
            timestamps: self.timestamps[start..].to_vec(),
            values: self.values[start..].to_vec(),
            matrix: self.matrix.slice(s![start.., ..]).to_owned(),
        }
    }

    /// Rows whose timestamps fall within `[first, last]`, preserving order.
    pub fn rows_within(&self, first: Timestamp, last: Timestamp) -> FeatureTable {
        let keep: Vec<usize> = self
            .timestamps
            .iter()
            .enumerate()
            .filter(|(_, ts)| **ts >= first && **ts <= last)
            .map(|(i, _)| i)
            .collect();

        FeatureTable {
            names: self.names.clone(),
            timestamps: keep.iter().map(|&i| self.timestamps[i]).collect(),
            values: keep.iter().map(|&i| self.values[i]).collect(),
            matrix: Array2::from_shape_fn((keep.len(), self.names.len()), |(r, c)| {
                self.matrix[[keep[r], c]]
            }),
        }
    }
}

/// Feature engineer for one series type and rolling window.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    target: String,
    window: usize,
}

impl FeatureEngineer {
    pub fn new(series: SeriesKind, window: usize) -> Self {
        Self::with_target(series.target_name(), window)
    }

    pub fn with_target(target: &str, window: usize) -> Self {
        Self {
            target: target.to_string(),
            window: window.max(1),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Column names this engineer produces, in table order.
    pub fn feature_names(&self) -> Vec<String> {
        engineered_feature_names(&self.target)
    }

    /// Engineers features over `series`, which must already be sorted ascending.
    pub fn engineer(&self, series: &[TimeSeriesPoint]) -> FeatureTable {
        engineer(series, &self.target, self.window)
    }

    /// Like [`engineer`](Self::engineer), but restarts the value-derived
    /// features wherever consecutive points are more than `cadence` apart.
    /// Each run is engineered on its own and the runs are stacked in order,
    /// so a diff or rolling window never reaches across a gap.
    pub fn engineer_contiguous(&self, series: &[TimeSeriesPoint], cadence: TimeDelta) -> FeatureTable {
        let runs: Vec<FeatureTable> = series
            .chunk_by(|a, b| b.timestamp - a.timestamp <= cadence)
            .map(|run| self.engineer(run))
            .collect();
        stack(self.feature_names(), runs)
    }
}

fn stack(names: Vec<String>, parts: Vec<FeatureTable>) -> FeatureTable {
    let rows = parts.iter().map(FeatureTable::len).sum();
    let mut matrix = Array2::zeros((rows, names.len()));
    let mut timestamps = Vec::with_capacity(rows);
    let mut values = Vec::with_capacity(rows);
    let mut offset = 0;
    for part in parts {
        let len = part.len();
        matrix.slice_mut(s![offset..offset + len, ..]).assign(&part.matrix);
        offset += len;
        timestamps.extend(part.timestamps);
        values.extend(part.values);
    }
    FeatureTable {
        names,
        timestamps,
        values,
        matrix,
    }
}

/// See the module docs. `series` must be sorted ascending; it is not re-sorted.
pub fn engineer(series: &[TimeSeriesPoint], target_name: &str, window: usize) -> FeatureTable {
    let window = window.max(1);
    let n = series.len();
    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    let timestamps: Vec<Timestamp> = series.iter().map(|p| p.timestamp).collect();

    let mut columns: Vec<Vec<f64>> = time_features(&timestamps);

    let mut rolling_mean = Vec::with_capacity(n);
    let mut rolling_std = Vec::with_capacity(n);
    let mut rolling_min = Vec::with_capacity(n);
    let mut rolling_max = Vec::with_capacity(n);
    for i in 0..n {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        let (mean, std) = mean_and_sample_std(slice);
        rolling_mean.push(mean);
        rolling_std.push(std);
        rolling_min.push(slice.iter().copied().fold(f64::INFINITY, f64::min));
        rolling_max.push(slice.iter().copied().fold(f64::NEG_INFINITY, f64::max));
    }

    let mut diff = Vec::with_capacity(n);
    let mut pct_change = Vec::with_capacity(n);
    for i in 0..n {
        if i == 0 {
            diff.push(f64::NAN);
            pct_change.push(f64::NAN);
            continue;
        }
        let prev = values[i - 1];
        diff.push(values[i] - prev);
        pct_change.push(if prev != 0.0 {
            values[i] / prev - 1.0
        } else {
            f64::NAN
        });
    }

    let zscore: Vec<f64> = (0..n)
        .map(|i| (values[i] - rolling_mean[i]) / (rolling_std[i] + ZSCORE_EPSILON))
        .collect();

    columns.push(values.clone());
    columns.push(rolling_mean);
    columns.push(rolling_std);
    columns.push(rolling_min);
    columns.push(rolling_max);
    columns.push(diff);
    columns.push(pct_change);
    columns.push(zscore);

    for col in columns.iter_mut() {
        fill_missing(col);
    }

    let names = engineered_feature_names(target_name);
    debug_assert_eq!(names.len(), columns.len());

    let matrix = Array2::from_shape_fn((n, columns.len()), |(r, c)| columns[c][r]);

    FeatureTable {
        names,
        timestamps,
        values,
        matrix,
    }
}

fn time_features(timestamps: &[Timestamp]) -> Vec<Vec<f64>> {
    let mut cols = vec![Vec::with_capacity(timestamps.len()); 9];
    for ts in timestamps {
        let hour = ts.hour() as f64;
        let dow = ts.weekday().num_days_from_monday() as f64;
        let month = ts.month();

        cols[0].push((2.0 * PI * hour / 24.0).sin());
        cols[1].push((2.0 * PI * hour / 24.0).cos());
        cols[2].push((2.0 * PI * dow / 7.0).sin());
        cols[3].push((2.0 * PI * dow / 7.0).cos());
        cols[4].push(if dow >= 5.0 { 1.0 } else { 0.0 });
        cols[5].push(month as f64);
        cols[6].push(ts.iso_week().week() as f64);
        cols[7].push(if (6..=9).contains(&month) { 1.0 } else { 0.0 });
        cols[8].push(if matches!(month, 12 | 1 | 2) { 1.0 } else { 0.0 });
    }
    cols
}

/// Mean and sample (n-1) standard deviation; std is NaN below two samples.
fn mean_and_sample_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, f64::NAN);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Back-fill, then forward-fill, then zero anything still missing.
fn fill_missing(col: &mut [f64]) {
    let mut next: Option<f64> = None;
    for v in col.iter_mut().rev() {
        if v.is_finite() {
            next = Some(*v);
        } else if let Some(n) = next {
            *v = n;
        }
    }

    let mut prev: Option<f64> = None;
    for v in col.iter_mut() {
        if v.is_finite() {
            prev = Some(*v);
        } else if let Some(p) = prev {
            *v = p;
        }
    }

    for v in col.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}
