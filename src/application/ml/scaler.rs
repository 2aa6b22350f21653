//! Zero-mean / unit-variance feature scaling.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-column standardisation fitted on one training matrix.
///
/// Uses the population standard deviation; columns with zero variance keep a
/// unit scale so they map to 0 instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mut means = Vec::with_capacity(x.ncols());
        let mut scales = Vec::with_capacity(x.ncols());

        for col in x.columns() {
            let mean = col.sum() / n;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            means.push(mean);
            scales.push(if std > 1e-12 { std } else { 1.0 });
        }

        Self { means, scales }
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Scales `x` column-wise. `x` must have `n_features()` columns.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        debug_assert_eq!(x.ncols(), self.n_features());
        Array2::from_shape_fn(x.dim(), |(r, c)| {
            (x[[r, c]] - self.means[c]) / self.scales[c]
        })
    }

    pub fn fit_transform(x: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(x);
        let scaled = scaler.transform(x);
        (scaler, scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardises_columns() {
        let x = Array2::from_shape_vec((4, 2), vec![1.0, 10.0, 2.0, 10.0, 3.0, 10.0, 4.0, 10.0])
            .unwrap();
        let (scaler, scaled) = StandardScaler::fit_transform(&x);

        assert_eq!(scaler.means(), &[2.5, 10.0]);
        let col0 = scaled.column(0);
        let mean: f64 = col0.sum() / 4.0;
        let var: f64 = col0.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let x = Array2::from_shape_vec((3, 1), vec![11.0, 11.0, 11.0]).unwrap();
        let scaler = StandardScaler::fit(&x);
        assert_eq!(scaler.scales(), &[1.0]);

        let sample = Array2::from_shape_vec((1, 1), vec![11.0]).unwrap();
        assert_eq!(scaler.transform(&sample)[[0, 0]], 0.0);
    }

    #[test]
    fn test_serde_preserves_parameters() {
        let x = Array2::from_shape_vec((2, 2), vec![0.0, 5.0, 2.0, 9.0]).unwrap();
        let scaler = StandardScaler::fit(&x);
        let json = serde_json::to_string(&scaler).unwrap();
        let restored: StandardScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, scaler);
    }
}
