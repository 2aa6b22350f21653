use ndarray::Array2;

/// Interface for unsupervised outlier scorers.
pub trait OutlierScorer: Send + Sync {
    /// Continuous score per row, higher means more normal.
    /// Isolation-style scorers return values in [-1, 0].
    fn score_samples(&self, x: &Array2<f64>) -> Vec<f64>;

    /// Decision threshold derived from the contamination rate at fit time.
    fn offset(&self) -> f64;

    /// Binary outlier label per row: `true` when the score is below `offset()`.
    fn predict(&self, x: &Array2<f64>) -> Vec<bool> {
        let offset = self.offset();
        self.score_samples(x)
            .into_iter()
            .map(|score| score < offset)
            .collect()
    }

    /// Get scorer name/type
    fn name(&self) -> &str;
}
