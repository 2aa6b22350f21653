// Feature engineering, scorers, training and prediction
pub mod ml;

// Baseline profiles and suppression
pub mod baseline_builder;
pub mod suppression;

// Alerting on flagged forecast points
pub mod alerts;

// Service entry points
pub mod anomaly_service;
