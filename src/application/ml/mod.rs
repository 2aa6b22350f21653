pub mod feature_engineering;
pub mod future_predictor;
pub mod isolation_forest;
pub mod model_registry;
pub mod monthly_trainer;
pub mod scaler;
pub mod scorer;
