mod common;

use common::{hourly_demand_between, local, quick_settings};
use gridsentry::application::ml::feature_engineering::FeatureEngineer;
use gridsentry::application::ml::monthly_trainer::{MonthlyModelTrainer, TrainingResult};
use gridsentry::application::ml::scorer::OutlierScorer;
use gridsentry::domain::types::{CalendarMonth, ModelScope, PredictionPoint, SeriesKind};

#[test]
fn test_model_mostly_recognises_its_own_month() {
    let july = CalendarMonth::new(7).unwrap();
    let mut history = hourly_demand_between(local(2023, 7, 1, 0), local(2023, 8, 1, 0), 3);
    history.extend(hourly_demand_between(local(2024, 7, 1, 0), local(2024, 8, 1, 0), 4));

    let trainer = MonthlyModelTrainer::new(quick_settings());
    let model = trainer.train(july, &history).unwrap();
    assert_eq!(model.scope, ModelScope::Month(july));
    assert_eq!(model.n_samples, history.len());

    let table = FeatureEngineer::new(SeriesKind::Demand, model.window)
        .engineer_contiguous(&history, SeriesKind::Demand.cadence());
    let x = model.scaler.transform(&table.select(&model.feature_columns).unwrap());
    let scores = model.scorer.score_samples(&x);
    let offset = model.scorer.offset();

    let confident = scores
        .iter()
        .zip(table.timestamps().iter().zip(table.values()))
        .map(|(s, (ts, v))| PredictionPoint::from_score(*ts, *v, *s < offset, *s))
        .filter(|p| p.is_anomaly && p.confidence > 50.0)
        .count();
    let allowed = (2.0 * model.contamination * history.len() as f64).ceil() as usize;
    assert!(
        confident <= allowed,
        "{} confident anomalies on training data, allowed {}",
        confident,
        allowed
    );

    let flagged = scores.iter().filter(|&&s| s < offset).count();
    assert_eq!(flagged, model.n_anomalies_detected);
}

#[test]
fn test_train_all_reports_sparse_months() {
    // January and February only; February 2024 is cut short.
    let mut history = hourly_demand_between(local(2024, 1, 1, 0), local(2024, 2, 1, 0), 8);
    history.extend(hourly_demand_between(local(2024, 2, 1, 0), local(2024, 2, 3, 0), 9));

    let trainer = MonthlyModelTrainer::new(quick_settings());
    let outcomes = trainer.train_all(&history);
    assert_eq!(outcomes.len(), 12);

    let january = CalendarMonth::new(1).unwrap();
    let february = CalendarMonth::new(2).unwrap();
    assert!(outcomes[&january].is_ok());

    let results: Vec<(CalendarMonth, TrainingResult)> = outcomes
        .iter()
        .map(|(month, outcome)| {
            let result = match outcome {
                Ok(model) => TrainingResult::from_model(model),
                Err(e) => TrainingResult::from_error(e),
            };
            (*month, result)
        })
        .collect();

    for (month, result) in &results {
        if *month == january {
            assert_eq!(result.outcome_label(), "success");
        } else {
            assert_eq!(result.outcome_label(), "insufficient_data", "{}", month);
        }
    }

    match &results[1].1 {
        TrainingResult::InsufficientData { available, required } => {
            assert_eq!(results[1].0, february);
            assert_eq!((*available, *required), (48, 100));
        }
        other => panic!("unexpected February outcome: {:?}", other),
    }
}

#[test]
fn test_month_models_are_independent_of_other_months() {
    let march = CalendarMonth::new(3).unwrap();
    let march_only = hourly_demand_between(local(2024, 3, 1, 0), local(2024, 3, 15, 0), 12);
    let mut with_april = march_only.clone();
    with_april.extend(hourly_demand_between(local(2024, 4, 1, 0), local(2024, 4, 10, 0), 13));

    let trainer = MonthlyModelTrainer::new(quick_settings());
    let a = trainer.train(march, &march_only).unwrap();
    let b = trainer.train(march, &with_april).unwrap();

    assert_eq!(a.scorer, b.scorer);
    assert_eq!(a.scaler, b.scaler);
    assert_eq!(a.training_period, b.training_period);
}
