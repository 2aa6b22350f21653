use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar-derived features, independent of the series being scored.
/// Order here is the column order of every engineered table.
pub const TIME_FEATURE_NAMES: &[&str] = &[
    "hour_sin",
    "hour_cos",
    "dow_sin",
    "dow_cos",
    "is_weekend",
    "month",
    "week_of_year",
    "is_summer",
    "is_winter",
];

/// Value-derived features, emitted as `{target}{suffix}` (e.g. `demand_mw_rolling_mean`).
/// The empty suffix is the raw value itself.
pub const VALUE_FEATURE_SUFFIXES: &[&str] = &[
    "",
    "_rolling_mean",
    "_rolling_std",
    "_rolling_min",
    "_rolling_max",
    "_diff",
    "_pct_change",
    "_zscore",
];

/// Full, ordered column list produced by the feature engineer for `target`.
pub fn engineered_feature_names(target: &str) -> Vec<String> {
    TIME_FEATURE_NAMES
        .iter()
        .map(|name| name.to_string())
        .chain(
            VALUE_FEATURE_SUFFIXES
                .iter()
                .map(|suffix| format!("{}{}", target, suffix)),
        )
        .collect()
}

/// Feature subset a model is trained on. The chosen list is persisted with
/// each model and is the only list consulted at prediction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureProfile {
    /// Cyclical encodings, seasonal flags, raw value and rate of change.
    #[default]
    Seasonal,
    /// Seasonal plus rolling mean, rolling std and z-score.
    Rolling,
}

impl FeatureProfile {
    pub fn columns(&self, target: &str) -> Vec<String> {
        let mut cols: Vec<String> = vec![
            "hour_sin".into(),
            "hour_cos".into(),
            "dow_sin".into(),
            "dow_cos".into(),
            "is_weekend".into(),
            "month".into(),
            "week_of_year".into(),
            "is_summer".into(),
            "is_winter".into(),
            target.to_string(),
        ];
        if *self == FeatureProfile::Rolling {
            cols.push(format!("{}_rolling_mean", target));
            cols.push(format!("{}_rolling_std", target));
        }
        cols.push(format!("{}_diff", target));
        cols.push(format!("{}_pct_change", target));
        if *self == FeatureProfile::Rolling {
            cols.push(format!("{}_zscore", target));
        }
        cols
    }
}

impl fmt::Display for FeatureProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureProfile::Seasonal => f.write_str("seasonal"),
            FeatureProfile::Rolling => f.write_str("rolling"),
        }
    }
}

impl FromStr for FeatureProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "seasonal" => Ok(FeatureProfile::Seasonal),
            "rolling" => Ok(FeatureProfile::Rolling),
            _ => anyhow::bail!(
                "Invalid FEATURE_PROFILE: {}. Must be 'seasonal' or 'rolling'",
                s
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engineered_names_length() {
        let names = engineered_feature_names("demand_mw");
        assert_eq!(
            names.len(),
            TIME_FEATURE_NAMES.len() + VALUE_FEATURE_SUFFIXES.len()
        );
        assert_eq!(names[9], "demand_mw");
        assert_eq!(names.last().unwrap(), "demand_mw_zscore");
    }

    #[test]
    fn test_profiles_are_subsets_of_engineered_columns() {
        for target in ["demand_mw", "price"] {
            let all = engineered_feature_names(target);
            for profile in [FeatureProfile::Seasonal, FeatureProfile::Rolling] {
                for col in profile.columns(target) {
                    assert!(all.contains(&col), "{} missing from engineered set", col);
                }
            }
        }
    }

    #[test]
    fn test_seasonal_profile_excludes_rolling() {
        let cols = FeatureProfile::Seasonal.columns("demand_mw");
        assert_eq!(cols.len(), 12);
        assert!(cols.iter().all(|c| !c.contains("rolling") && !c.contains("zscore")));
        assert_eq!(FeatureProfile::Rolling.columns("demand_mw").len(), 15);
    }
}
