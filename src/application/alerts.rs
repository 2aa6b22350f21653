//! Actionable alerts for flagged forecast points.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{ForecastBatch, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlert {
    /// Local wall-clock time, `YYYY-MM-DD HH:MM`.
    pub timestamp: String,
    pub time_until: String,
    pub value: f64,
    pub severity: Severity,
    pub confidence: f64,
    pub anomaly_score: f64,
    pub explanation: String,
}

/// One alert per flagged point, in forecast order.
pub fn alerts(batch: &ForecastBatch, now: DateTime<Utc>) -> Vec<AnomalyAlert> {
    batch
        .anomalies()
        .map(|p| AnomalyAlert {
            timestamp: p.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            time_until: format_time_until(p.timestamp.with_timezone(&Utc) - now),
            value: p.value.round(),
            severity: p.severity,
            confidence: (p.confidence * 10.0).round() / 10.0,
            anomaly_score: (p.anomaly_score * 1000.0).round() / 1000.0,
            explanation: format!(
                "Unusual {} forecast pattern detected by the {} model",
                batch.series, batch.model_scope
            ),
        })
        .collect()
}

/// "45 minutes" under an hour, "5 hours" under a day, else "1d 3h". Truncates.
/// Past instants read the same way with an "ago" suffix.
pub fn format_time_until(delta: TimeDelta) -> String {
    if delta < TimeDelta::zero() {
        return format!("{} ago", format_time_until(-delta));
    }
    let minutes = delta.num_minutes();
    let hours = delta.num_hours();
    if hours < 1 {
        format!("{} minutes", minutes)
    } else if hours < 24 {
        format!("{} hours", hours)
    } else {
        format!("{}d {}h", hours / 24, hours % 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CalendarMonth, ModelScope, PredictionPoint, SeriesKind};
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_format_time_until() {
        assert_eq!(format_time_until(TimeDelta::minutes(45)), "45 minutes");
        assert_eq!(format_time_until(TimeDelta::minutes(5 * 60 + 20)), "5 hours");
        assert_eq!(format_time_until(TimeDelta::hours(27)), "1d 3h");
        assert_eq!(format_time_until(TimeDelta::zero()), "0 minutes");
    }

    #[test]
    fn test_past_points_read_as_ago() {
        assert_eq!(format_time_until(TimeDelta::minutes(-10)), "10 minutes ago");
        assert_eq!(format_time_until(TimeDelta::hours(-5)), "5 hours ago");
        assert_eq!(format_time_until(-TimeDelta::minutes(27 * 60 + 59)), "1d 3h ago");
    }

    #[test]
    fn test_alerts_only_for_flagged_points() {
        let tz = FixedOffset::west_opt(8 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 20, 0, 0).unwrap();
        let at = |h: u32| tz.with_ymd_and_hms(2025, 11, 3, h, 0, 0).unwrap();
        let batch = ForecastBatch::new(
            SeriesKind::Demand,
            ModelScope::Month(CalendarMonth::new(11).unwrap()),
            CalendarMonth::new(11).unwrap(),
            vec![
                PredictionPoint::from_score(at(17), 2500.0, false, -0.45),
                PredictionPoint::from_score(at(18), 3850.4, true, -0.72345),
            ],
        );

        let out = alerts(&batch, now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].timestamp, "2025-11-03 18:00");
        assert_eq!(out[0].time_until, "6 hours");
        assert_eq!(out[0].value, 3850.0);
        assert_eq!(out[0].anomaly_score, -0.723);
        assert_eq!(out[0].confidence, 72.3);
        assert_eq!(out[0].severity, Severity::High);
    }
}
