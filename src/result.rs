use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

use crate::util::{mean, std_dev};

/// Which flavour of session is being run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionKind {
    /// Short practice run, never persisted
    #[default]
    Warmup,
    /// Stored as `test`; `full` is still accepted when reading
    #[serde(rename = "test", alias = "full")]
    #[strum(serialize = "test")]
    Full,
}

impl SessionKind {
    pub const fn total_trials(self) -> usize {
        match self {
            SessionKind::Warmup => 5,
            SessionKind::Full => 20,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionKind::Warmup => "Warmup",
            SessionKind::Full => "Test",
        }
    }
}

/// Coarse speed bucket used to colour individual trials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedRating {
    Fast,
    Moderate,
    Slow,
}

impl SpeedRating {
    pub fn of(latency_ms: f64) -> Self {
        if latency_ms < 300.0 {
            SpeedRating::Fast
        } else if latency_ms < 400.0 {
            SpeedRating::Moderate
        } else {
            SpeedRating::Slow
        }
    }
}

/// Summary of one completed session. Built once by the engine, read-only after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    kind: SessionKind,
    reaction_times: Vec<f64>,
    average_time: f64,
}

impl TestResult {
    pub(crate) fn new(kind: SessionKind, reaction_times: Vec<f64>) -> Self {
        let average_time = mean(&reaction_times).unwrap_or(0.0);
        Self {
            kind,
            reaction_times,
            average_time,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn reaction_times(&self) -> &[f64] {
        &self.reaction_times
    }

    pub fn average_time(&self) -> f64 {
        self.average_time
    }

    pub fn trials(&self) -> usize {
        self.reaction_times.len()
    }

    pub fn best_time(&self) -> f64 {
        self.min_max().0
    }

    pub fn worst_time(&self) -> f64 {
        self.min_max().1
    }

    pub fn std_dev(&self) -> f64 {
        std_dev(&self.reaction_times).unwrap_or(0.0)
    }

    pub fn ratings(&self) -> impl Iterator<Item = SpeedRating> + '_ {
        self.reaction_times.iter().map(|rt| SpeedRating::of(*rt))
    }

    fn min_max(&self) -> (f64, f64) {
        match self.reaction_times.iter().copied().minmax() {
            MinMaxResult::MinMax(min, max) => (min, max),
            MinMaxResult::OneElement(only) => (only, only),
            MinMaxResult::NoElements => (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_trials_per_kind() {
        assert_eq!(SessionKind::Warmup.total_trials(), 5);
        assert_eq!(SessionKind::Full.total_trials(), 20);
    }

    #[test]
    fn test_session_kind_display() {
        assert_eq!(SessionKind::Warmup.to_string(), "warmup");
        assert_eq!(SessionKind::Full.to_string(), "test");
    }

    #[test]
    fn test_result_summary() {
        let result =
            TestResult::new(SessionKind::Warmup, vec![250., 300., 280., 310., 270.]);

        assert_eq!(result.average_time(), 282.0);
        assert_eq!(result.best_time(), 250.0);
        assert_eq!(result.worst_time(), 310.0);
        assert_eq!(result.trials(), 5);
        assert!(result.std_dev() > 0.0);
    }

    #[test]
    fn test_result_single_trial() {
        let result = TestResult::new(SessionKind::Warmup, vec![199.5]);
        assert_eq!(result.best_time(), 199.5);
        assert_eq!(result.worst_time(), 199.5);
        assert_eq!(result.std_dev(), 0.0);
    }

    #[test]
    fn test_empty_result_is_all_zero() {
        let result = TestResult::new(SessionKind::Full, vec![]);
        assert_eq!(result.average_time(), 0.0);
        assert_eq!(result.best_time(), 0.0);
    }

    #[test]
    fn test_speed_rating_thresholds() {
        assert_eq!(SpeedRating::of(299.9), SpeedRating::Fast);
        assert_eq!(SpeedRating::of(300.0), SpeedRating::Moderate);
        assert_eq!(SpeedRating::of(399.9), SpeedRating::Moderate);
        assert_eq!(SpeedRating::of(400.0), SpeedRating::Slow);
    }

    #[test]
    fn test_ratings_follow_trial_order() {
        let result = TestResult::new(SessionKind::Warmup, vec![450., 250., 350.]);
        let ratings: Vec<_> = result.ratings().collect();
        assert_eq!(
            ratings,
            vec![SpeedRating::Slow, SpeedRating::Fast, SpeedRating::Moderate]
        );
    }

    #[test]
    fn test_session_kind_accepts_legacy_full() {
        let kind: SessionKind = serde_json::from_str(r#""full""#).unwrap();
        assert_eq!(kind, SessionKind::Full);
        let kind: SessionKind = serde_json::from_str(r#""test""#).unwrap();
        assert_eq!(kind, SessionKind::Full);
    }

    #[test]
    fn test_result_serializes_kind_lowercase() {
        let result = TestResult::new(SessionKind::Full, vec![300.0]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "test");
        assert_eq!(json["average_time"], 300.0);
    }
}
