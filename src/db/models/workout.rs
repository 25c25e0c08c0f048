//! Completed workout records handed to the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finished session. Built once when the session ends and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub device: String,
    pub total_reps: u32,
    pub total_duration_seconds: u64,
}

/// Aggregate over every stored workout, shown under the history list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutTotals {
    pub workout_count: u64,
    pub total_reps: u64,
    pub total_duration_seconds: u64,
}

impl WorkoutTotals {
    pub fn add(&mut self, workout: &Workout) {
        self.workout_count += 1;
        self.total_reps += u64::from(workout.total_reps);
        self.total_duration_seconds += workout.total_duration_seconds;
    }
}
