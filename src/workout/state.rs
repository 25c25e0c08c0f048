use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum WorkoutStatus {
    #[default]
    Idle,
    Active,
}

/// Live counters for the session in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutState {
    pub status: WorkoutStatus,
    pub session_id: Option<String>,
    pub reps: u32,
    /// Whole ticks elapsed since the session started.
    pub duration_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl WorkoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkoutStatus::Active
    }

    pub fn is_session(&self, session_id: &str) -> bool {
        self.is_active() && self.session_id.as_deref() == Some(session_id)
    }

    pub fn begin_session(&mut self, session_id: String, started_at: DateTime<Utc>) {
        *self = Self {
            status: WorkoutStatus::Active,
            session_id: Some(session_id),
            reps: 0,
            duration_secs: 0,
            started_at: Some(started_at),
        };
    }

    /// Counts one rep; ignored unless a session is active.
    pub fn record_rep(&mut self) -> Option<u32> {
        if !self.is_active() {
            return None;
        }
        self.reps = self.reps.saturating_add(1);
        Some(self.reps)
    }

    pub fn tick(&mut self) -> Option<u64> {
        if !self.is_active() {
            return None;
        }
        self.duration_secs += 1;
        Some(self.duration_secs)
    }

    pub fn finish(&mut self) {
        *self = Self::default();
    }
}
