use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::models::Workout;

use super::WorkoutStore;

const DEFAULT_LATENCY: Duration = Duration::from_millis(500);

/// In-memory stand-in for the remote workout backend. Every call waits for
/// a simulated network round trip before touching the list.
#[derive(Clone)]
pub struct MockRemoteStore {
    workouts: Arc<Mutex<Vec<Workout>>>,
    latency: Duration,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::with_latency(DEFAULT_LATENCY)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            workouts: Arc::new(Mutex::new(Vec::new())),
            latency,
        }
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkoutStore for MockRemoteStore {
    async fn save_workout(&self, workout: &Workout) -> Result<()> {
        self.round_trip().await;
        let mut workouts = self.workouts.lock().await;
        if workouts.iter().any(|w| w.id == workout.id) {
            bail!("workout {} already exists", workout.id);
        }
        workouts.push(workout.clone());
        Ok(())
    }

    async fn fetch_workouts(&self) -> Result<Vec<Workout>> {
        self.round_trip().await;
        let mut workouts = self.workouts.lock().await.clone();
        workouts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(workouts)
    }

    async fn delete_workout(&self, workout_id: &str) -> Result<bool> {
        self.round_trip().await;
        let mut workouts = self.workouts.lock().await;
        let before = workouts.len();
        workouts.retain(|w| w.id != workout_id);
        Ok(workouts.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn workout(id: &str, minutes_after: i64, reps: u32) -> Workout {
        let started_at = Utc.with_ymd_and_hms(2026, 5, 4, 7, 0, 0).unwrap()
            + ChronoDuration::minutes(minutes_after);
        Workout {
            id: id.to_string(),
            user_id: "owner".to_string(),
            started_at,
            ended_at: Some(started_at + ChronoDuration::seconds(90)),
            device: "test".to_string(),
            total_reps: reps,
            total_duration_seconds: 90,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_returns_newest_first_after_latency() {
        let store = MockRemoteStore::new();
        store.save_workout(&workout("a", 0, 10)).await.unwrap();
        store.save_workout(&workout("c", 60, 12)).await.unwrap();
        store.save_workout(&workout("b", 30, 8)).await.unwrap();

        let before = tokio::time::Instant::now();
        let ids: Vec<String> = store
            .fetch_workouts()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, ["c", "b", "a"]);
        assert!(before.elapsed() >= DEFAULT_LATENCY);
    }

    #[tokio::test]
    async fn default_queries_build_on_fetch() {
        let store = MockRemoteStore::with_latency(Duration::ZERO);
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            store.save_workout(&workout(id, i as i64, 5)).await.unwrap();
        }

        let page: Vec<String> = store
            .fetch_page(2, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(page, ["c", "b"]);

        let totals = store.totals().await.unwrap();
        assert_eq!(totals.workout_count, 4);
        assert_eq!(totals.total_reps, 20);
        assert_eq!(totals.total_duration_seconds, 360);

        assert!(store.find_workout("b").await.unwrap().is_some());
        assert!(store.delete_workout("b").await.unwrap());
        assert!(!store.delete_workout("b").await.unwrap());
        assert!(store.find_workout("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MockRemoteStore::with_latency(Duration::ZERO);
        store.save_workout(&workout("a", 0, 10)).await.unwrap();
        assert!(store.save_workout(&workout("a", 5, 3)).await.is_err());

        let saved = store.fetch_workouts().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].total_reps, 10);
    }

    #[tokio::test]
    async fn owner_filter_keeps_newest_first() {
        let store = MockRemoteStore::with_latency(Duration::ZERO);
        let mut foreign = workout("x", 10, 4);
        foreign.user_id = "someone-else".to_string();
        store.save_workout(&workout("a", 0, 10)).await.unwrap();
        store.save_workout(&foreign).await.unwrap();
        store.save_workout(&workout("b", 20, 6)).await.unwrap();

        let ids: Vec<String> = store
            .fetch_for_owner("owner")
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, ["b", "a"]);
    }
}
