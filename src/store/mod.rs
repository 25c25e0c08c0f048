//! Persistence collaborator for completed workouts.
//!
//! `fetch_page`, `find_workout`, `fetch_for_owner` and `totals` have defaults built on
//! `fetch_workouts`; stores backed by a query engine override them.

mod mock_remote;

pub use mock_remote::MockRemoteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::db::models::{Workout, WorkoutTotals};

#[async_trait]
pub trait WorkoutStore: Send + Sync {
    async fn save_workout(&self, workout: &Workout) -> Result<()>;

    /// Every stored workout, newest `started_at` first.
    async fn fetch_workouts(&self) -> Result<Vec<Workout>>;

    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<Workout>> {
        let workouts = self.fetch_workouts().await?;
        Ok(workouts.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_workout(&self, workout_id: &str) -> Result<Option<Workout>> {
        let workouts = self.fetch_workouts().await?;
        Ok(workouts.into_iter().find(|w| w.id == workout_id))
    }

    /// Workouts saved under `user_id`, newest first.
    async fn fetch_for_owner(&self, user_id: &str) -> Result<Vec<Workout>> {
        let workouts = self.fetch_workouts().await?;
        Ok(workouts.into_iter().filter(|w| w.user_id == user_id).collect())
    }

    /// Returns whether a workout with that id existed.
    async fn delete_workout(&self, workout_id: &str) -> Result<bool>;

    async fn totals(&self) -> Result<WorkoutTotals> {
        let workouts = self.fetch_workouts().await?;
        let mut totals = WorkoutTotals::default();
        for workout in &workouts {
            totals.add(workout);
        }
        Ok(totals)
    }
}
