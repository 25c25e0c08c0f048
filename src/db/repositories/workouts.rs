use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{format_datetime, parse_datetime, parse_optional_datetime, to_i64, to_u32, to_u64},
        models::{Workout, WorkoutTotals},
    },
    store::WorkoutStore,
};

const WORKOUT_COLUMNS: &str =
    "id, user_id, started_at, ended_at, device, total_reps, total_duration_seconds";

fn row_to_workout(row: &Row) -> Result<Workout> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let total_reps: i64 = row.get("total_reps")?;
    let total_duration_seconds: i64 = row.get("total_duration_seconds")?;

    Ok(Workout {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        device: row.get("device")?,
        total_reps: to_u32(total_reps, "total_reps")?,
        total_duration_seconds: to_u64(total_duration_seconds, "total_duration_seconds")?,
    })
}

impl Database {
    pub async fn insert_workout(&self, workout: &Workout) -> Result<()> {
        let record = workout.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO workouts (id, user_id, started_at, ended_at, device, total_reps, total_duration_seconds)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.user_id,
                    format_datetime(&record.started_at),
                    record.ended_at.as_ref().map(format_datetime),
                    record.device,
                    i64::from(record.total_reps),
                    to_i64(record.total_duration_seconds)?,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_workout(&self, workout_id: &str) -> Result<Option<Workout>> {
        let workout_id = workout_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE id = ?1"
            ))?;

            let workout = stmt
                .query_row(params![workout_id], |row| Ok(row_to_workout(row)))
                .optional()?
                .transpose()
                .map_err(|e| anyhow!("Failed to parse workout: {}", e))?;

            Ok(workout)
        })
        .await
    }

    pub async fn list_workouts(&self) -> Result<Vec<Workout>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORKOUT_COLUMNS} FROM workouts ORDER BY started_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut workouts = Vec::new();
            while let Some(row) = rows.next()? {
                workouts.push(row_to_workout(row)?);
            }

            Ok(workouts)
        })
        .await
    }

    pub async fn list_workouts_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Workout>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORKOUT_COLUMNS} FROM workouts
                 ORDER BY started_at DESC
                 LIMIT ?1 OFFSET ?2"
            ))?;

            let mut rows = stmt.query(params![limit, offset])?;
            let mut workouts = Vec::new();
            while let Some(row) = rows.next()? {
                workouts.push(row_to_workout(row)?);
            }

            Ok(workouts)
        })
        .await
    }

    pub async fn list_workouts_for_owner(&self, user_id: &str) -> Result<Vec<Workout>> {
        let user_id = user_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORKOUT_COLUMNS} FROM workouts
                 WHERE user_id = ?1
                 ORDER BY started_at DESC"
            ))?;

            let mut rows = stmt.query(params![user_id])?;
            let mut workouts = Vec::new();
            while let Some(row) = rows.next()? {
                workouts.push(row_to_workout(row)?);
            }

            Ok(workouts)
        })
        .await
    }

    pub async fn delete_workout(&self, workout_id: &str) -> Result<bool> {
        let workout_id = workout_id.to_string();
        self.run(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM workouts WHERE id = ?1", params![workout_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn workout_totals(&self) -> Result<WorkoutTotals> {
        self.run(|conn| {
            let (count, reps, seconds): (i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(total_reps), 0),
                        COALESCE(SUM(total_duration_seconds), 0)
                 FROM workouts",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

            Ok(WorkoutTotals {
                workout_count: to_u64(count, "workout_count")?,
                total_reps: to_u64(reps, "total_reps")?,
                total_duration_seconds: to_u64(seconds, "total_duration_seconds")?,
            })
        })
        .await
    }
}

#[async_trait]
impl WorkoutStore for Database {
    async fn save_workout(&self, workout: &Workout) -> Result<()> {
        self.insert_workout(workout).await
    }

    async fn fetch_workouts(&self) -> Result<Vec<Workout>> {
        self.list_workouts().await
    }

    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<Workout>> {
        self.list_workouts_paginated(limit, offset).await
    }

    async fn find_workout(&self, workout_id: &str) -> Result<Option<Workout>> {
        self.get_workout(workout_id).await
    }

    async fn fetch_for_owner(&self, user_id: &str) -> Result<Vec<Workout>> {
        self.list_workouts_for_owner(user_id).await
    }

    async fn delete_workout(&self, workout_id: &str) -> Result<bool> {
        Database::delete_workout(self, workout_id).await
    }

    async fn totals(&self) -> Result<WorkoutTotals> {
        self.workout_totals().await
    }
}
