use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio::{sync::Mutex, task::JoinHandle, time};
use uuid::Uuid;

use crate::{
    db::models::Workout,
    detection::DetectorConfig,
    pose::{PoseController, PoseSource},
    store::WorkoutStore,
};

use super::{EventEmitter, WorkoutEvent, WorkoutState};

/// Who and what a finished workout is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutIdentity {
    pub owner_id: String,
    pub device: String,
}

/// Counts one rep for the active session and announces the new total.
/// With `session_id` set, reps belonging to any other session are dropped.
pub(crate) async fn apply_rep(
    state: &Mutex<WorkoutState>,
    events: &EventEmitter,
    session_id: Option<&str>,
) -> Option<u32> {
    let (session_id, total_reps) = {
        let mut guard = state.lock().await;
        if let Some(expected) = session_id {
            if !guard.is_session(expected) {
                return None;
            }
        }
        let total_reps = guard.record_rep()?;
        (guard.session_id.clone()?, total_reps)
    };

    events.emit(WorkoutEvent::RepCounted {
        session_id,
        total_reps,
    });
    Some(total_reps)
}

#[derive(Clone)]
pub struct WorkoutController {
    state: Arc<Mutex<WorkoutState>>,
    store: Arc<dyn WorkoutStore>,
    events: EventEmitter,
    identity: WorkoutIdentity,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    pose: Arc<Mutex<PoseController>>,
}

impl WorkoutController {
    pub fn new(
        store: Arc<dyn WorkoutStore>,
        events: EventEmitter,
        identity: WorkoutIdentity,
        detector_config: DetectorConfig,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(WorkoutState::new())),
            store,
            events,
            identity,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
            pose: Arc::new(Mutex::new(PoseController::new(detector_config))),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub async fn get_snapshot(&self) -> WorkoutState {
        self.state.lock().await.clone()
    }

    pub async fn set_detector_config(&self, config: DetectorConfig) -> Result<()> {
        self.pose.lock().await.set_config(config)
    }

    pub async fn start_workout(&self, source: Box<dyn PoseSource>) -> Result<WorkoutState> {
        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        {
            let mut state = self.state.lock().await;
            if state.is_active() {
                bail!("workout already active");
            }
            state.begin_session(session_id.clone(), started_at);
        }

        let started = self.pose.lock().await.start(
            session_id.clone(),
            source,
            self.state.clone(),
            self.events.clone(),
        );
        if let Err(err) = started {
            self.state.lock().await.finish();
            return Err(err);
        }

        self.spawn_ticker(session_id.clone()).await;

        info!("Workout {session_id} started");
        self.emit_state_changed().await;

        Ok(self.get_snapshot().await)
    }

    /// Counts a rep reported outside the pose loop (e.g. a manual tap).
    /// Ignored while no workout is active.
    pub async fn record_rep(&self) -> Option<u32> {
        apply_rep(&self.state, &self.events, None).await
    }

    pub async fn end_workout(&self) -> Result<Workout> {
        if !self.state.lock().await.is_active() {
            bail!("no active workout to end");
        }

        if let Err(err) = self.pose.lock().await.stop().await {
            warn!("Pose detection did not shut down cleanly: {err:#}");
        }
        self.cancel_ticker().await;

        let ended_at = Utc::now();
        let workout = {
            let mut state = self.state.lock().await;
            let started_at = state
                .started_at
                .ok_or_else(|| anyhow!("no active workout to end"))?;

            let workout = Workout {
                id: Uuid::new_v4().to_string(),
                user_id: self.identity.owner_id.clone(),
                started_at,
                ended_at: Some(ended_at),
                device: self.identity.device.clone(),
                total_reps: state.reps,
                total_duration_seconds: state.duration_secs,
            };

            state.finish();
            workout
        };

        self.emit_state_changed().await;

        let persisted = match self.store.save_workout(&workout).await {
            Ok(()) => {
                info!(
                    "Workout {} saved: {} reps in {}s",
                    workout.id, workout.total_reps, workout.total_duration_seconds
                );
                true
            }
            Err(err) => {
                error!("Failed to save workout {}: {err:#}", workout.id);
                false
            }
        };

        self.events.emit(WorkoutEvent::WorkoutCompleted {
            workout: workout.clone(),
            persisted,
        });

        Ok(workout)
    }

    /// Abandons the running workout without saving it.
    pub async fn cancel_workout(&self) -> Result<()> {
        let session_id = match self.state.lock().await.session_id.clone() {
            Some(session_id) => session_id,
            None => return Ok(()),
        };

        if let Err(err) = self.pose.lock().await.stop().await {
            warn!("Pose detection did not shut down cleanly: {err:#}");
        }
        self.cancel_ticker().await;
        self.state.lock().await.finish();

        info!("Workout {session_id} cancelled");
        self.emit_state_changed().await;
        Ok(())
    }

    async fn spawn_ticker(&self, session_id: String) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let events = self.events.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval =
                time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            loop {
                interval.tick().await;

                let duration_secs = {
                    let mut guard = state.lock().await;
                    if !guard.is_session(&session_id) {
                        break;
                    }
                    match guard.tick() {
                        Some(duration_secs) => duration_secs,
                        None => break,
                    }
                };

                events.emit(WorkoutEvent::Tick {
                    session_id: session_id.clone(),
                    duration_secs,
                });
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn emit_state_changed(&self) {
        let state = self.get_snapshot().await;
        self.events.emit(WorkoutEvent::StateChanged { state });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::WorkoutTotals;
    use crate::pose::{ChannelPoseSource, SyntheticConfig, SyntheticPoseSource};
    use crate::store::MockRemoteStore;
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct FailingStore;

    #[async_trait]
    impl WorkoutStore for FailingStore {
        async fn save_workout(&self, _workout: &Workout) -> Result<()> {
            Err(anyhow!("backend unavailable"))
        }

        async fn fetch_workouts(&self) -> Result<Vec<Workout>> {
            Ok(Vec::new())
        }

        async fn delete_workout(&self, _workout_id: &str) -> Result<bool> {
            Ok(false)
        }

        async fn totals(&self) -> Result<WorkoutTotals> {
            Ok(WorkoutTotals::default())
        }
    }

    /// Source whose estimator crashes on the first read.
    struct CrashingSource;

    #[async_trait]
    impl PoseSource for CrashingSource {
        async fn next_frame(&mut self) -> Result<Option<crate::pose::PoseFrame>> {
            panic!("pose estimator crashed");
        }
    }

    fn identity() -> WorkoutIdentity {
        WorkoutIdentity {
            owner_id: "owner-7".into(),
            device: "iPhone".into(),
        }
    }

    fn controller_with(
        store: Arc<dyn WorkoutStore>,
    ) -> (WorkoutController, UnboundedReceiver<WorkoutEvent>) {
        let (events, receiver) = EventEmitter::channel();
        let controller =
            WorkoutController::new(store, events, identity(), DetectorConfig::default());
        (controller, receiver)
    }

    fn idle_source() -> Box<dyn PoseSource> {
        // The sender is dropped, so the pose loop ends right away.
        Box::new(ChannelPoseSource::channel(1).1)
    }

    async fn wait_for_source_end(receiver: &mut UnboundedReceiver<WorkoutEvent>) {
        while let Some(event) = receiver.recv().await {
            if matches!(event, WorkoutEvent::PoseSourceEnded { .. }) {
                return;
            }
        }
        panic!("event channel closed before the pose source ended");
    }

    #[tokio::test]
    async fn manual_reps_only_count_during_a_workout() {
        let store = Arc::new(MockRemoteStore::with_latency(Duration::ZERO));
        let (controller, _receiver) = controller_with(store.clone());

        assert_eq!(controller.record_rep().await, None);

        controller.start_workout(idle_source()).await.unwrap();
        assert_eq!(controller.record_rep().await, Some(1));
        assert_eq!(controller.record_rep().await, Some(2));

        let workout = controller.end_workout().await.unwrap();
        assert_eq!(workout.total_reps, 2);
        assert_eq!(workout.user_id, "owner-7");
        assert_eq!(workout.device, "iPhone");
        assert!(workout.ended_at.unwrap() >= workout.started_at);

        assert_eq!(controller.record_rep().await, None);
        assert_eq!(store.fetch_workouts().await.unwrap(), vec![workout]);
    }

    #[tokio::test]
    async fn rejects_double_start_and_idle_end() {
        let store = Arc::new(MockRemoteStore::with_latency(Duration::ZERO));
        let (controller, _receiver) = controller_with(store);

        assert!(controller.end_workout().await.is_err());

        controller.start_workout(idle_source()).await.unwrap();
        assert!(controller.start_workout(idle_source()).await.is_err());
        assert!(controller.get_snapshot().await.is_active());

        controller.end_workout().await.unwrap();
        assert!(controller.end_workout().await.is_err());
    }

    #[tokio::test]
    async fn synthetic_session_is_counted_and_persisted() {
        let store = Arc::new(MockRemoteStore::with_latency(Duration::ZERO));
        let (controller, mut receiver) = controller_with(store.clone());

        let source = SyntheticPoseSource::new(SyntheticConfig {
            reps: Some(6),
            frame_interval: Duration::ZERO,
            ..SyntheticConfig::default()
        })
        .unwrap();
        controller.start_workout(Box::new(source)).await.unwrap();

        let mut rep_totals = Vec::new();
        while let Some(event) = receiver.recv().await {
            match event {
                WorkoutEvent::RepCounted { total_reps, .. } => rep_totals.push(total_reps),
                WorkoutEvent::PoseSourceEnded { .. } => break,
                _ => {}
            }
        }
        assert_eq!(rep_totals, [1, 2, 3, 4, 5, 6]);

        let workout = controller.end_workout().await.unwrap();
        assert_eq!(workout.total_reps, 6);

        let saved = store.fetch_workouts().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].total_reps, 6);
    }

    #[tokio::test]
    async fn persistence_failure_still_ends_the_workout() {
        let (controller, mut receiver) = controller_with(Arc::new(FailingStore));

        controller.start_workout(idle_source()).await.unwrap();
        controller.record_rep().await;
        wait_for_source_end(&mut receiver).await;

        let workout = controller.end_workout().await.unwrap();
        assert_eq!(workout.total_reps, 1);
        assert!(!controller.get_snapshot().await.is_active());

        let mut completed = None;
        while let Ok(event) = receiver.try_recv() {
            if let WorkoutEvent::WorkoutCompleted { persisted, .. } = event {
                completed = Some(persisted);
            }
        }
        assert_eq!(completed, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_duration_once_per_interval() {
        let store = Arc::new(MockRemoteStore::with_latency(Duration::ZERO));
        let (controller, _receiver) = controller_with(store);

        let (_sender, source) = ChannelPoseSource::channel(1);
        controller.start_workout(Box::new(source)).await.unwrap();
        assert_eq!(controller.get_snapshot().await.duration_secs, 0);

        time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(controller.get_snapshot().await.duration_secs, 3);

        let workout = controller.end_workout().await.unwrap();
        assert_eq!(workout.total_duration_seconds, 3);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.get_snapshot().await.duration_secs, 0);
    }

    #[tokio::test]
    async fn cancel_discards_the_session() {
        let store = Arc::new(MockRemoteStore::with_latency(Duration::ZERO));
        let (controller, _receiver) = controller_with(store.clone());

        controller.cancel_workout().await.unwrap();

        let (_sender, source) = ChannelPoseSource::channel(1);
        controller.start_workout(Box::new(source)).await.unwrap();
        controller.record_rep().await;
        controller.cancel_workout().await.unwrap();

        assert_eq!(controller.get_snapshot().await, WorkoutState::default());
        assert!(store.fetch_workouts().await.unwrap().is_empty());

        controller.start_workout(idle_source()).await.unwrap();
        assert_eq!(controller.get_snapshot().await.reps, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_completes_when_pose_task_crashed() {
        let store = Arc::new(MockRemoteStore::with_latency(Duration::ZERO));
        let (controller, _receiver) = controller_with(store.clone());

        controller.start_workout(Box::new(CrashingSource)).await.unwrap();
        controller.record_rep().await;
        controller.cancel_workout().await.unwrap();
        assert_eq!(controller.get_snapshot().await, WorkoutState::default());

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(controller.get_snapshot().await.duration_secs, 0);
        assert!(store.fetch_workouts().await.unwrap().is_empty());

        controller.start_workout(idle_source()).await.unwrap();
        assert!(controller.get_snapshot().await.is_active());
    }

    #[tokio::test]
    async fn detector_settings_are_locked_during_a_workout() {
        let store = Arc::new(MockRemoteStore::with_latency(Duration::ZERO));
        let (controller, _receiver) = controller_with(store);
        let tuned = DetectorConfig {
            down_threshold: 0.08,
            ..DetectorConfig::default()
        };

        controller.set_detector_config(tuned).await.unwrap();
        let (_sender, source) = ChannelPoseSource::channel(1);
        controller.start_workout(Box::new(source)).await.unwrap();
        assert!(controller.set_detector_config(tuned).await.is_err());
        controller.end_workout().await.unwrap();
        assert!(controller.set_detector_config(tuned).await.is_ok());
    }
}
