use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::detection::{DetectorConfig, RepDetector};
use crate::workout::{EventEmitter, WorkoutState};

use super::loop_worker::pose_loop;
use super::source::PoseSource;

/// Owns the rep detector between sessions and the pose loop task during one.
pub struct PoseController {
    config: DetectorConfig,
    detector: Option<RepDetector>,
    handle: Option<JoinHandle<RepDetector>>,
    cancel_token: Option<CancellationToken>,
}

impl PoseController {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            detector: Some(RepDetector::new(config)),
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn set_config(&mut self, config: DetectorConfig) -> Result<()> {
        config.validate()?;
        if self.is_running() {
            bail!("cannot change detector settings during a workout");
        }
        self.config = config;
        self.detector = Some(RepDetector::new(config));
        Ok(())
    }

    pub fn start(
        &mut self,
        session_id: String,
        source: Box<dyn PoseSource>,
        state: Arc<Mutex<WorkoutState>>,
        events: EventEmitter,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("pose detection already active");
        }

        let mut detector = self
            .detector
            .take()
            .unwrap_or_else(|| RepDetector::new(self.config));
        detector.reset();

        info!("Starting pose detection for session {session_id}");

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(pose_loop(
            session_id,
            source,
            detector,
            state,
            events,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        match handle.await.context("pose loop task failed to join") {
            Ok(detector) => {
                self.detector = Some(detector);
                Ok(())
            }
            Err(err) => {
                warn!("Discarding rep detector after failed pose loop: {err:#}");
                Err(err)
            }
        }
    }
}
