use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    detection::RepDetector,
    workout::{apply_rep, EventEmitter, WorkoutEvent, WorkoutState},
};

use super::joints::JointObservation;
use super::source::PoseSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

const MAX_CONSECUTIVE_SOURCE_ERRORS: u32 = 5;

/// Drives `detector` with every frame `source` yields until the source ends
/// or `cancel_token` fires. Rep events are applied to `state` and emitted
/// before the next frame is read, so they keep frame order.
///
/// Returns the detector so the next session can reuse it.
pub async fn pose_loop(
    session_id: String,
    mut source: Box<dyn PoseSource>,
    mut detector: RepDetector,
    state: Arc<Mutex<WorkoutState>>,
    events: EventEmitter,
    cancel_token: CancellationToken,
) -> RepDetector {
    let min_confidence = detector.config().min_confidence;
    let mut consecutive_errors: u32 = 0;
    let mut frames: u64 = 0;
    let mut inconclusive: u64 = 0;
    let mut reps: u32 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("pose loop shutting down for session {}", session_id);
                break;
            }
            next = source.next_frame() => next,
        };

        match next {
            Ok(Some(frame)) => {
                consecutive_errors = 0;
                frames += 1;

                let observation = JointObservation::from_frame(&frame, min_confidence);
                if detector.classify(&observation).is_none() {
                    inconclusive += 1;
                }

                if detector.process(&observation).is_some() {
                    reps += 1;
                    if apply_rep(&state, &events, Some(&session_id)).await.is_none() {
                        log_warn!(
                            "rep detected after session {} stopped counting; ignoring",
                            session_id
                        );
                    }
                }
            }
            Ok(None) => {
                log_info!("pose source ended for session {}", session_id);
                events.emit(WorkoutEvent::PoseSourceEnded {
                    session_id: session_id.clone(),
                });
                break;
            }
            Err(err) => {
                consecutive_errors += 1;
                log_warn!(
                    "skipping unreadable pose frame for session {} ({}/{}): {err:#}",
                    session_id,
                    consecutive_errors,
                    MAX_CONSECUTIVE_SOURCE_ERRORS
                );

                if consecutive_errors >= MAX_CONSECUTIVE_SOURCE_ERRORS {
                    log_error!(
                        "pose source failed {} times in a row; stopping detection for session {}",
                        consecutive_errors,
                        session_id
                    );
                    events.emit(WorkoutEvent::PoseSourceEnded {
                        session_id: session_id.clone(),
                    });
                    break;
                }
            }
        }
    }

    log_info!(
        "pose loop for session {} processed {} frames ({} inconclusive), {} reps",
        session_id,
        frames,
        inconclusive,
        reps
    );

    detector
}
