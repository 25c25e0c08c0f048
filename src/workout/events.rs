use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::db::models::Workout;

use super::state::WorkoutState;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkoutEvent {
    StateChanged {
        state: WorkoutState,
    },
    Tick {
        session_id: String,
        duration_secs: u64,
    },
    RepCounted {
        session_id: String,
        total_reps: u32,
    },
    PoseSourceEnded {
        session_id: String,
    },
    WorkoutCompleted {
        workout: Workout,
        persisted: bool,
    },
}

impl WorkoutEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkoutEvent::StateChanged { .. } => "workout-state-changed",
            WorkoutEvent::Tick { .. } => "workout-tick",
            WorkoutEvent::RepCounted { .. } => "rep-counted",
            WorkoutEvent::PoseSourceEnded { .. } => "pose-source-ended",
            WorkoutEvent::WorkoutCompleted { .. } => "workout-completed",
        }
    }
}

/// Single ordered channel from the session to whoever renders it.
#[derive(Clone)]
pub struct EventEmitter {
    sender: mpsc::UnboundedSender<WorkoutEvent>,
}

impl EventEmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkoutEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: WorkoutEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            debug!("Dropped {name} event: no listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag_and_camel_case_fields() {
        let event = WorkoutEvent::RepCounted {
            session_id: "s1".into(),
            total_reps: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "repCounted", "sessionId": "s1", "totalReps": 3})
        );
    }

    #[test]
    fn emitting_without_listener_is_harmless() {
        let (emitter, receiver) = EventEmitter::channel();
        drop(receiver);
        emitter.emit(WorkoutEvent::PoseSourceEnded {
            session_id: "s1".into(),
        });
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (emitter, mut receiver) = EventEmitter::channel();
        for total_reps in 1..=3 {
            emitter.emit(WorkoutEvent::RepCounted {
                session_id: "s1".into(),
                total_reps,
            });
        }

        for expected in 1..=3 {
            match receiver.recv().await {
                Some(WorkoutEvent::RepCounted { total_reps, .. }) => {
                    assert_eq!(total_reps, expected)
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }
}
