pub mod controller;
pub mod events;
pub mod state;

pub(crate) use controller::apply_rep;
pub use controller::{WorkoutController, WorkoutIdentity};
pub use events::{EventEmitter, WorkoutEvent};
pub use state::{WorkoutState, WorkoutStatus};
