pub mod workout;

pub use workout::{Workout, WorkoutTotals};
