pub mod progress;

pub use progress::{ProgressTracker, PROGRESS_GRANULARITY};
