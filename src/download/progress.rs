use std::sync::Mutex;

use crate::storage::traits::ProgressCallback;

/// Bytes between two progress reports
pub const PROGRESS_GRANULARITY: u64 = 64 * 1024;

#[derive(Debug, Default)]
struct ProgressState {
    transferred: u64,
    last_emitted_at: u64,
    last_fraction: f64,
    finished: bool,
}

/// Turns byte counts into fraction reports
///
/// Reports are monotonic, at most one per [`PROGRESS_GRANULARITY`] bytes, and
/// strictly below 1.0 until [`finish`](Self::finish) emits the single 1.0.
pub struct ProgressTracker {
    callback: Option<ProgressCallback>,
    total_size: Option<u64>,
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>, total_size: Option<u64>) -> Self {
        Self {
            callback,
            total_size: total_size.filter(|&t| t > 0),
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Records `bytes` more transferred
    pub fn advance(&self, bytes: usize) {
        let Some(ref callback) = self.callback else {
            return;
        };
        let Some(total_size) = self.total_size else {
            return;
        };

        let fraction = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.finished {
                return;
            }
            state.transferred += bytes as u64;
            if !Self::should_emit_progress(state.transferred, state.last_emitted_at) {
                return;
            }
            let fraction = Self::calculate_progress(state.transferred, total_size);
            if fraction >= 1.0 || fraction <= state.last_fraction {
                return;
            }
            state.last_emitted_at = state.transferred;
            state.last_fraction = fraction;
            fraction
        };

        callback(fraction);
    }

    /// Emits the terminal 1.0, once
    pub fn finish(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.finished {
                return;
            }
            state.finished = true;
            state.last_fraction = 1.0;
        }
        if let Some(ref callback) = self.callback {
            callback(1.0);
        }
    }

    pub fn transferred(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .transferred
    }

    fn should_emit_progress(transferred: u64, last_emitted_at: u64) -> bool {
        transferred - last_emitted_at >= PROGRESS_GRANULARITY
    }

    fn calculate_progress(transferred: u64, total_size: u64) -> f64 {
        (transferred as f64 / total_size as f64).clamp(0.0, 1.0)
    }
}
