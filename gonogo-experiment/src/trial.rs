use gonogo_core::{TrialSpec, TrialState};

/// A trial in flight: its descriptor plus the timing recorded so far.
pub struct Trial<T> {
    pub id: usize,
    pub spec: TrialSpec,
    pub durations: TrialDurations,
    pub timestamps: TrialTimestamps<T>,
    pub state: TrialState,
}

#[derive(Debug, Clone, Copy)]
pub struct TrialDurations {
    pub fixation_ms: u64,
    pub response_window_ms: u64,
    pub feedback_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TrialTimestamps<T> {
    pub start: T,
    pub stimulus_start: Option<T>,
    pub response: Option<T>,
    pub feedback_start: Option<T>,
}
