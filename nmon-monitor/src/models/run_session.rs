//! Sampling run state machine
//!
//! A run progresses through:
//! IDLE → CAPTURING → CONVERTING → MEASURING → DECIDING →
//! (ACCUMULATING → CAPTURING | FINALIZE_PASS | FINALIZE_FAIL) → DISPATCHED → IDLE

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::models::{MeasurementRecord, Sample};

/// Sampling run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Between runs
    Idle,
    /// External capture utility recording one sample
    Capturing,
    /// Raw capture → PCM WAV
    Converting,
    /// Statistics and classification
    Measuring,
    /// Passing-label check
    Deciding,
    /// Merge sample into the concatenated clip
    Accumulating,
    /// Archive the clip of a qualifying run
    FinalizePass,
    /// Drop the clip of a disqualified run
    FinalizeFail,
    /// Records persisted, telemetry sent
    Dispatched,
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Flag file says off; nothing was sampled
    Disabled,
    /// Every configured sample passed
    Qualified,
    /// A sample fell outside the passing label set
    Disqualified,
    /// A fatal-to-run failure stopped sampling
    Aborted(String),
    /// External stop request honored at a phase boundary
    Cancelled,
}

/// Per-run accumulated state
#[derive(Debug, Clone)]
pub struct RunAccumulator {
    pub run_id: Uuid,
    pub state: RunState,
    /// Samples processed so far, in capture order
    pub samples: Vec<Sample>,
    /// False once any sample disqualifies the run
    pub qualifying: bool,
    /// In-progress concatenated clip
    pub artifact: Option<PathBuf>,
    /// Artifacts successfully handed to the archive
    pub uploaded: Vec<PathBuf>,
    pub transitions: Vec<StateTransition>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunAccumulator {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Idle,
            samples: Vec::new(),
            qualifying: true,
            artifact: None,
            uploaded: Vec::new(),
            transitions: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: RunState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state == RunState::Dispatched {
            self.ended_at = Some(transition.transitioned_at);
        }

        self.transitions.push(transition.clone());
        transition
    }

    pub fn push_sample(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn disqualify(&mut self) {
        self.qualifying = false;
    }

    /// Mean loudness over collected samples, None when no samples exist
    pub fn mean_loudness(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(|s| s.features.loudness_db).sum();
        Some(total / self.samples.len() as f64)
    }

    pub fn records(&self) -> Vec<MeasurementRecord> {
        self.samples.iter().map(Sample::to_record).collect()
    }

    /// Visited states in order, starting from the initial state
    pub fn state_path(&self) -> Vec<RunState> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        path.push(
            self.transitions
                .first()
                .map(|t| t.old_state)
                .unwrap_or(self.state),
        );
        path.extend(self.transitions.iter().map(|t| t.new_state));
        path
    }
}

impl Default for RunAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
