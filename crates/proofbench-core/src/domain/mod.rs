//! Domain models for proofbench.
//!
//! - `Task`, `Suite`, `Phase`, `ScoringKind`: benchmark input
//! - `TaskTrace`, `PhaseEntry`, `ResultRecord`: benchmark output rows
//! - `BenchError`: error taxonomy

pub mod digest;
pub mod error;
pub mod task;
pub mod trace;

pub use error::{BenchError, Result};
pub use task::{Phase, ScoringKind, Suite, Task};
pub use trace::{
    retries_for_score, round2, run_key, run_stamp, PhaseEntry, PhaseStatus, ResultRecord,
    TaskTrace, PASS_THRESHOLD, PHASE_PASS_RATE,
};
