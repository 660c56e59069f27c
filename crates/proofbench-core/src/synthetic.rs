//! Synthetic phase scoring for smoke runs without a completion service.
//!
//! Each canonical phase draws one score from a fixed Gaussian. The random
//! source is always passed in explicitly: a seeded `StdRng` makes a run
//! reproducible, an entropy-seeded one makes it vary.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::task::Phase;
use crate::domain::trace::{retries_for_score, round2, PhaseEntry, PhaseStatus, PASS_THRESHOLD};

/// Mean and standard deviation of a phase's synthetic score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseDistribution {
    pub mean: f64,
    pub stdev: f64,
}

impl PhaseDistribution {
    pub fn for_phase(phase: Phase) -> Self {
        let (mean, stdev) = match phase {
            Phase::WarmUp => (85.0, 5.0),
            Phase::Strength => (78.0, 8.0),
            Phase::Endurance => (72.0, 10.0),
            Phase::Competition => (80.0, 7.0),
        };
        Self { mean, stdev }
    }
}

/// Random source for a synthetic run.
pub fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Standard normal sample (Box–Muller).
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - U(0,1] keeps ln() finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// One synthetic score: Gaussian draw clamped to `[0, 100]`, two decimals.
pub fn synthetic_score<R: Rng + ?Sized>(rng: &mut R, dist: PhaseDistribution) -> f64 {
    let raw = dist.mean + dist.stdev * standard_normal(rng);
    round2(raw.clamp(0.0, 100.0))
}

/// One phase entry per canonical phase, in phase order.
///
/// A synthetic phase has a single sample, so its status is pass iff the
/// drawn score reaches the task pass threshold.
pub fn synthetic_phase_entries<R: Rng + ?Sized>(
    rng: &mut R,
    profile: &str,
    timestamp: DateTime<Utc>,
) -> Vec<PhaseEntry> {
    Phase::ALL
        .iter()
        .map(|&phase| {
            let dist = PhaseDistribution::for_phase(phase);
            let score = synthetic_score(rng, dist);
            let status = if score >= PASS_THRESHOLD {
                PhaseStatus::Pass
            } else {
                PhaseStatus::Fail
            };
            PhaseEntry {
                run_id: PhaseEntry::make_run_id(profile, &timestamp, phase),
                profile: profile.to_string(),
                phase,
                timestamp,
                status,
                score,
                retries: retries_for_score(score),
                trace: format!(
                    "synthetic: samples=1 mean={:.1} stdev={:.1}",
                    dist.mean, dist.stdev
                ),
                ..PhaseEntry::default()
            }
        })
        .collect()
}
