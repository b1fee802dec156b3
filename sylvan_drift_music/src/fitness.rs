// Fitness evaluation for melodic patterns.
//
// Scores a single 16-step pattern as a weighted sum of four layers:
//
// Layer 1 (Downbeats): notes on steps 0, 4, 8, 12 earn a reward scaled by
//   the stability of their degree in the active mood's scale
//   (root/fifth/octave highest, thirds and the fourth moderate, anything
//   else nothing).
// Layer 2 (Melodic motion): each pair of consecutive sounding notes (rests
//   skipped) earns a reward for a step or small leap (<= 4 semitones) and a
//   penalty for a large leap (> 7 semitones). The exact octave is exempt.
// Layer 3 (Density): a note count strictly between 25% and 75% of the
//   measure is rewarded, anything else penalized.
// Layer 4 (Syncopation): small bonus per note on the designated off-beat
//   steps (2, 6, 10, 14).
//
// The total floors at zero so archive thresholds compare non-negative
// values.
//
// Consumed by evolution.rs when an outgoing pattern is archived.

use crate::pattern::Pattern;
use crate::scale::{Mood, Stability};
use crate::types::STEPS;
use serde::{Deserialize, Serialize};

/// Steps that carry the pulse of the measure.
pub const DOWNBEATS: [usize; 4] = [0, 4, 8, 12];

/// Off-beat steps that earn the syncopation bonus.
pub const OFFBEATS: [usize; 4] = [2, 6, 10, 14];

/// Weights for the fitness layers. Tunable parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FitnessWeights {
    // Layer 1: downbeats
    pub downbeat_strong: f64,
    pub downbeat_moderate: f64,

    // Layer 2: melodic motion
    pub small_interval_reward: f64,
    pub large_leap_penalty: f64,
    /// Largest interval (semitones) that still counts as "small".
    pub small_interval_max: u8,
    /// Intervals strictly above this count as large leaps.
    pub large_leap_min: u8,

    // Layer 3: density
    pub density_reward: f64,
    pub density_penalty: f64,

    // Layer 4: syncopation
    pub offbeat_bonus: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        FitnessWeights {
            downbeat_strong: 10.0,
            downbeat_moderate: 5.0,

            small_interval_reward: 3.0,
            large_leap_penalty: -5.0,
            small_interval_max: 4,
            large_leap_min: 7,

            density_reward: 10.0,
            density_penalty: -10.0,

            offbeat_bonus: 2.0,
        }
    }
}

/// Full fitness of a pattern, floored at zero.
pub fn evaluate(pattern: &Pattern, mood: Mood, weights: &FitnessWeights) -> f64 {
    let total = score_downbeats(pattern, mood, weights)
        + score_motion(pattern, weights)
        + score_density(pattern, weights)
        + score_offbeats(pattern, weights);
    total.max(0.0)
}

// ── Layer 1: Downbeats ──

fn score_downbeats(pattern: &Pattern, mood: Mood, weights: &FitnessWeights) -> f64 {
    DOWNBEATS
        .iter()
        .filter_map(|&step| pattern.steps[step])
        .map(|pitch| match mood.stability(pitch) {
            Stability::Strong => weights.downbeat_strong,
            Stability::Moderate => weights.downbeat_moderate,
            Stability::Unstable => 0.0,
        })
        .sum()
}

// ── Layer 2: Melodic motion ──

fn score_motion(pattern: &Pattern, weights: &FitnessWeights) -> f64 {
    let notes: Vec<i8> = pattern.steps.iter().flatten().copied().collect();
    notes
        .windows(2)
        .map(|w| {
            let interval = (w[1] as i16 - w[0] as i16).unsigned_abs();
            if interval <= weights.small_interval_max as u16 {
                weights.small_interval_reward
            } else if interval > weights.large_leap_min as u16 && interval != 12 {
                weights.large_leap_penalty
            } else {
                0.0
            }
        })
        .sum()
}

// ── Layer 3: Density ──

fn score_density(pattern: &Pattern, weights: &FitnessWeights) -> f64 {
    let count = pattern.note_count();
    let low = STEPS / 4;
    let high = STEPS * 3 / 4;
    if count > low && count < high {
        weights.density_reward
    } else {
        weights.density_penalty
    }
}

// ── Layer 4: Syncopation ──

fn score_offbeats(pattern: &Pattern, weights: &FitnessWeights) -> f64 {
    OFFBEATS
        .iter()
        .filter(|&&step| pattern.steps[step].is_some())
        .count() as f64
        * weights.offbeat_bonus
}
