// Euclidean percussion genomes.
//
// `euclidean()` spreads `pulses` accents as evenly as possible over `steps`
// slots with the accumulator (Bresenham-style) construction: add `pulses` to
// a bucket every step, and whenever the bucket reaches `steps`, subtract
// `steps` and accent that slot. `generate()` then rotates the whole sequence
// by a uniformly random amount so the downbeat isn't always the same.
//
// A `RhythmGenome` holds two independent voices: a primary accent voice
// (4–11 pulses) and a sparser secondary fill voice (2–5 pulses). The rhythm
// lock is enforced by the caller (harmony.rs / the engine); this module only
// builds sequences.

use crate::types::STEPS;
use serde::{Deserialize, Serialize};
use sylvan_drift_prng::GameRng;

/// Pulse ranges (inclusive) for the two percussion voices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RhythmConfig {
    pub primary_pulses: (u32, u32),
    pub secondary_pulses: (u32, u32),
}

impl Default for RhythmConfig {
    fn default() -> Self {
        RhythmConfig {
            primary_pulses: (4, 11),
            secondary_pulses: (2, 5),
        }
    }
}

/// Two-voice percussion genome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmGenome {
    pub primary: [bool; STEPS],
    pub secondary: [bool; STEPS],
}

impl Default for RhythmGenome {
    /// Four-on-the-floor primary, backbeat secondary.
    fn default() -> Self {
        let mut primary = [false; STEPS];
        let mut secondary = [false; STEPS];
        for step in (0..STEPS).step_by(4) {
            primary[step] = true;
        }
        secondary[4] = true;
        secondary[12] = true;
        Self { primary, secondary }
    }
}

/// Unrotated Euclidean sequence. `pulses` is clamped to `steps`.
pub fn euclidean(steps: usize, pulses: usize) -> Vec<bool> {
    let pulses = pulses.min(steps);
    let mut out = vec![false; steps];
    let mut bucket = 0;
    for slot in out.iter_mut() {
        bucket += pulses;
        if bucket >= steps {
            bucket -= steps;
            *slot = true;
        }
    }
    out
}

/// Rotate `pattern` right by `amount` slots.
pub fn rotate(pattern: &[bool], amount: usize) -> Vec<bool> {
    let mut out = pattern.to_vec();
    if !out.is_empty() {
        let len = out.len();
        out.rotate_right(amount % len);
    }
    out
}

/// Euclidean sequence with a uniformly random rotation.
pub fn generate(steps: usize, pulses: usize, rng: &mut GameRng) -> Vec<bool> {
    let base = euclidean(steps, pulses);
    if steps == 0 {
        return base;
    }
    let amount = rng.range_usize(0, steps);
    rotate(&base, amount)
}

fn to_measure(v: &[bool]) -> [bool; STEPS] {
    let mut out = [false; STEPS];
    for (dst, src) in out.iter_mut().zip(v.iter()) {
        *dst = *src;
    }
    out
}

/// Roll a fresh two-voice genome.
pub fn generate_genome(config: &RhythmConfig, rng: &mut GameRng) -> RhythmGenome {
    let (lo, hi) = config.primary_pulses;
    let primary_pulses = rng.range_u32_inclusive(lo, hi.max(lo)) as usize;
    let (lo, hi) = config.secondary_pulses;
    let secondary_pulses = rng.range_u32_inclusive(lo, hi.max(lo)) as usize;
    let genome = RhythmGenome {
        primary: to_measure(&generate(STEPS, primary_pulses, rng)),
        secondary: to_measure(&generate(STEPS, secondary_pulses, rng)),
    };
    tracing::debug!(primary_pulses, secondary_pulses, "rolled rhythm genome");
    genome
}
