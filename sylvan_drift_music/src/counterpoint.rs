// Counterpoint line derived from the melody.
//
// The counter-voice is never evolved on its own. It is recomputed from the
// current melody whenever the melody changes, and it is a pure function of
// (melody, mood, config): its randomness comes from a `GameRng` derived from
// the melody's id, so the same pattern always yields the same line.
//
// Rules per step:
// - Melody sounds: answer only rarely (~10%) so the counter-voice doesn't
//   mask the lead, a third or fifth above by scale position, an octave up.
//   Pitches outside the scale fall back to a fixed fifth (+7) transposition.
// - Melody rests: fill the gap most of the time (~70%), preferring stable
//   degrees (root, fifth, octave when the scale has them).

use crate::pattern::Pattern;
use crate::scale::Mood;
use crate::types::{PatternId, STEPS};
use serde::{Deserialize, Serialize};
use sylvan_drift_prng::GameRng;

/// Salt mixed into the melody id so the counterpoint stream differs from
/// any other stream keyed on the same id.
const COUNTERPOINT_SALT: u64 = 0xc0_47e2;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CounterpointConfig {
    /// Probability of answering a sounding melody note.
    pub answer_probability: f64,
    /// Probability of filling a melody rest.
    pub fill_probability: f64,
    /// Semitone transposition used when the melody note is out of scale.
    pub fallback_interval: i8,
    /// Velocity of counter-voice notes, relative to full scale.
    pub velocity: f32,
}

impl Default for CounterpointConfig {
    fn default() -> Self {
        CounterpointConfig {
            answer_probability: 0.1,
            fill_probability: 0.7,
            fallback_interval: 7,
            velocity: 0.55,
        }
    }
}

/// The derived counter-voice for one melody.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterLine {
    /// The melody this line was derived from.
    pub source: PatternId,
    pub steps: [Option<i8>; STEPS],
    pub velocities: [f32; STEPS],
}

impl CounterLine {
    pub fn note_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_some()).count()
    }
}

/// Derive the counter-voice for `melody` in `mood`.
pub fn generate(melody: &Pattern, mood: Mood, config: &CounterpointConfig) -> CounterLine {
    let mut rng = GameRng::derive(melody.id.seed(), COUNTERPOINT_SALT);
    let mut steps = [None; STEPS];
    let mut velocities = [0.0; STEPS];

    for step in 0..STEPS {
        let note = match melody.steps[step] {
            Some(pitch) => {
                if rng.random_bool(config.answer_probability) {
                    Some(answer(pitch, mood, config, &mut rng))
                } else {
                    None
                }
            }
            None => {
                if rng.random_bool(config.fill_probability) {
                    Some(fill(mood, &mut rng))
                } else {
                    None
                }
            }
        };
        if note.is_some() {
            steps[step] = note;
            velocities[step] = config.velocity;
        }
    }

    CounterLine {
        source: melody.id,
        steps,
        velocities,
    }
}

/// Third or fifth above `pitch` by scale position, voiced an octave up.
fn answer(pitch: i8, mood: Mood, config: &CounterpointConfig, rng: &mut GameRng) -> i8 {
    let interval_above = match mood.degree_index(pitch) {
        Some(idx) => {
            let steps = if rng.random_bool(0.5) { 2 } else { 4 };
            // degree_above works in the octave of degrees(); re-add any
            // octave the melody note sits in.
            let base = mood.degrees()[idx];
            mood.degree_above(idx, steps) + (pitch - base)
        }
        None => pitch + config.fallback_interval,
    };
    interval_above.saturating_add(12)
}

/// A stable degree for filling a melody rest: root most often, then the
/// fifth if the scale has one, then the octave.
fn fill(mood: Mood, rng: &mut GameRng) -> i8 {
    let candidates: [(i8, f64); 3] = [(0, 0.5), (7, 0.3), (12, 0.2)];
    let weights: Vec<f64> = candidates
        .iter()
        .map(|&(pitch, w)| if mood.contains(pitch) { w } else { 0.0 })
        .collect();
    rng.weighted_index(&weights)
        .map(|i| candidates[i].0)
        .unwrap_or(0)
}
