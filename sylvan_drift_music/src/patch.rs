// Synth patch: the timbral bundle handed to the renderer.
//
// The engine never interprets a patch; it rolls, nudges and forwards it.
// Updates from outside arrive as a closed set of `PatchField` values, so
// every writable field is spelled out and `apply` is an exhaustive match
// that clamps each value into its legal range.

use serde::{Deserialize, Serialize};
use sylvan_drift_prng::GameRng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Triangle,
        Waveform::Sawtooth,
        Waveform::Square,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthMode {
    Subtractive,
    Fm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterClass {
    Lowpass,
    Bandpass,
    Highpass,
}

/// Discrete FM carrier:modulator ratios a roll may choose.
pub const FM_RATIOS: [f32; 6] = [0.5, 1.0, 1.5, 2.0, 3.0, 3.5];

/// Discrete FM modulation depths (modulator amplitude in Hz).
pub const FM_DEPTHS: [f32; 4] = [50.0, 100.0, 200.0, 400.0];

/// ADSR envelope. Times in seconds, sustain as a level in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

/// Bounds for envelope rolls.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatchBounds {
    pub attack: (f32, f32),
    pub decay: (f32, f32),
    pub sustain: (f32, f32),
    pub release: (f32, f32),
    /// Largest detune, in cents.
    pub max_detune: f32,
    /// Probability a roll picks FM synthesis.
    pub fm_probability: f64,
    /// Probability a roll picks a lowpass filter.
    pub lowpass_probability: f64,
}

impl Default for PatchBounds {
    fn default() -> Self {
        PatchBounds {
            attack: (0.005, 1.5),
            decay: (0.05, 1.0),
            sustain: (0.2, 0.9),
            release: (0.1, 3.0),
            max_detune: 25.0,
            fm_probability: 0.4,
            lowpass_probability: 0.75,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SynthPatch {
    pub envelope: Envelope,
    pub waveform: Waveform,
    pub mode: SynthMode,
    /// Detune between the two oscillators, in cents.
    pub detune: f32,
    pub fm_ratio: f32,
    pub fm_depth: f32,
    pub filter: FilterClass,
}

impl Default for SynthPatch {
    fn default() -> Self {
        SynthPatch {
            envelope: Envelope {
                attack: 0.05,
                decay: 0.3,
                sustain: 0.6,
                release: 0.8,
            },
            waveform: Waveform::Triangle,
            mode: SynthMode::Subtractive,
            detune: 6.0,
            fm_ratio: 2.0,
            fm_depth: 100.0,
            filter: FilterClass::Lowpass,
        }
    }
}

fn roll(rng: &mut GameRng, (lo, hi): (f32, f32)) -> f32 {
    if lo < hi { rng.range_f32(lo, hi) } else { lo }
}

/// One writable patch field with its typed value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PatchField {
    Attack(f32),
    Decay(f32),
    Sustain(f32),
    Release(f32),
    Waveform(Waveform),
    Mode(SynthMode),
    Detune(f32),
    FmRatio(f32),
    FmDepth(f32),
    Filter(FilterClass),
}

impl SynthPatch {
    /// Roll a complete random patch within `bounds`.
    pub fn random(bounds: &PatchBounds, rng: &mut GameRng) -> Self {
        let mode = if rng.random_bool(bounds.fm_probability) {
            SynthMode::Fm
        } else {
            SynthMode::Subtractive
        };
        let filter = if rng.random_bool(bounds.lowpass_probability) {
            FilterClass::Lowpass
        } else if rng.random_bool(0.5) {
            FilterClass::Bandpass
        } else {
            FilterClass::Highpass
        };
        SynthPatch {
            envelope: Envelope {
                attack: roll(rng, bounds.attack),
                decay: roll(rng, bounds.decay),
                sustain: roll(rng, bounds.sustain),
                release: roll(rng, bounds.release),
            },
            waveform: rng.pick(&Waveform::ALL).copied().unwrap_or(Waveform::Sine),
            mode,
            detune: roll(rng, (0.0, bounds.max_detune)),
            fm_ratio: rng.pick(&FM_RATIOS).copied().unwrap_or(1.0),
            fm_depth: rng.pick(&FM_DEPTHS).copied().unwrap_or(100.0),
            filter,
        }
    }

    /// Write one field, clamping numeric values into range.
    pub fn apply(&mut self, field: PatchField) {
        match field {
            PatchField::Attack(v) => self.envelope.attack = v.clamp(0.001, 10.0),
            PatchField::Decay(v) => self.envelope.decay = v.clamp(0.001, 10.0),
            PatchField::Sustain(v) => self.envelope.sustain = v.clamp(0.0, 1.0),
            PatchField::Release(v) => self.envelope.release = v.clamp(0.001, 20.0),
            PatchField::Waveform(w) => self.waveform = w,
            PatchField::Mode(m) => self.mode = m,
            PatchField::Detune(v) => self.detune = v.clamp(0.0, 100.0),
            PatchField::FmRatio(v) => self.fm_ratio = v.clamp(0.125, 16.0),
            PatchField::FmDepth(v) => self.fm_depth = v.clamp(0.0, 2000.0),
            PatchField::Filter(f) => self.filter = f,
        }
    }
}
