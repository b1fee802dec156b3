// Bio-feedback coupler.
//
// Turns a `BioSnapshot` from the external agent simulation into a set of
// parameter nudges. `plan()` is a pure decision step: it reads the current
// engine parameters through `FeedbackContext` and returns `FeedbackEffects`,
// which the engine then applies. Nothing happens unless autonomous evolution
// is on, and each effect is additionally gated by its domain lock:
//
// - tempo:   eases 1% per snapshot toward base ± 5 BPM (energy 0 → -5,
//            energy 100 → +5). Gated by autonomy only.
// - cutoff:  eases 5% per snapshot toward 0.2–0.8 by energy (timbre lock).
// - rhythm:  population above 80 outside PEAK re-rolls the Euclidean
//            genome (rhythm lock).
// - mood:    with p = 0.01, synergy above 0.7 nudges toward Euphoric and
//            below 0.3 toward Dark (harmony lock).
// - timbre:  with p = 0.05, a patch field nudge chosen by the dominant
//            agent type (timbre lock).
//
// Random draws happen only for effects whose gates are open, so a locked
// domain never consumes randomness.

use crate::config::FeedbackConfig;
use crate::types::{AgentType, BioSnapshot, Domain, EvolutionLocks, MacroPhase};
use sylvan_drift_music::patch::{PatchField, SynthMode, Waveform};
use sylvan_drift_music::scale::Mood;
use sylvan_drift_prng::GameRng;

/// Engine parameters the coupler reads.
#[derive(Clone, Copy, Debug)]
pub struct FeedbackContext {
    pub autonomous: bool,
    pub locks: EvolutionLocks,
    pub phase: MacroPhase,
    pub base_tempo: f64,
    pub tempo: f64,
    pub cutoff: f32,
    pub mood: Mood,
}

/// Parameter changes requested by one snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeedbackEffects {
    pub tempo: Option<f64>,
    pub cutoff: Option<f32>,
    pub regenerate_rhythm: bool,
    pub mood: Option<Mood>,
    pub timbre: Option<PatchField>,
}

impl FeedbackEffects {
    pub fn is_empty(&self) -> bool {
        *self == FeedbackEffects::default()
    }
}

/// The patch nudge associated with a dominant agent type.
pub fn timbre_for(agent: AgentType) -> PatchField {
    match agent {
        AgentType::Forager => PatchField::Waveform(Waveform::Triangle),
        AgentType::Predator => PatchField::Waveform(Waveform::Sawtooth),
        AgentType::Symbiont => PatchField::Mode(SynthMode::Fm),
        AgentType::Wanderer => PatchField::Waveform(Waveform::Sine),
    }
}

pub fn plan(
    config: &FeedbackConfig,
    snapshot: &BioSnapshot,
    ctx: &FeedbackContext,
    rng: &mut GameRng,
) -> FeedbackEffects {
    let mut effects = FeedbackEffects::default();
    if !ctx.autonomous {
        return effects;
    }
    let snapshot = snapshot.sanitized();
    let energy = snapshot.average_energy / 100.0;

    let tempo_target = ctx.base_tempo + (energy * 2.0 - 1.0) * config.tempo_span;
    effects.tempo = Some(ctx.tempo + (tempo_target - ctx.tempo) * config.tempo_ease);

    if !ctx.locks.is_locked(Domain::Timbre) {
        let (lo, hi) = config.cutoff_range;
        let target = lo + (hi - lo) * energy as f32;
        effects.cutoff = Some(ctx.cutoff + (target - ctx.cutoff) * config.cutoff_ease);
    }

    if snapshot.population > config.population_threshold
        && ctx.phase != MacroPhase::Peak
        && !ctx.locks.is_locked(Domain::Rhythm)
    {
        effects.regenerate_rhythm = true;
    }

    if !ctx.locks.is_locked(Domain::Harmony) && rng.random_bool(config.mood_nudge_probability) {
        let nudged = if snapshot.synergy > config.synergy_high {
            Some(Mood::Euphoric)
        } else if snapshot.synergy < config.synergy_low {
            Some(Mood::Dark)
        } else {
            None
        };
        effects.mood = nudged.filter(|&m| m != ctx.mood);
    }

    if !ctx.locks.is_locked(Domain::Timbre) && rng.random_bool(config.timbre_nudge_probability) {
        effects.timbre = Some(timbre_for(snapshot.dominant_type));
    }

    effects
}
