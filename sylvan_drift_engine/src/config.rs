// Data-driven engine configuration.
//
// Every tunable lives in `EngineConfig`, a serde tree that nests the
// generator configs from `sylvan_drift_music` next to the engine's own
// scheduler, macro-phase and feedback parameters. `Default` reproduces the
// stock behaviour (120 BPM, 100 ms lookahead, 8/8/16/8-bar phases, elite
// threshold 50, ...). Hosts can override any subset from JSON: missing
// top-level sections fall back to their defaults, nested sections must be
// complete.
//
// See also: `engine.rs`, which owns the config, and `error.rs` for
// `ConfigError`.
//
// **Critical constraint: determinism.** Two engines built from the same seed
// and config produce identical event streams.

use crate::error::ConfigError;
use crate::types::{ArpMode, DrumKit, MacroPhase};
use serde::{Deserialize, Serialize};
use std::path::Path;
use sylvan_drift_music::chaos::ChaosConfig;
use sylvan_drift_music::counterpoint::CounterpointConfig;
use sylvan_drift_music::evolution::EvolutionConfig;
use sylvan_drift_music::fitness::FitnessWeights;
use sylvan_drift_music::harmony::HarmonyConfig;
use sylvan_drift_music::scale::Mood;

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Timing of the lookahead loop, all in seconds except tempo.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Steps due before `now + lookahead` are produced on each tick.
    pub lookahead: f64,
    /// Delay before the host should tick again.
    pub rearm_delay: f64,
    /// Offset from `now` of the first step after `start`.
    pub start_lead: f64,
    pub min_tempo: f64,
    pub max_tempo: f64,
    /// Upper bound on steps produced by a single tick. A host that stalls
    /// longer than this is resynchronised instead of flooded.
    pub max_steps_per_tick: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            lookahead: 0.100,
            rearm_delay: 0.025,
            start_lead: 0.05,
            min_tempo: 60.0,
            max_tempo: 200.0,
            max_steps_per_tick: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Macro phases
// ---------------------------------------------------------------------------

/// Length and arrangement preset of one macro phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhasePreset {
    pub bars: u32,
    /// Fraction of the 16 steps on which the thinning voices (counterpoint,
    /// secondary percussion, arpeggio) may sound.
    pub density: f32,
    /// Normalized filter-cutoff centre for the phase.
    pub cutoff: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MacroConfig {
    pub drift: PhasePreset,
    pub build: PhasePreset,
    pub peak: PhasePreset,
    pub comedown: PhasePreset,
}

impl Default for MacroConfig {
    fn default() -> Self {
        MacroConfig {
            drift: PhasePreset {
                bars: 8,
                density: 0.375,
                cutoff: 0.35,
            },
            build: PhasePreset {
                bars: 8,
                density: 0.625,
                cutoff: 0.55,
            },
            peak: PhasePreset {
                bars: 16,
                density: 1.0,
                cutoff: 0.85,
            },
            comedown: PhasePreset {
                bars: 8,
                density: 0.5,
                cutoff: 0.4,
            },
        }
    }
}

impl MacroConfig {
    pub fn preset(&self, phase: MacroPhase) -> &PhasePreset {
        match phase {
            MacroPhase::Drift => &self.drift,
            MacroPhase::Build => &self.build,
            MacroPhase::Peak => &self.peak,
            MacroPhase::Comedown => &self.comedown,
        }
    }
}

// ---------------------------------------------------------------------------
// Bio-feedback
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Tempo target spans `base ± tempo_span` BPM across the energy range.
    pub tempo_span: f64,
    /// Fraction of the remaining tempo distance covered per snapshot.
    pub tempo_ease: f64,
    /// Cutoff target range (normalized) mapped from energy.
    pub cutoff_range: (f32, f32),
    pub cutoff_ease: f32,
    /// Populations strictly above this regenerate the rhythm (outside PEAK).
    pub population_threshold: u32,
    pub mood_nudge_probability: f64,
    pub synergy_high: f64,
    pub synergy_low: f64,
    pub timbre_nudge_probability: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        FeedbackConfig {
            tempo_span: 5.0,
            tempo_ease: 0.01,
            cutoff_range: (0.2, 0.8),
            cutoff_ease: 0.05,
            population_threshold: 80,
            mood_nudge_probability: 0.01,
            synergy_high: 0.7,
            synergy_low: 0.3,
            timbre_nudge_probability: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Centre tempo for bio-feedback drift, and the starting tempo.
    pub base_tempo: f64,
    pub initial_mood: Mood,
    pub arp_mode: ArpMode,
    pub drum_kit: DrumKit,
    /// Whether autonomous evolution starts enabled.
    pub autonomous: bool,
    /// Bars between autonomous evolution ticks.
    pub evolution_interval_bars: u32,
    pub initial_cutoff: f32,
    pub initial_resonance: f32,
    /// How far the chaos scalar swings the effective cutoff (± half this).
    pub chaos_cutoff_depth: f32,
    /// How far the chaos scalar swings lead velocity (± half this).
    pub chaos_velocity_depth: f32,

    pub scheduler: SchedulerConfig,
    pub macro_phases: MacroConfig,
    pub feedback: FeedbackConfig,
    pub evolution: EvolutionConfig,
    pub fitness: FitnessWeights,
    pub counterpoint: CounterpointConfig,
    pub harmony: HarmonyConfig,
    pub chaos: ChaosConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            base_tempo: 120.0,
            initial_mood: Mood::Ethereal,
            arp_mode: ArpMode::Off,
            drum_kit: DrumKit::Organic,
            autonomous: true,
            evolution_interval_bars: 4,
            initial_cutoff: 0.5,
            initial_resonance: 0.2,
            chaos_cutoff_depth: 0.2,
            chaos_velocity_depth: 0.1,

            scheduler: SchedulerConfig::default(),
            macro_phases: MacroConfig::default(),
            feedback: FeedbackConfig::default(),
            evolution: EvolutionConfig::default(),
            fitness: FitnessWeights::default(),
            counterpoint: CounterpointConfig::default(),
            harmony: HarmonyConfig::default(),
            chaos: ChaosConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject values the engine cannot run with. Merely unusual values
    /// (odd tempos, extreme probabilities) pass and get clamped at use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.to_string()))
        };

        let s = &self.scheduler;
        if !(s.lookahead > 0.0 && s.rearm_delay > 0.0 && s.start_lead >= 0.0) {
            return invalid("scheduler lookahead and rearm_delay must be positive");
        }
        if !(s.min_tempo > 0.0 && s.min_tempo <= s.max_tempo) {
            return invalid("scheduler tempo range must be positive and ordered");
        }
        if s.max_steps_per_tick == 0 {
            return invalid("scheduler max_steps_per_tick must be at least 1");
        }
        if !self.base_tempo.is_finite() {
            return invalid("base_tempo must be finite");
        }
        if self.evolution_interval_bars == 0 {
            return invalid("evolution_interval_bars must be at least 1");
        }
        for phase in MacroPhase::ALL {
            if self.macro_phases.preset(phase).bars == 0 {
                return Err(ConfigError::Invalid(format!("{phase} phase has zero bars")));
            }
        }
        if self.evolution.elite_capacity == 0 || self.evolution.history_capacity == 0 {
            return invalid("elite and history capacities must be at least 1");
        }
        if !(self.chaos.dt > 0.0 && self.chaos.dt.is_finite()) {
            return invalid("chaos dt must be positive");
        }
        if self.harmony.progression_length == 0 {
            return invalid("progression_length must be at least 1");
        }
        if self.harmony.bars_per_chord_choices.iter().any(|&b| b == 0) {
            return invalid("bars_per_chord choices must be at least 1");
        }
        Ok(())
    }
}
