// Engine-level enums and the bio-feedback snapshot.
//
// `MacroPhase` is the long-form arc (see `macro_phase.rs`); `ArpMode` and
// `DrumKit` are performance presets chosen from the control surface;
// `AgentType` and `BioSnapshot` describe the statistics pushed in by the
// external agent simulation (see `feedback.rs`).
//
// Pattern ids, evolution domains and lock flags live in
// `sylvan_drift_music::types` and are re-exported here for convenience.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use sylvan_drift_music::types::{Domain, EvolutionLocks, PatternId, STEPS};

/// Long-form section of the arrangement. Cycles
/// Drift → Build → Peak → Comedown → Drift.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacroPhase {
    #[default]
    Drift,
    Build,
    Peak,
    Comedown,
}

impl MacroPhase {
    pub const ALL: [MacroPhase; 4] = [
        MacroPhase::Drift,
        MacroPhase::Build,
        MacroPhase::Peak,
        MacroPhase::Comedown,
    ];

    pub fn next(self) -> MacroPhase {
        match self {
            MacroPhase::Drift => MacroPhase::Build,
            MacroPhase::Build => MacroPhase::Peak,
            MacroPhase::Peak => MacroPhase::Comedown,
            MacroPhase::Comedown => MacroPhase::Drift,
        }
    }
}

impl fmt::Display for MacroPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MacroPhase::Drift => "DRIFT",
            MacroPhase::Build => "BUILD",
            MacroPhase::Peak => "PEAK",
            MacroPhase::Comedown => "COMEDOWN",
        };
        f.write_str(name)
    }
}

/// Arpeggiator direction over the current chord tones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArpMode {
    #[default]
    Off,
    Up,
    Down,
    UpDown,
    Random,
}

/// Percussion preset: which sounds the two rhythm voices map to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrumKit {
    #[default]
    Organic,
    Electronic,
    Minimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrumSound {
    Kick,
    Snare,
    Clap,
    ClosedHat,
    Rim,
    Shaker,
    LowTom,
    Crash,
}

impl DrumSound {
    /// General MIDI percussion note.
    pub fn midi_note(self) -> u8 {
        match self {
            DrumSound::Kick => 36,
            DrumSound::Snare => 38,
            DrumSound::Clap => 39,
            DrumSound::ClosedHat => 42,
            DrumSound::Rim => 37,
            DrumSound::Shaker => 70,
            DrumSound::LowTom => 45,
            DrumSound::Crash => 49,
        }
    }
}

impl DrumKit {
    pub fn primary(self) -> DrumSound {
        match self {
            DrumKit::Organic => DrumSound::LowTom,
            DrumKit::Electronic => DrumSound::Kick,
            DrumKit::Minimal => DrumSound::Rim,
        }
    }

    pub fn secondary(self) -> DrumSound {
        match self {
            DrumKit::Organic => DrumSound::Shaker,
            DrumKit::Electronic => DrumSound::Clap,
            DrumKit::Minimal => DrumSound::ClosedHat,
        }
    }

    /// Overall level of the kit relative to full scale.
    pub fn velocity_scale(self) -> f32 {
        match self {
            DrumKit::Organic => 0.8,
            DrumKit::Electronic => 1.0,
            DrumKit::Minimal => 0.6,
        }
    }
}

/// Which agent class dominates the external simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentType {
    #[default]
    Forager,
    Predator,
    Symbiont,
    Wanderer,
}

/// Population statistics pushed in by the agent simulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BioSnapshot {
    pub population: u32,
    /// Mean agent energy in [0, 100].
    pub average_energy: f64,
    pub dominant_type: AgentType,
    /// Cooperation measure in [0, 1].
    pub synergy: f64,
}

impl Default for BioSnapshot {
    fn default() -> Self {
        BioSnapshot {
            population: 0,
            average_energy: 50.0,
            dominant_type: AgentType::Forager,
            synergy: 0.5,
        }
    }
}

impl BioSnapshot {
    /// Clamp fields into range; non-finite values fall back to the midpoint.
    pub fn sanitized(self) -> Self {
        let energy = if self.average_energy.is_finite() {
            self.average_energy.clamp(0.0, 100.0)
        } else {
            50.0
        };
        let synergy = if self.synergy.is_finite() {
            self.synergy.clamp(0.0, 1.0)
        } else {
            0.5
        };
        BioSnapshot {
            average_energy: energy,
            synergy,
            ..self
        }
    }
}
