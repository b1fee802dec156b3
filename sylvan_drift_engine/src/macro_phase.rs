// Macro phase state machine: the long-form arc of the piece.
//
// Phases cycle DRIFT → BUILD → PEAK → COMEDOWN → DRIFT with bar lengths
// taken from `MacroConfig` (8/8/16/8 by default). The engine calls
// `on_measure()` once per completed measure; the phase-local bar counter
// grows, and once it reaches the phase length a transition fires, but only
// while autonomous evolution is enabled. With autonomy off the counter keeps
// counting and the phase holds; re-enabling it transitions on the next
// measure.
//
// `force_transition()` skips the timing check and the autonomous flag.
//
// A transition that lands on DRIFT coming out of COMEDOWN is a "rebirth":
// the engine regenerates the song structure and restarts the generation
// count. The machine only reports it; `engine.rs` carries it out.

use crate::config::MacroConfig;
use crate::types::MacroPhase;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: MacroPhase,
    pub to: MacroPhase,
    pub forced: bool,
}

impl PhaseTransition {
    pub fn is_rebirth(&self) -> bool {
        self.from == MacroPhase::Comedown && self.to == MacroPhase::Drift
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MacroPhaseMachine {
    phase: MacroPhase,
    bars_in_phase: u32,
}

impl MacroPhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> MacroPhase {
        self.phase
    }

    pub fn bars_in_phase(&self) -> u32 {
        self.bars_in_phase
    }

    /// Count one completed measure and transition if the phase is over.
    pub fn on_measure(
        &mut self,
        config: &MacroConfig,
        autonomous: bool,
    ) -> Option<PhaseTransition> {
        self.bars_in_phase = self.bars_in_phase.saturating_add(1);
        let length = config.preset(self.phase).bars;
        if autonomous && self.bars_in_phase >= length {
            Some(self.switch(false))
        } else {
            None
        }
    }

    /// Move to the next phase immediately.
    pub fn force_transition(&mut self) -> PhaseTransition {
        self.switch(true)
    }

    fn switch(&mut self, forced: bool) -> PhaseTransition {
        let from = self.phase;
        self.phase = from.next();
        self.bars_in_phase = 0;
        PhaseTransition {
            from,
            to: self.phase,
            forced,
        }
    }
}
