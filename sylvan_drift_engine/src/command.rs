// Commands: the control surface.
//
// Every external mutation of the engine goes through `Command`, applied with
// `Engine::apply`. Commands never fail: out-of-range values are clamped and
// commands that make no sense in the current state are ignored. Changes land
// synchronously, so anything a command sets (locks in particular) is in
// force before the next autonomous tick.
//
// Direct user edits win over autonomy by setting their domain lock:
// - `ToggleStep` locks melody (while autonomous evolution is on).
// - `SetMood` locks harmony.
// - `SetFilter`, `SetSynthMode`, `SetFmRatio` and `SetPatchField` lock timbre.
// `ManualMutation` and `ForceTransition` are explicit requests and bypass the
// locks without setting them.
//
// See also: `engine.rs` for the dispatcher, `event.rs` for the
// notifications commands produce.

use crate::types::{ArpMode, BioSnapshot, Domain, DrumKit};
use serde::{Deserialize, Serialize};
use sylvan_drift_music::patch::{PatchField, SynthMode};
use sylvan_drift_music::scale::Mood;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Set the tempo in BPM, clamped to the scheduler's range.
    SetTempo { bpm: f64 },
    /// Set normalized filter cutoff and resonance, each clamped to [0, 1].
    SetFilter { cutoff: f32, resonance: f32 },
    /// Switch scale and effect sends.
    SetMood { mood: Mood },
    SetArpMode { mode: ArpMode },
    SetDrumKit { kit: DrumKit },
    /// Master switch for every autonomous change (evolution, phase
    /// transitions, bio-feedback).
    SetAutonomous { enabled: bool },
    SetLock { domain: Domain, locked: bool },
    /// Jump to the next macro phase now, with an accent cue.
    ForceTransition,
    /// Mutate one domain immediately, ignoring its lock.
    ManualMutation { domain: Domain },
    /// Cycle one melody step: rest → root → random degree → rest.
    ToggleStep { step: usize },
    SetSynthMode { mode: SynthMode },
    SetFmRatio { ratio: f32 },
    SetPatchField { field: PatchField },
    FeedSnapshot { snapshot: BioSnapshot },
    /// Start (or restart) the transport at host time `now`.
    Start { now: f64 },
    Stop,
}
