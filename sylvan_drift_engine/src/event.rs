// Engine output: step events for the renderer and notifications for hosts.
//
// Two streams leave the engine on every `tick`:
// - `StepEvent`: one per produced 16th-note step, carrying absolute trigger
//   times and everything a renderer needs to voice them. The engine never
//   synthesizes audio; a `VoiceTrigger` is a complete, self-contained
//   instruction.
// - `Notification`: classified log lines plus change notices (new pattern,
//   new patch) and a per-step summary, for UIs and tooling.
//
// Both are returned together in a `TickReport`, along with the time the host
// should tick again.
//
// See also: `engine.rs` (`produce_step`) which builds these.

use crate::types::{DrumKit, DrumSound, MacroPhase, PatternId};
use serde::{Deserialize, Serialize};
use sylvan_drift_music::counterpoint::CounterLine;
use sylvan_drift_music::patch::SynthPatch;
use sylvan_drift_music::pattern::Pattern;
use sylvan_drift_music::scale::EffectSends;

// ---------------------------------------------------------------------------
// Step events
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Voice {
    Lead,
    Counter,
    Bass,
    Arp,
    PercPrimary,
    PercSecondary,
    /// One-shot cue after a forced phase transition.
    Accent,
}

/// Voice-specific sound parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VoiceParams {
    Synth(SynthPatch),
    Drum { kit: DrumKit, sound: DrumSound },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceTrigger {
    pub voice: Voice,
    /// Absolute host time in seconds, micro-offset already applied.
    pub time: f64,
    /// MIDI note number.
    pub pitch: u8,
    pub velocity: f32,
    pub params: VoiceParams,
    /// Normalized filter cutoff in [0, 1].
    pub cutoff: f32,
    pub resonance: f32,
    /// Oscillator detune in cents.
    pub detune: f32,
    /// Micro-timing offset, in fractions of a step.
    pub micro_offset: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Nominal (grid) time of the step.
    pub time: f64,
    pub step: usize,
    pub measure: u64,
    pub phase: MacroPhase,
    pub generation: u32,
    pub pattern_id: PatternId,
    pub chaos: f64,
    pub sends: EffectSends,
    pub triggers: Vec<VoiceTrigger>,
}

impl StepEvent {
    pub fn triggers_for(&self, voice: Voice) -> impl Iterator<Item = &VoiceTrigger> {
        self.triggers.iter().filter(move |t| t.voice == voice)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogClass {
    /// Control and transport changes.
    Info,
    /// Generator actions (evolution strategies, edits, mutations).
    Exec,
    /// Structural events (phase transitions, rebirth).
    Event,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    Log {
        class: LogClass,
        message: String,
    },
    PatternChanged {
        pattern: Pattern,
        counterpoint: CounterLine,
    },
    PatchChanged {
        patch: SynthPatch,
    },
    TickSummary {
        step: usize,
        measure: u64,
        phase: MacroPhase,
        generation: u32,
        pattern_id: PatternId,
        chaos: f64,
    },
}

impl Notification {
    pub fn log(class: LogClass, message: impl Into<String>) -> Self {
        Notification::Log {
            class,
            message: message.into(),
        }
    }
}

/// Everything one `Engine::tick` produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub events: Vec<StepEvent>,
    pub notifications: Vec<Notification>,
    /// When the host should tick next; `None` once stopped.
    pub rearm_at: Option<f64>,
}

impl TickReport {
    /// Messages of every `Log` notification of `class`.
    pub fn logs(&self, class: LogClass) -> impl Iterator<Item = &str> {
        self.notifications.iter().filter_map(move |n| match n {
            Notification::Log { class: c, message } if *c == class => Some(message.as_str()),
            _ => None,
        })
    }
}
