// sylvan_drift_engine: real-time coordinator for the Sylvan Drift composer.
//
// Owns the clock-facing half of the system: the lookahead scheduler, the
// macro phase arc, the bio-feedback coupler and the `Engine` that wires them
// to the pure generators in `sylvan_drift_music`. No audio, no I/O beyond
// config loading; the host pushes `Command`s in, calls `tick(now)` on a
// timer, and forwards the resulting `StepEvent`s to a renderer.
//
// Module overview:
// - `engine.rs`:      Engine: command dispatch, tick loop, bar bookkeeping, step production.
// - `scheduler.rs`:   LookaheadScheduler: wall-clock seconds → 16th-note steps.
// - `macro_phase.rs`: DRIFT/BUILD/PEAK/COMEDOWN state machine and rebirth detection.
// - `feedback.rs`:    Bio-feedback coupler: snapshot → gated parameter nudges.
// - `command.rs`:     Command: the whole control surface.
// - `event.rs`:       StepEvent/VoiceTrigger output, Notification stream, TickReport.
// - `config.rs`:      EngineConfig and nested presets, JSON loading and validation.
// - `error.rs`:       ConfigError.
// - `types.rs`:       MacroPhase, ArpMode, DrumKit, BioSnapshot, re-exported ids and locks.
//
// The `drift` binary (`main.rs`) runs the engine headless against a
// simulated clock.
//
// **Critical constraint: determinism.** Same seed, config, commands and
// clock readings give the same events. All randomness flows from one
// `GameRng`.

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod feedback;
pub mod macro_phase;
pub mod scheduler;
pub mod types;

pub use command::Command;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::ConfigError;
pub use event::{Notification, StepEvent, TickReport};
