// Top-level engine: owns every generator and drives them from the clock.
//
// `Engine` is a plain owned struct; every operation takes `&mut self` and
// runs to completion, so evolution ticks, rhythm rolls and chaos steps are
// atomic with respect to each other. Hosts drive it with two calls:
//
// - `apply(&Command)`: control surface (see `command.rs`). Synchronous, so
//   a lock set by a user edit is in force before any later tick.
// - `tick(now)`: one scheduler iteration. Steps the chaos modulator,
//   resyncs the grid after a host stall, drains every step due within the
//   lookahead window, runs bar bookkeeping on each measure wrap, and
//   returns a `TickReport` (step events, buffered notifications, re-arm
//   time).
//
// Bar bookkeeping order on a measure boundary: evolution tick (every
// `evolution_interval_bars`), chord advance, then the macro phase check, so
// a rebirth's generation reset is the last word for that bar.
//
// Step production voices the current melody, its counterpoint, a bass note
// on the downbeat, the optional arpeggio and both percussion voices, all
// transposed by the current chord. Counterpoint, secondary percussion and
// arpeggio are thinned by the phase density (`density_allows`).
//
// See also: `scheduler.rs`, `macro_phase.rs`, `feedback.rs`, and the
// generator crate `sylvan_drift_music`.
//
// **Critical constraint: determinism.** All randomness comes from the
// engine's single `GameRng`; same seed + same commands + same clock gives
// the same output.

use crate::command::Command;
use crate::config::EngineConfig;
use crate::event::{
    LogClass, Notification, StepEvent, TickReport, Voice, VoiceParams, VoiceTrigger,
};
use crate::feedback::{self, FeedbackContext};
use crate::macro_phase::{MacroPhaseMachine, PhaseTransition};
use crate::scheduler::{LookaheadScheduler, ScheduledStep};
use crate::types::{
    ArpMode, BioSnapshot, Domain, DrumKit, DrumSound, EvolutionLocks, MacroPhase, STEPS,
};
use sylvan_drift_music::chaos::ChaosModulator;
use sylvan_drift_music::counterpoint::{self, CounterLine};
use sylvan_drift_music::evolution::{EvolutionGate, PatternEvolver, Strategy};
use sylvan_drift_music::harmony::SongStructure;
use sylvan_drift_music::patch::PatchField;
use sylvan_drift_music::pattern::Pattern;
use sylvan_drift_music::scale::Mood;
use sylvan_drift_prng::GameRng;

/// Steps in the order the density mask admits them: half notes, quarters,
/// eighths, then sixteenths.
const DENSITY_ORDER: [usize; STEPS] = [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15];

/// Whether a thinning voice may sound on `step` at `density`.
pub fn density_allows(step: usize, density: f32) -> bool {
    let slots = (density.clamp(0.0, 1.0) * STEPS as f32).round() as usize;
    DENSITY_ORDER.iter().take(slots).any(|&s| s == step)
}

fn midi(pitch: i16) -> u8 {
    pitch.clamp(0, 127) as u8
}

/// Finite values clamped to [0, 1]; `None` for NaN or infinities.
fn unit(value: f32) -> Option<f32> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

fn patch_field_is_finite(field: PatchField) -> bool {
    match field {
        PatchField::Attack(v)
        | PatchField::Decay(v)
        | PatchField::Sustain(v)
        | PatchField::Release(v)
        | PatchField::Detune(v)
        | PatchField::FmRatio(v)
        | PatchField::FmDepth(v) => v.is_finite(),
        PatchField::Waveform(_) | PatchField::Mode(_) | PatchField::Filter(_) => true,
    }
}

pub struct Engine {
    config: EngineConfig,
    rng: GameRng,
    scheduler: LookaheadScheduler,
    macro_phase: MacroPhaseMachine,
    evolver: PatternEvolver,
    counterpoint: Option<CounterLine>,
    song: SongStructure,
    chaos: ChaosModulator,

    locks: EvolutionLocks,
    autonomous: bool,
    mood: Mood,
    arp_mode: ArpMode,
    arp_cursor: usize,
    drum_kit: DrumKit,
    /// User/feedback cutoff before phase and chaos modulation.
    cutoff: f32,
    resonance: f32,
    /// Accent cue owed to the next produced step.
    pending_accent: bool,

    notifications: Vec<Notification>,
}

impl Engine {
    /// Create an engine with default config and the given seed.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, EngineConfig::default())
    }

    /// Create an engine and run initialization: a forced song-structure
    /// regeneration followed by genesis of the first pattern. A config that
    /// fails `EngineConfig::validate` is replaced by the defaults.
    pub fn with_config(seed: u64, config: EngineConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!(error = %e, "invalid engine config, using defaults");
                EngineConfig::default()
            }
        };
        let mut engine = Engine {
            rng: GameRng::new(seed),
            scheduler: LookaheadScheduler::new(config.scheduler.clone(), config.base_tempo),
            macro_phase: MacroPhaseMachine::new(),
            evolver: PatternEvolver::new(config.evolution.clone(), config.fitness.clone()),
            counterpoint: None,
            song: SongStructure::default(),
            chaos: ChaosModulator::new(config.chaos.clone()),

            locks: EvolutionLocks::default(),
            autonomous: config.autonomous,
            mood: config.initial_mood,
            arp_mode: config.arp_mode,
            arp_cursor: 0,
            drum_kit: config.drum_kit,
            cutoff: unit(config.initial_cutoff).unwrap_or(0.5),
            resonance: unit(config.initial_resonance).unwrap_or(0.0),
            pending_accent: false,

            notifications: Vec::new(),
            config,
        };
        engine.init();
        engine
    }

    fn init(&mut self) {
        let done = self
            .song
            .regenerate(&self.config.harmony, &self.locks, true, false, &mut self.rng);
        if done.timbre {
            self.notify_patch();
        }
        self.evolve(true);
        self.log(
            LogClass::Info,
            format!(
                "init: root {} mood {} tempo {:.0}",
                self.song.root,
                self.mood,
                self.scheduler.tempo()
            ),
        );
        tracing::info!(root = self.song.root, mood = %self.mood, "engine initialized");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> MacroPhase {
        self.macro_phase.phase()
    }

    pub fn bars_in_phase(&self) -> u32 {
        self.macro_phase.bars_in_phase()
    }

    pub fn generation(&self) -> u32 {
        self.evolver.generation()
    }

    pub fn current_pattern(&self) -> Option<&Pattern> {
        self.evolver.current()
    }

    pub fn counterpoint(&self) -> Option<&CounterLine> {
        self.counterpoint.as_ref()
    }

    pub fn evolver(&self) -> &PatternEvolver {
        &self.evolver
    }

    pub fn song(&self) -> &SongStructure {
        &self.song
    }

    pub fn locks(&self) -> EvolutionLocks {
        self.locks
    }

    pub fn is_autonomous(&self) -> bool {
        self.autonomous
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn arp_mode(&self) -> ArpMode {
        self.arp_mode
    }

    pub fn drum_kit(&self) -> DrumKit {
        self.drum_kit
    }

    pub fn tempo(&self) -> f64 {
        self.scheduler.tempo()
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Completed measures since the last `Start`.
    pub fn measure(&self) -> u64 {
        self.scheduler.measure()
    }

    pub fn chaos_scalar(&self) -> f64 {
        self.chaos.scalar()
    }

    /// Take notifications buffered since the last tick or drain.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // -----------------------------------------------------------------------
    // Control surface
    // -----------------------------------------------------------------------

    /// Apply one command. Invalid or pointless commands are ignored.
    pub fn apply(&mut self, command: &Command) {
        match command {
            Command::SetTempo { bpm } => {
                let before = self.scheduler.tempo();
                let tempo = self.scheduler.set_tempo(*bpm);
                if tempo != before {
                    self.log(LogClass::Info, format!("tempo {tempo:.1} BPM"));
                }
            }
            Command::SetFilter { cutoff, resonance } => {
                let (Some(cutoff), Some(resonance)) = (unit(*cutoff), unit(*resonance)) else {
                    return;
                };
                self.cutoff = cutoff;
                self.resonance = resonance;
                self.lock_for_user_edit(Domain::Timbre);
            }
            Command::SetMood { mood } => {
                self.set_mood(*mood);
                self.lock_for_user_edit(Domain::Harmony);
            }
            Command::SetArpMode { mode } => {
                self.arp_mode = *mode;
                self.arp_cursor = 0;
                self.log(LogClass::Info, format!("arp {mode:?}"));
            }
            Command::SetDrumKit { kit } => {
                self.drum_kit = *kit;
                self.log(LogClass::Info, format!("drum kit {kit:?}"));
            }
            Command::SetAutonomous { enabled } => {
                if self.autonomous != *enabled {
                    self.autonomous = *enabled;
                    let state = if *enabled { "on" } else { "off" };
                    self.log(LogClass::Info, format!("autonomous evolution {state}"));
                }
            }
            Command::SetLock { domain, locked } => {
                if self.locks.is_locked(*domain) != *locked {
                    self.locks.set(*domain, *locked);
                    let state = if *locked { "locked" } else { "unlocked" };
                    self.log(LogClass::Info, format!("{domain} {state}"));
                }
            }
            Command::ForceTransition => {
                let transition = self.macro_phase.force_transition();
                self.pending_accent = true;
                self.on_transition(transition);
            }
            Command::ManualMutation { domain } => self.manual_mutation(*domain),
            Command::ToggleStep { step } => {
                let Some(pattern) = self.evolver.toggle_step(*step, self.mood, &mut self.rng) else {
                    return;
                };
                self.lock_for_user_edit(Domain::Melody);
                self.log(
                    LogClass::Exec,
                    format!("EDIT step {step} -> {}", pattern.id.short()),
                );
                self.melody_changed(pattern);
            }
            Command::SetSynthMode { mode } => self.edit_patch(PatchField::Mode(*mode)),
            Command::SetFmRatio { ratio } => self.edit_patch(PatchField::FmRatio(*ratio)),
            Command::SetPatchField { field } => self.edit_patch(*field),
            Command::FeedSnapshot { snapshot } => self.feed(snapshot),
            Command::Start { now } => {
                if !now.is_finite() {
                    return;
                }
                self.scheduler.start(*now);
                self.arp_cursor = 0;
                self.log(LogClass::Info, "transport started");
                tracing::info!(now, tempo = self.scheduler.tempo(), "transport started");
            }
            Command::Stop => {
                if self.scheduler.stop() {
                    self.log(LogClass::Info, "transport stopped");
                    tracing::info!("transport stopped");
                }
            }
        }
    }

    /// Run one evolution tick. Returns whether the melody changed.
    pub fn evolve(&mut self, force: bool) -> bool {
        let gate = EvolutionGate {
            autonomous: self.autonomous,
            melody_locked: self.locks.melody,
        };
        let Some(outcome) = self.evolver.evolve(gate, force, self.mood, &mut self.rng) else {
            return false;
        };
        let pattern = outcome.pattern;
        let message = match outcome.strategy {
            Strategy::Genesis => format!(
                "GENESIS {} ({} notes)",
                pattern.id.short(),
                pattern.note_count()
            ),
            strategy => format!(
                "{strategy} gen {} {} <- {}",
                pattern.generation,
                pattern.id.short(),
                pattern.lineage
            ),
        };
        self.log(LogClass::Exec, message);
        if outcome.archived {
            let score = outcome.outgoing_score.unwrap_or(0.0);
            self.log(LogClass::Exec, format!("ARCHIVED elite (score {score:.1})"));
        }
        self.melody_changed(pattern);
        true
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// One scheduler iteration at host time `now` (seconds). A non-finite
    /// `now` only steps the chaos modulator and reports no re-arm time.
    pub fn tick(&mut self, now: f64) -> TickReport {
        self.chaos.step();

        if !now.is_finite() {
            tracing::warn!(now, "ignoring tick with non-finite clock");
            return TickReport {
                events: Vec::new(),
                notifications: self.drain_notifications(),
                rearm_at: None,
            };
        }
        if self.scheduler.is_stalled(now) {
            let behind = now - self.scheduler.next_event_time();
            tracing::warn!(now, behind, "host clock stalled, resyncing");
            self.scheduler.resync(now);
        }

        let mut events = Vec::new();
        let mut produced = 0;
        while let Some(slot) = self.scheduler.next_due(now) {
            if produced == self.scheduler.max_steps_per_tick() {
                tracing::warn!(now, produced, "scheduler fell behind, resyncing");
                self.scheduler.resync(now);
                break;
            }
            if let Some(event) = self.produce_step(slot) {
                events.push(event);
            }
            produced += 1;
            if self.scheduler.advance() {
                self.on_measure();
            }
        }

        TickReport {
            events,
            notifications: self.drain_notifications(),
            rearm_at: self.scheduler.rearm_at(now),
        }
    }

    fn on_measure(&mut self) {
        let bars = self.scheduler.measure();
        let interval = u64::from(self.config.evolution_interval_bars.max(1));
        if bars % interval == 0 {
            self.evolve(false);
        }
        if self.song.advance_chord(bars) {
            tracing::debug!(
                bars,
                chord = self.song.chord_index,
                offset = self.song.chord_offset(),
                "chord advanced"
            );
        }
        if let Some(transition) = self
            .macro_phase
            .on_measure(&self.config.macro_phases, self.autonomous)
        {
            self.on_transition(transition);
        }
    }

    fn on_transition(&mut self, transition: PhaseTransition) {
        let suffix = if transition.forced { " (forced)" } else { "" };
        self.log(
            LogClass::Event,
            format!("PHASE {} -> {}{suffix}", transition.from, transition.to),
        );
        tracing::info!(
            from = %transition.from,
            to = %transition.to,
            forced = transition.forced,
            "phase transition"
        );

        if transition.is_rebirth() {
            let done = self.song.regenerate(
                &self.config.harmony,
                &self.locks,
                false,
                false,
                &mut self.rng,
            );
            if done.timbre {
                self.notify_patch();
            }
            self.evolver.reset_generation();
            self.log(
                LogClass::Event,
                format!("REBIRTH root {} revision {}", self.song.root, self.song.revision),
            );
            tracing::info!(root = self.song.root, revision = self.song.revision, "rebirth");
        }
    }

    // -----------------------------------------------------------------------
    // Step production
    // -----------------------------------------------------------------------

    fn produce_step(&mut self, slot: ScheduledStep) -> Option<StepEvent> {
        let pattern = self.evolver.current()?.clone();
        let step = slot.step;
        let phase = self.macro_phase.phase();
        let density = self.config.macro_phases.preset(phase).density;
        let phase_cutoff = self.config.macro_phases.preset(phase).cutoff;
        let chaos = self.chaos.scalar();
        let swing = chaos as f32 - 0.5;
        let cutoff = (0.5 * (self.cutoff + phase_cutoff) + swing * self.config.chaos_cutoff_depth)
            .clamp(0.0, 1.0);
        let root = i16::from(self.song.root) + i16::from(self.song.chord_offset());

        let mut triggers = Vec::new();

        if std::mem::take(&mut self.pending_accent) {
            let accent = self.drum_trigger(Voice::Accent, DrumSound::Crash, slot.time, 1.0, cutoff);
            triggers.push(accent);
        }

        if step == 0 {
            triggers.push(self.synth_trigger(Voice::Bass, slot.time, root - 12, 0.8, 0.0, cutoff));
        }

        if let Some(offset) = pattern.steps[step] {
            let micro = pattern.offsets[step];
            let time = slot.time + f64::from(micro) * slot.duration;
            let velocity = (pattern.velocities[step]
                * (1.0 + swing * self.config.chaos_velocity_depth))
                .clamp(0.0, 1.0);
            let pitch = root + 12 + i16::from(offset);
            triggers.push(self.synth_trigger(Voice::Lead, time, pitch, velocity, micro, cutoff));
        }

        if density_allows(step, density) {
            let counter = self
                .counterpoint
                .as_ref()
                .and_then(|line| line.steps[step].map(|offset| (offset, line.velocities[step])));
            if let Some((offset, velocity)) = counter {
                let pitch = root + 12 + i16::from(offset);
                let counter =
                    self.synth_trigger(Voice::Counter, slot.time, pitch, velocity, 0.0, cutoff);
                triggers.push(counter);
            }

            let arp_tone = if step % 2 == 0 { self.next_arp_tone() } else { None };
            if let Some(tone) = arp_tone {
                let pitch = root + 24 + i16::from(tone);
                triggers.push(self.synth_trigger(Voice::Arp, slot.time, pitch, 0.45, 0.0, cutoff));
            }

            if self.song.rhythm.secondary[step] {
                let sound = self.drum_kit.secondary();
                let hit = self.drum_trigger(Voice::PercSecondary, sound, slot.time, 0.6, cutoff);
                triggers.push(hit);
            }
        }

        if self.song.rhythm.primary[step] {
            let accent = if step % 4 == 0 { 1.0 } else { 0.75 };
            let sound = self.drum_kit.primary();
            triggers.push(self.drum_trigger(Voice::PercPrimary, sound, slot.time, accent, cutoff));
        }

        let generation = self.evolver.generation();
        tracing::trace!(step, measure = slot.measure, triggers = triggers.len(), "step");
        self.notifications.push(Notification::TickSummary {
            step,
            measure: slot.measure,
            phase,
            generation,
            pattern_id: pattern.id,
            chaos,
        });

        Some(StepEvent {
            time: slot.time,
            step,
            measure: slot.measure,
            phase,
            generation,
            pattern_id: pattern.id,
            chaos,
            sends: self.mood.sends(),
            triggers,
        })
    }

    fn synth_trigger(
        &self,
        voice: Voice,
        time: f64,
        pitch: i16,
        velocity: f32,
        micro_offset: f32,
        cutoff: f32,
    ) -> VoiceTrigger {
        VoiceTrigger {
            voice,
            time,
            pitch: midi(pitch),
            velocity,
            params: VoiceParams::Synth(self.song.patch.clone()),
            cutoff,
            resonance: self.resonance,
            detune: self.song.patch.detune,
            micro_offset,
        }
    }

    fn drum_trigger(
        &self,
        voice: Voice,
        sound: DrumSound,
        time: f64,
        level: f32,
        cutoff: f32,
    ) -> VoiceTrigger {
        VoiceTrigger {
            voice,
            time,
            pitch: sound.midi_note(),
            velocity: (level * self.drum_kit.velocity_scale()).clamp(0.0, 1.0),
            params: VoiceParams::Drum {
                kit: self.drum_kit,
                sound,
            },
            cutoff,
            resonance: self.resonance,
            detune: 0.0,
            micro_offset: 0.0,
        }
    }

    /// Next chord tone (root, third, fifth, octave by scale position) for
    /// the arpeggiator, or `None` when it is off.
    fn next_arp_tone(&mut self) -> Option<i8> {
        let tones = [
            0,
            self.mood.degree_above(0, 2),
            self.mood.degree_above(0, 4),
            12,
        ];
        let index = match self.arp_mode {
            ArpMode::Off => return None,
            ArpMode::Up => self.arp_cursor % 4,
            ArpMode::Down => 3 - self.arp_cursor % 4,
            ArpMode::UpDown => [0, 1, 2, 3, 2, 1][self.arp_cursor % 6],
            ArpMode::Random => self.rng.range_usize(0, tones.len()),
        };
        self.arp_cursor = self.arp_cursor.wrapping_add(1);
        Some(tones[index])
    }

    // -----------------------------------------------------------------------
    // Mutation helpers
    // -----------------------------------------------------------------------

    fn manual_mutation(&mut self, domain: Domain) {
        match domain {
            Domain::Melody => {
                self.evolve(true);
            }
            Domain::Timbre => {
                let done = self
                    .song
                    .regenerate(&self.config.harmony, &self.locks, true, true, &mut self.rng);
                if done.timbre {
                    self.notify_patch();
                    self.log(LogClass::Exec, "MANUAL timbre mutation");
                }
            }
            Domain::Harmony => {
                if self
                    .song
                    .regenerate_harmony(&self.config.harmony, &self.locks, true, &mut self.rng)
                {
                    self.song.touch();
                    self.log(
                        LogClass::Exec,
                        format!(
                            "MANUAL harmony: root {} progression {:?}",
                            self.song.root, self.song.progression.offsets
                        ),
                    );
                }
            }
            Domain::Rhythm => {
                if self
                    .song
                    .regenerate_rhythm(&self.config.harmony, &self.locks, true, &mut self.rng)
                {
                    self.song.touch();
                    self.log(LogClass::Exec, "MANUAL rhythm mutation");
                }
            }
        }
    }

    fn edit_patch(&mut self, field: PatchField) {
        if !patch_field_is_finite(field) {
            return;
        }
        self.song.patch.apply(field);
        self.song.touch();
        self.lock_for_user_edit(Domain::Timbre);
        self.notify_patch();
    }

    fn feed(&mut self, snapshot: &BioSnapshot) {
        let ctx = FeedbackContext {
            autonomous: self.autonomous,
            locks: self.locks,
            phase: self.macro_phase.phase(),
            base_tempo: self.config.base_tempo,
            tempo: self.scheduler.tempo(),
            cutoff: self.cutoff,
            mood: self.mood,
        };
        let effects = feedback::plan(&self.config.feedback, snapshot, &ctx, &mut self.rng);
        if effects.is_empty() {
            return;
        }
        tracing::debug!(?effects, population = snapshot.population, "bio-feedback");

        if let Some(tempo) = effects.tempo {
            self.scheduler.set_tempo(tempo);
        }
        if let Some(cutoff) = effects.cutoff.and_then(unit) {
            self.cutoff = cutoff;
        }
        if effects.regenerate_rhythm
            && self
                .song
                .regenerate_rhythm(&self.config.harmony, &self.locks, false, &mut self.rng)
        {
            self.song.touch();
            self.log(
                LogClass::Exec,
                format!("FEEDBACK rhythm (population {})", snapshot.population),
            );
        }
        if let Some(mood) = effects.mood {
            self.set_mood(mood);
            self.log(LogClass::Exec, format!("FEEDBACK mood {mood}"));
        }
        if let Some(field) = effects.timbre {
            self.song.patch.apply(field);
            self.song.touch();
            self.notify_patch();
            self.log(LogClass::Exec, format!("FEEDBACK timbre {field:?}"));
        }
    }

    fn set_mood(&mut self, mood: Mood) {
        self.mood = mood;
        // The counter-voice depends on the scale, so re-derive it.
        if let Some(pattern) = self.evolver.current() {
            let line = counterpoint::generate(pattern, mood, &self.config.counterpoint);
            self.counterpoint = Some(line);
        }
        self.log(LogClass::Info, format!("mood {mood}"));
    }

    /// A direct user edit claims its domain while autonomy is running.
    fn lock_for_user_edit(&mut self, domain: Domain) {
        if self.autonomous && !self.locks.is_locked(domain) {
            self.locks.set(domain, true);
            self.log(LogClass::Info, format!("{domain} locked by edit"));
        }
    }

    fn melody_changed(&mut self, pattern: Pattern) {
        let line = counterpoint::generate(&pattern, self.mood, &self.config.counterpoint);
        self.counterpoint = Some(line.clone());
        self.notifications.push(Notification::PatternChanged {
            pattern,
            counterpoint: line,
        });
    }

    fn notify_patch(&mut self) {
        self.notifications.push(Notification::PatchChanged {
            patch: self.song.patch.clone(),
        });
    }

    fn log(&mut self, class: LogClass, message: impl Into<String>) {
        self.notifications.push(Notification::log(class, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylvan_drift_music::patch::SynthMode;

    fn run_until(engine: &mut Engine, from: f64, to: f64) -> Vec<TickReport> {
        let mut reports = Vec::new();
        let mut now = from;
        while now < to {
            reports.push(engine.tick(now));
            now += 0.025;
        }
        reports
    }

    #[test]
    fn density_mask_prefers_strong_steps() {
        assert!((0..STEPS).all(|s| density_allows(s, 1.0)));
        assert!((0..STEPS).all(|s| !density_allows(s, 0.0)));
        let drift: Vec<usize> = (0..STEPS).filter(|&s| density_allows(s, 0.375)).collect();
        assert_eq!(drift, vec![0, 2, 4, 8, 10, 12]);
        let half: Vec<usize> = (0..STEPS).filter(|&s| density_allows(s, 0.5)).collect();
        assert_eq!(half, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn init_produces_pattern_counterpoint_and_patch() {
        let mut engine = Engine::new(7);
        let pattern = engine.current_pattern().unwrap().clone();
        assert_eq!(pattern.generation, 0);
        assert_eq!(engine.counterpoint().unwrap().source, pattern.id);
        assert_eq!(engine.song().revision, 1);
        let notes = engine.drain_notifications();
        assert!(notes.iter().any(|n| matches!(n, Notification::PatternChanged { .. })));
        assert!(notes.iter().any(|n| matches!(n, Notification::PatchChanged { .. })));
    }

    #[test]
    fn stale_ticks_after_stop_are_silent() {
        let mut engine = Engine::new(1);
        engine.apply(&Command::Start { now: 0.0 });
        let reports = run_until(&mut engine, 0.0, 1.0);
        assert!(reports.iter().any(|r| !r.events.is_empty()));
        engine.apply(&Command::Stop);
        engine.apply(&Command::Stop);
        let report = engine.tick(1.0);
        assert!(report.events.is_empty());
        assert_eq!(report.rearm_at, None);
        let report = engine.tick(5.0);
        assert!(report.events.is_empty());
    }

    #[test]
    fn forced_transition_queues_an_accent() {
        let mut engine = Engine::new(3);
        engine.apply(&Command::SetAutonomous { enabled: false });
        engine.apply(&Command::Start { now: 0.0 });
        engine.apply(&Command::ForceTransition);
        assert_eq!(engine.phase(), MacroPhase::Build);
        let report = engine.tick(0.0);
        assert_eq!(report.logs(LogClass::Event).count(), 1);
        let first = &report.events[0];
        assert_eq!(first.triggers_for(Voice::Accent).count(), 1);
        let report = engine.tick(0.2);
        assert!(report.events.iter().all(|e| e.triggers_for(Voice::Accent).count() == 0));
    }

    #[test]
    fn lead_triggers_follow_the_pattern() {
        let mut engine = Engine::new(11);
        engine.apply(&Command::SetAutonomous { enabled: false });
        engine.apply(&Command::Start { now: 0.0 });
        let pattern = engine.current_pattern().unwrap().clone();
        let root = i16::from(engine.song().root) + i16::from(engine.song().chord_offset());
        let reports = run_until(&mut engine, 0.0, 1.9);
        let events: Vec<&StepEvent> = reports.iter().flat_map(|r| r.events.iter()).collect();
        assert_eq!(events.len(), STEPS);
        for event in events {
            let leads: Vec<&VoiceTrigger> = event.triggers_for(Voice::Lead).collect();
            match pattern.steps[event.step] {
                Some(offset) => {
                    assert_eq!(leads.len(), 1);
                    assert_eq!(i16::from(leads[0].pitch), root + 12 + i16::from(offset));
                    let shift = leads[0].time - event.time;
                    assert!((shift - f64::from(pattern.offsets[event.step]) * 0.125).abs() < 1e-9);
                }
                None => assert!(leads.is_empty()),
            }
            assert_eq!(event.triggers_for(Voice::Bass).count(), usize::from(event.step == 0));
        }
    }

    #[test]
    fn toggle_step_locks_melody_only_when_autonomous() {
        let mut engine = Engine::new(5);
        engine.apply(&Command::ToggleStep { step: 3 });
        assert!(engine.locks().melody);
        assert!(matches!(
            engine.current_pattern().unwrap().lineage,
            sylvan_drift_music::pattern::Lineage::Edit { step: 3, .. }
        ));

        let mut engine = Engine::new(5);
        engine.apply(&Command::SetAutonomous { enabled: false });
        engine.apply(&Command::ToggleStep { step: 3 });
        assert!(!engine.locks().melody);

        // Out-of-range steps are ignored.
        let id = engine.current_pattern().unwrap().id;
        engine.apply(&Command::ToggleStep { step: 99 });
        assert_eq!(engine.current_pattern().unwrap().id, id);
    }

    #[test]
    fn patch_edits_lock_timbre_and_notify() {
        let mut engine = Engine::new(9);
        engine.drain_notifications();
        engine.apply(&Command::SetSynthMode { mode: SynthMode::Fm });
        engine.apply(&Command::SetFmRatio { ratio: 3.5 });
        assert!(engine.locks().timbre);
        assert_eq!(engine.song().patch.mode, SynthMode::Fm);
        assert_eq!(engine.song().patch.fm_ratio, 3.5);
        let patches = engine
            .drain_notifications()
            .into_iter()
            .filter(|n| matches!(n, Notification::PatchChanged { .. }))
            .count();
        assert_eq!(patches, 2);

        let before = engine.song().patch.clone();
        engine.apply(&Command::SetPatchField {
            field: PatchField::Attack(f32::NAN),
        });
        assert_eq!(engine.song().patch, before);
    }

    #[test]
    fn manual_mutation_bypasses_locks() {
        let mut engine = Engine::new(13);
        for domain in Domain::ALL {
            engine.apply(&Command::SetLock { domain, locked: true });
        }
        let id = engine.current_pattern().unwrap().id;
        let revision = engine.song().revision;
        assert!(!engine.evolve(false));

        engine.apply(&Command::ManualMutation { domain: Domain::Melody });
        assert_ne!(engine.current_pattern().unwrap().id, id);
        engine.apply(&Command::ManualMutation { domain: Domain::Timbre });
        engine.apply(&Command::ManualMutation { domain: Domain::Harmony });
        engine.apply(&Command::ManualMutation { domain: Domain::Rhythm });
        assert_eq!(engine.song().revision, revision + 3);
        assert!(Domain::ALL.iter().all(|&d| engine.locks().is_locked(d)));
    }

    #[test]
    fn filter_and_tempo_are_clamped() {
        let mut engine = Engine::new(2);
        engine.apply(&Command::SetTempo { bpm: 1000.0 });
        assert_eq!(engine.tempo(), 200.0);
        engine.apply(&Command::SetTempo { bpm: -5.0 });
        assert_eq!(engine.tempo(), 60.0);
        engine.apply(&Command::SetFilter {
            cutoff: 3.0,
            resonance: -1.0,
        });
        assert_eq!((engine.cutoff(), engine.resonance()), (1.0, 0.0));
        engine.apply(&Command::SetFilter {
            cutoff: f32::NAN,
            resonance: 0.5,
        });
        assert_eq!(engine.cutoff(), 1.0);
    }

    #[test]
    fn non_finite_clock_is_ignored() {
        let mut engine = Engine::new(21);
        engine.apply(&Command::Start { now: 0.0 });
        engine.tick(0.0);
        let chaos = engine.chaos_scalar();

        let report = engine.tick(f64::NAN);
        assert!(report.events.is_empty());
        assert_eq!(report.rearm_at, None);
        assert_ne!(engine.chaos_scalar(), chaos);
        assert!(engine.tick(f64::INFINITY).events.is_empty());

        // The grid is untouched: the next finite tick carries on at step 1.
        let report = engine.tick(0.1);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].step, 1);
        assert!((report.events[0].time - 0.175).abs() < 1e-9);
    }

    #[test]
    fn stalled_host_gets_no_stale_burst() {
        let mut engine = Engine::new(22);
        engine.apply(&Command::Start { now: 0.0 });
        engine.tick(0.0);
        let report = engine.tick(30.0);
        assert_eq!(report.events.len(), 1);
        assert!(report.events.iter().all(|e| e.time >= 30.0));
        for event in &report.events {
            assert!(event.triggers.iter().all(|t| t.time >= 30.0 - 0.5 * 0.125));
        }
        assert_eq!(report.events[0].step, 1);
        assert!((report.events[0].time - 30.05).abs() < 1e-9);
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let mut config = EngineConfig::default();
        config.scheduler.min_tempo = 250.0;
        config.scheduler.max_tempo = 100.0;
        config.base_tempo = 90.0;
        let mut engine = Engine::with_config(4, config);
        assert_eq!(engine.config().scheduler.min_tempo, 60.0);
        assert_eq!(engine.tempo(), 120.0);
        engine.apply(&Command::SetTempo { bpm: 500.0 });
        assert_eq!(engine.tempo(), 200.0);

        let mut config = EngineConfig::default();
        config.scheduler.max_tempo = f64::NAN;
        let engine = Engine::with_config(4, config);
        assert_eq!(engine.config().scheduler.max_tempo, 200.0);
    }

    #[test]
    fn arpeggio_walks_chord_tones() {
        let mut engine = Engine::new(17);
        engine.apply(&Command::SetAutonomous { enabled: false });
        engine.apply(&Command::SetArpMode { mode: ArpMode::Up });
        // Peak lets every eighth note through.
        engine.apply(&Command::ForceTransition);
        engine.apply(&Command::ForceTransition);
        assert_eq!(engine.phase(), MacroPhase::Peak);
        engine.apply(&Command::Start { now: 0.0 });
        let reports = run_until(&mut engine, 0.0, 1.9);
        let arp: Vec<u8> = reports
            .iter()
            .flat_map(|r| r.events.iter())
            .flat_map(|e| e.triggers_for(Voice::Arp))
            .map(|t| t.pitch)
            .collect();
        assert_eq!(arp.len(), 8);
        assert!(arp[0] < arp[1] && arp[1] < arp[2] && arp[2] < arp[3]);
        assert_eq!(arp[3] - arp[0], 12);
        assert_eq!(arp[4], arp[0]);
    }
}
