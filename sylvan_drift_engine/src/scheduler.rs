// Lookahead scheduler: wall-clock seconds in, 16th-note steps out.
//
// The host calls `Engine::tick(now)` on a coarse, jittery timer. On each
// call the scheduler hands out every step whose grid time falls before
// `now + lookahead`, so the renderer always has the next ~100 ms queued and
// timer jitter never shifts a note. After draining, the host should tick
// again at `now + rearm_delay`.
//
// `next_event_time` only moves forward, by one step duration
// (60 / bpm / 4) per produced step, using the tempo in force at that moment:
// a tempo change affects future intervals only.
//
// The step index wraps mod 16; each wrap bumps the measure counter, and
// `advance()` reports it so the engine can run bar bookkeeping.
//
// A host that stalls for longer than the lookahead would otherwise get a
// burst of steps that are already in the past. `is_stalled(now)` reports
// that case so the engine can `resync` the grid before draining. Non-finite
// clock values never make a step due.
//
// `start(now)` places the first step `start_lead` ahead of `now` and zeroes
// the counters. `stop()` clears the running flag, which both cancels the
// pending re-arm (`rearm_at` returns `None`) and makes stale ticks produce
// nothing. Stopping twice is harmless.

use crate::config::SchedulerConfig;
use crate::types::STEPS;
use serde::{Deserialize, Serialize};

/// A step the engine should produce now.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledStep {
    pub time: f64,
    pub step: usize,
    pub measure: u64,
    /// Duration of this step at the tempo it was scheduled with.
    pub duration: f64,
}

#[derive(Clone, Debug)]
pub struct LookaheadScheduler {
    config: SchedulerConfig,
    tempo: f64,
    running: bool,
    next_event_time: f64,
    step: usize,
    measure: u64,
}

impl LookaheadScheduler {
    pub fn new(config: SchedulerConfig, tempo: f64) -> Self {
        let mut scheduler = Self {
            config,
            tempo: 120.0,
            running: false,
            next_event_time: 0.0,
            step: 0,
            measure: 0,
        };
        scheduler.set_tempo(tempo);
        scheduler
    }

    pub fn start(&mut self, now: f64) {
        self.running = true;
        self.next_event_time = now + self.config.start_lead;
        self.step = 0;
        self.measure = 0;
    }

    /// Returns whether the transport was running.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Clamp and set the tempo. Non-finite input is ignored. Returns the
    /// tempo now in force.
    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        if bpm.is_finite() {
            self.tempo = bpm.clamp(self.config.min_tempo, self.config.max_tempo);
        }
        self.tempo
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Seconds per 16th note at the current tempo.
    pub fn step_duration(&self) -> f64 {
        60.0 / self.tempo / 4.0
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn measure(&self) -> u64 {
        self.measure
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    /// The next step, if it is due within the lookahead window.
    pub fn next_due(&self, now: f64) -> Option<ScheduledStep> {
        if !self.running
            || !now.is_finite()
            || self.next_event_time >= now + self.config.lookahead
        {
            return None;
        }
        Some(ScheduledStep {
            time: self.next_event_time,
            step: self.step,
            measure: self.measure,
            duration: self.step_duration(),
        })
    }

    /// Move past the step just produced. Returns `true` when this completed
    /// a measure.
    pub fn advance(&mut self) -> bool {
        self.next_event_time += self.step_duration();
        self.step += 1;
        if self.step == STEPS {
            self.step = 0;
            self.measure += 1;
            true
        } else {
            false
        }
    }

    /// Whether the next step is more than one lookahead window in the past.
    pub fn is_stalled(&self, now: f64) -> bool {
        self.running && now.is_finite() && self.next_event_time < now - self.config.lookahead
    }

    /// Jump the grid forward after a host stall, keeping step and measure.
    pub fn resync(&mut self, now: f64) {
        if now.is_finite() {
            self.next_event_time = now + self.config.start_lead;
        }
    }

    /// When the host should call back, or `None` when stopped.
    pub fn rearm_at(&self, now: f64) -> Option<f64> {
        self.running.then(|| now + self.config.rearm_delay)
    }

    pub fn max_steps_per_tick(&self) -> usize {
        self.config.max_steps_per_tick
    }
}
