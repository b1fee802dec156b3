// End-to-end composition tests: drive a full `Engine` through a simulated
// clock and check the long-form behaviour that no single module owns
// (evolution cadence, the 40-bar phase arc and rebirth, locks against
// autonomy, transport restarts, determinism).

use sylvan_drift_engine::event::{LogClass, Notification, StepEvent, TickReport, Voice};
use sylvan_drift_engine::types::{AgentType, BioSnapshot, Domain, MacroPhase};
use sylvan_drift_engine::{Command, Engine};

const TICK: f64 = 0.025;

/// Tick from `start` until `bars` measures have completed. Returns the
/// reports and the clock value where it stopped.
fn run_bars(engine: &mut Engine, start: f64, bars: u64) -> (Vec<TickReport>, f64) {
    let mut reports = Vec::new();
    let mut now = start;
    while engine.measure() < bars {
        reports.push(engine.tick(now));
        now += TICK;
        assert!(now < start + 10_000.0, "engine stalled");
    }
    (reports, now)
}

fn logs(reports: &[TickReport], class: LogClass) -> Vec<String> {
    reports
        .iter()
        .flat_map(|r| r.logs(class).map(str::to_string))
        .collect()
}

fn events(reports: &[TickReport]) -> Vec<&StepEvent> {
    reports.iter().flat_map(|r| r.events.iter()).collect()
}

#[test]
fn second_evolution_mutates_or_crosses_the_genesis_pattern() {
    for seed in 0..20 {
        let mut engine = Engine::new(seed);
        let genesis = engine.current_pattern().unwrap().clone();
        assert_eq!(engine.generation(), 0);
        engine.drain_notifications();

        assert!(engine.evolve(false));
        let notes = engine.drain_notifications();
        let action = notes
            .iter()
            .find_map(|n| match n {
                Notification::Log {
                    class: LogClass::Exec,
                    message,
                } => Some(message.clone()),
                _ => None,
            })
            .unwrap();
        assert!(
            action.contains("MUTATION") || action.contains("CROSSOVER"),
            "seed {seed}: {action}"
        );
        assert_eq!(engine.generation(), 1);
        let child = engine.current_pattern().unwrap();
        assert_ne!(child.id, genesis.id);
        assert!(child.lineage.references(genesis.id), "seed {seed}: {}", child.lineage);
        assert!(notes.iter().any(|n| matches!(
            n,
            Notification::PatternChanged { pattern, .. } if pattern.id == child.id
        )));
    }
}

#[test]
fn forty_bars_complete_one_arc_and_rebirth() {
    let mut engine = Engine::new(2024);
    assert_eq!(engine.song().revision, 1);
    engine.apply(&Command::Start { now: 0.0 });
    let (reports, _) = run_bars(&mut engine, 0.0, 40);

    let arc = logs(&reports, LogClass::Event);
    assert_eq!(arc.len(), 5, "{arc:?}");
    assert_eq!(arc[0], "PHASE DRIFT -> BUILD");
    assert_eq!(arc[1], "PHASE BUILD -> PEAK");
    assert_eq!(arc[2], "PHASE PEAK -> COMEDOWN");
    assert_eq!(arc[3], "PHASE COMEDOWN -> DRIFT");
    assert!(arc[4].starts_with("REBIRTH"));

    // Ten evolution ticks (every 4 bars), then the rebirth reset.
    let exec = logs(&reports, LogClass::Exec);
    assert!(exec.iter().any(|m| m.contains(" gen 10 ")), "{exec:?}");
    assert_eq!(engine.phase(), MacroPhase::Drift);
    assert_eq!(engine.generation(), 0);
    assert_eq!(engine.song().revision, 2);
}

#[test]
fn step_stream_is_gapless_and_ordered() {
    let mut engine = Engine::new(8);
    engine.apply(&Command::Start { now: 3.0 });
    let (reports, _) = run_bars(&mut engine, 3.0, 6);
    let events = events(&reports);
    assert!(events.len() >= 6 * 16);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.step, i % 16);
        assert_eq!(event.measure, (i / 16) as u64);
        assert!((0.0..=1.0).contains(&event.chaos));
        let expected = 3.05 + i as f64 * 0.125;
        assert!((event.time - expected).abs() < 1e-6, "step {i} at {}", event.time);
        for trigger in &event.triggers {
            assert!((trigger.time - event.time).abs() <= 0.5 * 0.125 + 1e-9);
            assert!((0.0..=1.0).contains(&trigger.velocity));
            assert!((0.0..=1.0).contains(&trigger.cutoff));
        }
        assert_eq!(
            event.triggers.iter().filter(|t| t.voice == Voice::Bass).count(),
            usize::from(event.step == 0)
        );
    }
}

#[test]
fn counterpoint_always_tracks_the_current_melody() {
    let mut engine = Engine::new(31);
    engine.apply(&Command::Start { now: 0.0 });
    let mut now = 0.0;
    while engine.measure() < 20 {
        engine.tick(now);
        let melody = engine.current_pattern().unwrap().id;
        assert_eq!(engine.counterpoint().unwrap().source, melody);
        now += TICK;
    }
}

#[test]
fn without_autonomy_nothing_evolves_or_transitions() {
    let mut engine = Engine::new(77);
    engine.apply(&Command::SetAutonomous { enabled: false });
    let id = engine.current_pattern().unwrap().id;
    let revision = engine.song().revision;
    engine.apply(&Command::Start { now: 0.0 });
    let (reports, _) = run_bars(&mut engine, 0.0, 48);
    assert!(logs(&reports, LogClass::Event).is_empty());
    assert_eq!(engine.phase(), MacroPhase::Drift);
    assert_eq!(engine.bars_in_phase(), 48);
    assert_eq!(engine.generation(), 0);
    assert_eq!(engine.current_pattern().unwrap().id, id);
    assert_eq!(engine.song().revision, revision);
}

#[test]
fn melody_lock_freezes_the_pattern_but_not_the_arc() {
    let mut engine = Engine::new(19);
    engine.apply(&Command::SetLock {
        domain: Domain::Melody,
        locked: true,
    });
    let id = engine.current_pattern().unwrap().id;
    engine.apply(&Command::Start { now: 0.0 });
    run_bars(&mut engine, 0.0, 12);
    assert_eq!(engine.current_pattern().unwrap().id, id);
    assert_eq!(engine.generation(), 0);
    assert_eq!(engine.phase(), MacroPhase::Build);

    engine.apply(&Command::SetLock {
        domain: Domain::Melody,
        locked: false,
    });
    let start = 12.0 * 2.0 + 1.0;
    engine.apply(&Command::Start { now: start });
    run_bars(&mut engine, start, 4);
    assert_ne!(engine.current_pattern().unwrap().id, id);
}

#[test]
fn locked_rebirth_keeps_the_song() {
    let mut engine = Engine::new(4);
    for domain in [Domain::Harmony, Domain::Timbre, Domain::Rhythm] {
        engine.apply(&Command::SetLock { domain, locked: true });
    }
    let song = engine.song().clone();
    engine.apply(&Command::Start { now: 0.0 });
    let (reports, _) = run_bars(&mut engine, 0.0, 40);
    assert!(logs(&reports, LogClass::Event).iter().any(|m| m.starts_with("REBIRTH")));
    assert_eq!(engine.generation(), 0);
    assert_eq!(engine.song().root, song.root);
    assert_eq!(engine.song().progression, song.progression);
    assert_eq!(engine.song().patch, song.patch);
    assert_eq!(engine.song().rhythm, song.rhythm);
    assert_eq!(engine.song().revision, song.revision);
}

#[test]
fn restart_reinitializes_timing() {
    let mut engine = Engine::new(6);
    engine.apply(&Command::Start { now: 0.0 });
    let (_, now) = run_bars(&mut engine, 0.0, 2);
    engine.apply(&Command::Stop);
    assert!(!engine.is_running());
    let stale = engine.tick(now + 1.0);
    assert!(stale.events.is_empty());
    assert!(stale.rearm_at.is_none());

    engine.apply(&Command::Start { now: 100.0 });
    assert_eq!(engine.measure(), 0);
    let report = engine.tick(100.0);
    assert_eq!(report.events.len(), 1);
    let first = &report.events[0];
    assert_eq!((first.step, first.measure), (0, 0));
    assert!((first.time - 100.05).abs() < 1e-9);
    assert!(report.rearm_at.is_some_and(|t| (t - 100.025).abs() < 1e-9));
}

#[test]
fn elite_archive_stays_bounded_and_sorted() {
    let mut engine = Engine::new(99);
    let mut mass_extinctions = 0;
    for _ in 0..400 {
        engine.drain_notifications();
        assert!(engine.evolve(true));
        let generation = engine.generation();
        let notes = engine.drain_notifications();
        let mass = notes.iter().any(|n| matches!(
            n,
            Notification::Log { message, .. } if message.starts_with("MASS EXTINCTION MUTATION x8")
        ));
        assert_eq!(mass, generation % 16 == 0, "generation {generation}");
        if mass {
            mass_extinctions += 1;
        }

        let archive = engine.evolver().archive();
        assert!(archive.len() <= 10);
        let scores: Vec<f64> = archive.members().iter().map(|p| p.fitness).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
        assert!(scores.iter().all(|&s| s > 50.0));
    }
    assert_eq!(mass_extinctions, 25);
}

#[test]
fn feedback_respects_autonomy_and_locks() {
    let crowded = BioSnapshot {
        population: 200,
        average_energy: 100.0,
        dominant_type: AgentType::Symbiont,
        synergy: 0.5,
    };

    let mut engine = Engine::new(12);
    engine.apply(&Command::SetAutonomous { enabled: false });
    let revision = engine.song().revision;
    engine.apply(&Command::FeedSnapshot { snapshot: crowded });
    assert_eq!(engine.tempo(), 120.0);
    assert_eq!(engine.song().revision, revision);

    let mut engine = Engine::new(12);
    engine.apply(&Command::SetLock {
        domain: Domain::Timbre,
        locked: true,
    });
    let revision = engine.song().revision;
    let cutoff = engine.cutoff();
    engine.apply(&Command::FeedSnapshot { snapshot: crowded });
    assert!((engine.tempo() - 120.05).abs() < 1e-9);
    assert_eq!(engine.cutoff(), cutoff);
    // Crowding outside PEAK re-rolls the rhythm.
    assert_eq!(engine.song().revision, revision + 1);

    engine.apply(&Command::SetLock {
        domain: Domain::Rhythm,
        locked: true,
    });
    engine.apply(&Command::FeedSnapshot { snapshot: crowded });
    assert_eq!(engine.song().revision, revision + 1);
}

#[test]
fn same_seed_same_session() {
    fn session(seed: u64) -> Vec<TickReport> {
        let mut engine = Engine::new(seed);
        engine.apply(&Command::Start { now: 0.0 });
        let mut reports = Vec::new();
        let mut now = 0.0;
        for i in 0..2000 {
            if i % 40 == 0 {
                engine.apply(&Command::FeedSnapshot {
                    snapshot: BioSnapshot {
                        population: 50 + (i / 40) as u32,
                        average_energy: (i % 100) as f64,
                        dominant_type: AgentType::Wanderer,
                        synergy: 0.8,
                    },
                });
            }
            if i == 700 {
                engine.apply(&Command::ToggleStep { step: 5 });
            }
            reports.push(engine.tick(now));
            now += TICK;
        }
        reports
    }

    assert_eq!(session(1234), session(1234));
    assert_ne!(session(1234), session(4321));
}
