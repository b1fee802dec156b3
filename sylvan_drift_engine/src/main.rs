// Sylvan Drift: headless CLI entry point.
//
// Runs the engine against a simulated clock, ticking at the scheduler's
// re-arm interval, and prints every step event as one JSON line on stdout.
// Tracing output goes to stderr (filter with RUST_LOG, default `info`).
//
// Usage:
//   cargo run -p sylvan_drift_engine --bin drift -- [--seed N] [--bars N]
//     [--tempo BPM] [--mood MOOD] [--config PATH] [--feedback] [--summary]
//
// Moods: ethereal, euphoric, melancholic, dark, mystic
//
// `--feedback` feeds a synthetic bio-feedback snapshot once per simulated
// second. `--summary` suppresses the JSON stream and prints a short report
// at the end instead.

use sylvan_drift_engine::event::{LogClass, Notification};
use sylvan_drift_engine::types::{AgentType, BioSnapshot};
use sylvan_drift_engine::{Command, Engine, EngineConfig};
use sylvan_drift_music::scale::Mood;
use sylvan_drift_prng::GameRng;

/// Salt for the synthetic agent-simulation stream, so it never shares
/// draws with the engine.
const FEEDBACK_SALT: u64 = 0xb10_feed;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let seed: u64 = parse_flag(&args, "--seed").unwrap_or(42);
    let bars: u64 = parse_flag(&args, "--bars").unwrap_or(40);
    let tempo: Option<f64> = parse_flag(&args, "--tempo");
    let mood: Option<Mood> = parse_flag(&args, "--mood");
    let config_path: Option<String> = parse_flag(&args, "--config");
    let feedback = has_flag(&args, "--feedback");
    let summary = has_flag(&args, "--summary");

    let mut config = match config_path {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {path}: {e}");
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(tempo) = tempo {
        config.base_tempo = tempo;
    }
    if let Some(mood) = mood {
        config.initial_mood = mood;
    }

    let rearm = config.scheduler.rearm_delay;
    let mut engine = Engine::with_config(seed, config);
    let mut agents = GameRng::derive(seed, FEEDBACK_SALT);

    let mut now = 0.0;
    let mut next_snapshot = 1.0;
    let mut steps = 0usize;
    let mut phase_log = Vec::new();
    engine.apply(&Command::Start { now });

    while engine.measure() < bars {
        if feedback && now >= next_snapshot {
            let snapshot = synthetic_snapshot(&mut agents, now);
            engine.apply(&Command::FeedSnapshot { snapshot });
            next_snapshot += 1.0;
        }

        let report = engine.tick(now);
        steps += report.events.len();
        for note in &report.notifications {
            if let Notification::Log {
                class: LogClass::Event,
                message,
            } = note
            {
                phase_log.push(format!("{now:8.2}s  {message}"));
            }
        }
        if !summary {
            for event in &report.events {
                match serde_json::to_string(event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::error!("failed to serialize step event: {e}"),
                }
            }
        }
        now = report.rearm_at.unwrap_or(now + rearm);
    }
    engine.apply(&Command::Stop);

    if summary {
        println!("=== Sylvan Drift ===");
        println!("Seed: {seed}");
        println!("Bars: {bars} ({steps} steps, {now:.1}s simulated)");
        println!("Final tempo: {:.1} BPM", engine.tempo());
        println!("Mood: {}", engine.mood());
        println!("Phase: {} (generation {})", engine.phase(), engine.generation());
        println!(
            "Elite archive: {} patterns (best {:.1})",
            engine.evolver().archive().len(),
            engine.evolver().archive().best().map_or(0.0, |p| p.fitness)
        );
        println!("Song revision: {}", engine.song().revision);
        println!();
        for line in &phase_log {
            println!("{line}");
        }
    }
}

/// A slowly wandering population, loosely imitating an agent simulation.
fn synthetic_snapshot(rng: &mut GameRng, now: f64) -> BioSnapshot {
    let wave = (now / 30.0).sin();
    let types = [
        AgentType::Forager,
        AgentType::Predator,
        AgentType::Symbiont,
        AgentType::Wanderer,
    ];
    BioSnapshot {
        population: (60.0 + 30.0 * wave + rng.range_f64(-5.0, 5.0)).max(0.0) as u32,
        average_energy: 50.0 + 40.0 * wave,
        dominant_type: rng.pick(&types).copied().unwrap_or_default(),
        synergy: rng.range_f64(0.0, 1.0),
    }
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
