// Genetic evolution of the melodic pattern.
//
// `PatternEvolver` owns the current `Pattern`, the generation counter and the
// two crossover pools (`EliteArchive`, `PatternHistory`). Each call to
// `evolve()` replaces the current pattern with an offspring:
//
// 1. Gate: unless forced, nothing happens while the melody lock is set or
//    autonomous evolution is off.
// 2. Genesis: with no current pattern, roll a fresh random one (each step a
//    note with p = 0.4, pitch uniform over the mood's degrees).
// 3. Otherwise archive the outgoing pattern: score it (`fitness.rs`), offer
//    it to the elite archive when it clears the threshold, push it into the
//    history ring, and bump the generation.
// 4. Pick a reproduction strategy:
//    - Learning crossover (~30%, an elite other than the parent exists):
//      splice steps and velocities at the midpoint with a random elite.
//    - Plain crossover (~25%, >= 2 history entries): splice all three lanes
//      with a random non-latest history entry.
//    - Mutation (default): K point mutations, K = 1–2.
//    Every `mass_extinction_period`-th generation is a "mass extinction":
//    crossover is skipped and exactly 8 aggressive point mutations apply.
//
// The offspring gets a fresh id and a `Lineage` naming its parents; the
// caller regenerates counterpoint and notifies listeners.
//
// Also hosts the user step edit (`toggle_step`), which cycles a step through
// rest → root → random degree → rest.
//
// Depends on fitness.rs for scoring, scale.rs for the degree set, pattern.rs
// for the pools.

use crate::fitness::{FitnessWeights, evaluate};
use crate::pattern::{EliteArchive, Lineage, Pattern, PatternHistory};
use crate::scale::Mood;
use crate::types::{PatternId, STEPS};
use serde::{Deserialize, Serialize};
use std::fmt;
use sylvan_drift_prng::GameRng;

/// Evolution parameters. The threshold, capacities and extinction period
/// are empirical defaults, exposed so hosts can tune them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Outgoing patterns scoring strictly above this enter the elite archive.
    pub elite_threshold: f64,
    pub elite_capacity: usize,
    pub history_capacity: usize,
    /// Every N-th generation is a mass extinction. 0 disables it.
    pub mass_extinction_period: u32,

    /// Probability that a genesis step holds a note.
    pub genesis_note_probability: f64,
    /// Velocity range `[min, max)` for new notes.
    pub velocity_range: (f32, f32),

    pub learned_crossover_probability: f64,
    pub crossover_probability: f64,

    /// Inclusive range of point mutations in a normal generation.
    pub mutations_per_generation: (usize, usize),
    pub mass_extinction_mutations: usize,

    /// Probability a mutated note is re-pitched rather than deleted.
    pub repitch_probability: f64,
    pub mass_repitch_probability: f64,
    /// Probability a re-pitch moves to a neighbouring degree instead of a
    /// random one.
    pub adjacent_degree_probability: f64,
    /// Probability a mutated rest becomes a note.
    pub insert_probability: f64,
    pub mass_insert_probability: f64,
    /// Probability of nudging the micro-timing of a mutated step.
    pub offset_perturb_probability: f64,
    /// Largest micro-timing nudge, in fractions of a step.
    pub offset_perturb_max: f32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            elite_threshold: 50.0,
            elite_capacity: 10,
            history_capacity: 5,
            mass_extinction_period: 16,

            genesis_note_probability: 0.4,
            velocity_range: (0.5, 1.0),

            learned_crossover_probability: 0.3,
            crossover_probability: 0.25,

            mutations_per_generation: (1, 2),
            mass_extinction_mutations: 8,

            repitch_probability: 0.8,
            mass_repitch_probability: 0.5,
            adjacent_degree_probability: 0.85,
            insert_probability: 0.15,
            mass_insert_probability: 0.5,
            offset_perturb_probability: 0.3,
            offset_perturb_max: 0.1,
        }
    }
}

/// Whether autonomous evolution may run right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvolutionGate {
    pub autonomous: bool,
    pub melody_locked: bool,
}

impl EvolutionGate {
    pub fn open(&self) -> bool {
        self.autonomous && !self.melody_locked
    }
}

/// How an offspring was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    Genesis,
    Mutation { count: usize, mass_extinction: bool },
    Crossover,
    LearnedCrossover,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Genesis => write!(f, "GENESIS"),
            Strategy::Mutation {
                count,
                mass_extinction: true,
            } => write!(f, "MASS EXTINCTION MUTATION x{count}"),
            Strategy::Mutation { count, .. } => write!(f, "MUTATION x{count}"),
            Strategy::Crossover => write!(f, "CROSSOVER"),
            Strategy::LearnedCrossover => write!(f, "LEARNED CROSSOVER"),
        }
    }
}

/// Result of one successful `evolve()` call.
#[derive(Clone, Debug)]
pub struct EvolutionOutcome {
    pub pattern: Pattern,
    pub strategy: Strategy,
    /// Fitness of the pattern that was replaced, if there was one.
    pub outgoing_score: Option<f64>,
    /// Whether the replaced pattern entered the elite archive.
    pub archived: bool,
}

/// Whether `generation` is a mass-extinction generation.
pub fn is_mass_extinction(generation: u32, period: u32) -> bool {
    period > 0 && generation > 0 && generation % period == 0
}

/// Number of point mutations to apply at `generation`.
pub fn mutation_count(generation: u32, config: &EvolutionConfig, rng: &mut GameRng) -> usize {
    if is_mass_extinction(generation, config.mass_extinction_period) {
        return config.mass_extinction_mutations;
    }
    let (low, high) = config.mutations_per_generation;
    rng.range_usize_inclusive(low, high.max(low))
}

/// Owner of the melodic genome and its evolutionary memory.
#[derive(Clone, Debug)]
pub struct PatternEvolver {
    config: EvolutionConfig,
    weights: FitnessWeights,
    current: Option<Pattern>,
    archive: EliteArchive,
    history: PatternHistory,
    generation: u32,
}

impl PatternEvolver {
    pub fn new(config: EvolutionConfig, weights: FitnessWeights) -> Self {
        let archive = EliteArchive::new(config.elite_capacity);
        let history = PatternHistory::new(config.history_capacity);
        Self {
            config,
            weights,
            current: None,
            archive,
            history,
            generation: 0,
        }
    }

    pub fn current(&self) -> Option<&Pattern> {
        self.current.as_ref()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Rebirth: start counting generations again. The current pattern and
    /// both pools survive.
    pub fn reset_generation(&mut self) {
        self.generation = 0;
    }

    pub fn archive(&self) -> &EliteArchive {
        &self.archive
    }

    pub fn history(&self) -> &PatternHistory {
        &self.history
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Score a pattern with this evolver's weights.
    pub fn evaluate(&self, pattern: &Pattern, mood: Mood) -> f64 {
        evaluate(pattern, mood, &self.weights)
    }

    /// Run one evolution tick. Returns `None` when gated off.
    pub fn evolve(
        &mut self,
        gate: EvolutionGate,
        force: bool,
        mood: Mood,
        rng: &mut GameRng,
    ) -> Option<EvolutionOutcome> {
        if !force && !gate.open() {
            return None;
        }

        let Some(outgoing) = self.current.take() else {
            let pattern = self.genesis(mood, rng);
            tracing::debug!(id = %pattern.id, notes = pattern.note_count(), "genesis pattern");
            self.current = Some(pattern.clone());
            return Some(EvolutionOutcome {
                pattern,
                strategy: Strategy::Genesis,
                outgoing_score: None,
                archived: false,
            });
        };

        let score = self.evaluate(&outgoing, mood);
        let scored = outgoing.with_fitness(score);
        let archived = score > self.config.elite_threshold && self.archive.insert(scored.clone());
        self.history.push(scored);

        self.generation += 1;
        let mass = is_mass_extinction(self.generation, self.config.mass_extinction_period);

        let (offspring, strategy) = self.reproduce(&outgoing, mass, mood, rng);
        tracing::debug!(
            generation = self.generation,
            %strategy,
            outgoing_score = score,
            archived,
            "evolved pattern"
        );
        self.current = Some(offspring.clone());
        Some(EvolutionOutcome {
            pattern: offspring,
            strategy,
            outgoing_score: Some(score),
            archived,
        })
    }

    /// Cycle one step through rest → root → random degree → rest, producing
    /// a new current pattern. Returns `None` with no current pattern or an
    /// out-of-range step.
    pub fn toggle_step(&mut self, step: usize, mood: Mood, rng: &mut GameRng) -> Option<Pattern> {
        if step >= STEPS {
            return None;
        }
        let parent = self.current.as_ref()?;
        let mut steps = parent.steps;
        let mut velocities = parent.velocities;
        steps[step] = match parent.steps[step] {
            None => Some(0),
            Some(0) => {
                let non_root: Vec<i8> =
                    mood.degrees().iter().copied().filter(|&d| d != 0).collect();
                Some(rng.pick(&non_root).copied().unwrap_or(0))
            }
            Some(_) => None,
        };
        if parent.steps[step].is_none() {
            velocities[step] = velocities[step].max(self.config.velocity_range.0);
        }
        let edited = Pattern {
            id: PatternId::new(rng),
            steps,
            velocities,
            offsets: parent.offsets,
            generation: parent.generation,
            lineage: Lineage::Edit {
                parent: parent.id,
                step,
            },
            fitness: 0.0,
        };
        self.current = Some(edited.clone());
        Some(edited)
    }

    fn genesis(&self, mood: Mood, rng: &mut GameRng) -> Pattern {
        let mut steps = [None; STEPS];
        let mut velocities = [0.0; STEPS];
        for (slot, velocity) in steps.iter_mut().zip(velocities.iter_mut()) {
            if rng.random_bool(self.config.genesis_note_probability) {
                *slot = rng.pick(mood.degrees()).copied();
                *velocity = self.roll_velocity(rng);
            }
        }
        Pattern {
            id: PatternId::new(rng),
            steps,
            velocities,
            offsets: [0.0; STEPS],
            generation: self.generation,
            lineage: Lineage::Genesis,
            fitness: 0.0,
        }
    }

    fn reproduce(
        &self,
        parent: &Pattern,
        mass: bool,
        mood: Mood,
        rng: &mut GameRng,
    ) -> (Pattern, Strategy) {
        // The outgoing pattern may have just been archived; never splice it
        // with itself.
        let elites: Vec<&Pattern> = self
            .archive
            .members()
            .iter()
            .filter(|elite| elite.id != parent.id)
            .collect();
        if !mass && !elites.is_empty() && rng.random_bool(self.config.learned_crossover_probability)
        {
            if let Some(elite) = rng.pick(&elites) {
                return (self.learned_crossover(parent, elite, rng), Strategy::LearnedCrossover);
            }
        }

        if !mass && self.history.len() >= 2 && rng.random_bool(self.config.crossover_probability) {
            let pool: Vec<&Pattern> = self.history.older().collect();
            if let Some(donor) = rng.pick(&pool) {
                return (self.crossover(parent, donor, rng), Strategy::Crossover);
            }
        }

        let count = mutation_count(self.generation, &self.config, rng);
        let child = self.mutate(parent, count, mass, mood, rng);
        (
            child,
            Strategy::Mutation {
                count,
                mass_extinction: mass,
            },
        )
    }

    /// Steps and velocities from the elite past the midpoint; offsets stay
    /// with the parent.
    fn learned_crossover(&self, parent: &Pattern, elite: &Pattern, rng: &mut GameRng) -> Pattern {
        let mid = STEPS / 2;
        let mut steps = parent.steps;
        let mut velocities = parent.velocities;
        steps[mid..].copy_from_slice(&elite.steps[mid..]);
        velocities[mid..].copy_from_slice(&elite.velocities[mid..]);
        self.offspring(
            steps,
            velocities,
            parent.offsets,
            Lineage::LearnedCrossover {
                parent: parent.id,
                elite: elite.id,
            },
            rng,
        )
    }

    fn crossover(&self, parent: &Pattern, donor: &Pattern, rng: &mut GameRng) -> Pattern {
        let mid = STEPS / 2;
        let mut steps = parent.steps;
        let mut velocities = parent.velocities;
        let mut offsets = parent.offsets;
        steps[mid..].copy_from_slice(&donor.steps[mid..]);
        velocities[mid..].copy_from_slice(&donor.velocities[mid..]);
        offsets[mid..].copy_from_slice(&donor.offsets[mid..]);
        self.offspring(
            steps,
            velocities,
            offsets,
            Lineage::Crossover {
                parent: parent.id,
                donor: donor.id,
            },
            rng,
        )
    }

    fn mutate(
        &self,
        parent: &Pattern,
        count: usize,
        mass: bool,
        mood: Mood,
        rng: &mut GameRng,
    ) -> Pattern {
        let cfg = &self.config;
        let (repitch_p, insert_p) = if mass {
            (cfg.mass_repitch_probability, cfg.mass_insert_probability)
        } else {
            (cfg.repitch_probability, cfg.insert_probability)
        };

        let mut steps = parent.steps;
        let mut velocities = parent.velocities;
        let mut offsets = parent.offsets;

        for _ in 0..count {
            let step = rng.range_usize(0, STEPS);
            match steps[step] {
                Some(pitch) => {
                    if rng.random_bool(repitch_p) {
                        steps[step] = Some(self.repitch(pitch, mood, rng));
                    } else {
                        steps[step] = None;
                    }
                    if rng.random_bool(cfg.offset_perturb_probability)
                        && cfg.offset_perturb_max > 0.0
                    {
                        let delta = rng.range_f32(-cfg.offset_perturb_max, cfg.offset_perturb_max);
                        offsets[step] = (offsets[step] + delta).clamp(-0.5, 0.5);
                    }
                }
                None => {
                    if rng.random_bool(insert_p) {
                        steps[step] = rng.pick(mood.degrees()).copied();
                        velocities[step] = self.roll_velocity(rng);
                    }
                }
            }
        }

        self.offspring(
            steps,
            velocities,
            offsets,
            Lineage::Mutation {
                parent: parent.id,
                mutations: count,
                mass_extinction: mass,
            },
            rng,
        )
    }

    /// Move to a neighbouring scale degree most of the time, otherwise (or
    /// when the pitch is outside the scale) jump to a random degree.
    fn repitch(&self, pitch: i8, mood: Mood, rng: &mut GameRng) -> i8 {
        let degrees = mood.degrees();
        let random = |rng: &mut GameRng| rng.pick(degrees).copied().unwrap_or(pitch);
        let Some(idx) = mood.degree_index(pitch) else {
            return random(rng);
        };
        if !rng.random_bool(self.config.adjacent_degree_probability) {
            return random(rng);
        }
        let up = rng.random_bool(0.5);
        let next = match (up, idx) {
            (true, i) if i + 1 < degrees.len() => i + 1,
            (false, i) if i > 0 => i - 1,
            // At the edge of the scale, step the only way available.
            (true, i) => i.saturating_sub(1),
            (false, i) => (i + 1).min(degrees.len() - 1),
        };
        // Keep the octave the pitch lived in.
        let octave_shift = pitch - degrees[idx];
        degrees[next] + octave_shift
    }

    fn roll_velocity(&self, rng: &mut GameRng) -> f32 {
        let (low, high) = self.config.velocity_range;
        if low < high {
            rng.range_f32(low, high)
        } else {
            low
        }
    }

    fn offspring(
        &self,
        steps: [Option<i8>; STEPS],
        velocities: [f32; STEPS],
        offsets: [f32; STEPS],
        lineage: Lineage,
        rng: &mut GameRng,
    ) -> Pattern {
        Pattern {
            id: PatternId::new(rng),
            steps,
            velocities,
            offsets,
            generation: self.generation,
            lineage,
            fitness: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: EvolutionGate = EvolutionGate {
        autonomous: true,
        melody_locked: false,
    };

    fn evolver() -> PatternEvolver {
        PatternEvolver::new(EvolutionConfig::default(), FitnessWeights::default())
    }

    #[test]
    fn genesis_then_offspring_keep_sixteen_steps() {
        let mut rng = GameRng::new(42);
        let mut evo = evolver();
        for _ in 0..100 {
            let out = evo.evolve(OPEN, false, Mood::Euphoric, &mut rng).unwrap();
            let p = &out.pattern;
            assert_eq!(p.steps.len(), STEPS);
            assert_eq!(p.velocities.len(), STEPS);
            assert_eq!(p.offsets.len(), STEPS);
            assert!(p.offsets.iter().all(|o| (-0.5..=0.5).contains(o)));
            assert!(
                p.steps.iter().flatten().all(|&s| Mood::Euphoric.contains(s)),
                "all pitches should stay in scale"
            );
        }
        assert_eq!(evo.generation(), 99);
    }

    #[test]
    fn genesis_uses_scale_degrees_and_velocity_range() {
        let mut rng = GameRng::new(7);
        let mut evo = evolver();
        let out = evo.evolve(OPEN, false, Mood::Dark, &mut rng).unwrap();
        assert_eq!(out.strategy, Strategy::Genesis);
        assert_eq!(out.pattern.generation, 0);
        assert_eq!(out.pattern.lineage, Lineage::Genesis);
        for (step, vel) in out.pattern.steps.iter().zip(out.pattern.velocities.iter()) {
            if let Some(pitch) = step {
                assert!(Mood::Dark.degrees().contains(pitch));
                assert!((0.5..1.0).contains(vel), "velocity {vel} out of genesis range");
            }
        }
    }

    #[test]
    fn mass_extinction_always_applies_eight_mutations() {
        let config = EvolutionConfig::default();
        for seed in 0..50 {
            let mut rng = GameRng::new(seed);
            for generation in [16, 32, 48, 160] {
                assert_eq!(mutation_count(generation, &config, &mut rng), 8);
            }
            let normal = mutation_count(17, &config, &mut rng);
            assert!((1..=2).contains(&normal));
        }
    }

    #[test]
    fn mass_extinction_generation_uses_mutation_strategy() {
        let mut rng = GameRng::new(3);
        let mut evo = evolver();
        evo.evolve(OPEN, false, Mood::Euphoric, &mut rng);
        for _ in 0..64 {
            let out = evo.evolve(OPEN, false, Mood::Euphoric, &mut rng).unwrap();
            if evo.generation() % 16 == 0 {
                assert_eq!(
                    out.strategy,
                    Strategy::Mutation {
                        count: 8,
                        mass_extinction: true
                    },
                    "generation {} should be a mass extinction",
                    evo.generation()
                );
            } else {
                assert!(!matches!(
                    out.strategy,
                    Strategy::Mutation {
                        mass_extinction: true,
                        ..
                    }
                ));
            }
        }
    }

    #[test]
    fn melody_lock_blocks_unforced_evolution() {
        let mut rng = GameRng::new(5);
        let mut evo = evolver();
        evo.evolve(OPEN, true, Mood::Euphoric, &mut rng);
        let before = evo.current().unwrap().id;

        let locked = EvolutionGate {
            autonomous: true,
            melody_locked: true,
        };
        assert!(evo.evolve(locked, false, Mood::Euphoric, &mut rng).is_none());
        assert_eq!(evo.current().unwrap().id, before);
        assert_eq!(evo.generation(), 0);

        let forced = evo.evolve(locked, true, Mood::Euphoric, &mut rng).unwrap();
        assert_ne!(forced.pattern.id, before);
        assert_eq!(evo.current().unwrap().id, forced.pattern.id);
    }

    #[test]
    fn autonomous_off_blocks_unforced_evolution() {
        let mut rng = GameRng::new(6);
        let mut evo = evolver();
        let closed = EvolutionGate {
            autonomous: false,
            melody_locked: false,
        };
        assert!(evo.evolve(closed, false, Mood::Euphoric, &mut rng).is_none());
        assert!(evo.current().is_none());
        assert!(evo.evolve(closed, true, Mood::Euphoric, &mut rng).is_some());
    }

    #[test]
    fn second_evolve_references_genesis() {
        let mut rng = GameRng::new(10);
        let mut evo = evolver();
        let genesis = evo.evolve(OPEN, false, Mood::Mystic, &mut rng).unwrap();
        let child = evo.evolve(OPEN, false, Mood::Mystic, &mut rng).unwrap();
        assert!(matches!(
            child.strategy,
            Strategy::Mutation { .. } | Strategy::Crossover | Strategy::LearnedCrossover
        ));
        assert_eq!(evo.generation(), 1);
        assert_eq!(child.pattern.generation, 1);
        assert!(child.pattern.lineage.references(genesis.pattern.id));
        assert_eq!(evo.history().len(), 1);
    }

    #[test]
    fn only_high_scorers_are_archived() {
        let mut rng = GameRng::new(21);
        let mut evo = evolver();
        evo.evolve(OPEN, false, Mood::Euphoric, &mut rng);
        for _ in 0..300 {
            let out = evo.evolve(OPEN, false, Mood::Euphoric, &mut rng).unwrap();
            if out.archived {
                assert!(out.outgoing_score.unwrap() > 50.0);
            }
        }
        assert!(evo.archive().len() <= 10);
        assert!(evo.archive().members().iter().all(|p| p.fitness > 50.0));
        assert!(
            evo.archive()
                .members()
                .windows(2)
                .all(|w| w[0].fitness >= w[1].fitness)
        );
    }

    #[test]
    fn evolution_is_deterministic_per_seed() {
        let run = |seed| {
            let mut rng = GameRng::new(seed);
            let mut evo = evolver();
            for _ in 0..40 {
                evo.evolve(OPEN, false, Mood::Ethereal, &mut rng);
            }
            evo.current().unwrap().clone()
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn toggle_step_cycles_rest_root_degree_rest() {
        let mut rng = GameRng::new(12);
        let mut evo = evolver();
        evo.evolve(OPEN, true, Mood::Euphoric, &mut rng);
        // Force step 3 to a rest first by cycling until it is one.
        while evo.current().unwrap().steps[3].is_some() {
            evo.toggle_step(3, Mood::Euphoric, &mut rng);
        }
        let parent = evo.current().unwrap().id;
        let root = evo.toggle_step(3, Mood::Euphoric, &mut rng).unwrap();
        assert_eq!(root.steps[3], Some(0));
        assert_eq!(root.lineage, Lineage::Edit { parent, step: 3 });

        let degree = evo.toggle_step(3, Mood::Euphoric, &mut rng).unwrap();
        let pitch = degree.steps[3].unwrap();
        assert_ne!(pitch, 0);
        assert!(Mood::Euphoric.degrees().contains(&pitch));

        let rest = evo.toggle_step(3, Mood::Euphoric, &mut rng).unwrap();
        assert_eq!(rest.steps[3], None);
        assert!(evo.toggle_step(STEPS, Mood::Euphoric, &mut rng).is_none());
    }

    #[test]
    fn repitch_prefers_neighbouring_degrees() {
        let mut config = EvolutionConfig::default();
        config.adjacent_degree_probability = 1.0;
        let evo = PatternEvolver::new(config, FitnessWeights::default());
        let mut rng = GameRng::new(2);
        for _ in 0..200 {
            // 4 sits between 2 and 7 in the Euphoric scale.
            let p = evo.repitch(4, Mood::Euphoric, &mut rng);
            assert!(p == 2 || p == 7, "unexpected neighbour {p}");
            // 12 is the top degree; the only neighbour is 9.
            assert_eq!(evo.repitch(12, Mood::Euphoric, &mut rng), 9);
        }
    }

    fn uniform(rng: &mut GameRng, pitch: Option<i8>, velocity: f32, offset: f32) -> Pattern {
        Pattern {
            id: PatternId::new(rng),
            steps: [pitch; STEPS],
            velocities: [velocity; STEPS],
            offsets: [offset; STEPS],
            generation: 0,
            lineage: Lineage::Genesis,
            fitness: 0.0,
        }
    }

    #[test]
    fn crossover_splices_all_lanes_at_the_midpoint() {
        let mut rng = GameRng::new(30);
        let evo = evolver();
        let parent = uniform(&mut rng, Some(0), 0.5, 0.1);
        let donor = uniform(&mut rng, Some(7), 0.9, -0.2);
        let child = evo.crossover(&parent, &donor, &mut rng);

        assert!(child.steps[..8].iter().all(|&s| s == Some(0)));
        assert!(child.steps[8..].iter().all(|&s| s == Some(7)));
        assert!(child.velocities[..8].iter().all(|&v| v == 0.5));
        assert!(child.velocities[8..].iter().all(|&v| v == 0.9));
        assert!(child.offsets[..8].iter().all(|&o| o == 0.1));
        assert!(child.offsets[8..].iter().all(|&o| o == -0.2));
        assert_eq!(
            child.lineage,
            Lineage::Crossover {
                parent: parent.id,
                donor: donor.id
            }
        );
        assert_ne!(child.id, parent.id);
        assert_ne!(child.id, donor.id);
    }

    #[test]
    fn learned_crossover_keeps_parent_offsets() {
        let mut rng = GameRng::new(31);
        let evo = evolver();
        let parent = uniform(&mut rng, Some(0), 0.5, 0.1);
        let elite = uniform(&mut rng, Some(4), 0.8, -0.3);
        let child = evo.learned_crossover(&parent, &elite, &mut rng);

        assert!(child.steps[..8].iter().all(|&s| s == Some(0)));
        assert!(child.steps[8..].iter().all(|&s| s == Some(4)));
        assert!(child.velocities[..8].iter().all(|&v| v == 0.5));
        assert!(child.velocities[8..].iter().all(|&v| v == 0.8));
        assert!(child.offsets.iter().all(|&o| o == 0.1));
        assert_eq!(
            child.lineage,
            Lineage::LearnedCrossover {
                parent: parent.id,
                elite: elite.id
            }
        );
    }

    #[test]
    fn learned_crossover_never_picks_the_parent() {
        let config = EvolutionConfig {
            learned_crossover_probability: 1.0,
            crossover_probability: 0.0,
            ..EvolutionConfig::default()
        };
        let mut evo = PatternEvolver::new(config, FitnessWeights::default());
        let mut rng = GameRng::new(32);
        let parent = uniform(&mut rng, Some(0), 0.7, 0.0).with_fitness(80.0);
        assert!(evo.archive.insert(parent.clone()));

        // The parent is the only elite: fall through to mutation.
        for _ in 0..50 {
            let (_, strategy) = evo.reproduce(&parent, false, Mood::Euphoric, &mut rng);
            assert!(matches!(strategy, Strategy::Mutation { .. }), "{strategy}");
        }

        let other = uniform(&mut rng, Some(7), 0.6, 0.0).with_fitness(70.0);
        assert!(evo.archive.insert(other.clone()));
        for _ in 0..50 {
            let (child, strategy) = evo.reproduce(&parent, false, Mood::Euphoric, &mut rng);
            assert_eq!(strategy, Strategy::LearnedCrossover);
            assert_eq!(
                child.lineage,
                Lineage::LearnedCrossover {
                    parent: parent.id,
                    elite: other.id
                }
            );
        }
    }

    #[test]
    fn evolved_learned_crossovers_use_a_different_elite() {
        let config = EvolutionConfig {
            learned_crossover_probability: 1.0,
            ..EvolutionConfig::default()
        };
        for seed in 0..40 {
            let mut rng = GameRng::new(seed);
            let mut evo = PatternEvolver::new(config.clone(), FitnessWeights::default());
            evo.evolve(OPEN, false, Mood::Euphoric, &mut rng);
            for _ in 0..30 {
                let out = evo.evolve(OPEN, false, Mood::Euphoric, &mut rng).unwrap();
                if let Lineage::LearnedCrossover { parent, elite } = out.pattern.lineage {
                    assert_ne!(parent, elite, "seed {seed}");
                }
            }
        }
    }

    #[test]
    fn point_mutation_deletes_notes() {
        let config = EvolutionConfig {
            repitch_probability: 0.0,
            insert_probability: 0.0,
            offset_perturb_probability: 0.0,
            ..EvolutionConfig::default()
        };
        let evo = PatternEvolver::new(config, FitnessWeights::default());
        let mut rng = GameRng::new(33);
        let parent = uniform(&mut rng, Some(2), 0.7, 0.0);
        let child = evo.mutate(&parent, 3, false, Mood::Euphoric, &mut rng);

        let deleted = child.steps.iter().filter(|s| s.is_none()).count();
        assert!((1..=3).contains(&deleted), "deleted {deleted}");
        assert!(child.steps.iter().flatten().all(|&p| p == 2));
        assert_eq!(child.offsets, parent.offsets);
        assert!(matches!(
            child.lineage,
            Lineage::Mutation {
                mutations: 3,
                mass_extinction: false,
                ..
            }
        ));
    }

    #[test]
    fn point_mutation_inserts_into_rests() {
        let config = EvolutionConfig {
            insert_probability: 1.0,
            repitch_probability: 1.0,
            offset_perturb_probability: 0.0,
            ..EvolutionConfig::default()
        };
        let evo = PatternEvolver::new(config, FitnessWeights::default());
        let mut rng = GameRng::new(34);
        let parent = uniform(&mut rng, None, 0.0, 0.0);
        let child = evo.mutate(&parent, 2, false, Mood::Dark, &mut rng);

        let inserted = child.note_count();
        assert!((1..=2).contains(&inserted), "inserted {inserted}");
        for (step, velocity) in child.steps.iter().zip(child.velocities.iter()) {
            match step {
                Some(pitch) => {
                    assert!(Mood::Dark.degrees().contains(pitch));
                    assert!((0.5..1.0).contains(velocity));
                }
                None => assert_eq!(*velocity, 0.0),
            }
        }
    }
}
