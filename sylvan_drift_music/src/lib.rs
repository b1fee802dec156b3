// Sylvan Drift music generators
//
// The pure, engine-independent half of the composer: everything here is a
// deterministic function of its inputs plus a caller-supplied `GameRng`, with
// no clocks, no I/O and no knowledge of playback. The engine crate
// (`sylvan_drift_engine`) owns the state machines and decides when each
// generator runs.
//
// Architecture:
// - types.rs: PatternId (UUID v4 from the PRNG), evolution domains and locks
// - scale.rs: Moods (scale + effect sends), degree lookup, stability classes
// - pattern.rs: The 16-step melodic genome, lineage, elite archive, history ring
// - fitness.rs: Layered pattern scoring (downbeats, intervals, density, off-beats)
// - evolution.rs: Genesis, crossover, learned crossover, point mutation,
//   mass extinction, user step edits
// - counterpoint.rs: Counter-voice derived from the melody
// - rhythm.rs: Euclidean percussion genomes
// - patch.rs: SynthPatch rolls and typed field edits
// - harmony.rs: Song structure (root, progression, patch, rhythm) regeneration
// - chaos.rs: Lorenz modulation source
//
// Everything is deterministic given a seed.

pub mod chaos;
pub mod counterpoint;
pub mod evolution;
pub mod fitness;
pub mod harmony;
pub mod patch;
pub mod pattern;
pub mod rhythm;
pub mod scale;
pub mod types;
