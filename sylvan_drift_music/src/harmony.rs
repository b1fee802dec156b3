// Song structure: root, chord progression, timbre and rhythm.
//
// `SongStructure` bundles everything the arrangement holds fixed between
// evolution ticks. `regenerate()` rebuilds it in three independently gated
// parts:
//
// - Harmony: a new root from `ROOT_CANDIDATES` and a 4-chord progression
//   whose offsets come from a unison-weighted table. Skipped when locked
//   (unless forced) or on a timbre-only pass.
// - Timbre: a fresh `SynthPatch` roll. Runs when unlocked or forced, and is
//   the only part touched by a timbre-only pass.
// - Rhythm: a new two-voice Euclidean genome (rhythm.rs). Skipped when
//   locked (unless forced) or on a timbre-only pass.
//
// Every change bumps `revision`, which the engine exposes so tests and hosts
// can tell that a rebirth actually rebuilt the song.
//
// The chord cursor advances on measure boundaries (`advance_chord`); the
// current chord's offset transposes every pitched voice.

use crate::patch::{PatchBounds, SynthPatch};
use crate::rhythm::{RhythmConfig, RhythmGenome, generate_genome};
use crate::types::{Domain, EvolutionLocks};
use serde::{Deserialize, Serialize};
use sylvan_drift_prng::GameRng;

/// MIDI roots a regeneration may choose (A2, C3, D3, E3, F3, G3).
pub const ROOT_CANDIDATES: [u8; 6] = [45, 48, 50, 52, 53, 55];

/// Chord-root offsets and their weights. Unison dominates so progressions
/// tend to sit on the tonic; the rest are fourths, fifths and steps.
pub const CHORD_OFFSETS: [(i8, f64); 7] = [
    (0, 4.0),
    (5, 2.0),
    (7, 2.0),
    (-5, 1.0),
    (-3, 1.0),
    (2, 0.5),
    (-2, 0.5),
];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarmonyConfig {
    pub progression_length: usize,
    /// Hold durations (in bars) a progression may pick from.
    pub bars_per_chord_choices: Vec<u32>,
    pub patch_bounds: PatchBounds,
    pub rhythm: RhythmConfig,
}

impl Default for HarmonyConfig {
    fn default() -> Self {
        HarmonyConfig {
            progression_length: 4,
            bars_per_chord_choices: vec![1, 2, 2, 4],
            patch_bounds: PatchBounds::default(),
            rhythm: RhythmConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordProgression {
    /// Root offsets in semitones; the first entry is always 0.
    pub offsets: Vec<i8>,
    pub bars_per_chord: u32,
}

impl Default for ChordProgression {
    fn default() -> Self {
        ChordProgression {
            offsets: vec![0, 5, 7, 0],
            bars_per_chord: 2,
        }
    }
}

impl ChordProgression {
    pub fn random(config: &HarmonyConfig, rng: &mut GameRng) -> Self {
        let weights: Vec<f64> = CHORD_OFFSETS.iter().map(|&(_, w)| w).collect();
        let mut offsets = Vec::with_capacity(config.progression_length.max(1));
        offsets.push(0);
        for _ in 1..config.progression_length {
            let offset = rng
                .weighted_index(&weights)
                .map(|i| CHORD_OFFSETS[i].0)
                .unwrap_or(0);
            offsets.push(offset);
        }
        let bars_per_chord = rng
            .pick(&config.bars_per_chord_choices)
            .copied()
            .unwrap_or(2)
            .max(1);
        ChordProgression {
            offsets,
            bars_per_chord,
        }
    }

    pub fn offset_at(&self, index: usize) -> i8 {
        if self.offsets.is_empty() {
            return 0;
        }
        self.offsets[index % self.offsets.len()]
    }
}

/// Which parts a `regenerate` call rebuilt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Regenerated {
    pub harmony: bool,
    pub timbre: bool,
    pub rhythm: bool,
}

impl Regenerated {
    pub fn any(&self) -> bool {
        self.harmony || self.timbre || self.rhythm
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongStructure {
    /// MIDI note number of the song root.
    pub root: u8,
    pub progression: ChordProgression,
    pub chord_index: usize,
    pub patch: SynthPatch,
    pub rhythm: RhythmGenome,
    pub revision: u64,
}

impl Default for SongStructure {
    fn default() -> Self {
        SongStructure {
            root: 48,
            progression: ChordProgression::default(),
            chord_index: 0,
            patch: SynthPatch::default(),
            rhythm: RhythmGenome::default(),
            revision: 0,
        }
    }
}

impl SongStructure {
    /// Rebuild the parts the locks allow. `force` overrides the locks;
    /// `timbre_only` restricts the pass to the patch.
    pub fn regenerate(
        &mut self,
        config: &HarmonyConfig,
        locks: &EvolutionLocks,
        force: bool,
        timbre_only: bool,
        rng: &mut GameRng,
    ) -> Regenerated {
        let mut done = Regenerated::default();

        if !timbre_only {
            done.harmony = self.regenerate_harmony(config, locks, force, rng);
        }
        if locks.permits(Domain::Timbre, force) {
            self.patch = SynthPatch::random(&config.patch_bounds, rng);
            done.timbre = true;
        }
        if !timbre_only {
            done.rhythm = self.regenerate_rhythm(config, locks, force, rng);
        }

        if done.any() {
            self.revision += 1;
            tracing::debug!(
                root = self.root,
                offsets = ?self.progression.offsets,
                bars_per_chord = self.progression.bars_per_chord,
                harmony = done.harmony,
                timbre = done.timbre,
                rhythm = done.rhythm,
                "regenerated song structure"
            );
        }
        done
    }

    /// Pick a new root and progression unless the harmony lock forbids it.
    /// Like `regenerate_rhythm`, leaves `revision` alone.
    pub fn regenerate_harmony(
        &mut self,
        config: &HarmonyConfig,
        locks: &EvolutionLocks,
        force: bool,
        rng: &mut GameRng,
    ) -> bool {
        if !locks.permits(Domain::Harmony, force) {
            return false;
        }
        self.root = rng.pick(&ROOT_CANDIDATES).copied().unwrap_or(48);
        self.progression = ChordProgression::random(config, rng);
        self.chord_index = 0;
        true
    }

    /// Roll a new rhythm genome unless the rhythm lock forbids it. Does not
    /// bump `revision` on its own; callers outside `regenerate` do that via
    /// `touch`.
    pub fn regenerate_rhythm(
        &mut self,
        config: &HarmonyConfig,
        locks: &EvolutionLocks,
        force: bool,
        rng: &mut GameRng,
    ) -> bool {
        if !locks.permits(Domain::Rhythm, force) {
            return false;
        }
        self.rhythm = generate_genome(&config.rhythm, rng);
        true
    }

    /// Record an out-of-band change (patch edit, lone rhythm roll).
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Advance the chord cursor if `bar` lands on a chord boundary. Returns
    /// whether the chord changed.
    pub fn advance_chord(&mut self, bar: u64) -> bool {
        let hold = u64::from(self.progression.bars_per_chord.max(1));
        if bar % hold != 0 || self.progression.offsets.is_empty() {
            return false;
        }
        self.chord_index = (self.chord_index + 1) % self.progression.offsets.len();
        true
    }

    pub fn chord_offset(&self) -> i8 {
        self.progression.offset_at(self.chord_index)
    }

    /// MIDI pitch of the current chord root.
    pub fn chord_root(&self) -> i16 {
        i16::from(self.root) + i16::from(self.chord_offset())
    }
}
