// Melodic genome and the bounded pools that remember it.
//
// A `Pattern` is one 16-step measure of melody: per step an optional
// root-relative pitch, a velocity and a micro-timing offset. Patterns are
// immutable values: evolution and user edits always build a new instance
// with a fresh `PatternId` and a `Lineage` naming where it came from. The
// fixed-size arrays make the "all three lanes have 16 entries" invariant a
// property of the type rather than something to check.
//
// Two bounded pools hold past patterns for crossover:
// - `EliteArchive`: the best historical scorers, sorted descending.
// - `PatternHistory`: a ring of the most recent current patterns.
//
// See also: `evolution.rs` which fills both pools, `fitness.rs` for the
// score stored on archived patterns.

use crate::types::{PatternId, STEPS};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Where a pattern came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Lineage {
    /// Random first pattern of a session.
    Genesis,
    /// Point mutations applied to `parent`.
    Mutation {
        parent: PatternId,
        mutations: usize,
        mass_extinction: bool,
    },
    /// Midpoint splice of `parent` with a recent history entry.
    Crossover { parent: PatternId, donor: PatternId },
    /// Midpoint splice of `parent` with an elite archive member.
    LearnedCrossover { parent: PatternId, elite: PatternId },
    /// A user toggled `step` on `parent`.
    Edit { parent: PatternId, step: usize },
}

impl Lineage {
    /// Whether this lineage names `id` as a parent or donor.
    pub fn references(&self, id: PatternId) -> bool {
        match *self {
            Lineage::Genesis => false,
            Lineage::Mutation { parent, .. } | Lineage::Edit { parent, .. } => parent == id,
            Lineage::Crossover { parent, donor } => parent == id || donor == id,
            Lineage::LearnedCrossover { parent, elite } => parent == id || elite == id,
        }
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lineage::Genesis => write!(f, "genesis"),
            Lineage::Mutation {
                parent,
                mutations,
                mass_extinction,
            } => {
                let tag = if *mass_extinction { "mass-mut" } else { "mut" };
                write!(f, "{tag}x{mutations}({parent})")
            }
            Lineage::Crossover { parent, donor } => write!(f, "x({parent}+{donor})"),
            Lineage::LearnedCrossover { parent, elite } => {
                write!(f, "elite-x({parent}+{elite})")
            }
            Lineage::Edit { parent, step } => write!(f, "edit[{step}]({parent})"),
        }
    }
}

/// One immutable 16-step melodic genome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    /// Root-relative semitone offsets; `None` is a rest.
    pub steps: [Option<i8>; STEPS],
    /// Per-step velocity in [0, 1]. Meaningless on rests but kept so
    /// crossover can splice lanes uniformly.
    pub velocities: [f32; STEPS],
    /// Micro-timing offset in [-0.5, 0.5] of a step.
    pub offsets: [f32; STEPS],
    pub generation: u32,
    pub lineage: Lineage,
    /// Score assigned when the pattern was last evaluated; 0 until then.
    pub fitness: f64,
}

impl Pattern {
    /// Number of sounding steps.
    pub fn note_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_some()).count()
    }

    /// Copy of this pattern carrying `score`. Identity is unchanged: the
    /// score is bookkeeping, not a new genome.
    pub fn with_fitness(&self, score: f64) -> Self {
        Self {
            fitness: score,
            ..self.clone()
        }
    }
}

/// Score-descending pool of historically fit patterns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EliteArchive {
    capacity: usize,
    members: Vec<Pattern>,
}

impl EliteArchive {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            members: Vec::with_capacity(capacity + 1),
        }
    }

    /// Insert a scored pattern. Rejects ids already present; evicts the
    /// lowest scorer when over capacity. Returns whether `pattern` is a
    /// member afterwards.
    pub fn insert(&mut self, pattern: Pattern) -> bool {
        if self.contains(pattern.id) {
            return false;
        }
        let id = pattern.id;
        // Stable position: after every member with a score >= the new one.
        let pos = self
            .members
            .iter()
            .position(|m| m.fitness < pattern.fitness)
            .unwrap_or(self.members.len());
        self.members.insert(pos, pattern);
        self.members.truncate(self.capacity);
        self.contains(id)
    }

    pub fn contains(&self, id: PatternId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn members(&self) -> &[Pattern] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn best(&self) -> Option<&Pattern> {
        self.members.first()
    }
}

/// Ring buffer of the most recent current patterns, oldest first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternHistory {
    capacity: usize,
    entries: VecDeque<Pattern>,
}

impl PatternHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, pattern: Pattern) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(pattern);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry except the most recent one.
    pub fn older(&self) -> impl Iterator<Item = &Pattern> {
        let keep = self.entries.len().saturating_sub(1);
        self.entries.iter().take(keep)
    }

    pub fn latest(&self) -> Option<&Pattern> {
        self.entries.back()
    }
}
