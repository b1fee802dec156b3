// Core identifiers shared by the generators.
//
// Pattern identity is a UUID v4 drawn from the engine's `GameRng`, so two
// engines with the same seed mint the same ids in the same order. Ids are
// compared by value: the elite archive rejects duplicates, lineages point at
// parents by id, and the counterpoint generator derives its private PRNG
// stream from the melody's id.
//
// Also defines the four evolution domains and their lock flags, which every
// generator consults before mutating autonomously.
//
// **Critical constraint: determinism.** Ids never come from OS entropy.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use sylvan_drift_prng::GameRng;

/// Number of 16th-note slots in one pattern (one 4/4 measure).
pub const STEPS: usize = 16;

/// A UUID v4 identifying one immutable `Pattern`.
///
/// Layout follows RFC 4122: version nibble `0100`, variant bits `10`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId([u8; 16]);

impl PatternId {
    /// Mint a new id from the engine PRNG.
    pub fn new(rng: &mut GameRng) -> Self {
        let mut bytes = rng.next_128_bits();
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }

    /// Parse the 8-4-4-4-12 hex form.
    pub fn parse(s: &str) -> Option<Self> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(hex.get(i * 2..i * 2 + 2)?, 16).ok()?;
        }
        Some(Self(bytes))
    }

    /// Fold the id into a `u64`, used to seed per-pattern PRNG streams.
    pub fn seed(&self) -> u64 {
        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&self.0[..8]);
        hi.copy_from_slice(&self.0[8..]);
        u64::from_le_bytes(lo) ^ u64::from_le_bytes(hi).rotate_left(17)
    }

    /// First eight hex digits, for compact log lines.
    pub fn short(&self) -> String {
        format!(
            "{:02x}{:02x}{:02x}{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

// Serialize as the hex string so ids read naturally in JSON event dumps.
impl Serialize for PatternId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PatternId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PatternId::parse(&s).ok_or_else(|| serde::de::Error::custom("invalid pattern id"))
    }
}

impl fmt::Debug for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PatternId({})", self)
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3],
            b[4], b[5],
            b[6], b[7],
            b[8], b[9],
            b[10], b[11], b[12], b[13], b[14], b[15],
        )
    }
}

// ---------------------------------------------------------------------------
// Evolution domains and locks
// ---------------------------------------------------------------------------

/// The four independently lockable areas of autonomous change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Melody,
    Timbre,
    Harmony,
    Rhythm,
}

impl Domain {
    pub const ALL: [Domain; 4] = [Domain::Melody, Domain::Timbre, Domain::Harmony, Domain::Rhythm];
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Melody => "melody",
            Domain::Timbre => "timbre",
            Domain::Harmony => "harmony",
            Domain::Rhythm => "rhythm",
        };
        f.write_str(name)
    }
}

/// Lock flags gating autonomous mutation per domain. A set lock blocks
/// every non-forced change to its domain until cleared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionLocks {
    pub melody: bool,
    pub timbre: bool,
    pub harmony: bool,
    pub rhythm: bool,
}

impl EvolutionLocks {
    pub fn is_locked(&self, domain: Domain) -> bool {
        match domain {
            Domain::Melody => self.melody,
            Domain::Timbre => self.timbre,
            Domain::Harmony => self.harmony,
            Domain::Rhythm => self.rhythm,
        }
    }

    pub fn set(&mut self, domain: Domain, locked: bool) {
        match domain {
            Domain::Melody => self.melody = locked,
            Domain::Timbre => self.timbre = locked,
            Domain::Harmony => self.harmony = locked,
            Domain::Rhythm => self.rhythm = locked,
        }
    }

    /// Whether an autonomous (unforced) change to `domain` may happen.
    pub fn permits(&self, domain: Domain, force: bool) -> bool {
        force || !self.is_locked(domain)
    }
}
