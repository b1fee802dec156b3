// Moods, scales and degree stability.
//
// A `Mood` is the control-surface name for a scale plus the effect-send
// levels the renderer should use with it. Scales are lists of signed
// semitone offsets from the song root, always including the octave (12) so
// melodies can reach up to the next tonic.
//
// Pattern pitches are stored as offsets relative to the root, so changing
// mood never rewrites an existing pattern; new notes simply draw from the
// new degree set.
//
// Stability classes drive the fitness function (`fitness.rs`): root, fifth
// and octave are the most stable resting points, thirds and the fourth are
// moderately stable, everything else is colour.
//
// Used by evolution.rs (genesis, re-pitching), counterpoint.rs and the
// engine's arpeggiator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named moods selectable from the control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    /// Lydian: bright, floating raised fourth.
    Ethereal,
    /// Major pentatonic: no half steps, hard to sound wrong.
    Euphoric,
    /// Aeolian (natural minor).
    Melancholic,
    /// Phrygian: the flat second gives a dark, tense colour.
    Dark,
    /// Dorian: minor with a raised sixth.
    Mystic,
}

/// Effect-send levels in [0, 1] that accompany a mood.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectSends {
    pub reverb: f32,
    pub delay: f32,
}

/// How strongly a scale degree anchors the tonality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stability {
    Unstable,
    /// Minor/major third or the fourth.
    Moderate,
    /// Root, perfect fifth or octave.
    Strong,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Ethereal,
        Mood::Euphoric,
        Mood::Melancholic,
        Mood::Dark,
        Mood::Mystic,
    ];

    /// Scale degrees as semitone offsets from the root, ascending, with the
    /// octave as the last entry.
    pub fn degrees(self) -> &'static [i8] {
        match self {
            Mood::Ethereal => &[0, 2, 4, 6, 7, 9, 11, 12],
            Mood::Euphoric => &[0, 2, 4, 7, 9, 12],
            Mood::Melancholic => &[0, 2, 3, 5, 7, 8, 10, 12],
            Mood::Dark => &[0, 1, 3, 5, 7, 8, 10, 12],
            Mood::Mystic => &[0, 2, 3, 5, 7, 9, 10, 12],
        }
    }

    pub fn sends(self) -> EffectSends {
        match self {
            Mood::Ethereal => EffectSends { reverb: 0.8, delay: 0.5 },
            Mood::Euphoric => EffectSends { reverb: 0.4, delay: 0.35 },
            Mood::Melancholic => EffectSends { reverb: 0.6, delay: 0.3 },
            Mood::Dark => EffectSends { reverb: 0.7, delay: 0.2 },
            Mood::Mystic => EffectSends { reverb: 0.65, delay: 0.45 },
        }
    }

    /// Whether a root-relative pitch belongs to this scale (octave-folded).
    pub fn contains(self, pitch: i8) -> bool {
        let pc = pitch.rem_euclid(12);
        self.degrees().iter().any(|&d| d.rem_euclid(12) == pc)
    }

    /// Index of `pitch` within `degrees()`, matching exact offsets first and
    /// then pitch classes (so 14 maps to the degree for 2).
    pub fn degree_index(self, pitch: i8) -> Option<usize> {
        let degrees = self.degrees();
        degrees.iter().position(|&d| d == pitch).or_else(|| {
            let pc = pitch.rem_euclid(12);
            degrees.iter().position(|&d| d.rem_euclid(12) == pc)
        })
    }

    /// How strongly `pitch` anchors this scale. Pitches outside the scale
    /// are unstable. The fourth is the perfect fourth, or the raised fourth
    /// in scales without one (lydian).
    pub fn stability(self, pitch: i8) -> Stability {
        if !self.contains(pitch) {
            return Stability::Unstable;
        }
        match pitch.rem_euclid(12) {
            0 | 7 => Stability::Strong,
            3..=5 => Stability::Moderate,
            6 if !self.contains(5) => Stability::Moderate,
            _ => Stability::Unstable,
        }
    }

    /// Offset of the degree `steps` scale positions above the pitch at
    /// `index`, wrapping into the next octave when it runs off the end.
    pub fn degree_above(self, index: usize, steps: usize) -> i8 {
        // The octave entry duplicates the root, so wrap over the distinct
        // pitch classes only.
        let degrees = self.degrees();
        let distinct = degrees.len() - 1;
        let target = index + steps;
        let octaves = (target / distinct) as i8;
        degrees[target % distinct] + 12 * octaves
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mood::Ethereal => "ethereal",
            Mood::Euphoric => "euphoric",
            Mood::Melancholic => "melancholic",
            Mood::Dark => "dark",
            Mood::Mystic => "mystic",
        };
        f.write_str(name)
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown mood '{s}'"))
    }
}
