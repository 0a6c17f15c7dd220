//! Pitch-name and chord-name lookups.
//!
//! Names use scientific pitch notation with middle C as `C4` (MIDI 60).
//! Sharps are used when formatting; both `#` and `b` are accepted when parsing.

use smallvec::SmallVec;

/// Up to four chord tones inline; extended voicings spill to the heap.
pub type PitchSet = SmallVec<[u8; 4]>;

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Octave chords are voiced in.
const CHORD_OCTAVE: i32 = 4;

/// Chord qualities as semitone offsets above the root.
const MAJOR: &[u8] = &[0, 4, 7];
const MINOR: &[u8] = &[0, 3, 7];
const DOMINANT_7: &[u8] = &[0, 4, 7, 10];
const MAJOR_7: &[u8] = &[0, 4, 7, 11];
const MINOR_7: &[u8] = &[0, 3, 7, 10];
const DIMINISHED: &[u8] = &[0, 3, 6];
const DIMINISHED_7: &[u8] = &[0, 3, 6, 9];
const HALF_DIMINISHED: &[u8] = &[0, 3, 6, 10];
const SUS2: &[u8] = &[0, 2, 7];
const SUS4: &[u8] = &[0, 5, 7];
const AUGMENTED: &[u8] = &[0, 4, 8];

#[inline]
fn letter_class(letter: char) -> Option<i32> {
    match letter {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Split a leading `[A-G][#b]?` off `s`, returning its semitone class
/// (possibly -1 or 12 for `Cb`/`B#`) and the remainder.
fn split_root(s: &str) -> Option<(i32, &str)> {
    let mut chars = s.chars();
    let class = letter_class(chars.next()?)?;
    let rest = chars.as_str();
    match rest.chars().next() {
        Some('#') => Some((class + 1, &rest[1..])),
        Some('b') => Some((class - 1, &rest[1..])),
        _ => Some((class, rest)),
    }
}

/// Parse a pitch name such as `C4`, `D#3`, `Bb5` or `C-1` into a MIDI number.
///
/// Returns `None` for unknown letters, a missing or malformed octave, or a
/// result outside 0..=127.
pub fn note_to_midi(name: &str) -> Option<u8> {
    let (class, octave_str) = split_root(name.trim())?;
    if octave_str.is_empty() {
        return None;
    }
    let octave: i32 = octave_str.parse().ok()?;
    let midi = (octave + 1) * 12 + class;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

/// Format a MIDI number as a sharp-spelled pitch name (`60` -> `C4`).
pub fn midi_to_name(midi: u8) -> String {
    let octave = midi as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[(midi % 12) as usize], octave)
}

/// Pitch class name without octave (`61` -> `C#`).
#[inline]
pub fn pitch_class_name(midi: u8) -> &'static str {
    NOTE_NAMES[(midi % 12) as usize]
}

fn quality_intervals(suffix: &str) -> &'static [u8] {
    match suffix {
        "" | "maj" | "M" => MAJOR,
        "m" | "min" => MINOR,
        "7" => DOMINANT_7,
        "maj7" | "M7" => MAJOR_7,
        "m7" | "min7" => MINOR_7,
        "dim" => DIMINISHED,
        "dim7" => DIMINISHED_7,
        "m7b5" => HALF_DIMINISHED,
        "sus2" => SUS2,
        "sus4" => SUS4,
        "aug" | "+" => AUGMENTED,
        // Loose matching for decorated names coming back from the harmonizer
        s if s.contains("maj7") => MAJOR_7,
        s if s.contains("m7") => MINOR_7,
        s if s.contains('7') => DOMINANT_7,
        s if s.contains('m') => MINOR,
        _ => MAJOR,
    }
}

/// Resolve a chord name (`Cmaj7`, `F#m`, `Bbdim7`) to MIDI pitches voiced from
/// the root in octave 4. An unparseable root falls back to C major.
pub fn chord_to_pitches(name: &str) -> PitchSet {
    let (root_class, suffix) = split_root(name.trim()).unwrap_or((0, ""));
    let root = (CHORD_OCTAVE + 1) * 12 + root_class;
    quality_intervals(suffix)
        .iter()
        .filter_map(|iv| u8::try_from(root + *iv as i32).ok())
        .collect()
}

/// True when `name` starts with a recognisable chord root.
#[inline]
pub fn is_chord_name(name: &str) -> bool {
    split_root(name.trim()).is_some()
}
