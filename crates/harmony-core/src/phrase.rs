//! Symbolic tracks and their text encoding.
//!
//! Notes mode text is a whitespace-separated list of `Pitch[:units]` or
//! `Pitch[/units]` tokens (`"C4:2 D4:8 E4:4"`). Chords mode text is a list of
//! chord names with an optional `:units` suffix, separated by whitespace or
//! commas (`"Cmaj7 Dm7:8, G7"`). Tokens that do not parse are skipped.

use crate::constants::{DEFAULT_CHORD_UNITS, DEFAULT_NOTE_UNITS};
use crate::pitch::{chord_to_pitches, is_chord_name, midi_to_name, note_to_midi, PitchSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which track the user typed; the generator produces the other one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Melody in, chords out.
    #[default]
    Notes,
    /// Chords in, melody out.
    Chords,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::Notes => "notes",
            GenerationMode::Chords => "chords",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed melody note.
///
/// Fields:
/// - `pitch`: MIDI number 0..=127
/// - `duration_units`: length in base units, always >= 1
/// - `source_index`: position of the note in its phrase
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub duration_units: u32,
    pub source_index: usize,
}

/// One chord of a harmony track, keeping the name it was written with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChordEvent {
    pub label: String,
    pub pitches: PitchSet,
    pub duration_units: u32,
}

impl ChordEvent {
    pub fn from_name(label: &str, duration_units: u32) -> Self {
        Self {
            label: label.to_string(),
            pitches: chord_to_pitches(label),
            duration_units: duration_units.max(1),
        }
    }
}

/// One track of a musical sentence, in insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phrase {
    Notes(Vec<NoteEvent>),
    Chords(Vec<ChordEvent>),
}

impl Phrase {
    pub fn len(&self) -> usize {
        match self {
            Phrase::Notes(n) => n.len(),
            Phrase::Chords(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native durations of every event, in order.
    pub fn units(&self) -> Vec<u32> {
        match self {
            Phrase::Notes(n) => n.iter().map(|e| e.duration_units).collect(),
            Phrase::Chords(c) => c.iter().map(|e| e.duration_units).collect(),
        }
    }

    /// Sum of every duration. Widened so any parsed phrase fits.
    pub fn total_units(&self) -> u64 {
        self.units().iter().map(|&u| u64::from(u)).sum()
    }

    /// Pitches sounded by event `index` (one for a note, several for a chord).
    pub fn pitches_at(&self, index: usize) -> PitchSet {
        match self {
            Phrase::Notes(n) => n
                .get(index)
                .map(|e| PitchSet::from_slice(&[e.pitch]))
                .unwrap_or_default(),
            Phrase::Chords(c) => c.get(index).map(|e| e.pitches.clone()).unwrap_or_default(),
        }
    }

    /// Display form: `C4:2 D4:8` for notes, `Cmaj7 G7` for chords.
    pub fn to_text(&self) -> String {
        match self {
            Phrase::Notes(n) => format_notes(n),
            Phrase::Chords(c) => c
                .iter()
                .map(|e| e.label.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Leading decimal digits of `s` as a duration; zero, missing or malformed
/// values fall back to `default`.
fn parse_units(s: &str, default: u32) -> u32 {
    let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>() {
        Ok(0) | Err(_) => default,
        Ok(v) => v,
    }
}

/// Split `C4:2` / `C4/2` / `C4` into name and duration.
fn split_note_token(token: &str) -> (&str, u32) {
    if let Some((name, dur)) = token.split_once(':') {
        (name, parse_units(dur, DEFAULT_NOTE_UNITS))
    } else if let Some((name, dur)) = token.split_once('/') {
        (name, parse_units(dur, DEFAULT_NOTE_UNITS))
    } else {
        (token, DEFAULT_NOTE_UNITS)
    }
}

/// Parse notes-mode text. Chord brackets written by the keyboard (`[C4 E4]`)
/// are flattened into consecutive notes.
pub fn parse_notes(text: &str) -> Vec<NoteEvent> {
    let mut out = Vec::new();
    for raw in text.split_whitespace() {
        let token = raw.trim_matches(|c| c == '[' || c == ']');
        if token.is_empty() {
            continue;
        }
        let (name, units) = split_note_token(token);
        match note_to_midi(name) {
            Some(pitch) => out.push(NoteEvent {
                pitch,
                duration_units: units,
                source_index: out.len(),
            }),
            None => log::debug!("[phrase] skipping unparseable note token {:?}", raw),
        }
    }
    out
}

/// Parse chords-mode text.
pub fn parse_chords(text: &str) -> Vec<ChordEvent> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .filter_map(|token| {
            let (name, units) = match token.split_once(':') {
                Some((name, dur)) => (name, parse_units(dur, DEFAULT_CHORD_UNITS)),
                None => (token, DEFAULT_CHORD_UNITS),
            };
            if is_chord_name(name) {
                Some(ChordEvent::from_name(name, units))
            } else {
                log::debug!("[phrase] skipping unparseable chord token {:?}", token);
                None
            }
        })
        .collect()
}

/// Parse `text` as the input track for `mode`.
pub fn parse_phrase(text: &str, mode: GenerationMode) -> Phrase {
    match mode {
        GenerationMode::Notes => Phrase::Notes(parse_notes(text)),
        GenerationMode::Chords => Phrase::Chords(parse_chords(text)),
    }
}

/// `[[pitch, units], ...]` pairs as sent to the harmonization service.
pub fn melody_pairs(notes: &[NoteEvent]) -> Vec<[u32; 2]> {
    notes
        .iter()
        .map(|n| [n.pitch as u32, n.duration_units])
        .collect()
}

pub fn format_notes(notes: &[NoteEvent]) -> String {
    notes
        .iter()
        .map(|n| format!("{}:{}", midi_to_name(n.pitch), n.duration_units))
        .collect::<Vec<_>>()
        .join(" ")
}
