//! Harmonization collaborator boundary and the local simulated generator.

use crate::constants::{DEFAULT_CHORD_UNITS, DEFAULT_NOTE_UNITS};
use crate::error::{HarmonyError, Result};
use crate::phrase::{melody_pairs, ChordEvent, GenerationMode, NoteEvent, Phrase};
use crate::pitch::pitch_class_name;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Body of a harmonization request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonizeRequest {
    /// `[pitch, units]` pairs in melody order.
    pub melody: Vec<[u32; 2]>,
    pub temperature: f32,
    pub k: u32,
    pub mode: String,
}

impl HarmonizeRequest {
    pub fn from_notes(notes: &[NoteEvent], temperature: f32, k: u32) -> Self {
        Self {
            melody: melody_pairs(notes),
            temperature,
            k,
            mode: GenerationMode::Notes.as_str().to_string(),
        }
    }
}

/// Body of a successful harmonization response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HarmonizeResponse {
    #[serde(default)]
    pub input: Vec<[u32; 2]>,
    /// Chord names, one per harmony event.
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Where a result came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// The harmonization service answered.
    Backend,
    /// The local generator was the intended source (chords mode).
    Simulated,
    /// The service failed and the local generator stood in.
    Fallback,
}

impl Provenance {
    pub fn label(self) -> &'static str {
        match self {
            Provenance::Backend => "Using real backend model",
            Provenance::Simulated => "Using simulated data",
            Provenance::Fallback => "Using simulated data (backend unavailable)",
        }
    }
}

/// A resolved melody/harmony pair. Immutable once built; shared out of the
/// cache by reference count.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationResult {
    pub mode: GenerationMode,
    pub input: Phrase,
    pub output: Phrase,
    pub annotation: String,
    pub provenance: Provenance,
}

impl GenerationResult {
    pub fn new(
        mode: GenerationMode,
        input: Phrase,
        output: Phrase,
        description: &str,
        provenance: Provenance,
    ) -> Self {
        Self {
            mode,
            input,
            output,
            annotation: format!("{} - {}", provenance.label(), description),
            provenance,
        }
    }

    /// Build a result from a service response, falling back to the request's
    /// melody when the service did not echo it.
    pub fn from_response(request_notes: &[NoteEvent], response: &HarmonizeResponse) -> Self {
        let input = if response.input.is_empty() {
            request_notes.to_vec()
        } else {
            response
                .input
                .iter()
                .enumerate()
                .filter_map(|(i, [pitch, units])| {
                    let pitch = u8::try_from(*pitch).ok().filter(|p| *p <= 127)?;
                    Some(NoteEvent {
                        pitch,
                        duration_units: (*units).max(1),
                        source_index: i,
                    })
                })
                .collect()
        };
        let output = response
            .output
            .iter()
            .map(|name| ChordEvent::from_name(name, DEFAULT_CHORD_UNITS))
            .collect();
        let description = if response.description.is_empty() {
            "Chord progression generated using the backend model."
        } else {
            response.description.as_str()
        };
        Self::new(
            GenerationMode::Notes,
            Phrase::Notes(input),
            Phrase::Chords(output),
            description,
            Provenance::Backend,
        )
    }
}

/// The remote harmonization service, behind a narrow interface.
pub trait Harmonizer {
    fn harmonize(&mut self, request: &HarmonizeRequest) -> Result<HarmonizeResponse>;
}

/// A collaborator that is never reachable; every request takes the fallback.
#[derive(Default, Clone, Copy, Debug)]
pub struct Offline;

impl Harmonizer for Offline {
    fn harmonize(&mut self, _request: &HarmonizeRequest) -> Result<HarmonizeResponse> {
        Err(HarmonyError::Harmonizer("backend unreachable".into()))
    }
}

/// Chord candidates per melody pitch class.
fn chord_options(class: &str) -> &'static [&'static str] {
    match class {
        "C" => &["Cmaj7", "Am7", "Fmaj7"],
        "C#" => &["C#m7", "Bmaj7", "Amaj7"],
        "D" => &["Dm7", "G7", "Bbmaj7"],
        "D#" => &["D#dim7", "Cm7", "G#7"],
        "E" => &["Em7", "Cmaj7", "Am7"],
        "F" => &["Fmaj7", "Dm7", "Bbmaj7"],
        "F#" => &["F#m7", "D7", "Bmaj7"],
        "G" => &["G7", "Em7", "Cmaj7"],
        "G#" => &["G#m7", "Fm7", "Ebmaj7"],
        "A" => &["Am7", "Fmaj7", "Dm7"],
        "A#" => &["A#dim7", "Gm7", "Ebmaj7"],
        "B" => &["Bm7", "G7", "Em7"],
        _ => &["Cmaj7"],
    }
}

/// Offline stand-in for the harmonization service.
///
/// Notes mode: one chord for every two melody notes, chosen from a small
/// table keyed by the first note's pitch class. Chords mode: two to four
/// random chord tones per input chord.
pub struct SimulatedHarmonizer {
    rng: StdRng,
}

impl SimulatedHarmonizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn reseed(&mut self, seed: Option<u64>) {
        let seed = seed.unwrap_or_else(|| self.rng.gen());
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Generate the counterpart of `input` and annotate it with `provenance`.
    pub fn generate(&mut self, input: &Phrase, provenance: Provenance) -> Result<GenerationResult> {
        if input.is_empty() {
            return Err(HarmonyError::NoEvents(input.to_text()));
        }
        match input {
            Phrase::Notes(notes) => {
                let chords = notes
                    .chunks(2)
                    .map(|pair| {
                        let options = chord_options(pitch_class_name(pair[0].pitch));
                        let name = options.choose(&mut self.rng).copied().unwrap_or("Cmaj7");
                        ChordEvent::from_name(name, DEFAULT_CHORD_UNITS)
                    })
                    .collect::<Vec<_>>();
                Ok(GenerationResult::new(
                    GenerationMode::Notes,
                    input.clone(),
                    Phrase::Chords(chords),
                    "Generated a corresponding chord progression based on the input notes.",
                    provenance,
                ))
            }
            Phrase::Chords(chords) => {
                let mut melody = Vec::new();
                for chord in chords {
                    let count = self.rng.gen_range(2..=4);
                    for _ in 0..count {
                        if let Some(pitch) = chord.pitches.choose(&mut self.rng) {
                            melody.push(NoteEvent {
                                pitch: *pitch,
                                duration_units: DEFAULT_NOTE_UNITS,
                                source_index: melody.len(),
                            });
                        }
                    }
                }
                if melody.is_empty() {
                    return Err(HarmonyError::Simulation("chords have no tones".into()));
                }
                Ok(GenerationResult::new(
                    GenerationMode::Chords,
                    input.clone(),
                    Phrase::Notes(melody),
                    "Generated a melody line based on the input chords.",
                    provenance,
                ))
            }
        }
    }
}
