//! Projection of a resolved melody/harmony pair onto absolute time.
//!
//! One track drives: its events keep their native durations laid end to end
//! from `t0`. The other track is spread evenly over the driving track's total
//! length, so both tracks finish together at `t0 + T`.

use crate::constants::BASE_UNIT_SEC;
use crate::harmonizer::GenerationResult;
use crate::phrase::{GenerationMode, Phrase};
use crate::pitch::PitchSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Track {
    Melody,
    Harmony,
}

/// Which track supplies the timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Melody durations drive; harmony is stretched to fit.
    MelodyToHarmony,
    /// Chord durations drive; melody is stretched to fit.
    HarmonyToMelody,
}

impl Direction {
    /// The typed track drives: melody in notes mode, chords in chords mode.
    pub fn for_mode(mode: GenerationMode) -> Self {
        match mode {
            GenerationMode::Notes => Direction::MelodyToHarmony,
            GenerationMode::Chords => Direction::HarmonyToMelody,
        }
    }

    pub fn driving(self) -> Track {
        match self {
            Direction::MelodyToHarmony => Track::Melody,
            Direction::HarmonyToMelody => Track::Harmony,
        }
    }
}

/// One event placed on the absolute timeline.
///
/// Fields:
/// - `pitches`: one pitch for a melody note, the chord tones for harmony
/// - `start`: absolute seconds
/// - `duration`: seconds of the slot (before articulation)
/// - `index`: position of the event in its phrase
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledEvent {
    pub track: Track,
    pub pitches: PitchSet,
    pub start: f64,
    pub duration: f64,
    pub index: usize,
}

impl ScheduledEvent {
    #[inline]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Read-only timeline derived from a [`GenerationResult`].
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackPlan {
    pub t0: f64,
    /// Length of the driving track in seconds.
    pub total_sec: f64,
    pub direction: Direction,
    pub melody: Vec<ScheduledEvent>,
    pub harmony: Vec<ScheduledEvent>,
}

impl PlaybackPlan {
    pub fn is_empty(&self) -> bool {
        self.melody.is_empty() && self.harmony.is_empty()
    }

    /// Absolute time at which the last event of either track ends.
    pub fn end(&self) -> f64 {
        self.t0 + self.total_sec
    }

    /// Every event of both tracks ordered by start time (melody first on ties).
    pub fn events(&self) -> Vec<&ScheduledEvent> {
        let mut all: Vec<&ScheduledEvent> = self.melody.iter().chain(self.harmony.iter()).collect();
        all.sort_by(|a, b| a.start.total_cmp(&b.start));
        all
    }
}

/// Lay `phrase` out with its native durations from `t0`.
fn lay_out_native(phrase: &Phrase, track: Track, t0: f64, base_unit_sec: f64) -> Vec<ScheduledEvent> {
    let mut cursor_units: u64 = 0;
    phrase
        .units()
        .into_iter()
        .enumerate()
        .map(|(index, units)| {
            // Starts come from the integer cursor so rounding never accumulates
            let start = t0 + cursor_units as f64 * base_unit_sec;
            cursor_units += units as u64;
            ScheduledEvent {
                track,
                pitches: phrase.pitches_at(index),
                start,
                duration: units as f64 * base_unit_sec,
                index,
            }
        })
        .collect()
}

/// Spread `phrase` evenly over `[t0, t0 + total_sec]`.
fn spread_evenly(phrase: &Phrase, track: Track, t0: f64, total_sec: f64) -> Vec<ScheduledEvent> {
    let n = phrase.len();
    if n == 0 || total_sec <= 0.0 {
        return Vec::new();
    }
    let slot = total_sec / n as f64;
    (0..n)
        .map(|index| {
            let start = t0 + index as f64 * slot;
            let duration = if index + 1 == n {
                t0 + total_sec - start
            } else {
                slot
            };
            ScheduledEvent {
                track,
                pitches: phrase.pitches_at(index),
                start,
                duration,
                index,
            }
        })
        .collect()
}

/// Which phrase of `result` is the melody and which the harmony.
fn split_tracks(result: &GenerationResult) -> (&Phrase, &Phrase) {
    match (&result.input, &result.output) {
        (Phrase::Chords(_), melody) => (melody, &result.input),
        (melody, harmony) => (melody, harmony),
    }
}

/// Build the playback plan for `result` starting at `t0`.
pub fn schedule(
    result: &GenerationResult,
    t0: f64,
    direction: Direction,
    base_unit_sec: f64,
) -> PlaybackPlan {
    let unit = if base_unit_sec > 0.0 {
        base_unit_sec
    } else {
        BASE_UNIT_SEC
    };
    let (melody, harmony) = split_tracks(result);
    let (driving, other) = match direction {
        Direction::MelodyToHarmony => (melody, harmony),
        Direction::HarmonyToMelody => (harmony, melody),
    };
    let driving_track = direction.driving();
    let other_track = match driving_track {
        Track::Melody => Track::Harmony,
        Track::Harmony => Track::Melody,
    };

    let driven = lay_out_native(driving, driving_track, t0, unit);
    let total_sec = driving.total_units() as f64 * unit;
    let spread = spread_evenly(other, other_track, t0, total_sec);
    if spread.is_empty() && !other.is_empty() {
        log::warn!("[schedule] driving track is empty; nothing to stretch against");
    }
    log::debug!(
        "[schedule] {:?}: {} driving + {} spread events over {:.3}s",
        direction,
        driven.len(),
        spread.len(),
        total_sec
    );

    let (melody, harmony) = match driving_track {
        Track::Melody => (driven, spread),
        Track::Harmony => (spread, driven),
    };
    PlaybackPlan {
        t0,
        total_sec,
        direction,
        melody,
        harmony,
    }
}

/// [`schedule`] with the direction implied by the result's mode.
pub fn schedule_result(result: &GenerationResult, t0: f64, base_unit_sec: f64) -> PlaybackPlan {
    schedule(result, t0, Direction::for_mode(result.mode), base_unit_sec)
}
