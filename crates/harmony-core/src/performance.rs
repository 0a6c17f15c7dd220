//! Performance dispatch: turns a [`PlaybackPlan`] into audio calls and
//! time-ordered visual cues.

use crate::constants::{
    HARMONY_ARTICULATION, HARMONY_VELOCITY, MELODY_ARTICULATION, MELODY_VELOCITY, PALETTE,
};
use crate::error::Result;
use crate::pitch::midi_to_name;
use crate::schedule::{PlaybackPlan, Track};
use crate::timers::TimerQueue;

/// The synthesizer, behind a narrow interface. Note names use sharps
/// (`"C#4"`); times are on the same clock the plan was built against.
pub trait AudioSink {
    fn trigger_attack(&mut self, note: &str) -> Result<()>;
    fn trigger_release(&mut self, note: &str) -> Result<()>;
    fn trigger_attack_release(
        &mut self,
        note: &str,
        duration_sec: f64,
        at: f64,
        velocity: f32,
    ) -> Result<()>;
    fn release_all(&mut self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CueAction {
    NoteOn,
    NoteOff,
}

/// A visual event due at a point of the plan.
#[derive(Clone, Debug, PartialEq)]
pub struct Cue {
    pub performance: u64,
    pub pitch: u8,
    pub action: CueAction,
    pub color: &'static str,
}

/// Per-track playback style.
#[derive(Clone, Copy, Debug)]
pub struct Voicing {
    pub articulation: f64,
    pub velocity: f32,
    pub color: &'static str,
}

impl Voicing {
    pub fn for_track(track: Track) -> Self {
        match track {
            Track::Melody => Voicing {
                articulation: MELODY_ARTICULATION,
                velocity: MELODY_VELOCITY,
                color: PALETTE[0].0,
            },
            Track::Harmony => Voicing {
                articulation: HARMONY_ARTICULATION,
                velocity: HARMONY_VELOCITY,
                color: PALETTE[5].0,
            },
        }
    }
}

/// Drives at most one performance at a time.
#[derive(Default)]
pub struct Performer {
    active: Option<u64>,
    cues: TimerQueue<Cue>,
    ends_at: f64,
}

impl Performer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<u64> {
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn pending_cues(&self) -> usize {
        self.cues.len()
    }

    pub fn ends_at(&self) -> f64 {
        self.ends_at
    }

    /// Schedule every note of `plan` under `performance`. Audio is issued up
    /// front at absolute times; visual cues are queued for [`poll`](Self::poll).
    /// A note whose audio call fails is logged and skipped. Returns the number
    /// of notes scheduled.
    pub fn start(&mut self, performance: u64, plan: &PlaybackPlan, audio: &mut dyn AudioSink) -> usize {
        if let Some(previous) = self.active.take() {
            log::info!("[perform] performance {} superseded by {}", previous, performance);
            self.cues.clear();
        }
        self.active = Some(performance);
        self.ends_at = plan.end();

        let mut scheduled = 0;
        let mut skipped = 0;
        for event in plan.events() {
            let voicing = Voicing::for_track(event.track);
            let sounding = event.duration * voicing.articulation;
            for &pitch in event.pitches.iter() {
                let name = midi_to_name(pitch);
                if let Err(e) =
                    audio.trigger_attack_release(&name, sounding, event.start, voicing.velocity)
                {
                    log::warn!("[perform] skipping {} at {:.3}s: {}", name, event.start, e);
                    skipped += 1;
                    continue;
                }
                self.cues.schedule(
                    event.start,
                    Cue {
                        performance,
                        pitch,
                        action: CueAction::NoteOn,
                        color: voicing.color,
                    },
                );
                self.cues.schedule(
                    event.start + sounding,
                    Cue {
                        performance,
                        pitch,
                        action: CueAction::NoteOff,
                        color: voicing.color,
                    },
                );
                scheduled += 1;
            }
        }
        log::info!(
            "[perform] performance {}: {} notes scheduled, {} skipped, ends at {:.3}s",
            performance,
            scheduled,
            skipped,
            self.ends_at
        );
        scheduled
    }

    /// Emit every cue due at `now` for the active performance.
    pub fn poll(&mut self, now: f64, out: &mut Vec<Cue>) {
        let Some(active) = self.active else {
            return;
        };
        let mut due = Vec::new();
        self.cues.drain_due(now, &mut due);
        out.extend(due.into_iter().filter(|c| c.performance == active));
        if self.cues.is_empty() && now >= self.ends_at {
            log::debug!("[perform] performance {} complete", active);
            self.active = None;
        }
    }

    /// Cancel every pending cue and silence the synthesizer.
    pub fn stop(&mut self, audio: &mut dyn AudioSink) {
        let dropped = self.cues.len();
        self.cues.clear();
        if let Some(active) = self.active.take() {
            log::info!("[perform] stopped performance {} ({} cues dropped)", active, dropped);
        }
        if let Err(e) = audio.release_all() {
            log::warn!("[perform] release_all failed: {}", e);
        }
    }
}
