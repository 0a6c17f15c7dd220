//! Key-hold duration recording.
//!
//! Each pressed key owns a [`RecordingSession`]. Key-down appends a note with a
//! provisional duration to the phrase text and remembers which token it
//! wrote; key-up quantizes the hold time and rewrites that token in place.
//! Sessions for different keys are independent, so chords and overlapping
//! notes record correctly.

use crate::constants::{BASE_UNIT_SEC, DEFAULT_NOTE_UNITS};
use crate::pitch::midi_to_name;
use crate::quantize::quantize_hold;
use fnv::FnvHashMap;
use std::ops::Range;

/// Open recording for one physical key.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordingSession {
    pub key: String,
    pub pitch: u8,
    /// Seconds on the recorder's clock.
    pub started_at: f64,
    /// Index of the whitespace-separated token this session wrote.
    pub slot: usize,
}

/// Result of closing a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Committed {
    pub key: String,
    pub pitch: u8,
    pub units: u32,
    /// False when the token had been edited away and the rewrite was skipped.
    pub written: bool,
}

pub struct DurationRecorder {
    sessions: FnvHashMap<String, RecordingSession>,
    base_unit_sec: f64,
}

impl Default for DurationRecorder {
    fn default() -> Self {
        Self::new(BASE_UNIT_SEC)
    }
}

/// Byte range of the `index`-th whitespace-separated token of `text`.
pub fn token_span(text: &str, index: usize) -> Option<Range<usize>> {
    let mut count = 0;
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                if count == index {
                    return Some(s..i);
                }
                count += 1;
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    match start {
        Some(s) if count == index => Some(s..text.len()),
        _ => None,
    }
}

#[inline]
fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Append `token` to `text`, separated by a single space when needed.
pub fn append_token(text: &mut String, token: &str) -> usize {
    if !text.is_empty() && !text.ends_with(char::is_whitespace) {
        text.push(' ');
    }
    text.push_str(token);
    token_count(text) - 1
}

/// Remove the last token (and the whitespace before it).
pub fn remove_last_token(text: &mut String) -> Option<String> {
    let n = token_count(text);
    let span = token_span(text, n.checked_sub(1)?)?;
    let removed = text[span.clone()].to_string();
    text.truncate(span.start);
    let kept = text.trim_end().len();
    text.truncate(kept);
    Some(removed)
}

impl DurationRecorder {
    pub fn new(base_unit_sec: f64) -> Self {
        Self {
            sessions: FnvHashMap::default(),
            base_unit_sec,
        }
    }

    pub fn base_unit_sec(&self) -> f64 {
        self.base_unit_sec
    }

    pub fn is_recording(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Open a session for `key` and append `pitch` with a provisional
    /// duration. A key that is already recording is ignored (auto-repeat).
    pub fn key_down(&mut self, key: &str, pitch: u8, now: f64, text: &mut String) -> bool {
        if self.sessions.contains_key(key) {
            return false;
        }
        let token = format!("{}:{}", midi_to_name(pitch), DEFAULT_NOTE_UNITS);
        let slot = append_token(text, &token);
        log::debug!("[recorder] open {} -> {} at slot {}", key, token, slot);
        self.sessions.insert(
            key.to_string(),
            RecordingSession {
                key: key.to_string(),
                pitch,
                started_at: now,
                slot,
            },
        );
        true
    }

    /// Close the session for `key`, writing the quantized hold time into its
    /// token. Returns `None` when `key` had no open session.
    pub fn key_up(&mut self, key: &str, now: f64, text: &mut String) -> Option<Committed> {
        let session = self.sessions.remove(key)?;
        Some(self.commit(session, now, text))
    }

    /// Close every open session using `now` as the release time. Used on
    /// focus loss and explicit stop so no session outlives its key.
    pub fn force_close_all(&mut self, now: f64, text: &mut String) -> Vec<Committed> {
        let mut sessions: Vec<RecordingSession> = self.sessions.drain().map(|(_, s)| s).collect();
        sessions.sort_by_key(|s| s.slot);
        if !sessions.is_empty() {
            log::info!("[recorder] force-closing {} session(s)", sessions.len());
        }
        sessions
            .into_iter()
            .map(|s| self.commit(s, now, text))
            .collect()
    }

    /// Drop every session without touching the text.
    pub fn discard_all(&mut self) {
        self.sessions.clear();
    }

    fn commit(&self, session: RecordingSession, now: f64, text: &mut String) -> Committed {
        let hold_ms = (now - session.started_at) * 1000.0;
        let units = quantize_hold(hold_ms, self.base_unit_sec);
        let name = midi_to_name(session.pitch);
        let written = match token_span(text, session.slot) {
            // Only rewrite a token that still names the note we appended
            Some(span) if token_matches(&text[span.clone()], &name) => {
                text.replace_range(span, &format!("{}:{}", name, units));
                true
            }
            _ => {
                log::warn!(
                    "[recorder] slot {} no longer holds {}; skipping duration update",
                    session.slot,
                    name
                );
                false
            }
        };
        log::debug!(
            "[recorder] {} held {:.0}ms -> {} units",
            session.key,
            hold_ms,
            units
        );
        Committed {
            key: session.key,
            pitch: session.pitch,
            units,
            written,
        }
    }
}

#[inline]
fn token_matches(token: &str, name: &str) -> bool {
    matches!(token.split_once(':'), Some((n, _)) if n == name)
}
