//! Computer-keyboard piano layout and control keys.
//!
//! Key identifiers are physical key codes (`"KeyA"`, `"Semicolon"`), so the
//! layout does not move with the user's keyboard language.

use crate::constants::{DEFAULT_OCTAVE, MAX_OCTAVE, MIN_OCTAVE};

/// A piano key reachable from the computer keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    /// Semitone class, 0 = C.
    pub class: u8,
    /// Octave relative to the current base octave.
    pub octave_offset: i32,
}

/// Non-note keys handled by the keyboard front-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlKey {
    OctaveDown,
    OctaveUp,
    ToggleSustain,
    StopAll,
    CommitChord,
    DeleteLast,
    ToggleRecording,
}

#[inline]
const fn key(class: u8, octave_offset: i32) -> Option<KeyBinding> {
    Some(KeyBinding {
        class,
        octave_offset,
    })
}

/// Map a key code to a piano key, or `None` for unmapped keys.
#[inline]
pub fn binding_for_code(code: &str) -> Option<KeyBinding> {
    match code {
        // Home row: one octave of white keys
        "KeyA" => key(0, 0),
        "KeyS" => key(2, 0),
        "KeyD" => key(4, 0),
        "KeyF" => key(5, 0),
        "KeyG" => key(7, 0),
        "KeyH" => key(9, 0),
        "KeyJ" => key(11, 0),
        // Black keys above the home row
        "KeyW" => key(1, 0),
        "KeyE" => key(3, 0),
        "KeyT" => key(6, 0),
        "KeyY" => key(8, 0),
        "KeyU" => key(10, 0),
        // Spill into the next octave
        "KeyK" => key(0, 1),
        "KeyL" => key(2, 1),
        "Semicolon" => key(4, 1),
        "KeyI" => key(1, 1),
        "KeyO" => key(3, 1),
        // Bottom row: one octave down
        "KeyZ" => key(0, -1),
        "KeyX" => key(2, -1),
        "KeyC" => key(4, -1),
        "KeyV" => key(5, -1),
        "KeyB" => key(7, -1),
        "KeyN" => key(9, -1),
        "KeyM" => key(11, -1),
        "KeyQ" => key(1, -1),
        "Digit2" => key(3, -1),
        "Digit4" => key(6, -1),
        "Digit5" => key(8, -1),
        "Digit6" => key(10, -1),
        _ => None,
    }
}

#[inline]
pub fn control_for_code(code: &str) -> Option<ControlKey> {
    match code {
        "ArrowLeft" => Some(ControlKey::OctaveDown),
        "ArrowRight" => Some(ControlKey::OctaveUp),
        "Space" => Some(ControlKey::ToggleSustain),
        "Escape" => Some(ControlKey::StopAll),
        "Enter" => Some(ControlKey::CommitChord),
        "Backspace" => Some(ControlKey::DeleteLast),
        "KeyR" => Some(ControlKey::ToggleRecording),
        _ => None,
    }
}

impl KeyBinding {
    /// MIDI number of this key with `base_octave` as the home row octave.
    pub fn midi(self, base_octave: i32) -> Option<u8> {
        let midi = (base_octave + self.octave_offset + 1) * 12 + self.class as i32;
        u8::try_from(midi).ok().filter(|m| *m <= 127)
    }
}

/// Current base octave, clamped to the playable range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Octave(i32);

impl Default for Octave {
    fn default() -> Self {
        Octave(DEFAULT_OCTAVE)
    }
}

impl Octave {
    pub fn get(self) -> i32 {
        self.0
    }

    /// Shift by `delta`; shifts that would leave the range are ignored.
    pub fn shift(&mut self, delta: i32) -> bool {
        let next = self.0 + delta;
        if (MIN_OCTAVE..=MAX_OCTAVE).contains(&next) {
            self.0 = next;
            true
        } else {
            false
        }
    }
}
