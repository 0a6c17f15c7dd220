//! The studio: wires input capture, generation, scheduling, playback and the
//! waterfall together behind one object the host drives once per frame.

use crate::constants::{
    AUTOPLAY_DELAY_SEC, BASE_UNIT_SEC, CACHE_CAPACITY, CAPTURE_WINDOW_SEC, DEBOUNCE_SEC,
    DEFAULT_NOTE_UNITS, DEFAULT_TEMPERATURE, DEFAULT_TOP_K, KEYBOARD_AUTOGEN_DELAY_SEC,
    LEAD_IN_SEC, PALETTE,
};
use crate::coordinator::{CoordinatorEvent, CoordinatorParams, GenerationCoordinator};
use crate::harmonizer::{GenerationResult, Harmonizer};
use crate::keyboard::{binding_for_code, control_for_code, ControlKey, Octave};
use crate::performance::{AudioSink, Cue, CueAction, Performer};
use crate::phrase::GenerationMode;
use crate::pitch::midi_to_name;
use crate::recorder::{append_token, remove_last_token, DurationRecorder};
use crate::schedule::{schedule_result, PlaybackPlan};
use crate::timers::{Clock, TimerId, TimerQueue};
use crate::waterfall::{KeyLayout, Waterfall, WaterfallParams};
use rand::prelude::*;
use std::collections::VecDeque;
use std::rc::Rc;

/// Runtime tunables for a [`Studio`].
#[derive(Clone, Debug)]
pub struct StudioParams {
    pub base_unit_sec: f64,
    pub debounce_sec: f64,
    pub autoplay_delay_sec: f64,
    pub capture_window_sec: f64,
    pub cache_capacity: usize,
    pub temperature: f32,
    pub k: u32,
    pub lead_in_sec: f64,
    pub seed: u64,
    /// Start a performance automatically after each resolve.
    pub autoplay: bool,
    /// Raise computer-keyboard edits for generation once the keyboard has
    /// been quiet for `auto_generate_delay_sec`.
    pub auto_generate: bool,
    pub auto_generate_delay_sec: f64,
    pub waterfall: WaterfallParams,
}

impl Default for StudioParams {
    fn default() -> Self {
        Self {
            base_unit_sec: BASE_UNIT_SEC,
            debounce_sec: DEBOUNCE_SEC,
            autoplay_delay_sec: AUTOPLAY_DELAY_SEC,
            capture_window_sec: CAPTURE_WINDOW_SEC,
            cache_capacity: CACHE_CAPACITY,
            temperature: DEFAULT_TEMPERATURE,
            k: DEFAULT_TOP_K,
            lead_in_sec: LEAD_IN_SEC,
            seed: 42,
            autoplay: true,
            auto_generate: true,
            auto_generate_delay_sec: KEYBOARD_AUTOGEN_DELAY_SEC,
            waterfall: WaterfallParams::default(),
        }
    }
}

impl StudioParams {
    pub fn coordinator_params(&self) -> CoordinatorParams {
        CoordinatorParams {
            debounce_sec: self.debounce_sec,
            autoplay_delay_sec: self.autoplay_delay_sec,
            cache_capacity: self.cache_capacity,
            temperature: self.temperature,
            k: self.k,
            seed: self.seed,
        }
    }
}

/// Where a live note came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSource {
    Keyboard,
    Midi,
    Pointer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StudioTimer {
    /// The MIDI/pointer capture window closed.
    Capture,
    /// The computer keyboard has been quiet long enough.
    AutoGenerate,
}

pub struct Studio<C: Clock> {
    clock: C,
    params: StudioParams,
    text: String,
    mode: GenerationMode,

    recorder: DurationRecorder,
    octave: Octave,
    sustain: bool,
    recording: bool,
    enabled: bool,
    /// Note keys currently down, in press order.
    held: Vec<(String, u8)>,
    /// Note keys released while sustain was on.
    sustained: Vec<(String, u8)>,

    /// MIDI/pointer note names waiting for the capture window to close.
    capture: Vec<String>,
    capture_timer: Option<TimerId>,
    auto_generate_timer: Option<TimerId>,
    timers: TimerQueue<StudioTimer>,

    coordinator: GenerationCoordinator,
    performer: Performer,
    waterfall: Waterfall,
    primary: Box<dyn Harmonizer>,
    audio: Box<dyn AudioSink>,
    rng: StdRng,
}

impl<C: Clock> Studio<C> {
    pub fn new(
        clock: C,
        params: StudioParams,
        primary: Box<dyn Harmonizer>,
        audio: Box<dyn AudioSink>,
    ) -> Self {
        let mut waterfall = Waterfall::new(KeyLayout::default(), params.waterfall.clone());
        waterfall.start();
        Self {
            clock,
            recorder: DurationRecorder::new(params.base_unit_sec),
            coordinator: GenerationCoordinator::new(params.coordinator_params()),
            rng: StdRng::seed_from_u64(params.seed),
            params,
            text: String::new(),
            mode: GenerationMode::Notes,
            octave: Octave::default(),
            sustain: false,
            recording: true,
            enabled: true,
            held: Vec::new(),
            sustained: Vec::new(),
            capture: Vec::new(),
            capture_timer: None,
            auto_generate_timer: None,
            timers: TimerQueue::new(),
            performer: Performer::new(),
            waterfall,
            primary,
            audio,
        }
    }

    pub fn params(&self) -> &StudioParams {
        &self.params
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn octave(&self) -> i32 {
        self.octave.get()
    }

    pub fn is_sustain(&self) -> bool {
        self.sustain
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_input_enabled(&self) -> bool {
        self.enabled
    }

    pub fn status(&self) -> &str {
        self.coordinator.status()
    }

    pub fn latest(&self) -> Option<Rc<GenerationResult>> {
        self.coordinator.latest()
    }

    pub fn coordinator(&self) -> &GenerationCoordinator {
        &self.coordinator
    }

    pub fn performer(&self) -> &Performer {
        &self.performer
    }

    pub fn waterfall(&self) -> &Waterfall {
        &self.waterfall
    }

    pub fn recorder(&self) -> &DurationRecorder {
        &self.recorder
    }

    pub fn cache_len(&self) -> usize {
        self.coordinator.cache_len()
    }

    pub fn clear_cache(&mut self) {
        self.coordinator.clear_cache();
    }

    pub fn reset_play_lock(&mut self) {
        self.coordinator.reset_play_lock();
    }

    /// Warm the cache with simulated results for `texts` in the current mode.
    pub fn preload(&mut self, texts: &[&str]) -> usize {
        self.coordinator.preload(texts, self.mode)
    }

    pub fn is_auto_generate(&self) -> bool {
        self.params.auto_generate
    }

    pub fn has_pending_auto_generate(&self) -> bool {
        self.auto_generate_timer.is_some()
    }

    /// Turn keyboard auto-generation on or off. Turning it off drops a
    /// pending timer.
    pub fn set_auto_generate(&mut self, enabled: bool) {
        self.params.auto_generate = enabled;
        if !enabled {
            self.cancel_auto_generate();
        }
        log::info!("[studio] auto-generation {}", if enabled { "on" } else { "off" });
    }

    pub fn toggle_auto_generate(&mut self) -> bool {
        self.set_auto_generate(!self.params.auto_generate);
        self.params.auto_generate
    }

    /// Change the keyboard quiet period. Applies from the next keyboard edit.
    pub fn set_auto_generate_delay(&mut self, delay_sec: f64) {
        self.params.auto_generate_delay_sec = delay_sec.max(0.0);
        log::info!("[studio] auto-generation delay {:.2}s", self.params.auto_generate_delay_sec);
    }

    /// Nothing scheduled, in flight or playing.
    pub fn is_idle(&self) -> bool {
        self.coordinator.next_deadline().is_none()
            && self.coordinator.in_flight_len() == 0
            && !self.performer.is_active()
            && self.capture_timer.is_none()
            && self.auto_generate_timer.is_none()
    }

    // ---------------- Text and mode ----------------

    /// Replace the phrase text (a user edit).
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.cancel_auto_generate();
        self.changed();
    }

    pub fn set_mode(&mut self, mode: GenerationMode) {
        if self.mode != mode {
            log::info!("[studio] mode -> {}", mode);
            self.mode = mode;
            self.changed();
        }
    }

    fn changed(&mut self) {
        let now = self.clock.now();
        self.coordinator.input_changed(&self.text, self.mode, now);
    }

    /// A computer-keyboard edit. The text is only raised for generation once
    /// the keyboard has been quiet and no recording session is open.
    fn keyboard_changed(&mut self) {
        self.coordinator.input_pending();
        self.cancel_auto_generate();
        if self.params.auto_generate {
            let due = self.clock.now() + self.params.auto_generate_delay_sec;
            self.auto_generate_timer = Some(self.timers.schedule(due, StudioTimer::AutoGenerate));
        }
    }

    fn cancel_auto_generate(&mut self) {
        if let Some(id) = self.auto_generate_timer.take() {
            self.timers.cancel(id);
        }
    }

    fn fire_auto_generate(&mut self) {
        self.auto_generate_timer = None;
        let open = self.recorder.open_sessions();
        if open > 0 {
            // The key-up that closes the session re-arms the timer
            log::debug!("[studio] auto-generation held for {} open session(s)", open);
            return;
        }
        if self.text.trim().is_empty() {
            return;
        }
        log::info!("[studio] auto-generating {:?}", self.text);
        self.changed();
    }

    /// Resolve the current text immediately (the "generate" action).
    pub fn generate_now(&mut self) {
        self.cancel_auto_generate();
        let now = self.clock.now();
        let mut events = Vec::new();
        self.coordinator.request(&self.text, self.mode, now, &mut events);
        self.dispatch(now, events);
    }

    /// Forget the displayed result and stop playback (the "clear" action).
    pub fn clear(&mut self) {
        self.stop();
        self.cancel_auto_generate();
        self.text.clear();
        self.coordinator.clear_result();
    }

    // ---------------- Computer keyboard ----------------

    /// Handle a key press by physical key code. Returns whether the key was
    /// consumed.
    pub fn key_down(&mut self, code: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(control) = control_for_code(code) {
            self.control(control);
            return true;
        }
        let Some(binding) = binding_for_code(code) else {
            return false;
        };
        if self.held.iter().any(|(k, _)| k == code) {
            return true;
        }
        let Some(pitch) = binding.midi(self.octave.get()) else {
            return false;
        };
        let now = self.clock.now();
        // A re-struck sustained key closes its previous note first
        if let Some(i) = self.sustained.iter().position(|(k, _)| k == code) {
            let (key, old) = self.sustained.remove(i);
            self.release_key_note(&key, old, now);
        }
        self.held.push((code.to_string(), pitch));
        self.sound_on(pitch, InputSource::Keyboard);
        if self.recording {
            self.recorder.key_down(code, pitch, now, &mut self.text);
        } else {
            append_token(
                &mut self.text,
                &format!("{}:{}", midi_to_name(pitch), DEFAULT_NOTE_UNITS),
            );
        }
        self.keyboard_changed();
        true
    }

    pub fn key_up(&mut self, code: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(i) = self.held.iter().position(|(k, _)| k == code) else {
            return false;
        };
        let (key, pitch) = self.held.remove(i);
        if self.sustain {
            self.sustained.push((key, pitch));
        } else {
            let now = self.clock.now();
            self.release_key_note(&key, pitch, now);
        }
        true
    }

    fn release_key_note(&mut self, key: &str, pitch: u8, now: f64) {
        // Any closed session re-arms auto-generation, which may have been held for it
        if self.recorder.key_up(key, now, &mut self.text).is_some() {
            self.keyboard_changed();
        }
        self.sound_off(pitch);
    }

    fn control(&mut self, control: ControlKey) {
        match control {
            ControlKey::OctaveDown | ControlKey::OctaveUp => {
                let delta = if control == ControlKey::OctaveUp { 1 } else { -1 };
                if self.octave.shift(delta) {
                    log::info!("[studio] octave {}", self.octave.get());
                }
            }
            ControlKey::ToggleSustain => {
                self.sustain = !self.sustain;
                log::info!("[studio] sustain {}", if self.sustain { "on" } else { "off" });
                if !self.sustain {
                    self.stop_all_notes();
                }
            }
            ControlKey::StopAll => self.stop_all_notes(),
            ControlKey::CommitChord => {
                if self.held.is_empty() {
                    return;
                }
                let names: Vec<String> = self.held.iter().map(|(_, p)| midi_to_name(*p)).collect();
                append_token(&mut self.text, &format!("[{}]", names.join(" ")));
                self.keyboard_changed();
            }
            ControlKey::DeleteLast => {
                if let Some(removed) = remove_last_token(&mut self.text) {
                    log::debug!("[studio] removed {:?}", removed);
                    self.keyboard_changed();
                }
            }
            ControlKey::ToggleRecording => {
                if self.recording {
                    let now = self.clock.now();
                    self.close_sessions(now);
                }
                self.recording = !self.recording;
                log::info!("[studio] recording {}", if self.recording { "on" } else { "off" });
            }
        }
    }

    fn close_sessions(&mut self, now: f64) {
        if !self.recorder.force_close_all(now, &mut self.text).is_empty() {
            self.keyboard_changed();
        }
    }

    /// Release every live keyboard note and close every recording session.
    pub fn stop_all_notes(&mut self) {
        let now = self.clock.now();
        self.close_sessions(now);
        let notes: Vec<(String, u8)> = self.held.drain(..).chain(self.sustained.drain(..)).collect();
        for (_, pitch) in notes {
            self.waterfall.note_off(pitch);
        }
        if let Err(e) = self.audio.release_all() {
            log::warn!("[studio] release_all failed: {}", e);
        }
    }

    /// Window focus went away: key-up events may never arrive.
    pub fn focus_lost(&mut self) {
        log::debug!("[studio] focus lost");
        self.stop_all_notes();
    }

    pub fn set_input_enabled(&mut self, enabled: bool) {
        if !enabled && self.enabled {
            self.stop_all_notes();
        }
        self.enabled = enabled;
    }

    // ---------------- MIDI and pointer ----------------

    pub fn midi_note_on(&mut self, pitch: u8) {
        self.external_on(pitch, InputSource::Midi);
    }

    pub fn midi_note_off(&mut self, pitch: u8) {
        self.sound_off(pitch);
    }

    pub fn pointer_down(&mut self, pitch: u8) {
        self.external_on(pitch, InputSource::Pointer);
    }

    pub fn pointer_up(&mut self, pitch: u8) {
        self.sound_off(pitch);
    }

    fn external_on(&mut self, pitch: u8, source: InputSource) {
        if pitch > 127 {
            return;
        }
        self.sound_on(pitch, source);
        let name = midi_to_name(pitch);
        if !self.capture.contains(&name) {
            self.capture.push(name);
            log::debug!("[studio] captured {}", self.capture.join(" "));
        }
        if let Some(id) = self.capture_timer.take() {
            self.timers.cancel(id);
        }
        let due = self.clock.now() + self.params.capture_window_sec;
        self.capture_timer = Some(self.timers.schedule(due, StudioTimer::Capture));
    }

    fn flush_capture(&mut self) {
        self.capture_timer = None;
        if self.capture.is_empty() {
            return;
        }
        self.text = self.capture.join(" ");
        self.capture.clear();
        log::info!("[studio] captured phrase {:?}", self.text);
        self.changed();
    }

    fn random_color(&mut self) -> &'static str {
        PALETTE[..PALETTE.len() - 1]
            .choose(&mut self.rng)
            .map(|(name, _)| *name)
            .unwrap_or("orange")
    }

    fn sound_on(&mut self, pitch: u8, source: InputSource) {
        let name = midi_to_name(pitch);
        if let Err(e) = self.audio.trigger_attack(&name) {
            log::warn!("[studio] {:?} attack {} failed: {}", source, name, e);
        }
        let color = self.random_color();
        self.waterfall.note_on(pitch, color);
    }

    fn sound_off(&mut self, pitch: u8) {
        let name = midi_to_name(pitch);
        if let Err(e) = self.audio.trigger_release(&name) {
            log::warn!("[studio] release {} failed: {}", name, e);
        }
        self.waterfall.note_off(pitch);
    }

    // ---------------- Playback ----------------

    /// Play the latest result now, if the gate is open.
    pub fn play(&mut self) -> bool {
        match self.coordinator.latest() {
            Some(result) => self.perform(&result),
            None => false,
        }
    }

    fn perform(&mut self, result: &GenerationResult) -> bool {
        let now = self.clock.now();
        let plan = self.plan(result, now);
        if plan.is_empty() {
            log::warn!("[studio] nothing to play");
            return false;
        }
        let nominal = plan.end() - now;
        let Some(performance) = self.coordinator.try_begin_performance(now, nominal) else {
            return false;
        };
        self.waterfall.start();
        self.performer.start(performance, &plan, self.audio.as_mut());
        true
    }

    /// The plan a performance of `result` starting at `now` would follow.
    pub fn plan(&self, result: &GenerationResult, now: f64) -> PlaybackPlan {
        schedule_result(result, now + self.params.lead_in_sec, self.params.base_unit_sec)
    }

    /// Stop playback: pending cues and autoplay are dropped, visuals cleared
    /// and the gate released before this returns. A pending edit still
    /// resolves.
    pub fn stop(&mut self) {
        self.performer.stop(self.audio.as_mut());
        self.waterfall.clear();
        self.coordinator.end_performance();
        self.coordinator.cancel_autoplay();
    }

    // ---------------- Frame loop ----------------

    /// Advance one animation frame: fire due timers, run harmonizer calls,
    /// dispatch visual cues and tick the waterfall.
    pub fn frame(&mut self) {
        let now = self.clock.now();

        let mut fired = Vec::new();
        self.timers.drain_due(now, &mut fired);
        for timer in fired {
            match timer {
                StudioTimer::Capture => self.flush_capture(),
                StudioTimer::AutoGenerate => self.fire_auto_generate(),
            }
        }

        let mut events = Vec::new();
        self.coordinator.poll(now, &mut events);
        self.dispatch(now, events);

        let mut cues: Vec<Cue> = Vec::new();
        self.performer.poll(now, &mut cues);
        for cue in cues {
            match cue.action {
                CueAction::NoteOn => {
                    self.waterfall.note_on(cue.pitch, cue.color);
                }
                CueAction::NoteOff => self.waterfall.note_off(cue.pitch),
            }
        }

        self.waterfall.tick();
    }

    fn dispatch(&mut self, now: f64, events: Vec<CoordinatorEvent>) {
        let mut queue: VecDeque<CoordinatorEvent> = events.into();
        while let Some(event) = queue.pop_front() {
            match event {
                CoordinatorEvent::Request { ticket, request } => {
                    let outcome = self.primary.harmonize(&request);
                    let mut more = Vec::new();
                    self.coordinator.complete(ticket, outcome, now, &mut more);
                    queue.extend(more);
                }
                CoordinatorEvent::Resolved {
                    result, from_cache, ..
                } => {
                    log::info!(
                        "[studio] {}{} -> {}",
                        if from_cache { "(cached) " } else { "" },
                        result.input.to_text(),
                        result.output.to_text()
                    );
                }
                CoordinatorEvent::Failed { error, .. } => {
                    log::warn!("[studio] {}", error);
                }
                CoordinatorEvent::Autoplay { result, .. } => {
                    if self.params.autoplay {
                        self.perform(&result);
                    }
                }
            }
        }
    }
}
