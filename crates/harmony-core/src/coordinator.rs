//! Generation coordination: debounce, single-flight, cache and playback gate.
//!
//! The coordinator is an explicit state machine. Every input change bumps a
//! monotonic generation token; every deferred action (debounce expiry,
//! autoplay, gate release) carries the token it was scheduled under and is a
//! no-op if that token is no longer current. Harmonizer calls are handed to
//! the host as [`CoordinatorEvent::Request`] and reported back through
//! [`GenerationCoordinator::complete`], so the coordinator works the same for
//! blocking and asynchronous transports.

use crate::constants::{
    AUTOPLAY_DELAY_SEC, CACHE_CAPACITY, DEBOUNCE_SEC, DEFAULT_TEMPERATURE, DEFAULT_TOP_K,
};
use crate::error::{HarmonyError, Result};
use crate::harmonizer::{
    GenerationResult, HarmonizeRequest, HarmonizeResponse, Harmonizer, Provenance,
    SimulatedHarmonizer,
};
use crate::phrase::{parse_phrase, GenerationMode, Phrase};
use crate::timers::{TimerId, TimerQueue};
use fnv::FnvHashMap;
use std::collections::VecDeque;
use std::rc::Rc;

/// Normalized identity of a request: trimmed text plus mode.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub mode: GenerationMode,
}

impl CacheKey {
    pub fn new(text: &str, mode: GenerationMode) -> Self {
        Self {
            text: text.trim().to_string(),
            mode,
        }
    }
}

/// Handle for one outstanding harmonizer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Tunables for the coordinator.
#[derive(Clone, Debug)]
pub struct CoordinatorParams {
    pub debounce_sec: f64,
    pub autoplay_delay_sec: f64,
    pub cache_capacity: usize,
    pub temperature: f32,
    pub k: u32,
    pub seed: u64,
}

impl Default for CoordinatorParams {
    fn default() -> Self {
        Self {
            debounce_sec: DEBOUNCE_SEC,
            autoplay_delay_sec: AUTOPLAY_DELAY_SEC,
            cache_capacity: CACHE_CAPACITY,
            temperature: DEFAULT_TEMPERATURE,
            k: DEFAULT_TOP_K,
            seed: 42,
        }
    }
}

/// Output of the coordinator for the host to act on.
#[derive(Clone, Debug)]
pub enum CoordinatorEvent {
    /// Call the harmonization service and report back with `complete`.
    Request {
        ticket: Ticket,
        request: HarmonizeRequest,
    },
    /// A result for the current token is ready to display.
    Resolved {
        token: u64,
        result: Rc<GenerationResult>,
        from_cache: bool,
    },
    /// Both the service and the fallback failed for the current token.
    Failed { token: u64, error: HarmonyError },
    /// The autoplay delay for the current token elapsed.
    Autoplay {
        token: u64,
        result: Rc<GenerationResult>,
    },
}

#[derive(Clone, Debug)]
enum Deferred {
    Debounce { token: u64, key: CacheKey },
    Autoplay { token: u64 },
    GateRelease { performance: u64 },
}

struct InFlight {
    ticket: Ticket,
    input: Phrase,
    /// Tokens of every request that joined this call.
    waiters: Vec<u64>,
}

/// Bounded map with oldest-first eviction.
struct ResultCache {
    entries: FnvHashMap<CacheKey, Rc<GenerationResult>>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl ResultCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: FnvHashMap::default(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, key: &CacheKey) -> Option<Rc<GenerationResult>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: CacheKey, value: Rc<GenerationResult>) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                log::debug!("[coordinator] evicting {:?}", oldest.text);
                self.entries.remove(&oldest);
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// "Performance in progress" flag with a timed auto-release.
#[derive(Default)]
struct PlaybackGate {
    active: Option<u64>,
    release_timer: Option<TimerId>,
    counter: u64,
}

pub struct GenerationCoordinator {
    params: CoordinatorParams,
    token: u64,
    debounce: Option<TimerId>,
    timers: TimerQueue<Deferred>,
    in_flight: FnvHashMap<CacheKey, InFlight>,
    next_ticket: u64,
    cache: ResultCache,
    simulator: SimulatedHarmonizer,
    gate: PlaybackGate,
    latest: Option<Rc<GenerationResult>>,
    /// Token whose generation last failed.
    failed: Option<u64>,
    status: String,
}

impl Default for GenerationCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorParams::default())
    }
}

impl GenerationCoordinator {
    pub fn new(params: CoordinatorParams) -> Self {
        Self {
            cache: ResultCache::new(params.cache_capacity),
            simulator: SimulatedHarmonizer::new(params.seed),
            params,
            token: 0,
            debounce: None,
            timers: TimerQueue::new(),
            in_flight: FnvHashMap::default(),
            next_ticket: 0,
            gate: PlaybackGate::default(),
            latest: None,
            failed: None,
            status: String::new(),
        }
    }

    /// Current generation token.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Latest user-visible status line.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Most recent result surfaced for a current token.
    pub fn latest(&self) -> Option<Rc<GenerationResult>> {
        self.latest.clone()
    }

    /// Whether generation for the current token ended in failure.
    pub fn has_failed(&self) -> bool {
        self.failed == Some(self.token)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.entries.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        log::info!("[coordinator] cache cleared");
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_pending_debounce(&self) -> bool {
        self.debounce.is_some()
    }

    /// Earliest time at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<f64> {
        self.timers.next_due()
    }

    /// Fill the cache with simulated results for `texts` without touching the
    /// token, status or displayed result. Texts already cached or with no
    /// playable events are skipped. Returns how many entries were added.
    pub fn preload(&mut self, texts: &[&str], mode: GenerationMode) -> usize {
        let mut added = 0;
        for text in texts {
            let key = CacheKey::new(text, mode);
            if key.text.is_empty() || self.cache.get(&key).is_some() {
                continue;
            }
            let input = parse_phrase(&key.text, mode);
            match self.simulator.generate(&input, Provenance::Simulated) {
                Ok(result) => {
                    self.cache.insert(key, Rc::new(result));
                    added += 1;
                }
                Err(e) => log::debug!("[coordinator] not preloading {:?}: {}", key.text, e),
            }
        }
        log::info!("[coordinator] preloaded {} result(s)", added);
        added
    }

    /// Record an edit whose generation will be requested later. Supersedes
    /// any pending debounce or autoplay and any call still in flight.
    pub fn input_pending(&mut self) {
        self.token += 1;
        self.cancel_debounce();
        self.cancel_autoplay();
    }

    /// Record an edit. Supersedes any pending debounce; whitespace-only text
    /// cancels without scheduling anything.
    pub fn input_changed(&mut self, text: &str, mode: GenerationMode, now: f64) {
        self.input_pending();
        let key = CacheKey::new(text, mode);
        if key.text.is_empty() {
            log::debug!("[coordinator] empty input; nothing scheduled");
            return;
        }
        let due = now + self.params.debounce_sec;
        self.debounce = Some(self.timers.schedule(
            due,
            Deferred::Debounce {
                token: self.token,
                key,
            },
        ));
    }

    /// Cancel a pending debounce without changing the token.
    pub fn cancel_debounce(&mut self) {
        if let Some(id) = self.debounce.take() {
            if self.timers.cancel(id) {
                log::debug!("[coordinator] superseded pending debounce");
            }
        }
    }

    /// Drop pending autoplay timers. The token and any pending debounce are
    /// left alone.
    pub fn cancel_autoplay(&mut self) {
        let n = self
            .timers
            .cancel_where(|d| matches!(d, Deferred::Autoplay { .. }));
        if n > 0 {
            log::debug!("[coordinator] cancelled {} pending autoplay(s)", n);
        }
    }

    /// Fire due timers.
    pub fn poll(&mut self, now: f64, out: &mut Vec<CoordinatorEvent>) {
        let mut due = Vec::new();
        self.timers.drain_due(now, &mut due);
        for deferred in due {
            match deferred {
                Deferred::Debounce { token, key } => {
                    self.debounce = None;
                    if token != self.token {
                        log::debug!("[coordinator] stale debounce token {} (current {})", token, self.token);
                        continue;
                    }
                    self.begin(key, token, now, out);
                }
                Deferred::Autoplay { token } => {
                    if token != self.token {
                        continue;
                    }
                    if let Some(result) = self.latest.clone() {
                        out.push(CoordinatorEvent::Autoplay { token, result });
                    }
                }
                Deferred::GateRelease { performance } => {
                    if self.gate.active == Some(performance) {
                        log::debug!("[coordinator] performance {} finished", performance);
                        self.gate.active = None;
                        self.gate.release_timer = None;
                    }
                }
            }
        }
    }

    /// Resolve `text` right away, bypassing the debounce. Equivalent to an
    /// input change whose quiet period has already elapsed.
    pub fn request(
        &mut self,
        text: &str,
        mode: GenerationMode,
        now: f64,
        out: &mut Vec<CoordinatorEvent>,
    ) {
        self.token += 1;
        self.cancel_debounce();
        let key = CacheKey::new(text, mode);
        if key.text.is_empty() {
            return;
        }
        let token = self.token;
        self.begin(key, token, now, out);
    }

    /// Blocking form of [`request`](Self::request): performs the service call
    /// through `primary` and returns the outcome for this request.
    pub fn resolve(
        &mut self,
        text: &str,
        mode: GenerationMode,
        now: f64,
        primary: &mut dyn Harmonizer,
    ) -> Result<Rc<GenerationResult>> {
        let key = CacheKey::new(text, mode);
        if key.text.is_empty() {
            return Err(HarmonyError::EmptyInput);
        }
        let mut out = Vec::new();
        self.request(text, mode, now, &mut out);
        let token = self.token;
        let mut i = 0;
        while i < out.len() {
            if let CoordinatorEvent::Request { ticket, request } = &out[i] {
                let (ticket, outcome) = (*ticket, primary.harmonize(request));
                self.complete(ticket, outcome, now, &mut out);
            }
            i += 1;
        }
        for ev in out {
            match ev {
                CoordinatorEvent::Resolved { token: t, result, .. } if t == token => {
                    return Ok(result)
                }
                CoordinatorEvent::Failed { token: t, error } if t == token => return Err(error),
                _ => {}
            }
        }
        Err(HarmonyError::Harmonizer(
            "request joined a call that is still in flight".into(),
        ))
    }

    fn begin(&mut self, key: CacheKey, token: u64, now: f64, out: &mut Vec<CoordinatorEvent>) {
        if let Some(result) = self.cache.get(&key) {
            log::info!("[coordinator] cache hit for {:?}", key.text);
            self.surface(token, result, true, now, out);
            return;
        }
        if let Some(flight) = self.in_flight.get_mut(&key) {
            log::info!("[coordinator] joining in-flight request {:?}", flight.ticket);
            flight.waiters.push(token);
            return;
        }
        let input = parse_phrase(&key.text, key.mode);
        if input.is_empty() {
            self.fail(token, HarmonyError::NoEvents(key.text.clone()), out);
            return;
        }
        self.status = "Generating...".to_string();
        let request = match (&input, key.mode) {
            (Phrase::Notes(notes), GenerationMode::Notes) => Some(HarmonizeRequest::from_notes(
                notes,
                self.params.temperature,
                self.params.k,
            )),
            _ => None,
        };
        match request {
            Some(request) => {
                let ticket = Ticket(self.next_ticket);
                self.next_ticket += 1;
                log::info!(
                    "[coordinator] requesting harmony for {} note(s) as {:?}",
                    request.melody.len(),
                    ticket
                );
                self.in_flight.insert(
                    key,
                    InFlight {
                        ticket,
                        input,
                        waiters: vec![token],
                    },
                );
                out.push(CoordinatorEvent::Request { ticket, request });
            }
            None => {
                // Chords mode has no remote generator; the simulator is the source
                match self.simulator.generate(&input, Provenance::Simulated) {
                    Ok(result) => {
                        let result = Rc::new(result);
                        self.cache.insert(key, result.clone());
                        self.surface(token, result, false, now, out);
                    }
                    Err(error) => self.fail(token, error, out),
                }
            }
        }
    }

    /// Report the outcome of a harmonizer call. A failed call falls back to
    /// the simulator once; if that also fails nothing is cached. Unknown
    /// tickets are ignored.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<HarmonizeResponse>,
        now: f64,
        out: &mut Vec<CoordinatorEvent>,
    ) {
        let Some(key) = self
            .in_flight
            .iter()
            .find(|(_, f)| f.ticket == ticket)
            .map(|(k, _)| k.clone())
        else {
            log::warn!("[coordinator] completion for unknown {:?}", ticket);
            return;
        };
        let Some(flight) = self.in_flight.remove(&key) else {
            return;
        };
        let resolved = match (outcome, &flight.input) {
            (Ok(response), Phrase::Notes(notes)) => {
                Ok(GenerationResult::from_response(notes, &response))
            }
            (Ok(_), Phrase::Chords(_)) => Err(HarmonyError::Harmonizer(
                "service answered a chords-mode request".into(),
            )),
            (Err(e), _) => Err(e),
        };
        let resolved = resolved.or_else(|e| {
            log::warn!("[coordinator] backend failed, falling back to simulation: {}", e);
            self.simulator.generate(&flight.input, Provenance::Fallback)
        });
        match resolved {
            Ok(result) => {
                let result = Rc::new(result);
                self.cache.insert(key, result.clone());
                for token in flight.waiters {
                    self.surface(token, result.clone(), false, now, out);
                }
            }
            Err(error) => {
                for token in flight.waiters {
                    self.fail(token, error.clone(), out);
                }
            }
        }
    }

    fn surface(
        &mut self,
        token: u64,
        result: Rc<GenerationResult>,
        from_cache: bool,
        now: f64,
        out: &mut Vec<CoordinatorEvent>,
    ) {
        if token != self.token {
            log::debug!("[coordinator] dropping result for stale token {}", token);
            return;
        }
        self.status = if from_cache {
            format!("[cached] {}", result.annotation)
        } else {
            result.annotation.clone()
        };
        self.latest = Some(result.clone());
        self.timers
            .schedule(now + self.params.autoplay_delay_sec, Deferred::Autoplay { token });
        out.push(CoordinatorEvent::Resolved {
            token,
            result,
            from_cache,
        });
    }

    fn fail(&mut self, token: u64, error: HarmonyError, out: &mut Vec<CoordinatorEvent>) {
        if token != self.token {
            return;
        }
        log::error!("[coordinator] generation failed: {}", error);
        self.failed = Some(token);
        self.status = format!("Generation failed: {}", error);
        out.push(CoordinatorEvent::Failed { token, error });
    }

    /// Forget the displayed result (the "clear" action).
    pub fn clear_result(&mut self) {
        self.token += 1;
        self.cancel_debounce();
        self.latest = None;
        self.status.clear();
    }

    // ---------------- Playback gate ----------------

    pub fn is_performing(&self) -> bool {
        self.gate.active.is_some()
    }

    /// Claim the gate for a performance lasting `nominal_sec`. Returns the
    /// performance token, or `None` while another performance holds it.
    pub fn try_begin_performance(&mut self, now: f64, nominal_sec: f64) -> Option<u64> {
        if let Some(active) = self.gate.active {
            log::info!("[coordinator] performance {} in progress; skipping", active);
            return None;
        }
        self.gate.counter += 1;
        let performance = self.gate.counter;
        self.gate.active = Some(performance);
        self.gate.release_timer = Some(self.timers.schedule(
            now + nominal_sec.max(0.0),
            Deferred::GateRelease { performance },
        ));
        Some(performance)
    }

    /// Release the gate immediately (explicit stop).
    pub fn end_performance(&mut self) {
        if let Some(id) = self.gate.release_timer.take() {
            self.timers.cancel(id);
        }
        self.gate.active = None;
    }

    pub fn reset_play_lock(&mut self) {
        self.end_performance();
        log::info!("[coordinator] play lock reset");
    }
}
