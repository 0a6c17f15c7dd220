// Generation coordinator: debounce, single-flight, cache, fallback and gate.

use harmony_core::*;
use std::rc::Rc;

/// Service fake that answers with a fixed progression and counts calls.
#[derive(Default)]
struct Counting {
    calls: usize,
}

impl Harmonizer for Counting {
    fn harmonize(&mut self, _request: &HarmonizeRequest) -> Result<HarmonizeResponse> {
        self.calls += 1;
        Ok(HarmonizeResponse {
            input: Vec::new(),
            output: vec!["C".into(), "G7".into()],
            description: "test progression".into(),
        })
    }
}

fn requests(events: &[CoordinatorEvent]) -> Vec<(Ticket, HarmonizeRequest)> {
    events
        .iter()
        .filter_map(|e| match e {
            CoordinatorEvent::Request { ticket, request } => Some((*ticket, request.clone())),
            _ => None,
        })
        .collect()
}

fn resolved(events: &[CoordinatorEvent]) -> Vec<Rc<GenerationResult>> {
    events
        .iter()
        .filter_map(|e| match e {
            CoordinatorEvent::Resolved { result, .. } => Some(result.clone()),
            _ => None,
        })
        .collect()
}

fn ok_response() -> Result<HarmonizeResponse> {
    Counting::default().harmonize(&HarmonizeRequest::from_notes(&[], 1.0, 20))
}

#[test]
fn identical_requests_in_flight_share_one_call() {
    let mut coord = GenerationCoordinator::default();
    let mut out = Vec::new();
    coord.request("C4:2 D4:8", GenerationMode::Notes, 0.0, &mut out);
    coord.request("  C4:2 D4:8 ", GenerationMode::Notes, 0.01, &mut out);
    let issued = requests(&out);
    assert_eq!(issued.len(), 1);
    assert_eq!(coord.in_flight_len(), 1);

    out.clear();
    coord.complete(issued[0].0, ok_response(), 0.2, &mut out);
    let results = resolved(&out);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].provenance, Provenance::Backend);
    assert_eq!(coord.in_flight_len(), 0);
    assert_eq!(coord.cache_len(), 1);
}

#[test]
fn second_resolve_is_served_from_cache_without_a_call() {
    let mut coord = GenerationCoordinator::default();
    let mut service = Counting::default();
    let first = coord
        .resolve("C4:2 D4:8 E4:4", GenerationMode::Notes, 0.0, &mut service)
        .unwrap();
    let second = coord
        .resolve("C4:2 D4:8 E4:4", GenerationMode::Notes, 1.0, &mut service)
        .unwrap();
    assert_eq!(service.calls, 1);
    assert!(Rc::ptr_eq(&first, &second));
    assert!(coord.status().starts_with("[cached]"));
}

#[test]
fn mode_is_part_of_the_cache_key() {
    let mut coord = GenerationCoordinator::default();
    let mut service = Counting::default();
    coord
        .resolve("C4", GenerationMode::Notes, 0.0, &mut service)
        .unwrap();
    coord
        .resolve("C4", GenerationMode::Chords, 0.0, &mut service)
        .unwrap();
    assert_eq!(coord.cache_len(), 2);
}

#[test]
fn debounce_collapses_bursts_and_cancels_superseded_timer() {
    let mut coord = GenerationCoordinator::default();
    let mut out = Vec::new();
    coord.input_changed("C4", GenerationMode::Notes, 0.0);
    coord.input_changed("C4 D4", GenerationMode::Notes, 0.1);
    coord.poll(0.35, &mut out);
    assert!(out.is_empty(), "first timer should have been cancelled");
    coord.poll(0.45, &mut out);
    let issued = requests(&out);
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].1.melody, vec![[60, 4], [62, 4]]);
}

#[test]
fn whitespace_input_never_issues_a_request() {
    let mut coord = GenerationCoordinator::default();
    let mut out = Vec::new();
    coord.input_changed(" \t ", GenerationMode::Notes, 0.0);
    assert!(!coord.has_pending_debounce());
    coord.poll(10.0, &mut out);
    assert!(out.is_empty());
    let mut service = Counting::default();
    assert_eq!(
        coord.resolve("   ", GenerationMode::Notes, 0.0, &mut service),
        Err(HarmonyError::EmptyInput)
    );
    assert_eq!(service.calls, 0);
}

#[test]
fn unreachable_service_falls_back_to_simulation_once() {
    let mut coord = GenerationCoordinator::default();
    let result = coord
        .resolve("C4:2 D4:8 E4:4", GenerationMode::Notes, 0.0, &mut Offline)
        .unwrap();
    assert_eq!(result.provenance, Provenance::Fallback);
    assert!(result
        .annotation
        .starts_with("Using simulated data (backend unavailable)"));
    // One chord per two melody notes
    assert_eq!(result.output.len(), 2);
    assert_eq!(coord.cache_len(), 1);
}

#[test]
fn unplayable_text_is_surfaced_and_not_cached() {
    let mut coord = GenerationCoordinator::default();
    let mut service = Counting::default();
    let err = coord
        .resolve("hello there", GenerationMode::Notes, 0.0, &mut service)
        .unwrap_err();
    assert!(matches!(err, HarmonyError::NoEvents(_)));
    assert_eq!(service.calls, 0);
    assert_eq!(coord.cache_len(), 0);
    assert!(coord.status().starts_with("Generation failed"));
}

#[test]
fn chords_mode_uses_the_simulator_directly() {
    let mut coord = GenerationCoordinator::default();
    let mut service = Counting::default();
    let result = coord
        .resolve("Cmaj7 G7", GenerationMode::Chords, 0.0, &mut service)
        .unwrap();
    assert_eq!(service.calls, 0);
    assert_eq!(result.provenance, Provenance::Simulated);
    assert!(matches!(result.output, Phrase::Notes(ref n) if (4..=8).contains(&n.len())));
}

#[test]
fn cache_evicts_oldest_first() {
    let mut coord = GenerationCoordinator::new(CoordinatorParams {
        cache_capacity: 2,
        ..CoordinatorParams::default()
    });
    let mut service = Counting::default();
    for text in ["C4", "D4", "E4"] {
        coord
            .resolve(text, GenerationMode::Notes, 0.0, &mut service)
            .unwrap();
    }
    assert_eq!(coord.cache_len(), 2);
    assert_eq!(service.calls, 3);
    coord
        .resolve("E4", GenerationMode::Notes, 0.0, &mut service)
        .unwrap();
    assert_eq!(service.calls, 3);
    coord
        .resolve("C4", GenerationMode::Notes, 0.0, &mut service)
        .unwrap();
    assert_eq!(service.calls, 4);

    coord.clear_cache();
    assert_eq!(coord.cache_len(), 0);
}

#[test]
fn stale_completion_is_cached_but_not_surfaced() {
    let mut coord = GenerationCoordinator::default();
    let mut out = Vec::new();
    coord.request("C4:2", GenerationMode::Notes, 0.0, &mut out);
    let (ticket, _) = requests(&out)[0].clone();
    coord.input_changed("D4:2", GenerationMode::Notes, 0.1);

    out.clear();
    coord.complete(ticket, ok_response(), 0.2, &mut out);
    assert!(out.is_empty());
    assert!(coord.latest().is_none());
    assert_eq!(coord.cache_len(), 1);

    // Unknown tickets are ignored
    coord.complete(ticket, ok_response(), 0.3, &mut out);
    assert!(out.is_empty());
}

#[test]
fn autoplay_fires_after_delay_for_current_token_only() {
    let mut coord = GenerationCoordinator::default();
    let mut service = Counting::default();
    coord
        .resolve("C4:2", GenerationMode::Notes, 0.0, &mut service)
        .unwrap();
    let mut out = Vec::new();
    coord.poll(0.05, &mut out);
    assert!(out.is_empty());
    coord.poll(0.11, &mut out);
    assert!(matches!(out.as_slice(), [CoordinatorEvent::Autoplay { .. }]));

    // A newer edit cancels a pending autoplay
    coord
        .resolve("D4:2", GenerationMode::Notes, 1.0, &mut service)
        .unwrap();
    coord.input_changed("E4:2", GenerationMode::Notes, 1.01);
    out.clear();
    coord.poll(1.2, &mut out);
    assert!(out.is_empty());
}

#[test]
fn playback_gate_admits_one_performance_at_a_time() {
    let mut coord = GenerationCoordinator::default();
    let first = coord.try_begin_performance(0.0, 2.0);
    assert!(first.is_some());
    assert!(coord.is_performing());
    assert_eq!(coord.try_begin_performance(0.5, 2.0), None);

    let mut out = Vec::new();
    coord.poll(2.01, &mut out);
    assert!(!coord.is_performing());

    let second = coord.try_begin_performance(3.0, 5.0);
    assert!(second.is_some() && second != first);
    coord.end_performance();
    assert!(!coord.is_performing());

    coord.try_begin_performance(4.0, 5.0);
    coord.reset_play_lock();
    assert!(!coord.is_performing());
}

#[test]
fn simulator_is_reproducible_for_a_seed() {
    let input = parse_phrase("C4:2 E4:2 G4:2 A4:2 D4:2", GenerationMode::Notes);
    let mut sim = SimulatedHarmonizer::new(7);
    let a = sim.generate(&input, Provenance::Simulated).unwrap();
    sim.reseed(Some(7));
    let b = sim.generate(&input, Provenance::Simulated).unwrap();
    assert_eq!(a, b);
    // Five notes pair up into three chords of one bar each
    assert_eq!(a.output.units(), vec![16, 16, 16]);
    assert!(a.annotation.starts_with(Provenance::Simulated.label()));

    let empty = parse_phrase("", GenerationMode::Chords);
    assert!(matches!(
        sim.generate(&empty, Provenance::Simulated),
        Err(HarmonyError::NoEvents(_))
    ));
}

#[test]
fn preload_fills_the_cache_without_surfacing_anything() {
    let mut coord = GenerationCoordinator::default();
    let common = ["C4 E4 G4", "D4 F#4 A4", "G4 B4 D5"];
    assert_eq!(coord.preload(&common, GenerationMode::Notes), 3);
    assert_eq!(coord.cache_len(), 3);
    assert!(coord.latest().is_none());
    assert!(coord.status().is_empty());
    assert!(coord.next_deadline().is_none());

    // Already cached or unplayable texts are skipped
    assert_eq!(coord.preload(&["C4 E4 G4", "hello"], GenerationMode::Notes), 0);

    let mut service = Counting::default();
    let result = coord
        .resolve(" C4 E4 G4 ", GenerationMode::Notes, 0.0, &mut service)
        .unwrap();
    assert_eq!(service.calls, 0);
    assert_eq!(result.provenance, Provenance::Simulated);
    assert!(coord.status().starts_with("[cached]"));
}

#[test]
fn cancel_autoplay_keeps_the_pending_debounce() {
    let mut coord = GenerationCoordinator::default();
    let mut service = Counting::default();
    coord
        .resolve("C4:2", GenerationMode::Notes, 0.0, &mut service)
        .unwrap();
    coord.cancel_autoplay();
    let mut out = Vec::new();
    coord.poll(0.5, &mut out);
    assert!(out.is_empty());

    coord.input_changed("D4:2", GenerationMode::Notes, 1.0);
    let token = coord.token();
    coord.cancel_autoplay();
    assert!(coord.has_pending_debounce());
    assert_eq!(coord.token(), token);
    coord.poll(1.3, &mut out);
    assert_eq!(requests(&out).len(), 1);
}

#[test]
fn pending_input_supersedes_without_scheduling() {
    let mut coord = GenerationCoordinator::default();
    let mut out = Vec::new();
    coord.input_changed("C4", GenerationMode::Notes, 0.0);
    let token = coord.token();
    coord.input_pending();
    assert!(coord.token() > token);
    assert!(!coord.has_pending_debounce());
    coord.poll(5.0, &mut out);
    assert!(out.is_empty());
}

#[test]
fn failure_is_tracked_for_the_current_token_only() {
    let mut coord = GenerationCoordinator::default();
    let mut service = Counting::default();
    assert!(coord
        .resolve("nonsense", GenerationMode::Notes, 0.0, &mut service)
        .is_err());
    assert!(coord.has_failed());
    coord.input_changed("C4", GenerationMode::Notes, 0.1);
    assert!(!coord.has_failed());
    coord
        .resolve("C4", GenerationMode::Notes, 0.2, &mut service)
        .unwrap();
    assert!(!coord.has_failed());
}
