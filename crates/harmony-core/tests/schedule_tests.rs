// Timeline scheduling of melody/harmony pairs.

use harmony_core::*;

const EPS: f64 = 1e-9;

fn notes_result(melody: &str, chords: &[&str]) -> GenerationResult {
    let input = parse_phrase(melody, GenerationMode::Notes);
    let output = Phrase::Chords(chords.iter().map(|c| ChordEvent::from_name(c, 16)).collect());
    GenerationResult::new(GenerationMode::Notes, input, output, "test", Provenance::Backend)
}

fn assert_contiguous(events: &[ScheduledEvent], t0: f64) {
    let mut cursor = t0;
    for e in events {
        assert!((e.start - cursor).abs() < EPS, "gap/overlap at {}", e.index);
        assert!(e.duration > 0.0);
        cursor = e.end();
    }
}

#[test]
fn fourteen_unit_melody_spreads_two_chords_evenly() {
    let result = notes_result("C4:2 D4:8 E4:4", &["C", "G7"]);
    let t0 = 10.0;
    let plan = schedule(&result, t0, Direction::MelodyToHarmony, 0.125);
    assert!((plan.total_sec - 1.75).abs() < EPS);
    assert_eq!(plan.harmony.len(), 2);
    assert!((plan.harmony[0].start - t0).abs() < EPS);
    assert!((plan.harmony[1].start - (t0 + 0.875)).abs() < EPS);
    for h in &plan.harmony {
        assert!((h.duration - 0.875).abs() < EPS);
    }
    let melody_starts: Vec<f64> = plan.melody.iter().map(|e| e.start - t0).collect();
    assert!((melody_starts[1] - 0.25).abs() < EPS);
    assert!((melody_starts[2] - 1.25).abs() < EPS);
}

#[test]
fn both_tracks_end_together() {
    for (melody, chords) in [
        ("C4:1 D4:3 E4:5 F4:7", vec!["C", "F", "G"]),
        ("C4:16", vec!["C", "Am", "F", "G", "C", "E7", "Am"]),
        ("C4:3 D4:3 E4:3", vec!["Dm7"]),
    ] {
        let result = notes_result(melody, &chords);
        let plan = schedule(&result, 2.0, Direction::MelodyToHarmony, 0.125);
        let m_end = plan.melody.last().unwrap().end();
        let h_end = plan.harmony.last().unwrap().end();
        assert!((m_end - h_end).abs() < EPS, "{melody}: {m_end} vs {h_end}");
        assert!((m_end - plan.end()).abs() < EPS);
    }
}

#[test]
fn tracks_have_no_gaps_or_overlap() {
    let result = notes_result("C4:1 D4:2 E4:3 F4:4 G4:5", &["C", "Dm", "G7"]);
    let plan = schedule(&result, 0.5, Direction::MelodyToHarmony, 0.125);
    assert_contiguous(&plan.melody, 0.5);
    assert_contiguous(&plan.harmony, 0.5);
}

#[test]
fn empty_other_track_schedules_driving_track_alone() {
    let result = notes_result("C4:2 D4:2", &[]);
    let plan = schedule(&result, 0.0, Direction::MelodyToHarmony, 0.125);
    assert_eq!(plan.melody.len(), 2);
    assert!(plan.harmony.is_empty());
    assert!((plan.end() - 0.5).abs() < EPS);
}

#[test]
fn chords_drive_in_chords_mode() {
    let input = parse_phrase("Cmaj7 G7:8", GenerationMode::Chords);
    let output = parse_phrase("C4 E4 G4 B4 D4 F4", GenerationMode::Notes);
    let result = GenerationResult::new(
        GenerationMode::Chords,
        input,
        output,
        "test",
        Provenance::Simulated,
    );
    let plan = schedule_result(&result, 0.0, 0.125);
    assert_eq!(plan.direction, Direction::HarmonyToMelody);
    // 16 + 8 units
    assert!((plan.total_sec - 3.0).abs() < EPS);
    assert!((plan.harmony[1].start - 2.0).abs() < EPS);
    assert_eq!(plan.harmony[0].pitches.as_slice(), &[60, 64, 67, 71]);
    assert_eq!(plan.melody.len(), 6);
    for m in &plan.melody {
        assert!((m.duration - 0.5).abs() < EPS);
    }
    assert_contiguous(&plan.melody, 0.0);
}

#[test]
fn merged_events_are_time_ordered() {
    let result = notes_result("C4:4 D4:4 E4:4 F4:4", &["C", "G"]);
    let plan = schedule(&result, 0.0, Direction::MelodyToHarmony, 0.125);
    let events = plan.events();
    assert_eq!(events.len(), 6);
    for pair in events.windows(2) {
        assert!(pair[0].start <= pair[1].start);
    }
}

#[test]
fn huge_durations_do_not_overflow_the_total() {
    let result = notes_result("C4:4294967295 D4:1", &["C"]);
    assert_eq!(result.input.total_units(), 4_294_967_296);
    let plan = schedule(&result, 0.0, Direction::MelodyToHarmony, 0.125);
    assert!((plan.total_sec - 4_294_967_296.0 * 0.125).abs() < 1e-3);
    let h_end = plan.harmony.last().unwrap().end();
    assert!((h_end - plan.end()).abs() < 1e-3);
    assert!((plan.melody[1].end() - plan.end()).abs() < 1e-3);
}
