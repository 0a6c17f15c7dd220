// Text encoding, pitch lookups and the hold-time quantizer.

use harmony_core::pitch::{chord_to_pitches, midi_to_name, note_to_midi};
use harmony_core::*;

#[test]
fn notes_text_parses_to_pitch_unit_pairs() {
    let notes = parse_notes("C4:2 D4:8 E4:4");
    assert_eq!(melody_pairs(&notes), vec![[60, 2], [62, 8], [64, 4]]);
    assert_eq!(
        notes.iter().map(|n| n.source_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn missing_zero_or_bad_duration_defaults_to_four() {
    let notes = parse_notes("C4 D4/2 E4:0 F4:x G4:3");
    assert_eq!(
        melody_pairs(&notes),
        vec![[60, 4], [62, 2], [64, 4], [65, 4], [67, 3]]
    );
}

#[test]
fn unparseable_tokens_are_skipped_not_fatal() {
    let notes = parse_notes("C4:2 H4:3 hello E4:1");
    assert_eq!(melody_pairs(&notes), vec![[60, 2], [64, 1]]);
    assert!(parse_notes("   ").is_empty());
}

#[test]
fn chord_brackets_flatten_into_notes() {
    let notes = parse_notes("C4:2 [E4 G4]");
    assert_eq!(melody_pairs(&notes), vec![[60, 2], [64, 4], [67, 4]]);
}

#[test]
fn format_notes_is_the_display_form() {
    let notes = parse_notes("C#4:2 Bb3");
    assert_eq!(format_notes(&notes), "C#4:2 A#3:4");
}

#[test]
fn pitch_names_round_the_octave_boundaries() {
    assert_eq!(note_to_midi("C4"), Some(60));
    assert_eq!(note_to_midi("A4"), Some(69));
    assert_eq!(note_to_midi("C-1"), Some(0));
    assert_eq!(note_to_midi("G9"), Some(127));
    assert_eq!(note_to_midi("G#9"), None);
    assert_eq!(note_to_midi("X4"), None);
    assert_eq!(note_to_midi("C"), None);
    assert_eq!(midi_to_name(61), "C#4");
    assert_eq!(midi_to_name(0), "C-1");
}

#[test]
fn chord_names_resolve_to_voiced_pitch_sets() {
    assert_eq!(chord_to_pitches("Cmaj7").as_slice(), &[60, 64, 67, 71]);
    assert_eq!(chord_to_pitches("Am").as_slice(), &[69, 72, 76]);
    assert_eq!(chord_to_pitches("G7").as_slice(), &[67, 71, 74, 77]);
    assert_eq!(chord_to_pitches("Bbdim7").as_slice(), &[70, 73, 76, 79]);
    // Unparseable root falls back to C major
    assert_eq!(chord_to_pitches("??").as_slice(), &[60, 64, 67]);
}

#[test]
fn chords_text_accepts_commas_and_unit_suffixes() {
    let chords = parse_chords("Cmaj7, Dm7:8 G7");
    let labels: Vec<&str> = chords.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Cmaj7", "Dm7", "G7"]);
    assert_eq!(
        chords.iter().map(|c| c.duration_units).collect::<Vec<_>>(),
        vec![16, 8, 16]
    );
}

#[test]
fn phrase_reports_units_and_text() {
    let phrase = parse_phrase("C4:2 D4:8 E4:4", GenerationMode::Notes);
    assert_eq!(phrase.len(), 3);
    assert_eq!(phrase.total_units(), 14);
    assert_eq!(phrase.pitches_at(1).as_slice(), &[62]);
    assert!(phrase.pitches_at(9).is_empty());
    assert_eq!(phrase.to_text(), "C4:2 D4:8 E4:4");
}

#[test]
fn quantizer_never_drops_below_one_unit() {
    for ms in [0.0, 1.0, 30.0, 62.0, -50.0, f64::NAN] {
        assert_eq!(quantize_hold(ms, 0.125), 1, "hold {ms}ms");
    }
}

#[test]
fn quantizer_is_non_decreasing() {
    let mut prev = 0;
    for ms in (0..5000).step_by(7) {
        let units = quantize_hold(ms as f64, 0.125);
        assert!(units >= 1);
        assert!(units >= prev, "decreased at {ms}ms");
        prev = units;
    }
}

#[test]
fn quantizer_rounds_to_the_nearest_unit() {
    assert_eq!(quantize_hold(620.0, 0.125), 5);
    assert_eq!(quantize_hold_default(500.0), 4);
    assert_eq!(quantize_hold(1000.0, 0.25), 4);
    assert!((units_to_sec(14, 0.125) - 1.75).abs() < 1e-12);
}

#[test]
fn wire_request_serializes_like_the_service_expects() {
    let notes = parse_notes("C4:2 D4:8");
    let request = HarmonizeRequest::from_notes(&notes, 1.0, 20);
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["melody"], serde_json::json!([[60, 2], [62, 8]]));
    assert_eq!(json["mode"], "notes");
    assert_eq!(json["k"], 20);

    let response: HarmonizeResponse = serde_json::from_str(r#"{"output":["C","G7"]}"#).unwrap();
    assert!(response.input.is_empty());
    assert_eq!(response.output, vec!["C", "G7"]);
}
