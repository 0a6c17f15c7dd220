// Waterfall particle lifecycle and key geometry.

use harmony_core::*;

fn running() -> Waterfall {
    let mut w = Waterfall::default();
    w.start();
    w
}

#[test]
fn layout_covers_three_octaves_from_c4() {
    let layout = KeyLayout::default();
    assert_eq!(layout.keys().len(), 36);
    assert!(layout.key(59).is_none());
    assert!(layout.key(96).is_none());
    let c4 = layout.key(60).unwrap();
    assert!(!c4.black);
    assert_eq!(c4.origin, glam::Vec2::new(0.0, 0.0));
    let cs4 = layout.key(61).unwrap();
    assert!(cs4.black);
    // Centred on the C/D boundary
    assert_eq!(cs4.origin.y + cs4.size.y / 2.0, 30.0);
    assert_eq!(layout.height(), 21.0 * 30.0);
}

#[test]
fn held_note_grows_then_sustains() {
    let mut w = running();
    assert!(w.note_on(60, "red"));
    let p = &w.particles()[0];
    assert_eq!(p.state, ParticleState::Growing);
    assert_eq!(p.head, glam::Vec2::new(120.0, 15.0));
    assert!((p.thickness - 21.0).abs() < 1e-4);

    for _ in 0..3 {
        w.tick();
    }
    assert_eq!(w.particles()[0].extent, 6.0);

    for _ in 0..400 {
        w.tick();
    }
    let p = &w.particles()[0];
    assert_eq!(p.state, ParticleState::Sustained);
    assert_eq!(p.extent, 680.0);
    assert_eq!(p.head.x, 120.0);
}

#[test]
fn released_note_travels_and_fades() {
    let mut w = running();
    w.note_on(64, "blue");
    w.tick();
    w.note_off(64);
    assert_eq!(w.particles()[0].state, ParticleState::Releasing);
    w.tick();
    let p = &w.particles()[0];
    assert_eq!(p.head.x, 122.0);
    assert!(p.alpha < 1.0 && p.alpha > 0.99);
    assert_eq!(p.extent, 2.0);
}

#[test]
fn expired_particle_is_dropped_and_never_revived() {
    let mut w = running();
    w.note_on(60, "red");
    w.note_off(60);
    let mut frames = 0;
    while w.particles()[0].state != ParticleState::Expired {
        w.tick();
        frames += 1;
        assert!(frames < 1000, "particle never expired");
    }
    assert_eq!(w.particles()[0].alpha, 0.0);
    assert!(w.particles()[0].head.x >= 800.0);

    // A fresh note-on allocates a new particle; the expired one stays expired
    w.note_on(60, "green");
    assert_eq!(w.particles().len(), 2);
    assert_eq!(w.particles()[0].state, ParticleState::Expired);
    w.note_off(60);
    assert_eq!(w.particles()[0].state, ParticleState::Expired);
    w.tick();
    assert_eq!(w.particles().len(), 1);
    assert_eq!(w.particles()[0].color, "green");
}

#[test]
fn sustained_particle_expires_only_once_its_tail_leaves_the_canvas() {
    let mut w = running();
    w.note_on(62, "blue");
    while w.particles()[0].state != ParticleState::Sustained {
        w.tick();
    }
    assert_eq!(w.particles()[0].extent, 680.0);
    w.note_off(62);

    // Fully faded once the head reaches the right edge, but the tail is still on screen
    while w.particles()[0].head.x < 800.0 {
        w.tick();
    }
    assert_eq!(w.particles()[0].alpha, 0.0);
    assert_eq!(w.particles()[0].state, ParticleState::Releasing);

    let mut frames = 0;
    while w.particles()[0].state != ParticleState::Expired {
        w.tick();
        frames += 1;
        assert!(frames < 1000, "particle never expired");
    }
    let p = &w.particles()[0];
    assert!(p.head.x - p.extent >= 800.0);
    assert_eq!(frames, 340);
}

#[test]
fn note_off_releases_every_held_particle_of_the_pitch() {
    let mut w = running();
    w.note_on(67, "red");
    w.note_on(67, "blue");
    w.note_on(69, "red");
    w.note_off(67);
    let states: Vec<ParticleState> = w.particles().iter().map(|p| p.state).collect();
    assert_eq!(
        states,
        vec![
            ParticleState::Releasing,
            ParticleState::Releasing,
            ParticleState::Growing
        ]
    );
}

#[test]
fn out_of_range_pitches_are_ignored() {
    let mut w = running();
    assert!(!w.note_on(20, "red"));
    assert!(!w.note_on(100, "red"));
    assert!(w.particles().is_empty());
    assert_eq!(w.key_color(20), None);
}

#[test]
fn keys_light_and_return_to_idle() {
    let mut w = running();
    w.note_on(60, "red");
    w.note_on(61, "cyan");
    assert_eq!(w.key_color(60), Some("red"));
    assert_eq!(w.lit_keys(), 2);
    w.note_off(60);
    assert_eq!(w.key_color(60), Some("white"));
    assert_eq!(w.key_color(61), Some("cyan"));
    w.stop();
    assert_eq!(w.key_color(61), Some("black"));
    assert!(w.particles().is_empty());
    assert!(!w.is_running());
}

#[test]
fn tick_is_inert_until_started() {
    let mut w = Waterfall::default();
    w.note_on(60, "red");
    w.tick();
    assert_eq!(w.particles()[0].extent, 0.0);
}

#[test]
fn palette_names_map_to_hex() {
    assert_eq!(palette_hex("red"), "#EE2B29");
    assert_eq!(palette_hex("blue"), "#2979ff");
    assert_eq!(palette_hex("#123456"), "#123456");
}
