//! Particle waterfall beside a vertical keyboard.
//!
//! Keys are stacked along y with the keyboard on the left; particles start
//! at a key's right edge and scroll towards +x. A held note grows its
//! particle; a released one travels and fades out.

use crate::constants::{
    BLACK_KEY_HEIGHT, BLACK_KEY_WIDTH, DEFAULT_CANVAS_WIDTH, KEYBOARD_WIDTH,
    PALETTE, PARTICLE_THICKNESS, SCROLL_PER_FRAME, WATERFALL_LOWEST_C, WATERFALL_OCTAVES,
    WHITE_KEY_HEIGHT,
};
use fnv::FnvHashMap;
use glam::Vec2;

/// Hex colour for a palette name; unknown names pass through unchanged.
pub fn palette_hex(name: &str) -> &str {
    PALETTE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, hex)| *hex)
        .unwrap_or(name)
}

#[inline]
pub fn is_black(midi: u8) -> bool {
    matches!(midi % 12, 1 | 3 | 6 | 8 | 10)
}

/// Screen rectangle of one key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyRect {
    pub midi: u8,
    pub black: bool,
    /// Top-left corner.
    pub origin: Vec2,
    pub size: Vec2,
}

impl KeyRect {
    pub fn idle_color(&self) -> &'static str {
        if self.black {
            "black"
        } else {
            "white"
        }
    }
}

/// Geometry of the drawn key range.
#[derive(Clone, Debug)]
pub struct KeyLayout {
    keys: Vec<KeyRect>,
    lowest: u8,
}

impl KeyLayout {
    /// `octaves` octaves starting at C of `lowest_c` (C4 = MIDI 60).
    pub fn vertical(octaves: u8, lowest_c: u8) -> Self {
        let lowest = (lowest_c as u16 + 1).saturating_mul(12).min(127) as u8;
        let highest = (lowest as u16 + octaves as u16 * 12).min(128);
        let mut keys = Vec::new();
        let mut whites_so_far = 0.0f32;
        for midi in lowest as u16..highest {
            let midi = midi as u8;
            if is_black(midi) {
                // Centred on the boundary below the previous white key
                keys.push(KeyRect {
                    midi,
                    black: true,
                    origin: Vec2::new(0.0, whites_so_far * WHITE_KEY_HEIGHT - BLACK_KEY_HEIGHT / 2.0),
                    size: Vec2::new(BLACK_KEY_WIDTH, BLACK_KEY_HEIGHT),
                });
            } else {
                keys.push(KeyRect {
                    midi,
                    black: false,
                    origin: Vec2::new(0.0, whites_so_far * WHITE_KEY_HEIGHT),
                    size: Vec2::new(KEYBOARD_WIDTH, WHITE_KEY_HEIGHT),
                });
                whites_so_far += 1.0;
            }
        }
        Self { keys, lowest }
    }

    pub fn key(&self, midi: u8) -> Option<&KeyRect> {
        let i = midi.checked_sub(self.lowest)? as usize;
        self.keys.get(i)
    }

    pub fn keys(&self) -> &[KeyRect] {
        &self.keys
    }

    /// Total height of the white keys.
    pub fn height(&self) -> f32 {
        self.keys.iter().filter(|k| !k.black).count() as f32 * WHITE_KEY_HEIGHT
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::vertical(WATERFALL_OCTAVES, WATERFALL_LOWEST_C)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleState {
    /// Held and extending every frame.
    Growing,
    /// Held, but already spanning the whole visible track.
    Sustained,
    /// Released; travelling and fading.
    Releasing,
    /// Gone. Dropped from the render set on the next tick.
    Expired,
}

/// One note's visual.
///
/// Fields:
/// - `head`: leading edge on x, centre on y
/// - `extent`: length behind the head along the scroll axis
/// - `thickness`: size across the scroll axis
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub pitch: u8,
    pub color: &'static str,
    pub state: ParticleState,
    pub head: Vec2,
    pub extent: f32,
    pub thickness: f32,
    pub alpha: f32,
}

impl Particle {
    pub fn is_held(&self) -> bool {
        matches!(self.state, ParticleState::Growing | ParticleState::Sustained)
    }
}

/// Tunables for the waterfall.
#[derive(Clone, Debug)]
pub struct WaterfallParams {
    pub width: f32,
    pub speed: f32,
}

impl Default for WaterfallParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            speed: SCROLL_PER_FRAME,
        }
    }
}

pub struct Waterfall {
    pub params: WaterfallParams,
    layout: KeyLayout,
    particles: Vec<Particle>,
    lit: FnvHashMap<u8, &'static str>,
    running: bool,
}

impl Default for Waterfall {
    fn default() -> Self {
        Self::new(KeyLayout::default(), WaterfallParams::default())
    }
}

impl Waterfall {
    pub fn new(layout: KeyLayout, params: WaterfallParams) -> Self {
        Self {
            params,
            layout,
            particles: Vec::new(),
            lit: FnvHashMap::default(),
            running: false,
        }
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current fill of a key: its lit colour, or idle white/black.
    pub fn key_color(&self, midi: u8) -> Option<&'static str> {
        let key = self.layout.key(midi)?;
        Some(self.lit.get(&midi).copied().unwrap_or_else(|| key.idle_color()))
    }

    pub fn lit_keys(&self) -> usize {
        self.lit.len()
    }

    pub fn start(&mut self) {
        if !self.running {
            log::debug!("[waterfall] animation started");
            self.running = true;
        }
    }

    /// Stop animating, drop every particle and return all keys to idle.
    pub fn stop(&mut self) {
        self.running = false;
        self.clear();
    }

    pub fn clear(&mut self) {
        if !self.particles.is_empty() {
            log::debug!("[waterfall] cleared {} particle(s)", self.particles.len());
        }
        self.particles.clear();
        self.lit.clear();
    }

    /// Light `pitch` and spawn a particle. Pitches outside the drawn range are
    /// ignored.
    pub fn note_on(&mut self, pitch: u8, color: &'static str) -> bool {
        let Some(key) = self.layout.key(pitch).copied() else {
            log::debug!("[waterfall] pitch {} outside keyboard; ignored", pitch);
            return false;
        };
        self.lit.insert(pitch, color);
        self.particles.push(Particle {
            pitch,
            color,
            state: ParticleState::Growing,
            head: Vec2::new(key.origin.x + key.size.x, key.origin.y + key.size.y / 2.0),
            extent: 0.0,
            thickness: key.size.y * PARTICLE_THICKNESS,
            alpha: 1.0,
        });
        true
    }

    /// Release every held particle of `pitch` and unlight its key.
    pub fn note_off(&mut self, pitch: u8) {
        self.lit.remove(&pitch);
        for p in self.particles.iter_mut().filter(|p| p.pitch == pitch && p.is_held()) {
            p.state = ParticleState::Releasing;
        }
    }

    /// Advance one animation frame.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        self.particles.retain(|p| p.state != ParticleState::Expired);

        let width = self.params.width;
        let speed = self.params.speed;
        let track = (width - KEYBOARD_WIDTH).max(1.0);
        for p in &mut self.particles {
            match p.state {
                ParticleState::Growing => {
                    p.extent += speed;
                    if p.extent >= track {
                        p.extent = track;
                        p.state = ParticleState::Sustained;
                    }
                }
                ParticleState::Sustained => {}
                ParticleState::Releasing => {
                    p.head.x += speed;
                    p.alpha = (1.0 - (p.head.x - KEYBOARD_WIDTH) / track).clamp(0.0, 1.0);
                    // The trailing edge, not the head, has to leave the canvas
                    if p.alpha <= 0.0 && p.head.x - p.extent >= width {
                        p.state = ParticleState::Expired;
                    }
                }
                ParticleState::Expired => {}
            }
        }
    }
}
