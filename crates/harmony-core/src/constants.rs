// Shared timing/visual tuning constants used by the core and the native host.

// Timing grid
pub const BASE_UNIT_SEC: f64 = 0.125; // one sixteenth note at 120 BPM
pub const DEFAULT_NOTE_UNITS: u32 = 4; // quarter note when a token has no duration
pub const DEFAULT_CHORD_UNITS: u32 = 16; // one bar per chord in chords mode

// Generation coordination (seconds)
pub const DEBOUNCE_SEC: f64 = 0.3; // quiet period before an edit is resolved
pub const AUTOPLAY_DELAY_SEC: f64 = 0.1; // gap between a resolve and its performance
pub const CAPTURE_WINDOW_SEC: f64 = 0.8; // MIDI/pointer notes collected before writing text
pub const CACHE_CAPACITY: usize = 50; // oldest-first eviction beyond this
pub const KEYBOARD_AUTOGEN_DELAY_SEC: f64 = 1.0; // quiet keyboard period before an edit is raised
pub const PRELOAD_INPUTS: [&str; 3] = ["C4 E4 G4", "D4 F#4 A4", "G4 B4 D5"];

// Harmonizer request defaults
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_TOP_K: u32 = 20;

// Playback
pub const LEAD_IN_SEC: f64 = 0.5; // plan starts this long after "now"
pub const MELODY_ARTICULATION: f64 = 0.8; // fraction of a slot a melody note sounds
pub const HARMONY_ARTICULATION: f64 = 0.9;
pub const MELODY_VELOCITY: f32 = 0.7;
pub const HARMONY_VELOCITY: f32 = 0.5;

// Keyboard input
pub const DEFAULT_OCTAVE: i32 = 4;
pub const MIN_OCTAVE: i32 = 1;
pub const MAX_OCTAVE: i32 = 7;

// Waterfall geometry (vertical keyboard, particles scroll towards +x)
pub const WATERFALL_OCTAVES: u8 = 3;
pub const WATERFALL_LOWEST_C: u8 = 4; // C4 is the first drawn key
pub const WHITE_KEY_HEIGHT: f32 = 30.0;
pub const BLACK_KEY_HEIGHT: f32 = 20.0;
pub const KEYBOARD_WIDTH: f32 = 120.0;
pub const BLACK_KEY_WIDTH: f32 = 80.0;
pub const PARTICLE_THICKNESS: f32 = 0.7; // fraction of the key height
pub const SCROLL_PER_FRAME: f32 = 2.0; // growth and travel speed
pub const DEFAULT_CANVAS_WIDTH: f32 = 800.0;
pub const FRAME_RATE: f64 = 60.0;

// Palette used by the visualizer (name, hex)
pub const PALETTE: [(&str, &str); 8] = [
    ("red", "#EE2B29"),
    ("orange", "#ff9800"),
    ("yellow", "#ffff00"),
    ("green", "#c6ff00"),
    ("cyan", "#00e5ff"),
    ("blue", "#2979ff"),
    ("purple", "#651fff"),
    ("meta", "#d500f9"),
];
