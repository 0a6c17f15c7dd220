pub mod constants;
pub mod coordinator;
pub mod error;
pub mod harmonizer;
pub mod keyboard;
pub mod performance;
pub mod phrase;
pub mod pitch;
pub mod quantize;
pub mod recorder;
pub mod schedule;
pub mod studio;
pub mod timers;
pub mod waterfall;

pub use coordinator::*;
pub use error::*;
pub use harmonizer::*;
pub use performance::*;
pub use phrase::*;
pub use quantize::*;
pub use recorder::*;
pub use schedule::*;
pub use studio::*;
pub use timers::*;
pub use waterfall::*;
