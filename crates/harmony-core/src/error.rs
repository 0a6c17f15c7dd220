use thiserror::Error;

/// Failures surfaced by the performance pipeline.
///
/// None of these are fatal to the host: every variant ends up as inline
/// status text and the studio stays interactive.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HarmonyError {
    #[error("input is empty")]
    EmptyInput,
    #[error("no playable events in \"{0}\"")]
    NoEvents(String),
    #[error("harmonizer unavailable: {0}")]
    Harmonizer(String),
    #[error("simulated generator failed: {0}")]
    Simulation(String),
    #[error("audio engine error: {0}")]
    Audio(String),
}

pub type Result<T> = std::result::Result<T, HarmonyError>;
