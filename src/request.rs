//! Job requests as the user states them: one script plus its resource needs

/// Normalise free-form queue input into a list of queue names
pub mod queue;
/// Validated per-submission resource request
pub mod resource;
