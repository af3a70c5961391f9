//! Concrete job bodies.
//!
//! Jobs here only know about the [`ProgressTracker`](super::ProgressTracker)
//! they are handed; instrumentation and scheduling happen around them.

pub mod simulated;

pub use simulated::SimulatedWorkload;
