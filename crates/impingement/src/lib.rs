//! Plume-impingement strike detection and sliding-window constraint engine.
//!
//! A jet firing history is replayed in order. For every firing the
//! [`StrikeDetector`] tests each active thruster's plume cone against every
//! face of the target mesh, the [`LoadAccumulator`] folds the per-face results
//! into cumulative state, two [`ConstraintWindowTracker`]s keep trailing
//! time-window sums of pressure and heat-flux load, and the
//! [`ConstraintEvaluator`] latches the first violated limit. Processing order
//! is load-bearing: firings must be applied chronologically and exactly once.

pub mod accumulator;
pub mod case;
pub mod config;
pub mod constraints;
pub mod engine;
pub mod sink;
pub mod strike;
pub mod window;

pub use accumulator::{AccumulatorState, LoadAccumulator, LoadState};
pub use case::{Case, CaseError, load_case};
pub use config::{ConstraintLimits, ImpingementConfig, PlumeCone, WindowLimit};
pub use constraints::{ConstraintEvaluator, ViolationKind, ViolationLatch, ViolationRecord};
pub use engine::{EngineState, FiringOutcome, ImpingementEngine, RunSummary, Verdict};
pub use sink::{
    CaseDirectorySink, FiringSnapshot, FiringView, MemorySink, ResultsSink, RunView, SinkError,
};
pub use strike::{
    FiringImpact, FiringLoads, PlumeSource, StrikeDetector, StrikeGeometry, strike_geometry,
};
pub use window::{
    ConstraintWindowTracker, TimelineWindow, WindowArena, WindowError, WindowQuantity, WindowState,
};

use rpod_vehicle::CatalogError;
use thiserror::Error;

/// Errors surfaced while replaying a firing history.
#[derive(Debug, Error)]
pub enum ImpingementError {
    #[error("firing {index} is malformed: {reason}")]
    MalformedFiring { index: usize, reason: String },
    #[error("thruster catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("window tracking failed: {0}")]
    Window(#[from] WindowError),
    #[error("failed to persist results: {0}")]
    Sink(#[from] SinkError),
    #[error("checkpoint does not match this case: {0}")]
    StateMismatch(String),
    #[error("per-face array has {found} entries, mesh has {expected} faces")]
    FaceCountMismatch { expected: usize, found: usize },
}
