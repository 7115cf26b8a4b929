//! Sequential replay of a firing history through the detector, accumulator,
//! window trackers and evaluator.

use std::sync::atomic::{AtomicBool, Ordering};

use rpod_core::{dcm, vector};
use rpod_kinetics::PlumeKinetics;
use rpod_mesh::SurfaceMesh;
use rpod_vehicle::{Firing, FiringSequence, ThrusterCatalog};
use serde::{Deserialize, Serialize};

use crate::ImpingementError;
use crate::accumulator::{AccumulatorState, LoadAccumulator};
use crate::config::ImpingementConfig;
use crate::constraints::{ConstraintEvaluator, ViolationRecord};
use crate::sink::{FiringView, ResultsSink, RunView};
use crate::strike::StrikeDetector;
use crate::window::{ConstraintWindowTracker, WindowQuantity, WindowState};

/// Per-firing result handed to sinks and callers.
#[derive(Debug, Clone, PartialEq)]
pub struct FiringOutcome {
    pub index: usize,
    pub active_thrusters: usize,
    pub struck_faces: usize,
    pub total_strikes: u64,
    pub pressure_evictions: usize,
    pub heat_flux_evictions: usize,
    /// Set only on the firing that latched the run's first violation.
    pub violation: Option<ViolationRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    AllMet,
    Violated(ViolationRecord),
    /// Constraints were not checked; carries the reason.
    NotEvaluated(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Firings processed by this call.
    pub processed: usize,
    /// Index of the next unprocessed firing.
    pub next_firing: usize,
    /// `false` when cancelled before the end of the sequence.
    pub completed: bool,
    pub verdict: Verdict,
}

/// Serializable engine state after the last completed firing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub next_firing: usize,
    pub faces: usize,
    pub kinetics: bool,
    pub accumulator: AccumulatorState,
    pub pressure_window: Option<WindowState>,
    pub heat_flux_load_window: Option<WindowState>,
    pub first_violation: Option<ViolationRecord>,
}

#[derive(Debug)]
struct ConstraintStage {
    pressure: ConstraintWindowTracker,
    heat_flux_load: ConstraintWindowTracker,
    evaluator: ConstraintEvaluator,
}

pub struct ImpingementEngine<'a> {
    config: ImpingementConfig,
    detector: StrikeDetector<'a>,
    kinetics: Option<&'a dyn PlumeKinetics>,
    accumulator: LoadAccumulator,
    constraints: Option<ConstraintStage>,
    next_firing: usize,
}

impl<'a> ImpingementEngine<'a> {
    /// Build an engine over a read-only catalog and mesh.
    ///
    /// Without a kinetics model the engine runs in strike-only mode: no loads
    /// are computed and constraint limits are ignored.
    pub fn new(
        config: ImpingementConfig,
        catalog: &'a ThrusterCatalog,
        mesh: &'a SurfaceMesh,
        kinetics: Option<&'a dyn PlumeKinetics>,
    ) -> Result<Self, ImpingementError> {
        let detector = StrikeDetector::new(catalog, mesh, config.plume, kinetics, config.surface)?;
        let faces = mesh.len();

        let constraints = match (kinetics, config.constraints) {
            (Some(_), Some(limits)) => Some(ConstraintStage {
                pressure: ConstraintWindowTracker::new(
                    WindowQuantity::Pressure,
                    limits.pressure_window.window_size_s,
                    faces,
                )?,
                heat_flux_load: ConstraintWindowTracker::new(
                    WindowQuantity::HeatFluxLoad,
                    limits.heat_flux_load_window.window_size_s,
                    faces,
                )?,
                evaluator: ConstraintEvaluator::new(limits),
            }),
            _ => None,
        };

        Ok(Self {
            config,
            detector,
            kinetics,
            accumulator: LoadAccumulator::new(faces, kinetics.is_some()),
            constraints,
            next_firing: 0,
        })
    }

    pub fn config(&self) -> &ImpingementConfig {
        &self.config
    }

    pub fn mesh(&self) -> &SurfaceMesh {
        self.detector.mesh()
    }

    pub fn accumulator(&self) -> &LoadAccumulator {
        &self.accumulator
    }

    pub fn kinetics_name(&self) -> &'static str {
        self.kinetics.map_or("None", |model| model.name())
    }

    pub fn pressure_window(&self) -> Option<&ConstraintWindowTracker> {
        self.constraints.as_ref().map(|stage| &stage.pressure)
    }

    pub fn heat_flux_load_window(&self) -> Option<&ConstraintWindowTracker> {
        self.constraints.as_ref().map(|stage| &stage.heat_flux_load)
    }

    pub fn first_violation(&self) -> Option<&ViolationRecord> {
        self.constraints
            .as_ref()
            .and_then(|stage| stage.evaluator.first_violation())
    }

    /// Index of the next firing `step` will process.
    pub fn next_firing(&self) -> usize {
        self.next_firing
    }

    /// Process the next firing of the sequence.
    pub fn step(&mut self, firing: &Firing) -> Result<FiringOutcome, ImpingementError> {
        let index = self.next_firing;
        validate_firing(index, firing)?;

        let impact = self.detector.detect(index, firing)?;
        let struck_faces = impact.struck_faces();
        let total_strikes = impact.total_strikes();
        self.accumulator.fold(impact)?;

        let mut outcome = FiringOutcome {
            index,
            active_thrusters: firing.thrusters.len(),
            struck_faces,
            total_strikes,
            pressure_evictions: 0,
            heat_flux_evictions: 0,
            violation: None,
        };

        if let (Some(stage), Some(loads)) = (&mut self.constraints, self.accumulator.loads()) {
            outcome.pressure_evictions = stage.pressure.update(firing.duration_s, &loads.pressure)?;
            outcome.heat_flux_evictions = stage
                .heat_flux_load
                .update(firing.duration_s, &loads.heat_flux_load)?;
            outcome.violation = stage.evaluator.evaluate(
                index,
                loads,
                stage.pressure.running_sums(),
                stage.heat_flux_load.running_sums(),
            );
        }

        tracing::debug!(
            firing = index,
            struck_faces,
            total_strikes,
            pressure_evictions = outcome.pressure_evictions,
            heat_flux_evictions = outcome.heat_flux_evictions,
            "processed firing"
        );
        self.next_firing += 1;
        Ok(outcome)
    }

    /// Replay the remaining firings of `sequence` into `sink`.
    pub fn run(
        &mut self,
        sequence: &FiringSequence,
        sink: &mut dyn ResultsSink,
    ) -> Result<RunSummary, ImpingementError> {
        self.run_with_cancel(sequence, sink, &AtomicBool::new(false))
    }

    /// Like [`run`](Self::run), stopping at the next firing boundary once `cancel` is set.
    pub fn run_with_cancel(
        &mut self,
        sequence: &FiringSequence,
        sink: &mut dyn ResultsSink,
        cancel: &AtomicBool,
    ) -> Result<RunSummary, ImpingementError> {
        let start = self.next_firing;
        if start > sequence.len() {
            return Err(ImpingementError::StateMismatch(format!(
                "resume point {start} is past the end of a {}-firing history",
                sequence.len()
            )));
        }
        tracing::info!(
            start,
            firings = sequence.len(),
            faces = self.mesh().len(),
            kinetics = self.kinetics_name(),
            "starting impingement run"
        );

        for firing in &sequence.firings()[start..] {
            if cancel.load(Ordering::Acquire) {
                tracing::info!(next_firing = self.next_firing, "run cancelled");
                break;
            }
            let outcome = self.step(firing)?;
            sink.record_firing(&FiringView {
                firing,
                outcome: &outcome,
                mesh: self.mesh(),
                accumulator: &self.accumulator,
            })?;
            if sink.wants_checkpoints() {
                sink.record_checkpoint(&self.checkpoint())?;
            }
        }

        let completed = self.next_firing == sequence.len();
        let summary = RunSummary {
            processed: self.next_firing - start,
            next_firing: self.next_firing,
            completed,
            verdict: self.verdict(completed),
        };
        sink.finish(&RunView {
            summary: &summary,
            kinetics: self.kinetics_name(),
            faces: self.mesh().len(),
            struck_faces: self.accumulator.struck_faces(),
        })?;
        tracing::info!(
            processed = summary.processed,
            completed,
            struck_faces = self.accumulator.struck_faces(),
            "impingement run finished"
        );
        Ok(summary)
    }

    fn verdict(&self, completed: bool) -> Verdict {
        if self.kinetics.is_none() {
            return Verdict::NotEvaluated("plume kinetics model is None".to_string());
        }
        match &self.constraints {
            None => Verdict::NotEvaluated("constraint checking is disabled".to_string()),
            Some(stage) => match stage.evaluator.first_violation() {
                Some(record) => Verdict::Violated(*record),
                None if completed => Verdict::AllMet,
                None => Verdict::NotEvaluated(format!(
                    "run stopped before firing {}",
                    self.next_firing
                )),
            },
        }
    }

    pub fn checkpoint(&self) -> EngineState {
        EngineState {
            next_firing: self.next_firing,
            faces: self.mesh().len(),
            kinetics: self.kinetics.is_some(),
            accumulator: self.accumulator.state(),
            pressure_window: self.constraints.as_ref().map(|s| s.pressure.state()),
            heat_flux_load_window: self.constraints.as_ref().map(|s| s.heat_flux_load.state()),
            first_violation: self.first_violation().copied(),
        }
    }

    /// Resume from a checkpoint taken by an engine with the same case setup.
    pub fn restore(&mut self, state: EngineState) -> Result<(), ImpingementError> {
        let faces = self.mesh().len();
        if state.faces != faces {
            return Err(ImpingementError::FaceCountMismatch {
                expected: faces,
                found: state.faces,
            });
        }
        if state.kinetics != self.kinetics.is_some() {
            return Err(ImpingementError::StateMismatch(
                "kinetics mode differs from the checkpoint".to_string(),
            ));
        }

        let stage = match (
            &self.constraints,
            state.pressure_window,
            state.heat_flux_load_window,
        ) {
            (Some(current), Some(pressure), Some(heat_flux_load)) => {
                let pressure = restore_window(&current.pressure, pressure, faces)?;
                let heat_flux_load =
                    restore_window(&current.heat_flux_load, heat_flux_load, faces)?;
                let mut evaluator = ConstraintEvaluator::new(*current.evaluator.limits());
                evaluator.restore(state.first_violation);
                Some(ConstraintStage {
                    pressure,
                    heat_flux_load,
                    evaluator,
                })
            }
            (None, None, None) if state.first_violation.is_none() => None,
            _ => {
                return Err(ImpingementError::StateMismatch(
                    "constraint windows do not match the checkpoint".to_string(),
                ));
            }
        };

        self.accumulator.restore(state.accumulator)?;
        self.constraints = stage;
        self.next_firing = state.next_firing;
        tracing::info!(next_firing = self.next_firing, "restored engine state");
        Ok(())
    }
}

fn restore_window(
    current: &ConstraintWindowTracker,
    state: WindowState,
    faces: usize,
) -> Result<ConstraintWindowTracker, ImpingementError> {
    if state.quantity != current.quantity()
        || state.window_size_s != current.timeline().window_size_s()
    {
        return Err(ImpingementError::StateMismatch(format!(
            "{:?} window does not match the configured window",
            current.quantity()
        )));
    }
    Ok(ConstraintWindowTracker::from_state(state, faces)?)
}

fn validate_firing(index: usize, firing: &Firing) -> Result<(), ImpingementError> {
    let reason = if !(firing.duration_s.is_finite() && firing.duration_s >= 0.0) {
        Some(format!("duration {} is not a non-negative number", firing.duration_s))
    } else if !vector::is_finite(&firing.position) {
        Some("position has non-finite components".to_string())
    } else if !dcm::is_finite(&firing.dcm) {
        Some("orientation has non-finite components".to_string())
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ImpingementError::MalformedFiring { index, reason }),
        None => Ok(()),
    }
}
