//! Result sinks receiving per-firing state as the engine replays a history.

use std::path::{Path, PathBuf};

use rpod_export::ExportError;
use rpod_export::checkpoint;
use rpod_export::history::{HistoryRow, HistoryWriter};
use rpod_export::report::{self, Finding, Outcome, Summary};
use rpod_export::vtu::{self, CellField};
use rpod_mesh::SurfaceMesh;
use rpod_vehicle::Firing;
use thiserror::Error;

use crate::accumulator::{LoadAccumulator, LoadState};
use crate::engine::{EngineState, FiringOutcome, RunSummary, Verdict};

/// Snapshot of one processed firing.
pub struct FiringView<'a> {
    pub firing: &'a Firing,
    pub outcome: &'a FiringOutcome,
    pub mesh: &'a SurfaceMesh,
    pub accumulator: &'a LoadAccumulator,
}

/// End-of-run statistics.
pub struct RunView<'a> {
    pub summary: &'a RunSummary,
    pub kinetics: &'a str,
    pub faces: usize,
    pub struck_faces: usize,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("results path {0} exists and is not a directory")]
    NotADirectory(PathBuf),
}

/// Receives results in firing order. Any error aborts the run.
pub trait ResultsSink {
    fn record_firing(&mut self, view: &FiringView<'_>) -> Result<(), SinkError>;

    fn wants_checkpoints(&self) -> bool {
        false
    }

    fn record_checkpoint(&mut self, _state: &EngineState) -> Result<(), SinkError> {
        Ok(())
    }

    fn finish(&mut self, run: &RunView<'_>) -> Result<(), SinkError>;
}

/// Writes the standard artifact set under a case's `results/` directory.
pub struct CaseDirectorySink {
    results_dir: PathBuf,
    case_name: String,
    history: HistoryWriter,
    checkpoints: bool,
}

impl CaseDirectorySink {
    pub const STRIKES_DIR: &'static str = "strikes";
    pub const REPORT_FILE: &'static str = "impingement_report.txt";
    pub const HISTORY_FILE: &'static str = "strike_history.csv";
    pub const CHECKPOINT_FILE: &'static str = "checkpoint.json";

    /// Start a fresh run, truncating any previous history.
    pub fn create(results_dir: &Path, case_name: &str) -> Result<Self, SinkError> {
        ensure_directory(results_dir)?;
        let history = HistoryWriter::create(&results_dir.join(Self::HISTORY_FILE))?;
        Ok(Self::with_history(results_dir, case_name, history))
    }

    /// Continue a checkpointed run at `next_firing`, keeping the history rows before it.
    pub fn resume(
        results_dir: &Path,
        case_name: &str,
        next_firing: usize,
    ) -> Result<Self, SinkError> {
        ensure_directory(results_dir)?;
        let history = HistoryWriter::resume(&results_dir.join(Self::HISTORY_FILE), next_firing)?;
        Ok(Self::with_history(results_dir, case_name, history))
    }

    fn with_history(results_dir: &Path, case_name: &str, history: HistoryWriter) -> Self {
        Self {
            results_dir: results_dir.to_path_buf(),
            case_name: case_name.to_string(),
            history,
            checkpoints: false,
        }
    }

    pub fn with_checkpoints(mut self, enabled: bool) -> Self {
        self.checkpoints = enabled;
        self
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn firing_path(&self, index: usize) -> PathBuf {
        self.results_dir
            .join(Self::STRIKES_DIR)
            .join(format!("firing-{index}.vtu"))
    }

    pub fn report_path(&self) -> PathBuf {
        self.results_dir.join(Self::REPORT_FILE)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.results_dir.join(Self::CHECKPOINT_FILE)
    }

    /// Load a checkpoint written by an earlier run.
    pub fn read_checkpoint(results_dir: &Path) -> Result<EngineState, SinkError> {
        Ok(checkpoint::read_json(&results_dir.join(Self::CHECKPOINT_FILE))?)
    }
}

impl ResultsSink for CaseDirectorySink {
    fn record_firing(&mut self, view: &FiringView<'_>) -> Result<(), SinkError> {
        let accumulator = view.accumulator;
        let strikes: Vec<u64> = accumulator.strikes().iter().map(|s| u64::from(*s)).collect();

        let mut fields = vec![
            CellField::Count("strikes", &strikes),
            CellField::Count("cum_strikes", accumulator.cumulative_strikes()),
        ];
        if let Some(loads) = accumulator.loads() {
            fields.extend([
                CellField::Float("pressures", &loads.pressure),
                CellField::Float("max_pressures", &loads.max_pressure),
                CellField::Float("shear_stress", &loads.shear),
                CellField::Float("max_shears", &loads.max_shear),
                CellField::Float("heat_flux_rate", &loads.heat_flux_rate),
                CellField::Float("heat_flux_load", &loads.heat_flux_load),
                CellField::Float("cum_heat_flux_load", &loads.cumulative_heat_flux_load),
            ]);
        }
        vtu::write_cell_data(&self.firing_path(view.outcome.index), view.mesh, &fields)?;

        self.history.write(&history_row(view))?;
        Ok(())
    }

    fn wants_checkpoints(&self) -> bool {
        self.checkpoints
    }

    fn record_checkpoint(&mut self, state: &EngineState) -> Result<(), SinkError> {
        checkpoint::write_json(&self.checkpoint_path(), state)?;
        Ok(())
    }

    fn finish(&mut self, run: &RunView<'_>) -> Result<(), SinkError> {
        let summary = Summary {
            case_name: &self.case_name,
            kinetics: run.kinetics,
            firings: run.summary.next_firing,
            faces: run.faces,
            struck_faces: run.struck_faces,
        };
        let outcome = match &run.summary.verdict {
            Verdict::AllMet => Outcome::AllMet,
            Verdict::Violated(record) => Outcome::Violated(Finding {
                quantity: record.kind.label(),
                unit: record.kind.unit(),
                cell: record.cell_index,
                observed: record.observed,
                limit: record.limit,
                firing: record.firing_index,
            }),
            Verdict::NotEvaluated(reason) => Outcome::NotEvaluated { reason },
        };
        report::write_report(&self.report_path(), &summary, &outcome)?;
        Ok(())
    }
}

fn ensure_directory(path: &Path) -> Result<(), SinkError> {
    if path.exists() && !path.is_dir() {
        return Err(SinkError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

fn history_row(view: &FiringView<'_>) -> HistoryRow {
    let peak = |values: &[f64]| values.iter().copied().fold(0.0, f64::max);
    let loads = view.accumulator.loads();
    HistoryRow {
        firing: view.outcome.index,
        duration_s: view.firing.duration_s,
        active_thrusters: view.outcome.active_thrusters,
        struck_faces: view.outcome.struck_faces,
        cumulative_strikes: view.accumulator.cumulative_strikes().iter().sum(),
        peak_pressure_pa: loads.map_or(0.0, |l| peak(&l.pressure)),
        peak_heat_flux_load_j_m2: loads.map_or(0.0, |l| peak(&l.heat_flux_load)),
    }
}

/// Per-firing copy of the accumulator as seen by a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct FiringSnapshot {
    pub outcome: FiringOutcome,
    pub strikes: Vec<bool>,
    pub cumulative_strikes: Vec<u64>,
    pub loads: Option<LoadState>,
}

/// Keeps everything in memory; used by tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub snapshots: Vec<FiringSnapshot>,
    pub checkpoints: Vec<EngineState>,
    pub summary: Option<RunSummary>,
    capture_checkpoints: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoints() -> Self {
        Self {
            capture_checkpoints: true,
            ..Self::default()
        }
    }
}

impl ResultsSink for MemorySink {
    fn record_firing(&mut self, view: &FiringView<'_>) -> Result<(), SinkError> {
        self.snapshots.push(FiringSnapshot {
            outcome: view.outcome.clone(),
            strikes: view.accumulator.strikes().to_vec(),
            cumulative_strikes: view.accumulator.cumulative_strikes().to_vec(),
            loads: view.accumulator.loads().cloned(),
        });
        Ok(())
    }

    fn wants_checkpoints(&self) -> bool {
        self.capture_checkpoints
    }

    fn record_checkpoint(&mut self, state: &EngineState) -> Result<(), SinkError> {
        self.checkpoints.push(state.clone());
        Ok(())
    }

    fn finish(&mut self, run: &RunView<'_>) -> Result<(), SinkError> {
        self.summary = Some(run.summary.clone());
        Ok(())
    }
}
