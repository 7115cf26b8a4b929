//! Instantaneous and windowed threshold checks with a first-violation latch.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::accumulator::LoadState;
use crate::config::ConstraintLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    Pressure,
    Shear,
    HeatFlux,
    PressureWindow,
    HeatFluxLoadWindow,
}

impl ViolationKind {
    pub fn label(self) -> &'static str {
        match self {
            ViolationKind::Pressure => "Pressure",
            ViolationKind::Shear => "Shear",
            ViolationKind::HeatFlux => "Heat flux",
            ViolationKind::PressureWindow => "Pressure window",
            ViolationKind::HeatFluxLoadWindow => "Heat flux load window",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ViolationKind::Pressure | ViolationKind::Shear | ViolationKind::PressureWindow => "Pa",
            ViolationKind::HeatFlux => "W/m^2",
            ViolationKind::HeatFluxLoadWindow => "J/m^2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub cell_index: usize,
    pub kind: ViolationKind,
    pub observed: f64,
    pub limit: f64,
    pub firing_index: usize,
}

/// Set-once flag. Only the caller that flips it from clear to set wins.
#[derive(Debug, Default)]
pub struct ViolationLatch(AtomicBool);

impl ViolationLatch {
    pub fn new(tripped: bool) -> Self {
        Self(AtomicBool::new(tripped))
    }

    /// Returns `true` exactly once, for the first caller.
    pub fn try_trip(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Checks one firing's per-face values against the configured limits.
///
/// Checks per face run in a fixed order (pressure, shear, heat flux, pressure
/// window, heat-flux-load window) and all use strict `>`. Faces are scanned in
/// parallel but the lowest violating index is reported, so the recorded
/// violation does not depend on thread scheduling. After the first violation
/// later firings are not evaluated.
#[derive(Debug)]
pub struct ConstraintEvaluator {
    limits: ConstraintLimits,
    latch: ViolationLatch,
    first: Option<ViolationRecord>,
}

impl ConstraintEvaluator {
    pub fn new(limits: ConstraintLimits) -> Self {
        Self {
            limits,
            latch: ViolationLatch::default(),
            first: None,
        }
    }

    pub fn limits(&self) -> &ConstraintLimits {
        &self.limits
    }

    pub fn failed(&self) -> bool {
        self.latch.is_tripped()
    }

    pub fn first_violation(&self) -> Option<&ViolationRecord> {
        self.first.as_ref()
    }

    /// Evaluate one firing; returns the violation only if it is the first of the run.
    pub fn evaluate(
        &mut self,
        firing_index: usize,
        loads: &LoadState,
        pressure_sums: &[f64],
        heat_flux_load_sums: &[f64],
    ) -> Option<ViolationRecord> {
        if self.failed() {
            return None;
        }

        let limits = &self.limits;
        let found = (0..loads.pressure.len())
            .into_par_iter()
            .find_map_first(|cell| {
                face_violation(limits, cell, loads, pressure_sums, heat_flux_load_sums)
            })?;

        if !self.latch.try_trip() {
            return None;
        }
        let record = ViolationRecord {
            cell_index: found.0,
            kind: found.1,
            observed: found.2,
            limit: found.3,
            firing_index,
        };
        tracing::warn!(
            firing = firing_index,
            cell = record.cell_index,
            kind = record.kind.label(),
            observed = record.observed,
            limit = record.limit,
            "impingement constraint violated"
        );
        self.first = Some(record);
        Some(record)
    }

    /// Reinstate a previously latched violation from a checkpoint.
    pub fn restore(&mut self, first: Option<ViolationRecord>) {
        self.latch = ViolationLatch::new(first.is_some());
        self.first = first;
    }
}

fn face_violation(
    limits: &ConstraintLimits,
    cell: usize,
    loads: &LoadState,
    pressure_sums: &[f64],
    heat_flux_load_sums: &[f64],
) -> Option<(usize, ViolationKind, f64, f64)> {
    let value = |values: &[f64]| values.get(cell).copied().unwrap_or(0.0);
    let checks = [
        (ViolationKind::Pressure, value(&loads.pressure), limits.pressure_pa),
        (ViolationKind::Shear, value(&loads.shear), limits.shear_pa),
        (ViolationKind::HeatFlux, value(&loads.heat_flux_rate), limits.heat_flux_w_m2),
        (
            ViolationKind::PressureWindow,
            value(pressure_sums),
            limits.pressure_window.threshold,
        ),
        (
            ViolationKind::HeatFluxLoadWindow,
            value(heat_flux_load_sums),
            limits.heat_flux_load_window.threshold,
        ),
    ];
    checks
        .into_iter()
        .find(|(_, observed, limit)| observed > limit)
        .map(|(kind, observed, limit)| (cell, kind, observed, limit))
}
