//! Per-face cumulative state across the whole firing history.

use serde::{Deserialize, Serialize};

use crate::ImpingementError;
use crate::strike::{FiringImpact, FiringLoads};

/// Load fields, present only when a kinetics model is configured.
///
/// The `pressure`, `shear`, `heat_flux_rate` and `heat_flux_load` arrays hold
/// the most recent firing; the `max_*` and `cumulative_*` arrays never decrease.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadState {
    pub pressure: Vec<f64>,
    pub max_pressure: Vec<f64>,
    pub shear: Vec<f64>,
    pub max_shear: Vec<f64>,
    pub heat_flux_rate: Vec<f64>,
    pub heat_flux_load: Vec<f64>,
    pub cumulative_heat_flux_load: Vec<f64>,
}

impl LoadState {
    fn zeroed(faces: usize) -> Self {
        Self {
            pressure: vec![0.0; faces],
            max_pressure: vec![0.0; faces],
            shear: vec![0.0; faces],
            max_shear: vec![0.0; faces],
            heat_flux_rate: vec![0.0; faces],
            heat_flux_load: vec![0.0; faces],
            cumulative_heat_flux_load: vec![0.0; faces],
        }
    }

    fn fold(&mut self, loads: FiringLoads) {
        self.pressure = loads.pressure;
        self.shear = loads.shear;
        self.heat_flux_rate = loads.heat_flux_rate;
        self.heat_flux_load = loads.heat_flux_load;

        for (max, current) in self.max_pressure.iter_mut().zip(&self.pressure) {
            *max = max.max(*current);
        }
        for (max, current) in self.max_shear.iter_mut().zip(&self.shear) {
            *max = max.max(*current);
        }
        for (total, load) in self
            .cumulative_heat_flux_load
            .iter_mut()
            .zip(&self.heat_flux_load)
        {
            *total += load.max(0.0);
        }
    }
}

/// Cumulative fields persisted in checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorState {
    pub cumulative_strikes: Vec<u64>,
    pub max_pressure: Option<Vec<f64>>,
    pub max_shear: Option<Vec<f64>>,
    pub cumulative_heat_flux_load: Option<Vec<f64>>,
}

/// Running per-face strike counts, maxima and cumulative heat-flux load.
#[derive(Debug, Clone)]
pub struct LoadAccumulator {
    strikes: Vec<bool>,
    cumulative_strikes: Vec<u64>,
    loads: Option<LoadState>,
}

impl LoadAccumulator {
    pub fn new(faces: usize, with_loads: bool) -> Self {
        Self {
            strikes: vec![false; faces],
            cumulative_strikes: vec![0; faces],
            loads: with_loads.then(|| LoadState::zeroed(faces)),
        }
    }

    pub fn faces(&self) -> usize {
        self.strikes.len()
    }

    /// Replace the this-firing fields with `impact` and advance cumulative state.
    pub fn fold(&mut self, impact: FiringImpact) -> Result<(), ImpingementError> {
        let faces = self.faces();
        self.check_len(impact.strike_counts.len())?;
        if let Some(loads) = &impact.loads {
            for len in [
                loads.pressure.len(),
                loads.shear.len(),
                loads.heat_flux_rate.len(),
                loads.heat_flux_load.len(),
            ] {
                self.check_len(len)?;
            }
        }

        for ((struck, total), count) in self
            .strikes
            .iter_mut()
            .zip(self.cumulative_strikes.iter_mut())
            .zip(&impact.strike_counts)
        {
            *struck = *count > 0;
            *total += u64::from(*count);
        }

        if let Some(state) = &mut self.loads {
            state.fold(impact.loads.unwrap_or_else(|| FiringLoads {
                pressure: vec![0.0; faces],
                shear: vec![0.0; faces],
                heat_flux_rate: vec![0.0; faces],
                heat_flux_load: vec![0.0; faces],
            }));
        }
        Ok(())
    }

    /// Strike flags for the most recent firing.
    pub fn strikes(&self) -> &[bool] {
        &self.strikes
    }

    pub fn cumulative_strikes(&self) -> &[u64] {
        &self.cumulative_strikes
    }

    pub fn loads(&self) -> Option<&LoadState> {
        self.loads.as_ref()
    }

    /// Faces struck at least once so far.
    pub fn struck_faces(&self) -> usize {
        self.cumulative_strikes.iter().filter(|c| **c > 0).count()
    }

    pub fn state(&self) -> AccumulatorState {
        AccumulatorState {
            cumulative_strikes: self.cumulative_strikes.clone(),
            max_pressure: self.loads.as_ref().map(|l| l.max_pressure.clone()),
            max_shear: self.loads.as_ref().map(|l| l.max_shear.clone()),
            cumulative_heat_flux_load: self
                .loads
                .as_ref()
                .map(|l| l.cumulative_heat_flux_load.clone()),
        }
    }

    /// Restore cumulative fields; this-firing fields start at zero.
    pub fn restore(&mut self, state: AccumulatorState) -> Result<(), ImpingementError> {
        self.check_len(state.cumulative_strikes.len())?;
        let faces = self.faces();
        let fields = (
            state.max_pressure,
            state.max_shear,
            state.cumulative_heat_flux_load,
        );
        match (&mut self.loads, fields) {
            (Some(loads), (Some(max_pressure), Some(max_shear), Some(cumulative))) => {
                for len in [max_pressure.len(), max_shear.len(), cumulative.len()] {
                    if len != faces {
                        return Err(ImpingementError::FaceCountMismatch {
                            expected: faces,
                            found: len,
                        });
                    }
                }
                *loads = LoadState::zeroed(faces);
                loads.max_pressure = max_pressure;
                loads.max_shear = max_shear;
                loads.cumulative_heat_flux_load = cumulative;
            }
            (None, (None, None, None)) => {}
            _ => {
                return Err(ImpingementError::StateMismatch(
                    "load fields do not match the kinetics mode".to_string(),
                ));
            }
        }
        self.strikes = vec![false; faces];
        self.cumulative_strikes = state.cumulative_strikes;
        Ok(())
    }

    fn check_len(&self, found: usize) -> Result<(), ImpingementError> {
        if found == self.faces() {
            Ok(())
        } else {
            Err(ImpingementError::FaceCountMismatch {
                expected: self.faces(),
                found,
            })
        }
    }
}
