//! Immutable engine configuration, passed explicitly at construction.

use rpod_kinetics::SurfaceProperties;

/// Conical strike-test geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlumeCone {
    pub radius_m: f64,
    pub wedge_half_angle_rad: f64,
}

/// Trailing-window limit for one monitored quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowLimit {
    pub threshold: f64,
    pub window_size_s: f64,
}

/// Instantaneous and windowed impingement limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintLimits {
    pub pressure_pa: f64,
    pub shear_pa: f64,
    pub heat_flux_w_m2: f64,
    pub pressure_window: WindowLimit,
    pub heat_flux_load_window: WindowLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImpingementConfig {
    pub plume: PlumeCone,
    pub surface: SurfaceProperties,
    /// `None` disables constraint evaluation.
    pub constraints: Option<ConstraintLimits>,
}

impl From<rpod_config::ConstraintLimitsConfig> for ConstraintLimits {
    fn from(limits: rpod_config::ConstraintLimitsConfig) -> Self {
        Self {
            pressure_pa: limits.normal_pressure,
            shear_pa: limits.shear_pressure,
            heat_flux_w_m2: limits.heat_flux,
            pressure_window: WindowLimit {
                threshold: limits.normal_pressure_load,
                window_size_s: limits.normal_pressure_window_size,
            },
            heat_flux_load_window: WindowLimit {
                threshold: limits.heat_flux_load,
                window_size_s: limits.heat_flux_window_size,
            },
        }
    }
}
