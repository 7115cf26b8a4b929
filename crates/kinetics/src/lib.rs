//! Rarefied plume kinetics models.
//!
//! A model converts the strike geometry of one thruster/face pair (distance
//! from the exit plane, angle from the plume centreline) into surface loads.
//! The impingement engine treats models as side-effect-free queries, so they
//! must be `Send + Sync` to run on the per-face worker pool.

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

use rpod_core::constants::BOLTZMANN;
use rpod_vehicle::ThrusterMetrics;

/// Thermal and gas-surface interaction properties of the target wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceProperties {
    pub wall_temperature_k: f64,
    /// Thermal/momentum accommodation coefficient σ in [0, 1].
    pub accommodation: f64,
}

/// Loads induced on one face by one thruster.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlumeLoad {
    pub pressure_pa: f64,
    pub shear_pa: f64,
    pub heat_flux_w_m2: f64,
}

pub trait PlumeKinetics: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        distance_m: f64,
        theta_rad: f64,
        metrics: &ThrusterMetrics,
        surface: &SurfaceProperties,
    ) -> PlumeLoad;
}

/// Local free-stream state at a point in the plume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFlow {
    /// Number density relative to the exit plane.
    pub density_ratio: f64,
    pub mass_density_kg_m3: f64,
    pub temperature_k: f64,
    pub speed_ratio: f64,
}

/// Collisionless source-flow plume feeding free-molecular flat-plate relations.
///
/// The centreline density follows the disk-source decay
/// `½ (1 − r/√(r² + R₀²))`, spread off-axis by `cos θ · exp(−S₀² sin² θ)`
/// where `S₀` is the exit speed ratio. Temperature falls isentropically with
/// density and the bulk speed stays at the exit velocity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplifiedGasKinetics;

impl SimplifiedGasKinetics {
    /// Exit speed ratio `S₀ = vₑ / √(2 R Tₑ)`.
    pub fn exit_speed_ratio(metrics: &ThrusterMetrics) -> f64 {
        let thermal = 2.0 * metrics.gas_constant_j_kg_k * metrics.exit_temperature_k;
        metrics.exit_velocity_m_s / thermal.sqrt()
    }

    /// Centreline density relative to the exit plane.
    pub fn centerline_density_ratio(distance_m: f64, metrics: &ThrusterMetrics) -> f64 {
        let r0 = 0.5 * metrics.exit_diameter_m;
        0.5 * (1.0 - distance_m / (distance_m * distance_m + r0 * r0).sqrt())
    }

    /// Free-stream state at `distance_m`, `theta_rad`; `None` outside the forward hemisphere.
    pub fn local_flow(
        distance_m: f64,
        theta_rad: f64,
        metrics: &ThrusterMetrics,
    ) -> Option<LocalFlow> {
        if !valid_metrics(metrics)
            || !distance_m.is_finite()
            || distance_m <= 0.0
            || !(0.0..FRAC_PI_2).contains(&theta_rad)
        {
            return None;
        }

        let s0 = Self::exit_speed_ratio(metrics);
        let (sin_t, cos_t) = theta_rad.sin_cos();
        let angular = cos_t * (-s0 * s0 * sin_t * sin_t).exp();
        let density_ratio = Self::centerline_density_ratio(distance_m, metrics) * angular;
        if density_ratio <= 0.0 {
            return None;
        }

        let particle_mass = BOLTZMANN / metrics.gas_constant_j_kg_k;
        let mass_density = metrics.exit_number_density_m3 * density_ratio * particle_mass;
        let temperature =
            (metrics.exit_temperature_k * density_ratio.powf(metrics.gamma - 1.0)).max(1.0e-3);
        let speed_ratio =
            metrics.exit_velocity_m_s / (2.0 * metrics.gas_constant_j_kg_k * temperature).sqrt();

        Some(LocalFlow {
            density_ratio,
            mass_density_kg_m3: mass_density,
            temperature_k: temperature,
            speed_ratio,
        })
    }
}

impl PlumeKinetics for SimplifiedGasKinetics {
    fn name(&self) -> &'static str {
        "Simplified"
    }

    fn evaluate(
        &self,
        distance_m: f64,
        theta_rad: f64,
        metrics: &ThrusterMetrics,
        surface: &SurfaceProperties,
    ) -> PlumeLoad {
        let Some(flow) = Self::local_flow(distance_m, theta_rad, metrics) else {
            return PlumeLoad::default();
        };

        let sigma = surface.accommodation;
        let gamma = metrics.gamma;
        let rt = metrics.gas_constant_j_kg_k * flow.temperature_k;
        let rho = flow.mass_density_kg_m3;
        let (sin_t, cos_t) = theta_rad.sin_cos();

        let s = flow.speed_ratio;
        let chi = s * cos_t;
        let decay = (-chi * chi).exp();
        let erf_term = 1.0 + libm::erf(chi);
        let wall_ratio = surface.wall_temperature_k / flow.temperature_k;
        let flux_term = decay + PI.sqrt() * chi * erf_term;

        let pressure = rho
            * rt
            * (((2.0 - sigma) * chi / PI.sqrt() + 0.5 * sigma * wall_ratio.sqrt()) * decay
                + ((2.0 - sigma) * (chi * chi + 0.5)
                    + 0.5 * sigma * (PI * wall_ratio).sqrt() * chi)
                    * erf_term);

        let most_probable_speed = (2.0 * rt).sqrt();
        let shear = sigma * rho * metrics.exit_velocity_m_s * most_probable_speed * sin_t
            / (2.0 * PI.sqrt())
            * flux_term;

        let energy_term = s * s + gamma / (gamma - 1.0)
            - (gamma + 1.0) / (2.0 * (gamma - 1.0)) * wall_ratio;
        let heat_flux = sigma * rho * rt.powf(1.5) / (2.0 * PI).sqrt()
            * (energy_term * flux_term - 0.5 * decay);

        PlumeLoad {
            pressure_pa: pressure,
            shear_pa: shear,
            heat_flux_w_m2: heat_flux,
        }
    }
}

fn valid_metrics(metrics: &ThrusterMetrics) -> bool {
    metrics.exit_diameter_m > 0.0
        && metrics.exit_velocity_m_s > 0.0
        && metrics.gas_constant_j_kg_k > 0.0
        && metrics.gamma > 1.0
        && metrics.exit_temperature_k > 0.0
        && metrics.exit_number_density_m3 >= 0.0
}
