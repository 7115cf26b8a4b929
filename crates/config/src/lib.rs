//! Configuration models and loaders for RPOD plume-impingement cases.
//!
//! A case directory holds a `config.toml` whose sections point at the target
//! mesh, the thruster catalog, the thruster metrics table and the jet firing
//! history (JFH). Catalogs and histories may be written in YAML or TOML.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Name of the case manifest inside a case directory.
pub const CASE_MANIFEST: &str = "config.toml";

/// Top-level case manifest.
#[derive(Debug, Deserialize, Clone)]
pub struct CaseConfig {
    pub plume: PlumeConfig,
    pub pm: PlumeModelConfig,
    pub tv: TargetVehicleConfig,
    pub stl: StlConfig,
    pub jfh: JfhConfig,
    pub vv: VisitingVehicleConfig,
}

/// Conical strike-test geometry.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PlumeConfig {
    /// Maximum plume reach (m).
    pub radius: f64,
    /// Wedge half-angle about the plume centreline (rad).
    pub wedge_theta: f64,
}

/// Plume model selection.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PlumeModelConfig {
    pub kinetics: KineticsSelection,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum KineticsSelection {
    /// Strike-only analysis.
    #[serde(rename = "None")]
    Disabled,
    Simplified,
}

/// Target vehicle surface properties and impingement limits.
#[derive(Debug, Deserialize, Clone)]
pub struct TargetVehicleConfig {
    #[serde(default)]
    pub check_constraints: bool,
    #[serde(default = "default_surface_temp")]
    pub surface_temp: f64,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    #[serde(default)]
    pub normal_pressure: Option<f64>,
    #[serde(default)]
    pub shear_pressure: Option<f64>,
    #[serde(default)]
    pub heat_flux: Option<f64>,
    #[serde(default)]
    pub normal_pressure_load: Option<f64>,
    #[serde(default)]
    pub heat_flux_load: Option<f64>,
    #[serde(default)]
    pub normal_pressure_window_size: Option<f64>,
    #[serde(default)]
    pub heat_flux_window_size: Option<f64>,
}

fn default_surface_temp() -> f64 {
    300.0
}

fn default_sigma() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct StlConfig {
    /// Target vehicle mesh, relative to the case directory.
    pub tv: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JfhConfig {
    /// Jet firing history, relative to the case directory.
    pub file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisitingVehicleConfig {
    /// Thruster catalog, relative to the case directory.
    pub thrusters: String,
    /// Thruster metrics keyed by thruster type; required for kinetics.
    #[serde(default)]
    pub metrics: Option<String>,
}

/// Thruster record from the visiting-vehicle catalog.
#[derive(Debug, Deserialize, Clone)]
pub struct ThrusterConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Thruster frame to vehicle frame.
    pub dcm: [[f64; 3]; 3],
    /// Exit position offset in the vehicle frame (m).
    pub exit: [f64; 3],
}

/// Kinetic parameters for one thruster type.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ThrusterMetricsConfig {
    /// Exit diameter (m).
    pub d: f64,
    /// Exit velocity (m/s).
    pub ve: f64,
    /// Specific gas constant (J/kg/K).
    #[serde(rename = "R")]
    pub gas_constant: f64,
    pub gamma: f64,
    /// Exit temperature (K).
    #[serde(rename = "Te")]
    pub exit_temperature: f64,
    /// Exit number density (1/m³).
    pub n: f64,
    #[serde(default)]
    pub thrust: Option<f64>,
    #[serde(default)]
    pub mdot: Option<f64>,
}

/// Thruster reference as written in a JFH: a 1-based catalog position or a name.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ThrusterIdRecord {
    Index(u32),
    Name(String),
}

/// Validated firing record; every field is guaranteed present.
#[derive(Debug, Clone)]
pub struct FiringRecord {
    pub t: f64,
    pub xyz: [f64; 3],
    pub dcm: [[f64; 3]; 3],
    pub thrusters: Vec<ThrusterIdRecord>,
}

#[derive(Debug, Deserialize)]
struct RawFiringRecord {
    #[serde(default)]
    t: Option<f64>,
    #[serde(default)]
    xyz: Option<[f64; 3]>,
    #[serde(default)]
    dcm: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    thrusters: Option<Vec<ThrusterIdRecord>>,
}

impl RawFiringRecord {
    fn into_record(self, index: usize) -> Result<FiringRecord, ConfigError> {
        let missing = |field: &'static str| ConfigError::MalformedFiring { index, field };
        Ok(FiringRecord {
            t: self.t.ok_or_else(|| missing("t"))?,
            xyz: self.xyz.ok_or_else(|| missing("xyz"))?,
            dcm: self.dcm.ok_or_else(|| missing("dcm"))?,
            thrusters: self.thrusters.ok_or_else(|| missing("thrusters"))?,
        })
    }
}

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("firing {index} is missing required field `{field}`")]
    MalformedFiring { index: usize, field: &'static str },
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl CaseConfig {
    /// Check value ranges and that limits exist when constraint checking is on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };

        if !(self.plume.radius.is_finite() && self.plume.radius > 0.0) {
            return Err(invalid("plume.radius", "must be a positive number"));
        }
        let theta = self.plume.wedge_theta;
        if !(theta.is_finite() && theta > 0.0 && theta <= std::f64::consts::PI) {
            return Err(invalid("plume.wedge_theta", "must lie in (0, π] radians"));
        }
        if !(self.tv.sigma.is_finite() && (0.0..=1.0).contains(&self.tv.sigma)) {
            return Err(invalid("tv.sigma", "accommodation must lie in [0, 1]"));
        }
        if !(self.tv.surface_temp.is_finite() && self.tv.surface_temp > 0.0) {
            return Err(invalid("tv.surface_temp", "must be a positive temperature"));
        }

        if self.pm.kinetics == KineticsSelection::Simplified {
            if self.vv.metrics.is_none() {
                return Err(invalid("vv.metrics", "required when pm.kinetics is Simplified"));
            }
            if self.tv.check_constraints {
                self.constraint_limits()?;
            }
        }
        Ok(())
    }

    /// Constraint limits in declaration order, failing on the first absent or invalid value.
    pub fn constraint_limits(&self) -> Result<ConstraintLimitsConfig, ConfigError> {
        let tv = &self.tv;
        let threshold = |field: &'static str, value: Option<f64>| match value {
            Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
            Some(_) => Err(ConfigError::Invalid {
                field,
                reason: "must be a non-negative number".to_string(),
            }),
            None => Err(ConfigError::Invalid {
                field,
                reason: "required when tv.check_constraints is enabled".to_string(),
            }),
        };
        let window = |field: &'static str, value: Option<f64>| match value {
            Some(v) if v.is_finite() && v > 0.0 => Ok(v),
            Some(_) => Err(ConfigError::Invalid {
                field,
                reason: "window size must be a positive number of seconds".to_string(),
            }),
            None => Err(ConfigError::Invalid {
                field,
                reason: "required when tv.check_constraints is enabled".to_string(),
            }),
        };

        Ok(ConstraintLimitsConfig {
            normal_pressure: threshold("tv.normal_pressure", tv.normal_pressure)?,
            shear_pressure: threshold("tv.shear_pressure", tv.shear_pressure)?,
            heat_flux: threshold("tv.heat_flux", tv.heat_flux)?,
            normal_pressure_load: threshold("tv.normal_pressure_load", tv.normal_pressure_load)?,
            heat_flux_load: threshold("tv.heat_flux_load", tv.heat_flux_load)?,
            normal_pressure_window_size: window(
                "tv.normal_pressure_window_size",
                tv.normal_pressure_window_size,
            )?,
            heat_flux_window_size: window("tv.heat_flux_window_size", tv.heat_flux_window_size)?,
        })
    }
}

/// Fully populated constraint limits.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintLimitsConfig {
    pub normal_pressure: f64,
    pub shear_pressure: f64,
    pub heat_flux: f64,
    pub normal_pressure_load: f64,
    pub heat_flux_load: f64,
    pub normal_pressure_window_size: f64,
    pub heat_flux_window_size: f64,
}

/// Load and validate `config.toml` from a case directory.
pub fn load_case<P: AsRef<Path>>(case_dir: P) -> Result<CaseConfig, ConfigError> {
    let path = case_dir.as_ref().join(CASE_MANIFEST);
    let contents = read_to_string(&path)?;
    let config: CaseConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load the thruster catalog (YAML list, or TOML `[[thruster]]` tables).
pub fn load_thrusters<P: AsRef<Path>>(path: P) -> Result<Vec<ThrusterConfig>, ConfigError> {
    load_list(path.as_ref(), "thruster")
}

/// Load thruster metrics keyed by thruster type.
pub fn load_thruster_metrics<P: AsRef<Path>>(
    path: P,
) -> Result<BTreeMap<String, ThrusterMetricsConfig>, ConfigError> {
    let path = path.as_ref();
    if is_toml(path) {
        Ok(toml::from_str(&read_to_string(path)?)?)
    } else {
        Ok(serde_yaml::from_reader(open(path)?)?)
    }
}

/// Load a jet firing history, reporting the index of the first incomplete record.
pub fn load_firing_history<P: AsRef<Path>>(path: P) -> Result<Vec<FiringRecord>, ConfigError> {
    let raw: Vec<RawFiringRecord> = load_list(path.as_ref(), "firing")?;
    raw.into_iter()
        .enumerate()
        .map(|(index, record)| record.into_record(index))
        .collect()
}

fn load_list<T>(path: &Path, table_key: &str) -> Result<Vec<T>, ConfigError>
where
    T: DeserializeOwned,
{
    if is_toml(path) {
        let mut document: BTreeMap<String, Vec<T>> = toml::from_str(&read_to_string(path)?)?;
        Ok(document.remove(table_key).unwrap_or_default())
    } else {
        Ok(serde_yaml::from_reader(open(path)?)?)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map(|ext| ext == "toml").unwrap_or(false)
}

fn open(path: &Path) -> Result<File, ConfigError> {
    File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
