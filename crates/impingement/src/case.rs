//! Assembly of a runnable case from a case directory on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rpod_config::{
    CaseConfig, ConfigError, FiringRecord, KineticsSelection, ThrusterConfig, ThrusterIdRecord,
    ThrusterMetricsConfig,
};
use rpod_core::{dcm, vector};
use rpod_kinetics::{PlumeKinetics, SimplifiedGasKinetics, SurfaceProperties};
use rpod_mesh::{MeshError, SurfaceMesh};
use rpod_vehicle::{
    CatalogError, Firing, FiringSequence, Thruster, ThrusterCatalog, ThrusterMetrics, ThrusterRef,
};
use thiserror::Error;

use crate::ImpingementError;
use crate::config::{ImpingementConfig, PlumeCone};
use crate::engine::ImpingementEngine;

/// Directory, relative to the case, receiving all artifacts.
pub const RESULTS_DIR: &str = "results";

#[derive(Debug, Error)]
pub enum CaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load target mesh {path}: {source}")]
    Mesh {
        path: PathBuf,
        #[source]
        source: MeshError,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("invalid {what}: {reason}")]
    Invalid { what: String, reason: String },
}

/// Everything needed to replay one case.
#[derive(Debug)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub config: CaseConfig,
    pub settings: ImpingementConfig,
    pub mesh: SurfaceMesh,
    pub catalog: ThrusterCatalog,
    pub sequence: FiringSequence,
    pub kinetics: Option<Box<dyn PlumeKinetics>>,
}

impl Case {
    pub fn results_dir(&self) -> PathBuf {
        self.dir.join(RESULTS_DIR)
    }

    /// Fresh engine borrowing this case's mesh, catalog and kinetics model.
    pub fn engine(&self) -> Result<ImpingementEngine<'_>, ImpingementError> {
        ImpingementEngine::new(
            self.settings.clone(),
            &self.catalog,
            &self.mesh,
            self.kinetics.as_deref(),
        )
    }
}

/// Load `config.toml` and every file it references from `dir`.
pub fn load_case<P: AsRef<Path>>(dir: P) -> Result<Case, CaseError> {
    let dir = dir.as_ref();
    let config = rpod_config::load_case(dir)?;

    let mesh_path = dir.join(&config.stl.tv);
    let mesh = SurfaceMesh::from_stl(&mesh_path).map_err(|source| CaseError::Mesh {
        path: mesh_path.clone(),
        source,
    })?;

    let thrusters = rpod_config::load_thrusters(dir.join(&config.vv.thrusters))?;
    let metrics = match &config.vv.metrics {
        Some(file) => rpod_config::load_thruster_metrics(dir.join(file))?,
        None => BTreeMap::new(),
    };
    let catalog = catalog_from_config(&thrusters, &metrics)?;

    let records = rpod_config::load_firing_history(dir.join(&config.jfh.file))?;
    let sequence: FiringSequence = records
        .iter()
        .map(firing_from_record)
        .collect::<Vec<_>>()
        .into();

    let settings = impingement_config(&config)?;
    let kinetics = kinetics_for(config.pm.kinetics);
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string());

    tracing::info!(
        case = %name,
        faces = mesh.len(),
        thrusters = catalog.len(),
        firings = sequence.len(),
        "loaded impingement case"
    );

    Ok(Case {
        name,
        dir: dir.to_path_buf(),
        config,
        settings,
        mesh,
        catalog,
        sequence,
        kinetics,
    })
}

/// Engine configuration from a validated manifest.
///
/// Constraint limits are only read when checking is on and a kinetics model is
/// selected; strike-only cases never need them.
pub fn impingement_config(config: &CaseConfig) -> Result<ImpingementConfig, CaseError> {
    let constraints = if config.tv.check_constraints
        && config.pm.kinetics != KineticsSelection::Disabled
    {
        Some(config.constraint_limits()?.into())
    } else {
        None
    };
    Ok(ImpingementConfig {
        plume: PlumeCone {
            radius_m: config.plume.radius,
            wedge_half_angle_rad: config.plume.wedge_theta,
        },
        surface: SurfaceProperties {
            wall_temperature_k: config.tv.surface_temp,
            accommodation: config.tv.sigma,
        },
        constraints,
    })
}

pub fn kinetics_for(selection: KineticsSelection) -> Option<Box<dyn PlumeKinetics>> {
    match selection {
        KineticsSelection::Disabled => None,
        KineticsSelection::Simplified => Some(Box::new(SimplifiedGasKinetics)),
    }
}

pub fn catalog_from_config(
    thrusters: &[ThrusterConfig],
    metrics: &BTreeMap<String, ThrusterMetricsConfig>,
) -> Result<ThrusterCatalog, CaseError> {
    let thrusters = thrusters
        .iter()
        .map(|record| {
            if !dcm::is_finite(&record.dcm) || !vector::is_finite(&record.exit) {
                return Err(CaseError::Invalid {
                    what: format!("thruster `{}`", record.name),
                    reason: "dcm and exit must be finite".to_string(),
                });
            }
            Ok(Thruster {
                name: record.name.clone(),
                kind: record.kind.clone(),
                dcm: record.dcm,
                exit: record.exit,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let metrics = metrics
        .iter()
        .map(|(kind, m)| Ok((kind.clone(), thruster_metrics(kind, m)?)))
        .collect::<Result<BTreeMap<_, _>, CaseError>>()?;

    Ok(ThrusterCatalog::new(thrusters, metrics)?)
}

fn thruster_metrics(kind: &str, m: &ThrusterMetricsConfig) -> Result<ThrusterMetrics, CaseError> {
    let positive = [m.d, m.ve, m.gas_constant, m.exit_temperature];
    let reason = if positive.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
        Some("d, ve, R and Te must be positive")
    } else if !(m.gamma.is_finite() && m.gamma > 1.0) {
        Some("gamma must exceed 1")
    } else if !(m.n.is_finite() && m.n >= 0.0) {
        Some("n must be non-negative")
    } else {
        None
    };
    if let Some(reason) = reason {
        return Err(CaseError::Invalid {
            what: format!("metrics for thruster type `{kind}`"),
            reason: reason.to_string(),
        });
    }
    Ok(ThrusterMetrics {
        exit_diameter_m: m.d,
        exit_velocity_m_s: m.ve,
        gas_constant_j_kg_k: m.gas_constant,
        gamma: m.gamma,
        exit_temperature_k: m.exit_temperature,
        exit_number_density_m3: m.n,
        thrust_n: m.thrust,
        mass_flow_kg_s: m.mdot,
    })
}

pub fn firing_from_record(record: &FiringRecord) -> Firing {
    Firing {
        duration_s: record.t,
        position: record.xyz,
        dcm: record.dcm,
        thrusters: record
            .thrusters
            .iter()
            .map(|id| match id {
                ThrusterIdRecord::Index(i) => ThrusterRef::Index(*i),
                ThrusterIdRecord::Name(name) => ThrusterRef::Name(name.clone()),
            })
            .collect(),
    }
}
