//! Per-firing plume strike detection across every face and active thruster.

use std::f64::consts::PI;

use rayon::prelude::*;
use rpod_core::dcm;
use rpod_core::vector::{self, Vector3};
use rpod_kinetics::{PlumeKinetics, SurfaceProperties};
use rpod_mesh::{Face, SurfaceMesh};
use rpod_vehicle::{Firing, ThrusterCatalog, ThrusterMetrics};

use crate::ImpingementError;
use crate::config::PlumeCone;

/// Exit position and centreline of one active thruster in the target frame.
#[derive(Debug, Clone, Copy)]
pub struct PlumeSource {
    pub exit: Vector3,
    /// Unit plume axis; `None` when the composed orientation has no usable first row.
    pub axis: Option<Vector3>,
    pub slot: usize,
}

impl PlumeSource {
    /// Place a thruster for a firing: exit = position + V·offset, axis = row 0 of Tᵀ·Vᵀ.
    pub fn locate(
        firing: &Firing,
        thruster_dcm: &dcm::Matrix3,
        exit_offset: &Vector3,
        slot: usize,
    ) -> Self {
        let exit = vector::add(&firing.position, &dcm::apply(&firing.dcm, exit_offset));
        let composed = dcm::mul(&dcm::transpose(thruster_dcm), &dcm::transpose(&firing.dcm));
        let axis = vector::normalize(&composed[0]).map(|(unit, _)| unit);
        Self { exit, axis, slot }
    }
}

/// Geometry of a confirmed strike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeGeometry {
    pub distance_m: f64,
    /// Angle from the plume centreline; 0 is straight down the axis.
    pub theta_rad: f64,
}

/// Cone test for one face. Boundaries are exclusive; degenerate geometry never strikes.
pub fn strike_geometry(
    cone: &PlumeCone,
    exit: &Vector3,
    axis: &Vector3,
    face: &Face,
) -> Option<StrikeGeometry> {
    let separation = vector::sub(exit, &face.centroid);
    let (unit_distance, distance) = vector::normalize(&separation)?;

    let cos_angle = vector::dot(&unit_distance, axis).clamp(-1.0, 1.0);
    let theta = PI - cos_angle.acos();
    let facing = vector::dot(&face.normal, axis) < 0.0;

    let inside = distance < cone.radius_m && theta < cone.wedge_half_angle_rad;
    (inside && facing).then_some(StrikeGeometry {
        distance_m: distance,
        theta_rad: theta,
    })
}

/// Raw loads for one firing, one entry per face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiringLoads {
    pub pressure: Vec<f64>,
    pub shear: Vec<f64>,
    pub heat_flux_rate: Vec<f64>,
    pub heat_flux_load: Vec<f64>,
}

/// Detector output for one firing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiringImpact {
    /// Number of thruster plumes striking each face.
    pub strike_counts: Vec<u32>,
    /// Present only when a kinetics model is configured.
    pub loads: Option<FiringLoads>,
}

impl FiringImpact {
    pub fn struck_faces(&self) -> usize {
        self.strike_counts.iter().filter(|c| **c > 0).count()
    }

    pub fn total_strikes(&self) -> u64 {
        self.strike_counts.iter().map(|c| u64::from(*c)).sum()
    }
}

#[derive(Default, Clone, Copy)]
struct FaceImpact {
    strikes: u32,
    pressure: f64,
    shear: f64,
    heat_flux_rate: f64,
}

/// Strike detector bound to a read-only catalog and mesh.
pub struct StrikeDetector<'a> {
    catalog: &'a ThrusterCatalog,
    mesh: &'a SurfaceMesh,
    cone: PlumeCone,
    kinetics: Option<&'a dyn PlumeKinetics>,
    surface: SurfaceProperties,
}

impl<'a> StrikeDetector<'a> {
    pub fn new(
        catalog: &'a ThrusterCatalog,
        mesh: &'a SurfaceMesh,
        cone: PlumeCone,
        kinetics: Option<&'a dyn PlumeKinetics>,
        surface: SurfaceProperties,
    ) -> Result<Self, ImpingementError> {
        if kinetics.is_some() {
            catalog.require_metrics()?;
        }
        Ok(Self {
            catalog,
            mesh,
            cone,
            kinetics,
            surface,
        })
    }

    pub fn mesh(&self) -> &SurfaceMesh {
        self.mesh
    }

    /// Resolve and place every active thruster of a firing.
    pub fn plume_sources(
        &self,
        index: usize,
        firing: &Firing,
    ) -> Result<Vec<PlumeSource>, ImpingementError> {
        firing
            .thrusters
            .iter()
            .map(|reference| {
                let slot = self
                    .catalog
                    .resolve(reference)
                    .map_err(|err| ImpingementError::MalformedFiring {
                        index,
                        reason: err.to_string(),
                    })?;
                let thruster = &self.catalog.thrusters()[slot];
                Ok(PlumeSource::locate(firing, &thruster.dcm, &thruster.exit, slot))
            })
            .collect()
    }

    /// Evaluate one firing. Faces are processed in parallel; each face sums its
    /// thruster contributions in firing order, so results do not depend on scheduling.
    pub fn detect(
        &self,
        index: usize,
        firing: &Firing,
    ) -> Result<FiringImpact, ImpingementError> {
        let sources = self.plume_sources(index, firing)?;
        for source in sources.iter().filter(|s| s.axis.is_none()) {
            tracing::warn!(
                firing = index,
                slot = source.slot,
                "thruster has degenerate plume axis"
            );
        }

        let metrics: Vec<Option<&ThrusterMetrics>> = match self.kinetics {
            Some(_) => sources
                .iter()
                .map(|s| self.catalog.metrics_for(s.slot).map(Some))
                .collect::<Result<_, _>>()?,
            None => vec![None; sources.len()],
        };

        let per_face: Vec<FaceImpact> = self
            .mesh
            .faces()
            .par_iter()
            .map(|face| self.face_impact(face, &sources, &metrics))
            .collect();

        let strike_counts = per_face.iter().map(|f| f.strikes).collect();
        let loads = self.kinetics.map(|_| FiringLoads {
            pressure: per_face.iter().map(|f| f.pressure).collect(),
            shear: per_face.iter().map(|f| f.shear).collect(),
            heat_flux_rate: per_face.iter().map(|f| f.heat_flux_rate).collect(),
            heat_flux_load: per_face
                .iter()
                .map(|f| f.heat_flux_rate * firing.duration_s)
                .collect(),
        });

        Ok(FiringImpact { strike_counts, loads })
    }

    fn face_impact(
        &self,
        face: &Face,
        sources: &[PlumeSource],
        metrics: &[Option<&ThrusterMetrics>],
    ) -> FaceImpact {
        let mut impact = FaceImpact::default();
        for (source, metrics) in sources.iter().zip(metrics) {
            let Some(axis) = source.axis else { continue };
            let Some(hit) = strike_geometry(&self.cone, &source.exit, &axis, face) else {
                continue;
            };
            impact.strikes += 1;
            if let (Some(model), Some(metrics)) = (self.kinetics, metrics) {
                let load = model.evaluate(hit.distance_m, hit.theta_rad, metrics, &self.surface);
                impact.pressure += load.pressure_pa;
                impact.shear += load.shear_pa.abs();
                impact.heat_flux_rate += load.heat_flux_w_m2;
            }
        }
        impact
    }
}
