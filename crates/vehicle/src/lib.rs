//! Visiting-vehicle thruster catalog and jet firing history (JFH) models.

use std::collections::BTreeMap;
use std::fmt;

use rpod_core::dcm::Matrix3;
use rpod_core::vector::Vector3;
use thiserror::Error;

/// Kinetic parameters for one thruster type, consumed by plume models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrusterMetrics {
    pub exit_diameter_m: f64,
    pub exit_velocity_m_s: f64,
    pub gas_constant_j_kg_k: f64,
    pub gamma: f64,
    pub exit_temperature_k: f64,
    pub exit_number_density_m3: f64,
    pub thrust_n: Option<f64>,
    pub mass_flow_kg_s: Option<f64>,
}

/// One thruster on the visiting vehicle.
#[derive(Debug, Clone)]
pub struct Thruster {
    pub name: String,
    /// Type key into the metrics table.
    pub kind: String,
    /// Thruster frame to vehicle frame.
    pub dcm: Matrix3,
    /// Exit position offset in the vehicle frame (m).
    pub exit: Vector3,
}

/// Reference to a thruster as it appears in a firing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrusterRef {
    /// 1-based position in the catalog.
    Index(u32),
    Name(String),
}

impl fmt::Display for ThrusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrusterRef::Index(i) => write!(f, "#{i}"),
            ThrusterRef::Name(name) => write!(f, "`{name}`"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("thruster catalog is empty")]
    Empty,
    #[error("duplicate thruster name `{0}`")]
    DuplicateName(String),
    #[error("thruster {0} not found in catalog")]
    UnknownThruster(ThrusterRef),
    #[error("no thruster in catalog slot {0}")]
    UnknownSlot(usize),
    #[error("no metrics for thruster type `{kind}` (thruster `{thruster}`)")]
    MissingMetrics { thruster: String, kind: String },
}

/// Read-only thruster catalog shared across all firings.
#[derive(Debug, Clone)]
pub struct ThrusterCatalog {
    thrusters: Vec<Thruster>,
    by_name: BTreeMap<String, usize>,
    metrics: BTreeMap<String, ThrusterMetrics>,
}

impl ThrusterCatalog {
    pub fn new(
        thrusters: Vec<Thruster>,
        metrics: BTreeMap<String, ThrusterMetrics>,
    ) -> Result<Self, CatalogError> {
        if thrusters.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut by_name = BTreeMap::new();
        for (slot, thruster) in thrusters.iter().enumerate() {
            if by_name.insert(thruster.name.clone(), slot).is_some() {
                return Err(CatalogError::DuplicateName(thruster.name.clone()));
            }
        }
        Ok(Self {
            thrusters,
            by_name,
            metrics,
        })
    }

    pub fn len(&self) -> usize {
        self.thrusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thrusters.is_empty()
    }

    pub fn thrusters(&self) -> &[Thruster] {
        &self.thrusters
    }

    /// Resolve a firing reference to a zero-based catalog slot.
    ///
    /// A name made only of digits that matches no thruster name is read as a
    /// 1-based position, so `"2"` and `2` refer to the same thruster.
    pub fn resolve(&self, reference: &ThrusterRef) -> Result<usize, CatalogError> {
        let slot = match reference {
            ThrusterRef::Index(i) => self.position(*i),
            ThrusterRef::Name(name) => self.by_name.get(name).copied().or_else(|| {
                if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                name.parse().ok().and_then(|i| self.position(i))
            }),
        };
        slot.ok_or_else(|| CatalogError::UnknownThruster(reference.clone()))
    }

    fn position(&self, index: u32) -> Option<usize> {
        (index as usize)
            .checked_sub(1)
            .filter(|slot| *slot < self.thrusters.len())
    }

    /// Metrics for the thruster in `slot`.
    pub fn metrics_for(&self, slot: usize) -> Result<&ThrusterMetrics, CatalogError> {
        let thruster = self
            .thrusters
            .get(slot)
            .ok_or(CatalogError::UnknownSlot(slot))?;
        self.metrics
            .get(&thruster.kind)
            .ok_or_else(|| CatalogError::MissingMetrics {
                thruster: thruster.name.clone(),
                kind: thruster.kind.clone(),
            })
    }

    /// Fail unless every thruster type has a metrics entry.
    pub fn require_metrics(&self) -> Result<(), CatalogError> {
        (0..self.thrusters.len())
            .try_for_each(|slot| self.metrics_for(slot).map(|_| ()))
    }
}

/// One entry of the jet firing history.
#[derive(Debug, Clone)]
pub struct Firing {
    /// Firing duration (s).
    pub duration_s: f64,
    /// Visiting-vehicle position in the target frame (m).
    pub position: Vector3,
    /// Visiting-vehicle orientation as recorded in the JFH.
    pub dcm: Matrix3,
    pub thrusters: Vec<ThrusterRef>,
}

/// Ordered jet firing history; replay order is load-bearing.
#[derive(Debug, Clone, Default)]
pub struct FiringSequence {
    firings: Vec<Firing>,
}

impl FiringSequence {
    pub fn new(firings: Vec<Firing>) -> Self {
        Self { firings }
    }

    pub fn len(&self) -> usize {
        self.firings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firings.is_empty()
    }

    pub fn firings(&self) -> &[Firing] {
        &self.firings
    }

    /// Sum of all firing durations (s).
    pub fn total_duration_s(&self) -> f64 {
        self.firings.iter().map(|f| f.duration_s).sum()
    }
}

impl From<Vec<Firing>> for FiringSequence {
    fn from(firings: Vec<Firing>) -> Self {
        Self::new(firings)
    }
}
