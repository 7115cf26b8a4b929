//! RPOD plume-impingement analysis.
//!
//! The member crates carry the actual logic; this library re-exports them so
//! the `impingement` binary and the integration tests share one entry point.

pub use rpod_config as config;
pub use rpod_core as primitives;
pub use rpod_export as export;
pub use rpod_impingement as impingement;
pub use rpod_kinetics as kinetics;
pub use rpod_mesh as mesh;
pub use rpod_vehicle as vehicle;

/// Returns the version of the library for smoke tests.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
