//! Writers for impingement artifacts: per-firing VTK meshes, the textual
//! impingement report, the per-firing CSV history and JSON checkpoints.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while persisting artifacts. Always fatal for a run.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV history I/O failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    fn io(path: &Path, source: io::Error) -> Self {
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Create a buffered writer for the target path, creating parent directories as needed.
pub fn writer_for_path(path: &Path) -> Result<BufWriter<File>, ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
        }
    }
    let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
    Ok(BufWriter::new(file))
}

pub mod vtu {
    use std::io::Write;
    use std::path::Path;

    use rpod_mesh::SurfaceMesh;

    use super::{ExportError, writer_for_path};

    /// VTK cell type for a linear triangle.
    const VTK_TRIANGLE: u8 = 5;

    /// Named per-cell scalar array.
    #[derive(Debug, Clone, Copy)]
    pub enum CellField<'a> {
        Float(&'a str, &'a [f64]),
        Count(&'a str, &'a [u64]),
    }

    impl CellField<'_> {
        pub fn name(&self) -> &str {
            match self {
                CellField::Float(name, _) | CellField::Count(name, _) => name,
            }
        }

        fn len(&self) -> usize {
            match self {
                CellField::Float(_, values) => values.len(),
                CellField::Count(_, values) => values.len(),
            }
        }
    }

    /// Write an ASCII VTK UnstructuredGrid with one triangle per face and the given cell data.
    pub fn write_cell_data(
        path: &Path,
        mesh: &SurfaceMesh,
        fields: &[CellField<'_>],
    ) -> Result<(), ExportError> {
        let mut out = writer_for_path(path)?;
        render(&mut out, mesh, fields).map_err(|e| ExportError::io(path, e))?;
        out.flush().map_err(|e| ExportError::io(path, e))
    }

    fn render(
        out: &mut dyn Write,
        mesh: &SurfaceMesh,
        fields: &[CellField<'_>],
    ) -> std::io::Result<()> {
        let cells = mesh.len();
        for field in fields {
            if field.len() != cells {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!(
                        "field `{}` has {} values for {} cells",
                        field.name(),
                        field.len(),
                        cells
                    ),
                ));
            }
        }

        writeln!(out, r#"<?xml version="1.0"?>"#)?;
        writeln!(
            out,
            r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
        )?;
        writeln!(out, "  <UnstructuredGrid>")?;
        writeln!(
            out,
            r#"    <Piece NumberOfPoints="{}" NumberOfCells="{}">"#,
            cells * 3,
            cells
        )?;

        writeln!(out, "      <Points>")?;
        writeln!(
            out,
            r#"        <DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
        )?;
        for face in mesh.faces() {
            for v in &face.vertices {
                writeln!(out, "          {:e} {:e} {:e}", v[0], v[1], v[2])?;
            }
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Points>")?;

        writeln!(out, "      <Cells>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int64" Name="connectivity" format="ascii">"#
        )?;
        for cell in 0..cells {
            let base = cell * 3;
            writeln!(out, "          {} {} {}", base, base + 1, base + 2)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="Int64" Name="offsets" format="ascii">"#
        )?;
        for cell in 0..cells {
            writeln!(out, "          {}", (cell + 1) * 3)?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(
            out,
            r#"        <DataArray type="UInt8" Name="types" format="ascii">"#
        )?;
        for _ in 0..cells {
            writeln!(out, "          {VTK_TRIANGLE}")?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Cells>")?;

        writeln!(out, "      <CellData>")?;
        for field in fields {
            match field {
                CellField::Float(name, values) => {
                    writeln!(
                        out,
                        r#"        <DataArray type="Float64" Name="{name}" format="ascii">"#
                    )?;
                    for value in values.iter() {
                        writeln!(out, "          {value:e}")?;
                    }
                }
                CellField::Count(name, values) => {
                    writeln!(
                        out,
                        r#"        <DataArray type="UInt64" Name="{name}" format="ascii">"#
                    )?;
                    for value in values.iter() {
                        writeln!(out, "          {value}")?;
                    }
                }
            }
            writeln!(out, "        </DataArray>")?;
        }
        writeln!(out, "      </CellData>")?;

        writeln!(out, "    </Piece>")?;
        writeln!(out, "  </UnstructuredGrid>")?;
        writeln!(out, "</VTKFile>")
    }
}

pub mod report {
    use std::io::Write;
    use std::path::Path;

    use super::{ExportError, writer_for_path};

    /// First constraint violation found in a run.
    #[derive(Debug, Clone)]
    pub struct Finding<'a> {
        /// Human-readable quantity label, e.g. "Pressure window".
        pub quantity: &'a str,
        pub unit: &'a str,
        pub cell: usize,
        pub observed: f64,
        pub limit: f64,
        pub firing: usize,
    }

    #[derive(Debug, Clone)]
    pub enum Outcome<'a> {
        AllMet,
        Violated(Finding<'a>),
        NotEvaluated { reason: &'a str },
    }

    /// Header statistics printed above the verdict.
    #[derive(Debug, Clone)]
    pub struct Summary<'a> {
        pub case_name: &'a str,
        pub kinetics: &'a str,
        pub firings: usize,
        pub faces: usize,
        pub struck_faces: usize,
    }

    pub fn write_report(
        path: &Path,
        summary: &Summary<'_>,
        outcome: &Outcome<'_>,
    ) -> Result<(), ExportError> {
        let mut out = writer_for_path(path)?;
        render(&mut out, summary, outcome).map_err(|e| ExportError::io(path, e))?;
        out.flush().map_err(|e| ExportError::io(path, e))
    }

    /// Render the report body to any writer.
    pub fn render(
        out: &mut dyn Write,
        summary: &Summary<'_>,
        outcome: &Outcome<'_>,
    ) -> std::io::Result<()> {
        writeln!(out, "Impingement report: {}", summary.case_name)?;
        writeln!(out, "Plume kinetics: {}", summary.kinetics)?;
        writeln!(out, "Firings processed: {}", summary.firings)?;
        writeln!(
            out,
            "Faces struck at least once: {} of {}",
            summary.struck_faces, summary.faces
        )?;
        writeln!(out)?;
        match outcome {
            Outcome::AllMet => writeln!(out, "All impingement constraints met."),
            Outcome::Violated(finding) => {
                writeln!(
                    out,
                    "{} constraint failed at cell #{} during firing {}.",
                    finding.quantity, finding.cell, finding.firing
                )?;
                writeln!(
                    out,
                    "{} reached {:e} {} (limit {:e} {}).",
                    finding.quantity, finding.observed, finding.unit, finding.limit, finding.unit
                )
            }
            Outcome::NotEvaluated { reason } => {
                writeln!(out, "Constraint evaluation not performed: {reason}.")
            }
        }
    }
}

pub mod history {
    use std::path::Path;

    use serde::{Deserialize, Serialize};

    use super::{ExportError, writer_for_path};

    /// One CSV row per processed firing.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct HistoryRow {
        pub firing: usize,
        pub duration_s: f64,
        pub active_thrusters: usize,
        pub struck_faces: usize,
        pub cumulative_strikes: u64,
        pub peak_pressure_pa: f64,
        pub peak_heat_flux_load_j_m2: f64,
    }

    /// Streaming CSV writer; the header is emitted with the first row.
    pub struct HistoryWriter {
        inner: csv::Writer<std::io::BufWriter<std::fs::File>>,
    }

    impl HistoryWriter {
        pub fn create(path: &Path) -> Result<Self, ExportError> {
            let file = writer_for_path(path)?;
            Ok(Self {
                inner: csv::Writer::from_writer(file),
            })
        }

        /// Reopen an existing history for a run resuming at `next_firing`.
        ///
        /// Rows for firings at or past `next_firing` are dropped; they belong to
        /// work the checkpoint does not cover and will be written again.
        pub fn resume(path: &Path, next_firing: usize) -> Result<Self, ExportError> {
            let kept = if path.exists() {
                read_rows(path)?
                    .into_iter()
                    .filter(|row| row.firing < next_firing)
                    .collect()
            } else {
                Vec::new()
            };
            let mut writer = Self::create(path)?;
            for row in &kept {
                writer.write(row)?;
            }
            Ok(writer)
        }

        pub fn write(&mut self, row: &HistoryRow) -> Result<(), ExportError> {
            self.inner.serialize(row)?;
            self.inner.flush().map_err(csv::Error::from)?;
            Ok(())
        }
    }

    pub fn read_rows(path: &Path) -> Result<Vec<HistoryRow>, ExportError> {
        let mut reader = csv::Reader::from_path(path)?;
        Ok(reader.deserialize().collect::<Result<Vec<HistoryRow>, _>>()?)
    }
}

pub mod checkpoint {
    use std::io::{BufReader, Write};
    use std::path::Path;

    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use super::{ExportError, writer_for_path};

    /// Write `value` as JSON via a sibling temp file, replacing `path` only once complete.
    pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
        let staging = path.with_extension("json.partial");
        {
            let mut out = writer_for_path(&staging)?;
            serde_json::to_writer(&mut out, value)?;
            out.flush().map_err(|e| ExportError::io(&staging, e))?;
        }
        std::fs::rename(&staging, path).map_err(|e| ExportError::io(path, e))
    }

    pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ExportError> {
        let file = std::fs::File::open(path).map_err(|e| ExportError::io(path, e))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
