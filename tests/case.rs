use std::fs;
use std::path::Path;

use rpod_analysis::config::{ConfigError, KineticsSelection};
use rpod_analysis::impingement::{
    CaseDirectorySink, CaseError, ImpingementError, Verdict, ViolationKind, load_case,
};
use rpod_analysis::mesh::{SurfaceMesh, stl};

const IDENTITY_YAML: &str = "[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]";

fn manifest(kinetics: &str, check_constraints: bool, jfh: &str) -> String {
    format!(
        r#"[plume]
radius = 1.0
wedge_theta = 0.5

[pm]
kinetics = "{kinetics}"

[tv]
check_constraints = {check_constraints}
surface_temp = 300.0
sigma = 1.0
normal_pressure = 1.0e-6
shear_pressure = 1.0e9
heat_flux = 1.0e12
normal_pressure_load = 1.0e9
heat_flux_load = 1.0e12
normal_pressure_window_size = 10.0
heat_flux_window_size = 10.0

[stl]
tv = "target.stl"

[jfh]
file = "{jfh}"

[vv]
thrusters = "thrusters.yaml"
metrics = "metrics.yaml"
"#
    )
}

/// Two facets: one facing the origin at x = 0.5, one out of reach at x = 3.
const TARGET_STL: &str = "solid target
  facet normal -1 0 0
    outer loop
      vertex 0.5 -0.05 -0.05
      vertex 0.5 -0.05 0.1
      vertex 0.5 0.1 -0.05
    endloop
  endfacet
  facet normal -1 0 0
    outer loop
      vertex 3.0 -0.05 -0.05
      vertex 3.0 -0.05 0.1
      vertex 3.0 0.1 -0.05
    endloop
  endfacet
endsolid target
";

const METRICS_YAML: &str = "R4D:
  d: 0.05
  ve: 2000.0
  R: 300.0
  gamma: 1.3
  Te: 300.0
  n: 1.0e22
  thrust: 490.0
";

fn write_case(dir: &Path, kinetics: &str, check_constraints: bool) {
    fs::write(dir.join("config.toml"), manifest(kinetics, check_constraints, "jfh.yaml"))
        .expect("manifest");
    fs::write(dir.join("target.stl"), TARGET_STL).expect("stl");
    fs::write(
        dir.join("thrusters.yaml"),
        format!("- name: F1\n  type: R4D\n  dcm: {IDENTITY_YAML}\n  exit: [0.0, 0.0, 0.0]\n"),
    )
    .expect("thrusters");
    fs::write(dir.join("metrics.yaml"), METRICS_YAML).expect("metrics");
    fs::write(
        dir.join("jfh.yaml"),
        format!(
            "- t: 2.0\n  xyz: [0.0, 0.0, 0.0]\n  dcm: {IDENTITY_YAML}\n  thrusters: [1]\n\
             - t: 1.0\n  xyz: [-0.2, 0.05, 0.0]\n  dcm: {IDENTITY_YAML}\n  thrusters: [F1]\n"
        ),
    )
    .expect("jfh");
}

#[test]
fn case_directory_loads_every_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified", true);

    let case = load_case(dir.path()).expect("case");
    assert_eq!(case.mesh.len(), 2);
    assert_eq!(case.catalog.len(), 1);
    assert_eq!(case.sequence.len(), 2);
    assert_eq!(case.sequence.total_duration_s(), 3.0);
    assert_eq!(case.config.pm.kinetics, KineticsSelection::Simplified);
    assert_eq!(case.kinetics.as_ref().map(|k| k.name()), Some("Simplified"));
    let limits = case.settings.constraints.expect("limits");
    assert_eq!(limits.pressure_pa, 1.0e-6);
    assert_eq!(limits.heat_flux_load_window.window_size_s, 10.0);
    assert_eq!(case.results_dir(), dir.path().join("results"));
}

#[test]
fn firing_history_may_be_toml() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "None", false);
    fs::write(
        dir.path().join("config.toml"),
        manifest("None", false, "jfh.toml"),
    )
    .expect("manifest");
    fs::write(
        dir.path().join("jfh.toml"),
        "[[firing]]\nt = 1.5\nxyz = [0.0, 0.0, 0.0]\n\
         dcm = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]\nthrusters = [\"F1\", 1]\n",
    )
    .expect("jfh");

    let case = load_case(dir.path()).expect("case");
    assert_eq!(case.sequence.len(), 1);
    assert_eq!(case.sequence.firings()[0].thrusters.len(), 2);
    assert!(case.kinetics.is_none());
}

#[test]
fn incomplete_firing_record_names_its_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "None", false);
    fs::write(
        dir.path().join("jfh.yaml"),
        format!(
            "- t: 2.0\n  xyz: [0.0, 0.0, 0.0]\n  dcm: {IDENTITY_YAML}\n  thrusters: [1]\n\
             - t: 1.0\n  dcm: {IDENTITY_YAML}\n  thrusters: [1]\n"
        ),
    )
    .expect("jfh");

    let err = load_case(dir.path()).expect_err("missing xyz");
    assert!(matches!(
        err,
        CaseError::Config(ConfigError::MalformedFiring {
            index: 1,
            field: "xyz"
        })
    ));
}

#[test]
fn invalid_manifest_values_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified", true);
    let manifest =
        manifest("Simplified", true, "jfh.yaml").replace("radius = 1.0", "radius = -1.0");
    fs::write(dir.path().join("config.toml"), manifest).expect("manifest");

    let err = load_case(dir.path()).expect_err("negative radius");
    assert!(matches!(
        err,
        CaseError::Config(ConfigError::Invalid {
            field: "plume.radius",
            ..
        })
    ));
}

#[test]
fn enabled_constraints_need_every_limit() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified", true);
    let manifest =
        manifest("Simplified", true, "jfh.yaml").replace("heat_flux_load = 1.0e12\n", "");
    fs::write(dir.path().join("config.toml"), manifest).expect("manifest");

    let err = load_case(dir.path()).expect_err("missing heat flux load limit");
    assert!(err.to_string().contains("tv.heat_flux_load"), "{err}");
}

#[test]
fn strike_only_case_ignores_missing_limits() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "None", true);
    let manifest = manifest("None", true, "jfh.yaml").replace("normal_pressure = 1.0e-6\n", "");
    fs::write(dir.path().join("config.toml"), manifest).expect("manifest");

    let case = load_case(dir.path()).expect("case");
    assert!(case.settings.constraints.is_none());
}

#[test]
fn unphysical_metrics_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified", false);
    fs::write(
        dir.path().join("metrics.yaml"),
        METRICS_YAML.replace("gamma: 1.3", "gamma: 0.9"),
    )
    .expect("metrics");

    let err = load_case(dir.path()).expect_err("gamma below one");
    assert!(matches!(err, CaseError::Invalid { .. }), "{err}");
}

#[test]
fn unknown_thruster_fails_the_run_at_its_firing() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "None", false);
    fs::write(
        dir.path().join("jfh.yaml"),
        format!(
            "- t: 2.0\n  xyz: [0.0, 0.0, 0.0]\n  dcm: {IDENTITY_YAML}\n  thrusters: [1]\n\
             - t: 1.0\n  xyz: [0.0, 0.0, 0.0]\n  dcm: {IDENTITY_YAML}\n  thrusters: [F9]\n"
        ),
    )
    .expect("jfh");

    let case = load_case(dir.path()).expect("case");
    let mut engine = case.engine().expect("engine");
    let results = case.results_dir();
    let mut sink = CaseDirectorySink::create(&results, &case.name).expect("sink");
    let err = engine.run(&case.sequence, &mut sink).expect_err("unknown thruster");
    assert!(matches!(
        err,
        ImpingementError::MalformedFiring { index: 1, .. }
    ));
    assert!(results.join("strikes").join("firing-0.vtu").exists());
    assert!(!results.join("strikes").join("firing-1.vtu").exists());
}

#[test]
fn run_writes_meshes_history_and_violation_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified", true);
    let case = load_case(dir.path()).expect("case");
    let mut engine = case.engine().expect("engine");
    let results = case.results_dir();
    let mut sink = CaseDirectorySink::create(&results, &case.name)
        .expect("sink")
        .with_checkpoints(true);

    let summary = engine.run(&case.sequence, &mut sink).expect("run");
    let record = match summary.verdict {
        Verdict::Violated(record) => record,
        other => panic!("expected a violation, got {other:?}"),
    };
    assert_eq!(record.kind, ViolationKind::Pressure);
    assert_eq!((record.cell_index, record.firing_index), (0, 0));

    let vtu = fs::read_to_string(results.join("strikes/firing-0.vtu")).expect("vtu");
    for field in ["strikes", "cum_strikes", "pressures", "max_shears", "cum_heat_flux_load"] {
        assert!(vtu.contains(&format!("Name=\"{field}\"")), "missing {field}");
    }
    assert!(vtu.contains("NumberOfCells=\"2\""));
    assert!(results.join("strikes/firing-1.vtu").exists());

    let report = fs::read_to_string(results.join("impingement_report.txt")).expect("report");
    assert!(report.contains("Pressure constraint failed at cell #0 during firing 0."));

    let history = fs::read_to_string(results.join("strike_history.csv")).expect("history");
    let lines: Vec<&str> = history.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("firing,duration_s,"));

    let state = CaseDirectorySink::read_checkpoint(&results).expect("checkpoint");
    assert_eq!(state.next_firing, 2);
    assert_eq!(state.first_violation, Some(record));
}

#[test]
fn strike_only_run_reports_no_constraint_evaluation() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "None", true);
    let case = load_case(dir.path()).expect("case");
    let mut engine = case.engine().expect("engine");
    let results = case.results_dir();
    let mut sink = CaseDirectorySink::create(&results, &case.name).expect("sink");
    engine.run(&case.sequence, &mut sink).expect("run");

    let vtu = fs::read_to_string(results.join("strikes/firing-0.vtu")).expect("vtu");
    assert!(vtu.contains("Name=\"strikes\""));
    assert!(!vtu.contains("pressures"));
    assert!(!vtu.contains("heat_flux"));

    let report = fs::read_to_string(results.join("impingement_report.txt")).expect("report");
    assert!(report.contains("Constraint evaluation not performed"));
    assert!(!report.contains("failed"));
    assert!(!results.join("checkpoint.json").exists());
}

#[test]
fn unwritable_results_abort_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified", true);
    let case = load_case(dir.path()).expect("case");
    let results = case.results_dir();
    fs::create_dir_all(&results).expect("results dir");
    fs::write(results.join("strikes"), "not a directory").expect("blocker");

    let mut engine = case.engine().expect("engine");
    let mut sink = CaseDirectorySink::create(&results, &case.name).expect("sink");
    let err = engine.run(&case.sequence, &mut sink).expect_err("persistence failure");
    assert!(matches!(err, ImpingementError::Sink(_)), "{err}");
    assert!(!results.join("impingement_report.txt").exists());
}

#[test]
fn resuming_from_an_older_checkpoint_rewrites_later_history_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified", true);
    let case = load_case(dir.path()).expect("case");
    let results = case.results_dir();

    let mut full = case.engine().expect("engine");
    let mut sink = CaseDirectorySink::create(&results, &case.name).expect("sink");
    full.run(&case.sequence, &mut sink).expect("full run");

    // Checkpoint after the first firing only, as if later checkpoints were never written.
    let mut partial = case.engine().expect("engine");
    partial.step(&case.sequence.firings()[0]).expect("step");
    let stale = partial.checkpoint();

    let mut resumed = case.engine().expect("engine");
    resumed.restore(stale).expect("restore");
    let mut sink = CaseDirectorySink::resume(&results, &case.name, 1).expect("resume sink");
    let summary = resumed.run(&case.sequence, &mut sink).expect("resumed run");
    assert_eq!(summary.processed, 1);

    let history = fs::read_to_string(results.join("strike_history.csv")).expect("history");
    let firings: Vec<&str> = history
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().expect("firing column"))
        .collect();
    assert!(history.starts_with("firing,duration_s,"));
    assert_eq!(firings, ["0", "1"]);
}

#[test]
fn binary_and_ascii_stl_agree() {
    let ascii = stl::parse(TARGET_STL.as_bytes()).expect("ascii");

    let mut bytes = vec![0_u8; 80];
    bytes.extend_from_slice(&(ascii.len() as u32).to_le_bytes());
    for triangle in &ascii {
        bytes.extend_from_slice(&[0_u8; 12]);
        for vertex in triangle {
            for coord in vertex {
                bytes.extend_from_slice(&(*coord as f32).to_le_bytes());
            }
        }
        bytes.extend_from_slice(&[0_u8; 2]);
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("target_bin.stl");
    fs::write(&path, &bytes).expect("write stl");
    let binary = SurfaceMesh::from_stl(&path).expect("binary mesh");
    let reference = SurfaceMesh::from_triangles(ascii).expect("ascii mesh");

    assert_eq!(binary.len(), reference.len());
    for (a, b) in binary.faces().iter().zip(reference.faces()) {
        for axis in 0..3 {
            assert!((a.centroid[axis] - b.centroid[axis]).abs() < 1e-6);
            assert!((a.normal[axis] - b.normal[axis]).abs() < 1e-6);
        }
    }
    assert!((reference.faces()[0].normal[0] + 1.0).abs() < 1e-12);

    bytes.truncate(bytes.len() - 10);
    assert!(stl::parse_binary(&bytes).is_err());
}
