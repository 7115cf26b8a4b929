use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_case(dir: &Path, kinetics: &str) {
    fs::write(
        dir.join("config.toml"),
        format!(
            r#"[plume]
radius = 1.0
wedge_theta = 0.5

[pm]
kinetics = "{kinetics}"

[tv]
check_constraints = true
normal_pressure = 1.0e9
shear_pressure = 1.0e9
heat_flux = 1.0e12
normal_pressure_load = 1.0e9
heat_flux_load = 1.0e12
normal_pressure_window_size = 5.0
heat_flux_window_size = 5.0

[stl]
tv = "target.stl"

[jfh]
file = "jfh.toml"

[vv]
thrusters = "thrusters.toml"
metrics = "metrics.toml"
"#
        ),
    )
    .expect("manifest");
    fs::write(
        dir.join("target.stl"),
        "solid t\nfacet normal -1 0 0\nouter loop\n\
         vertex 0.5 -0.05 -0.05\nvertex 0.5 -0.05 0.1\nvertex 0.5 0.1 -0.05\n\
         endloop\nendfacet\nendsolid t\n",
    )
    .expect("stl");
    fs::write(
        dir.join("thrusters.toml"),
        "[[thruster]]\nname = \"F1\"\ntype = \"R4D\"\n\
         dcm = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]\nexit = [0.0, 0.0, 0.0]\n",
    )
    .expect("thrusters");
    fs::write(
        dir.join("metrics.toml"),
        "[R4D]\nd = 0.05\nve = 2000.0\nR = 300.0\ngamma = 1.3\nTe = 300.0\nn = 1.0e22\n",
    )
    .expect("metrics");
    let firing = "[[firing]]\nt = 1.0\nxyz = [0.0, 0.0, 0.0]\n\
                  dcm = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]\nthrusters = [1]\n";
    fs::write(dir.join("jfh.toml"), firing.repeat(3)).expect("jfh");
}

#[test]
fn impingement_cli_reports_compliant_case() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified");

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .args(["--case", dir.path().to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 firings, 1 of 1 faces struck"))
        .stdout(predicate::str::contains("all impingement constraints met"));

    let report =
        fs::read_to_string(dir.path().join("results/impingement_report.txt")).expect("report");
    assert!(report.contains("All impingement constraints met."));
    assert!(dir.path().join("results/strikes/firing-2.vtu").exists());
    assert!(!dir.path().join("results/checkpoint.json").exists());
}

#[test]
fn impingement_cli_strike_only_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "None");

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .args(["--case", dir.path().to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("constraint evaluation not performed"));
}

#[test]
fn impingement_cli_resumes_from_checkpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified");
    let case = dir.path().to_str().expect("utf8 path");

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .args(["--case", case, "--checkpoint"])
        .assert()
        .success();
    let checkpoint = dir.path().join("results/checkpoint.json");
    assert!(checkpoint.exists());

    // Extend the history by one firing and pick up where the first run stopped.
    let jfh = dir.path().join("jfh.toml");
    let mut history = fs::read_to_string(&jfh).expect("jfh");
    history.push_str(
        "[[firing]]\nt = 1.0\nxyz = [0.0, 0.0, 0.0]\n\
         dcm = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]\nthrusters = [\"F1\"]\n",
    );
    fs::write(&jfh, history).expect("extend jfh");

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .args(["--case", case, "--resume"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 firings"));

    assert!(dir.path().join("results/strikes/firing-3.vtu").exists());
    let history =
        fs::read_to_string(dir.path().join("results/strike_history.csv")).expect("history");
    assert_eq!(history.lines().count(), 5);
}

#[test]
fn impingement_cli_honours_rust_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified");

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .env("RUST_LOG", "debug")
        .args(["--case", dir.path().to_str().expect("utf8 path")])
        .assert()
        .success()
        .stderr(predicate::str::contains("processed firing"));

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .env_remove("RUST_LOG")
        .args(["--case", dir.path().to_str().expect("utf8 path")])
        .assert()
        .success()
        .stderr(predicate::str::contains("processed firing").not());
}

#[test]
fn impingement_cli_fails_when_results_cannot_be_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified");
    fs::create_dir_all(dir.path().join("results")).expect("results dir");
    fs::write(dir.path().join("results/strikes"), "not a directory").expect("blocker");

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .args(["--case", dir.path().to_str().expect("utf8 path")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("results/strikes"));
}

#[test]
fn impingement_cli_repeated_resume_keeps_one_history_row_per_firing() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_case(dir.path(), "Simplified");
    let case = dir.path().to_str().expect("utf8 path");

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .args(["--case", case, "--checkpoint"])
        .assert()
        .success();

    let jfh = dir.path().join("jfh.toml");
    let mut history = fs::read_to_string(&jfh).expect("jfh");
    history.push_str(
        "[[firing]]\nt = 1.0\nxyz = [0.0, 0.0, 0.0]\n\
         dcm = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]\nthrusters = [1]\n",
    );
    fs::write(&jfh, history).expect("extend jfh");

    // Without --checkpoint the stored state stays at firing 3, so both resumes replay firing 3.
    for _ in 0..2 {
        Command::cargo_bin("impingement")
            .expect("impingement bin")
            .args(["--case", case, "--resume"])
            .assert()
            .success();
    }

    let history =
        fs::read_to_string(dir.path().join("results/strike_history.csv")).expect("history");
    assert_eq!(history.lines().count(), 5);
}

#[test]
fn impingement_cli_fails_without_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");

    Command::cargo_bin("impingement")
        .expect("impingement bin")
        .args(["--case", dir.path().to_str().expect("utf8 path")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load case"));
}
