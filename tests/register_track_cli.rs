//! Tests for the `register-track` binary.

use std::fs;
use std::process::Command;

use tempfile::TempDir;
use track_overlay::{project, unproject, TransformConfig};

const BIN: &str = env!("CARGO_BIN_EXE_register-track");

fn write_inputs(dir: &TempDir) {
    let origin = project(-1.0169, 52.0786);
    let corners = [(0.0, 0.0), (400.0, 0.0), (400.0, 150.0), (150.0, 300.0), (0.0, 250.0)];
    let coordinates: Vec<[f64; 2]> = corners
        .iter()
        .chain(std::iter::once(&corners[0]))
        .map(|&(x, y)| {
            let g = unproject(origin.x + x, origin.y + y);
            [g.lon, g.lat]
        })
        .collect();

    let geo = serde_json::json!({
        "features": [{"geometry": {"coordinates": coordinates}}]
    });
    let points = serde_json::json!({
        "X": corners.iter().map(|c| c.0).collect::<Vec<_>>(),
        "Y": corners.iter().map(|c| c.1).collect::<Vec<_>>(),
    });
    fs::write(dir.path().join("track.geojson"), geo.to_string()).unwrap();
    fs::write(dir.path().join("corners.json"), points.to_string()).unwrap();
}

#[test]
fn test_writes_transform_file() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);
    let out = dir.path().join("transform.json");

    let status = Command::new(BIN)
        .arg("--corners")
        .arg(dir.path().join("corners.json"))
        .arg("--geo")
        .arg(dir.path().join("track.geojson"))
        .arg("--out")
        .arg(&out)
        .args(["--notes", "cli test"])
        .status()
        .unwrap();
    assert!(status.success());

    let config = TransformConfig::load(&out).unwrap();
    assert_eq!(config.corners_count, 5);
    assert_eq!(config.notes, "cli test");
    assert!((config.transform.s - 1.0).abs() < 1e-6);
}

#[test]
fn test_missing_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);
    let missing = dir.path().join("no_such_corners.json");

    let output = Command::new(BIN)
        .arg("--corners")
        .arg(&missing)
        .arg("--geo")
        .arg(dir.path().join("track.geojson"))
        .arg("--out")
        .arg(dir.path().join("transform.json"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no_such_corners.json"), "stderr: {}", stderr);
    assert!(!dir.path().join("transform.json").exists());
}

#[test]
fn test_empty_inputs_name_the_file() {
    let dir = TempDir::new().unwrap();
    write_inputs(&dir);

    let cases = [
        ("blank_corners.json", ""),
        ("no_corners.json", r#"{"X": [], "Y": []}"#),
    ];
    for (name, contents) in cases {
        fs::write(dir.path().join(name), contents).unwrap();
        let output = Command::new(BIN)
            .arg("--corners")
            .arg(dir.path().join(name))
            .arg("--geo")
            .arg(dir.path().join("track.geojson"))
            .arg("--out")
            .arg(dir.path().join("transform.json"))
            .output()
            .unwrap();

        assert!(!output.status.success(), "{} should be rejected", name);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains(name), "stderr: {}", stderr);
    }

    fs::write(dir.path().join("blank.geojson"), "").unwrap();
    let output = Command::new(BIN)
        .arg("--corners")
        .arg(dir.path().join("corners.json"))
        .arg("--geo")
        .arg(dir.path().join("blank.geojson"))
        .arg("--out")
        .arg(dir.path().join("transform.json"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("blank.geojson"));
    assert!(!dir.path().join("transform.json").exists());
}
