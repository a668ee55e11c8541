use assert_cmd::Command;

#[test]
fn status_on_an_empty_project_reports_an_empty_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::cargo_bin("pao")
        .expect("binary built")
        .arg("status")
        .arg(dir.path())
        .output()
        .expect("ran pao status");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("store is empty"));
}

#[test]
fn init_then_status_reports_the_seeded_features() {
    let dir = tempfile::tempdir().expect("tempdir");
    let seed_path = dir.path().join("seed.json");
    std::fs::write(
        &seed_path,
        r#"[
            {"name": "alpha", "category": "core"},
            {"name": "beta", "category": "core", "depends_on": ["alpha"]}
        ]"#,
    )
    .expect("write seed file");

    Command::cargo_bin("pao")
        .expect("binary built")
        .arg("init")
        .arg(dir.path())
        .arg("--from")
        .arg(&seed_path)
        .assert()
        .success();

    let output = Command::cargo_bin("pao")
        .expect("binary built")
        .arg("status")
        .arg(dir.path())
        .output()
        .expect("ran pao status");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("alpha"));
    assert!(stdout.contains("beta"));
}

#[test]
fn init_rejects_an_unknown_dependency_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let seed_path = dir.path().join("seed.json");
    std::fs::write(&seed_path, r#"[{"name": "alpha", "depends_on": ["missing"]}]"#)
        .expect("write seed file");

    Command::cargo_bin("pao")
        .expect("binary built")
        .arg("init")
        .arg(dir.path())
        .arg("--from")
        .arg(&seed_path)
        .assert()
        .failure();
}
