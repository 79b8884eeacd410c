use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const DIGITAL_COUPON: &str = "Cliente: JUAN PEREZ GOMEZ Identificacion: 123456789 Contrato: 998877\n\
Valor a pagar: $20,000.00\n";

/// `cupon` with the config directory pointed into `home`.
fn cupon(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cupon").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path()).env("HOME", home.path());
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    cupon(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("fields"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("cupon batch ./cupones --output cupones.csv"));
}

#[test]
fn test_fields_lists_columns() {
    let home = TempDir::new().unwrap();
    cupon(&home)
        .arg("fields")
        .assert()
        .success()
        .stdout(predicate::str::contains("ValorAPagar"))
        .stdout(predicate::str::contains("CodigoBarraLimpio"))
        .stdout(predicate::str::contains("digits only"));
}

#[test]
fn test_process_saved_text_as_json() {
    let home = TempDir::new().unwrap();
    let input = write(home.path(), "cupon.txt", DIGITAL_COUPON);

    cupon(&home)
        .arg("process")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Contrato\": \"998877\""))
        .stdout(predicate::str::contains("\"ValorAPagar\": \"20000\""))
        .stdout(predicate::str::contains("\"source_file\": \"cupon.txt\""));
}

#[test]
fn test_process_csv_and_explain() {
    let home = TempDir::new().unwrap();
    let input = write(home.path(), "cupon.txt", DIGITAL_COUPON);

    cupon(&home)
        .args(["process", "--format", "csv", "--explain"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("SourceFile,Cliente,Contrato,Identificacion"))
        .stdout(predicate::str::contains("cupon.txt,JUAN PEREZ GOMEZ,998877,123456789"))
        .stdout(predicate::str::contains("Mode: Digital"));
}

#[test]
fn test_process_missing_input() {
    let home = TempDir::new().unwrap();
    cupon(&home)
        .args(["process", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_batch_appends_without_repeating_header() {
    let home = TempDir::new().unwrap();
    let inputs = home.path().join("in");
    std::fs::create_dir(&inputs).unwrap();
    write(&inputs, "a.txt", DIGITAL_COUPON);
    write(&inputs, "b.txt", "Contrato: 555000\n");
    write(&inputs, "ignored.docx", "");
    let out = home.path().join("cupones.csv");

    for _ in 0..2 {
        cupon(&home)
            .arg("batch")
            .arg(&inputs)
            .arg("--output")
            .arg(&out)
            .args(["-j", "2", "--summary"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Found 2 files"))
            .stdout(predicate::str::contains("Missing fields:"));
    }

    let content = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines.iter().filter(|l| l.starts_with("SourceFile,")).count(), 1);
    assert!(lines[1].starts_with("a.txt,"));
    assert!(lines[2].starts_with("b.txt,NOT_FOUND,555000"));
}

#[test]
fn test_batch_without_matches_fails() {
    let home = TempDir::new().unwrap();
    let empty = home.path().join("empty");
    std::fs::create_dir(&empty).unwrap();

    cupon(&home)
        .arg("batch")
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_config_set_then_get() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("cfg.json");

    cupon(&home)
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "batch.max_workers", "8"])
        .assert()
        .success();

    cupon(&home)
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "batch.max_workers"])
        .assert()
        .success()
        .stdout(predicate::str::diff("8\n"));

    cupon(&home)
        .args(["config", "get", "nope.key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("cfg.json");

    cupon(&home).args(["config", "init", "--output"]).arg(&config).assert().success();
    assert!(config.exists());

    cupon(&home)
        .args(["config", "init", "--output"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}
