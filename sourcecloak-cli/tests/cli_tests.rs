use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

const LICENSE_KEY: &str = "PRO-1234-5678-9ABC";

fn sourcecloak() -> Command {
    let mut cmd = Command::cargo_bin("sourcecloak").unwrap();
    cmd.env_remove("OBFUSCATOR_LICENSE_KEY")
        .env_remove("OBFUSCATOR_BACKUP_DIR")
        .env_remove("OBFUSCATOR_LEVEL")
        .env_remove("OBFUSCATOR_EXCLUDE")
        .env_remove("OBFUSCATOR_OUTPUT_SUFFIX")
        .env_remove("OBFUSCATOR_REMOVE_WHITESPACE");
    cmd
}

#[test]
fn obfuscate_writes_stub_sibling() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("app.php");
    fs::write(&input, "<?php echo 1;").unwrap();

    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "obfuscate"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("app_obfuscated.php"));

    let stub = fs::read_to_string(dir.path().join("app_obfuscated.php")).unwrap();
    assert!(stub.contains("$obfuscated"));
    assert!(stub.contains("eval($decoded);"));
}

#[test]
fn obfuscate_then_deobfuscate_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("app.php");
    fs::write(&input, "<?php echo 1;").unwrap();

    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "obfuscate"])
        .arg(&input)
        .assert()
        .success();

    let restored = dir.path().join("restored.php");
    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "deobfuscate"])
        .arg(dir.path().join("app_obfuscated.php"))
        .arg("--output")
        .arg(&restored)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&restored).unwrap(), "<?php echo 1;");
}

#[test]
fn missing_input_exits_nonzero() {
    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "obfuscate", "/no/such/file.php"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input not found"));
}

#[test]
fn missing_license_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("app.php");
    fs::write(&input, "<?php echo 1;").unwrap();

    sourcecloak()
        .arg("obfuscate")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("license"));

    assert!(!dir.path().join("app_obfuscated.php").exists());
}

#[test]
fn analyze_reports_confidence_for_stub() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("app.php");
    fs::write(&input, "<?php echo 1;").unwrap();

    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "obfuscate"])
        .arg(&input)
        .assert()
        .success();

    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "analyze"])
        .arg(dir.path().join("app_obfuscated.php"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Obfuscated: yes"))
        .stdout(predicate::str::contains("Confidence:"));
}

#[test]
fn directory_batch_prints_summary_table() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.php"), "<?php echo 'a';").unwrap();
    fs::write(dir.path().join("b.php"), "<?php echo 'b';").unwrap();
    fs::write(dir.path().join("ignore.txt"), "text").unwrap();

    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "obfuscate"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Obfuscation Results"))
        .stdout(predicate::str::contains("2 processed, 2 succeeded, 0 failed"));
}

#[test]
fn batch_with_a_failing_file_exits_nonzero_after_full_table() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("good.php"), "<?php echo 1;").unwrap();
    fs::write(dir.path().join("bad.php"), [0xffu8, 0xfe, 0x00]).unwrap();

    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "obfuscate"])
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("2 processed, 1 succeeded, 1 failed"));
}

#[test]
fn secure_deploy_with_yes_replaces_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("project");
    fs::create_dir(&project).unwrap();
    fs::write(project.join("index.php"), "<?php echo 'index';").unwrap();

    sourcecloak()
        .args(["--license-key", LICENSE_KEY])
        .arg("--backup-dir")
        .arg(dir.path().join("backups"))
        .args(["secure-deploy", "--yes"])
        .arg(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains("Originals backed up to:"));

    let deployed = fs::read_to_string(project.join("index.php")).unwrap();
    assert!(deployed.contains("$obfuscated"));
    assert!(dir.path().join("backups").exists());
}

#[test]
fn license_status_shows_plan() {
    sourcecloak()
        .args(["--license-key", LICENSE_KEY, "license"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan:     Professional"));
}

#[test]
fn generate_license_emits_usable_key() {
    let output = sourcecloak()
        .args(["generate-license", "trial", "--days", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TRIAL-"))
        .get_output()
        .clone();

    let stdout = String::from_utf8(output.stdout).unwrap();
    let key = stdout
        .lines()
        .find(|line| line.starts_with("TRIAL-"))
        .unwrap()
        .trim()
        .to_string();

    sourcecloak()
        .args(["--license-key", &key, "license"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan:     Trial"));
}

#[test]
fn restore_lists_backups_when_name_is_unknown() {
    let dir = tempfile::tempdir().unwrap();

    sourcecloak()
        .args(["--license-key", LICENSE_KEY])
        .arg("--backup-dir")
        .arg(dir.path().join("backups"))
        .args(["restore", "backup_0_missing.php"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No backup files found"));
}
