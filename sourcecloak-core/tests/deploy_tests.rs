use std::fs;
use std::path::Path;

use sourcecloak_core::{analyzer, CloakConfig, DeployState, SourceCloak};

const LICENSE_KEY: &str = "PRO-1234-5678-9ABC";

fn cloak_for(root: &Path) -> SourceCloak {
    let config = CloakConfig {
        backup_dir: root.join("backups"),
        license_key: LICENSE_KEY.to_string(),
        ..CloakConfig::default()
    };
    SourceCloak::new(config)
}

fn make_project(root: &Path) -> std::path::PathBuf {
    let project = root.join("project");
    fs::create_dir_all(project.join("sub")).unwrap();
    fs::write(project.join("index.php"), "<?php echo 'index';").unwrap();
    fs::write(project.join("sub/helper.php"), "<?php echo 'helper';").unwrap();
    fs::write(project.join("notes.txt"), "keep me").unwrap();
    project
}

#[tokio::test]
async fn declined_confirmation_performs_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());

    let cloak = cloak_for(dir.path());
    let mut confirm = |_: &str| false;
    let outcome = cloak
        .secure_deploy(&project, None, None, &Default::default(), false, &mut confirm)
        .await
        .unwrap();

    assert_eq!(outcome.state, DeployState::Aborted);
    assert!(outcome.results.is_empty());
    assert!(outcome.backup_path.is_none());
    assert!(!dir.path().join("backups").exists());
    assert_eq!(
        fs::read_to_string(project.join("index.php")).unwrap(),
        "<?php echo 'index';"
    );
}

#[tokio::test]
async fn backup_is_byte_identical_to_pre_deploy_originals() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());

    let cloak = cloak_for(dir.path());
    let mut confirm = |_: &str| true;
    let outcome = cloak
        .secure_deploy(&project, None, None, &Default::default(), false, &mut confirm)
        .await
        .unwrap();

    assert_eq!(outcome.state, DeployState::Complete);
    let backup = outcome.backup_path.unwrap();
    assert_eq!(
        fs::read_to_string(backup.join("index.php")).unwrap(),
        "<?php echo 'index';"
    );
    assert_eq!(
        fs::read_to_string(backup.join("sub/helper.php")).unwrap(),
        "<?php echo 'helper';"
    );
    // non-candidates are backed up too (whole tree) but never replaced
    assert_eq!(
        fs::read_to_string(backup.join("notes.txt")).unwrap(),
        "keep me"
    );
}

#[tokio::test]
async fn originals_are_replaced_in_place_with_stubs() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());

    let cloak = cloak_for(dir.path());
    let mut confirm = |_: &str| true;
    let outcome = cloak
        .secure_deploy(&project, None, None, &Default::default(), false, &mut confirm)
        .await
        .unwrap();

    assert_eq!(outcome.state, DeployState::Complete);
    assert_eq!(outcome.results.len(), 2);

    for name in ["index.php", "sub/helper.php"] {
        let content = fs::read_to_string(project.join(name)).unwrap();
        assert!(content.contains("$obfuscated"), "{name} was not replaced");
        assert!(analyzer::analyze(&content).is_obfuscated);
    }
    // non-matching files are untouched
    assert_eq!(
        fs::read_to_string(project.join("notes.txt")).unwrap(),
        "keep me"
    );
}

#[tokio::test]
async fn deployed_stub_still_decodes_to_the_original_source() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());

    let cloak = cloak_for(dir.path());
    let mut confirm = |_: &str| true;
    cloak
        .secure_deploy(&project, None, None, &Default::default(), false, &mut confirm)
        .await
        .unwrap();

    let stub = fs::read_to_string(project.join("index.php")).unwrap();
    let recovered = sourcecloak_core::obfuscator::deobfuscate_content(&stub).unwrap();
    assert_eq!(recovered, "<?php echo 'index';");
}

#[tokio::test]
async fn single_file_deploy_replaces_just_that_file() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    let target = project.join("index.php");

    let cloak = cloak_for(dir.path());
    let mut confirm = |_: &str| true;
    let outcome = cloak
        .secure_deploy(&target, None, None, &Default::default(), false, &mut confirm)
        .await
        .unwrap();

    assert_eq!(outcome.state, DeployState::Complete);
    assert_eq!(outcome.results.len(), 1);
    assert!(fs::read_to_string(&target).unwrap().contains("$obfuscated"));
    assert_eq!(
        fs::read_to_string(project.join("sub/helper.php")).unwrap(),
        "<?php echo 'helper';"
    );
}

#[tokio::test]
async fn one_bad_file_yields_partial_and_leaves_others_deployed() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    // not valid UTF-8, so its transform fails while the rest proceed
    fs::write(project.join("broken.php"), [0xff, 0xfe, 0x00]).unwrap();

    let cloak = cloak_for(dir.path());
    let mut confirm = |_: &str| true;
    let outcome = cloak
        .secure_deploy(&project, None, None, &Default::default(), false, &mut confirm)
        .await
        .unwrap();

    assert_eq!(outcome.state, DeployState::Partial);
    let summary = outcome.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 1);
    assert!(fs::read_to_string(project.join("index.php"))
        .unwrap()
        .contains("$obfuscated"));
    // the failed file is left exactly as it was
    assert_eq!(fs::read(project.join("broken.php")).unwrap(), [0xff, 0xfe, 0x00]);
}

#[tokio::test]
async fn package_bundles_the_deployed_tree() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    let out = dir.path().join("dist");

    let cloak = cloak_for(dir.path());
    let mut confirm = |_: &str| true;
    let outcome = cloak
        .secure_deploy(&project, Some(&out), None, &Default::default(), true, &mut confirm)
        .await
        .unwrap();

    let package = outcome.package_path.unwrap();
    assert!(package.exists());
    assert_eq!(package.extension().unwrap(), "tar");
    assert!(package
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("secure_deploy_"));
    assert!(fs::metadata(&package).unwrap().len() > 0);
}

#[tokio::test]
async fn deploy_excludes_configured_paths() {
    let dir = tempfile::tempdir().unwrap();
    let project = make_project(dir.path());
    fs::create_dir_all(project.join("vendor")).unwrap();
    fs::write(project.join("vendor/dep.php"), "<?php echo 'dep';").unwrap();

    let cloak = cloak_for(dir.path());
    let mut confirm = |_: &str| true;
    let outcome = cloak
        .secure_deploy(&project, None, None, &Default::default(), false, &mut confirm)
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(
        fs::read_to_string(project.join("vendor/dep.php")).unwrap(),
        "<?php echo 'dep';"
    );
}
