use std::fs;

use assert_cmd::Command;

use trampgen::{Catalog, IMPORTS_FILE, STUBS_FILE};

fn trampgen() -> Command {
    Command::cargo_bin("trampgen").unwrap()
}

#[test]
fn generates_byte_identical_artifacts_across_runs() {
    let dir = tempfile::tempdir().unwrap();

    trampgen().arg(dir.path()).assert().success();
    let imports = fs::read(dir.path().join(IMPORTS_FILE)).unwrap();
    let stubs = fs::read(dir.path().join(STUBS_FILE)).unwrap();
    assert!(!imports.is_empty());
    assert!(!stubs.is_empty());

    trampgen().arg(dir.path()).assert().success();
    assert_eq!(imports, fs::read(dir.path().join(IMPORTS_FILE)).unwrap());
    assert_eq!(stubs, fs::read(dir.path().join(STUBS_FILE)).unwrap());
}

#[test]
fn artifacts_cover_the_whole_catalog() {
    let dir = tempfile::tempdir().unwrap();
    trampgen().arg(dir.path()).assert().success();

    let imports = fs::read_to_string(dir.path().join(IMPORTS_FILE)).unwrap();
    let stubs = fs::read_to_string(dir.path().join(STUBS_FILE)).unwrap();

    let catalog = Catalog::builtin();
    for sc in catalog.entries() {
        assert!(
            imports.contains(&format!("table.insert({:?},", sc.name)),
            "{} missing from the registry",
            sc.name
        );
        assert!(
            stubs.contains(&format!("sys_{}_entry:", sc.name)),
            "{} missing an entry stub",
            sc.name
        );
    }
    assert_eq!(imports.matches("table.insert(").count(), catalog.len());

    // No temp files may survive a successful run.
    let leftovers = fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "tmp")
        })
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn missing_output_directory_argument_is_a_usage_error() {
    let assert = trampgen().assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("usage"), "unexpected stderr: {stderr}");
}

#[test]
fn unusable_output_directory_fails_without_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not-a-directory");
    fs::write(&file, b"occupied").unwrap();

    let assert = trampgen().arg(&file).assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("Error:"), "unexpected stderr: {stderr}");

    // The occupied path is untouched and no artifacts appeared next to it.
    assert_eq!(fs::read(&file).unwrap(), b"occupied");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}
