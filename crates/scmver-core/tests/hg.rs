//! Integration tests for Mercurial repository support.

use std::fs;
use std::path::Path;
use std::process::Command;

use scmver_core::config::Options;
use scmver_core::env::SOURCE_DATE_EPOCH;
use scmver_core::{Configuration, EnvSnapshot, get_version};
use tempfile::TempDir;

fn hg(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("hg")
        .args(["--config", "ui.username=scmver tests <tests@example.com>"])
        .args(args)
        .current_dir(cwd)
        .env("HGPLAIN", "1")
        .output()
        .expect("failed to run hg");
    assert!(
        output.status.success(),
        "hg {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn version(root: &Path) -> String {
    let options = Options {
        root: Some(root.to_path_buf()),
        local_scheme: Some("no-local-version".to_string()),
        ..Options::default()
    };
    let env = EnvSnapshot::capture().with_var(SOURCE_DATE_EPOCH, "1234567890");
    get_version(&Configuration::from_options(options, env).unwrap()).unwrap()
}

fn commit(root: &Path, name: &str) {
    fs::write(root.join(name), name).unwrap();
    hg(root, &["add", name]);
    hg(root, &["commit", "-m", name]);
}

#[test]
fn test_mercurial_progression() {
    if Command::new("hg").arg("--version").output().is_err() {
        eprintln!("hg not found, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    hg(root, &["init"]);

    assert_eq!(version(root), "0.1.dev0");

    commit(root, "a.txt");
    assert_eq!(version(root), "0.1.dev1");

    // the tag commit only touches .hgtags and does not count
    hg(root, &["tag", "1.0"]);
    assert_eq!(version(root), "1.0");

    commit(root, "b.txt");
    assert_eq!(version(root), "1.1.dev2");

    fs::write(root.join("b.txt"), "changed").unwrap();
    assert_eq!(version(root), "1.1.dev2");
}
