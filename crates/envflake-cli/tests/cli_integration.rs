//! CLI subprocess integration tests.
//!
//! These tests invoke the `envflake` binary as a subprocess and verify
//! exit codes, stdout content, and JSON output stability.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const REV_A: &str = "0123456789abcdef0123456789abcdef01234567";
const REV_B: &str = "89abcdef0123456789abcdef0123456789abcdef";

fn envflake_bin(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_envflake"));
    // Keep the user's own config out of the picture.
    cmd.env("ENVFLAKE_CONFIG", home.join("no-such-config.toml"));
    cmd.env_remove("ENVFLAKE_LOG");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    envflake_bin(home).args(args).output().unwrap()
}

fn write_descriptor(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("envflake.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn rust_shell(dir: &Path) -> PathBuf {
    write_descriptor(
        dir,
        r#"descriptor_version = 1
description = "Rust development shell"

[inputs]
nixpkgs = "github:NixOS/nixpkgs/nixos-unstable"

[inputs.fenix]
url = "github:nix-community/fenix"
follows = { nixpkgs = "nixpkgs" }

[[overlays]]
input = "fenix"

[shells.x86_64-linux]
packages = ["toolchain", "cargo-release"]
"#,
    )
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn cli_version_exits_zero() {
    let home = tempfile::tempdir().unwrap();
    let output = run(home.path(), &["--version"]);
    assert!(output.status.success(), "envflake --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("envflake"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    let output = run(home.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["check", "shell", "lock", "pin"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn cli_check_reports_summary() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());

    let output = run(
        project.path(),
        &["--json", "check", &descriptor.to_string_lossy()],
    );
    assert!(
        output.status.success(),
        "check must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = stdout_json(&output);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["inputs"], 2);
    assert_eq!(json["platforms"][0], "x86_64-linux");
    assert_eq!(json["unpinned"].as_array().unwrap().len(), 2);
}

#[test]
fn cli_shell_lists_two_tooling_entries() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());

    let output = run(
        project.path(),
        &[
            "--json",
            "shell",
            &descriptor.to_string_lossy(),
            "--platform",
            "x86_64-linux",
        ],
    );
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["platform"], "x86_64-linux");
    assert_eq!(json["tooling"].as_array().unwrap().len(), 2);
    assert_eq!(json["library"].as_array().unwrap().len(), 0);
    assert_eq!(json["tooling"][1]["attr"], "cargo-release");
}

#[test]
fn cli_shell_undeclared_platform_exits_4() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());

    for platform in ["aarch64-darwin", "mips-linux"] {
        let output = run(
            project.path(),
            &[
                "shell",
                &descriptor.to_string_lossy(),
                "--platform",
                platform,
            ],
        );
        assert_eq!(output.status.code(), Some(4), "platform {platform}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("unsupported platform"), "stderr: {stderr}");
    }
}

#[test]
fn cli_unresolved_input_exits_3() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = write_descriptor(
        project.path(),
        r#"descriptor_version = 1
[inputs]
nixpkgs = "github:NixOS/nixpkgs"
[[overlays]]
input = "fenix"
"#,
    );
    let output = run(project.path(), &["check", &descriptor.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unresolved input"), "stderr: {stderr}");
}

#[test]
fn cli_malformed_descriptor_exits_2() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = write_descriptor(project.path(), "descriptor_version = [\n");
    let output = run(project.path(), &["check", &descriptor.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(2));

    let missing = project.path().join("missing.toml");
    let output = run(project.path(), &["check", &missing.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_id_is_stable() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());
    let path = descriptor.to_string_lossy();

    let first = run(project.path(), &["id", &path]);
    let second = run(project.path(), &["id", &path]);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(String::from_utf8_lossy(&first.stdout).trim().len(), 64);
}

#[test]
fn cli_pin_check_then_set() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());
    let path = descriptor.to_string_lossy();

    let output = run(project.path(), &["pin", &path, "--check"]);
    assert!(
        !output.status.success(),
        "pin --check must fail for unpinned inputs"
    );

    let output = run(
        project.path(),
        &[
            "pin",
            &path,
            "--set",
            &format!("nixpkgs={REV_A}"),
            "--set",
            &format!("fenix={REV_B}"),
        ],
    );
    assert!(
        output.status.success(),
        "pin --set must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = run(project.path(), &["pin", &path, "--check"]);
    assert!(output.status.success(), "pin --check must pass after --set");

    // The rewritten descriptor still describes the same shell.
    let output = run(
        project.path(),
        &["--json", "shell", &path, "--platform", "x86_64-linux"],
    );
    assert_eq!(stdout_json(&output)["tooling"].as_array().unwrap().len(), 2);
}

#[test]
fn cli_pin_set_repins_revision_in_locator() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = write_descriptor(
        project.path(),
        &format!(
            r#"descriptor_version = 1

[inputs]
nixpkgs = "github:NixOS/nixpkgs/{REV_A}"

[shells.x86_64-linux]
packages = ["git"]
"#
        ),
    );
    let path = descriptor.to_string_lossy();

    let output = run(
        project.path(),
        &["pin", &path, "--set", &format!("nixpkgs={REV_B}")],
    );
    assert!(
        output.status.success(),
        "re-pinning must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let content = std::fs::read_to_string(&descriptor).unwrap();
    assert!(content.contains(REV_B), "descriptor: {content}");
    assert!(!content.contains(REV_A), "old revision must be gone: {content}");

    let output = run(project.path(), &["--json", "inputs", &path]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(REV_B));
}

#[test]
fn cli_pin_set_unknown_input_exits_3() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());
    let output = run(
        project.path(),
        &[
            "pin",
            &descriptor.to_string_lossy(),
            "--set",
            &format!("flake-utils={REV_A}"),
        ],
    );
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn cli_lock_write_and_verify() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());
    let path = descriptor.to_string_lossy();

    let output = run(project.path(), &["lock", &path]);
    assert!(
        !output.status.success(),
        "lock must fail while inputs are unpinned"
    );

    let output = run(
        project.path(),
        &[
            "lock",
            &path,
            "--rev",
            &format!("nixpkgs={REV_A}"),
            "--rev",
            &format!("fenix={REV_B}"),
        ],
    );
    assert!(
        output.status.success(),
        "lock must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let lock_path = project.path().join("envflake.lock");
    let lock = std::fs::read_to_string(&lock_path).unwrap();
    assert!(lock.contains(REV_A));
    assert!(lock.contains(REV_B));

    let output = run(project.path(), &["--json", "lock", &path, "--verify"]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["status"], "verified");

    write_descriptor(
        project.path(),
        r#"descriptor_version = 1
[inputs]
nixpkgs = "github:NixOS/nixpkgs/nixos-24.05"
fenix = "github:nix-community/fenix"
"#,
    );
    let output = run(project.path(), &["lock", &path, "--verify"]);
    assert!(!output.status.success(), "verify must detect drift");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("drift"), "stderr: {stderr}");
}

#[test]
fn cli_new_from_preset_loads() {
    let project = tempfile::tempdir().unwrap();
    let dest = project.path().join("envflake.toml");
    let dest_str = dest.to_string_lossy();

    let output = run(
        project.path(),
        &["new", "--template", "rust", "--output", &dest_str],
    );
    assert!(output.status.success());

    let output = run(project.path(), &["check", &dest_str]);
    assert!(output.status.success());

    let output = run(
        project.path(),
        &["new", "--template", "rust", "--output", &dest_str],
    );
    assert!(!output.status.success(), "new must not overwrite silently");
}

#[test]
fn cli_presets_lists_builtin() {
    let home = tempfile::tempdir().unwrap();
    let output = run(home.path(), &["--json", "presets"]);
    assert!(output.status.success());
    let names: Vec<String> = stdout_json(&output)
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_owned())
        .collect();
    assert!(names.contains(&"rust".to_owned()));
    assert!(names.contains(&"minimal".to_owned()));
}

#[test]
fn cli_config_supplies_descriptor_and_platform() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());
    let config = project.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "descriptor = {:?}\nplatform = \"x86_64-linux\"\n",
            descriptor.to_string_lossy()
        ),
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_envflake"))
        .env("ENVFLAKE_CONFIG", &config)
        .args(["--json", "shell"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(stdout_json(&output)["platform"], "x86_64-linux");
}

#[test]
fn cli_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    let output = run(home.path(), &["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("envflake"));
}

#[test]
fn cli_broken_config_only_affects_descriptor_commands() {
    let project = tempfile::tempdir().unwrap();
    let descriptor = rust_shell(project.path());
    let config = project.path().join("config.toml");
    std::fs::write(&config, "descriptor = [\n").unwrap();

    let envflake = |args: &[&str]| {
        Command::new(env!("CARGO_BIN_EXE_envflake"))
            .env("ENVFLAKE_CONFIG", &config)
            .args(args)
            .output()
            .unwrap()
    };

    assert!(envflake(&["presets"]).status.success());
    assert!(envflake(&["completions", "bash"]).status.success());

    let output = envflake(&["check", &descriptor.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid config"), "stderr: {stderr}");
}
