//! Integration tests for the command-line interface.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn mixweave(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mixweave"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("MIXWEAVE_LOG")
        .env_remove("MIXWEAVE_DEBUG")
        .output()
        .expect("failed to run mixweave")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn fixture_args<'a>(command: &'a str, manifest: &'a str, source: &'a str) -> Vec<&'a str> {
    vec![command, "--manifest", manifest, "--source", source]
}

#[test]
fn check_reports_every_module() {
    let manifest = fixtures().join("patches.toml");
    let output = mixweave(&fixture_args(
        "check",
        manifest.to_str().unwrap(),
        fixtures().to_str().unwrap(),
    ));
    let out = stdout(&output);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(out.contains("game.player (3 match(es))"), "stdout: {out}");
    assert!(out.contains("game (0 match(es))"));
    assert!(out.contains("Summary:"));
}

#[test]
fn check_fails_on_required_count_mismatch() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("strict.toml");
    fs::write(
        &manifest,
        r#"[[groups]]
name = "strict"
target = "game.player.Player"

[[groups.inject]]
method = "two_calls"
at = { kind = "CALL_SITE", target = "self.calculate_physics" }
require = 1
"#,
    )
    .unwrap();

    let output = mixweave(&fixture_args(
        "check",
        manifest.to_str().unwrap(),
        fixtures().to_str().unwrap(),
    ));
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("game.player"), "stderr: {err}");
    assert!(err.contains("1 module(s) failed to weave"));
}

#[test]
fn points_lists_resolved_lines() {
    let manifest = fixtures().join("patches.toml");
    let output = mixweave(&fixture_args(
        "points",
        manifest.to_str().unwrap(),
        fixtures().to_str().unwrap(),
    ));
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("game.player.Player.set_health"));
    assert!(out.contains("game.player.Player.calculate_speed"));
    assert!(out.contains("game.player.Player.two_calls"));
}

#[test]
fn weave_diff_shows_only_instrumentation() {
    let manifest = fixtures().join("patches.toml");
    let source = fixtures().join("game/player.py");
    let mut args = fixture_args("weave", manifest.to_str().unwrap(), source.to_str().unwrap());
    args.extend(["--module", "game.player", "--diff"]);
    let output = mixweave(&args);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("+++ game.player (woven)"));
    let added: Vec<&str> = out.lines().filter(|l| l.starts_with('+') && !l.starts_with("+++")).collect();
    assert!(!added.is_empty());
    assert!(added.iter().all(|l| l.contains("__weave__")), "added: {added:?}");
}

#[test]
fn weave_out_writes_dumps() {
    let out_dir = TempDir::new().unwrap();
    let manifest = fixtures().join("patches.toml");
    let root = fixtures();
    let mut args = fixture_args("weave", manifest.to_str().unwrap(), root.to_str().unwrap());
    args.extend(["--out", out_dir.path().to_str().unwrap()]);
    let output = mixweave(&args);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let dumped = fs::read_to_string(out_dir.path().join("game_player.py")).unwrap();
    assert!(dumped.contains("class Player:"));
    assert!(out_dir.path().join("game.py").exists());
}

#[test]
fn run_prints_module_output() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("speed.py");
    fs::write(&source, "def base():\n    return 1.0\n\nprint(base() * 2)\n").unwrap();
    let manifest = dir.path().join("boost.toml");
    fs::write(
        &manifest,
        r#"[[groups]]
name = "boost"
target = "speed"

[[groups.inject]]
method = "base"
at = { kind = "CONSTANT", target = 1.0 }
action = "set_value"
value = 1.5
"#,
    )
    .unwrap();

    let output = mixweave(&fixture_args("run", manifest.to_str().unwrap(), source.to_str().unwrap()));
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "3.0\n");
}

#[test]
fn missing_manifest_is_reported() {
    let output = mixweave(&fixture_args(
        "check",
        "/nonexistent/patches.toml",
        fixtures().to_str().unwrap(),
    ));
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to read manifest"));
}
