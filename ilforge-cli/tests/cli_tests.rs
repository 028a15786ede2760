//! Integration tests for the ilforge CLI.
//!
//! These tests invoke the `ilforge` binary as a subprocess and check
//! exit codes, stdout, and stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(deprecated)]
fn ilforge() -> Command {
    Command::cargo_bin("ilforge").unwrap()
}

/// Helper: write raw body bytes to a temp file and return its path.
fn body_file(dir: &TempDir, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join("body.bin");
    fs::write(&path, bytes).unwrap();
    path
}

// ---- No-args / help ----

#[test]
fn no_args_prints_usage_and_exits_1() {
    ilforge()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage: ilforge"));
}

#[test]
fn help_flag_exits_0() {
    ilforge()
        .arg("--help")
        .assert()
        .success()
        .stderr(predicate::str::contains("Commands:"));
}

#[test]
fn unknown_command_exits_1() {
    ilforge()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown command"));
}

// ---- Render ----

#[test]
fn render_without_input_exits_1() {
    ilforge()
        .arg("render")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("requires an input file"));
}

#[test]
fn render_missing_file_exits_1() {
    ilforge()
        .args(["render", "/no/such/body.bin"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn render_simple_body() {
    let dir = TempDir::new().unwrap();
    // nop; ret
    let path = body_file(&dir, &[0x00, 0x2A]);

    ilforge()
        .args(["render", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("IL_0000: nop"))
        .stdout(predicate::str::contains("IL_0001: ret"));
}

#[test]
fn render_empty_body_exits_2() {
    let dir = TempDir::new().unwrap();
    let path = body_file(&dir, &[]);

    ilforge()
        .args(["render", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("routine has no body"));
}

#[test]
fn render_truncated_body_exits_2() {
    let dir = TempDir::new().unwrap();
    // ldc.i4 with only one of four operand bytes
    let path = body_file(&dir, &[0x20, 0x01]);

    ilforge()
        .args(["render", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("ends inside the instruction"));
}

// ---- Roundtrip ----

#[test]
fn roundtrip_straight_line_body() {
    let dir = TempDir::new().unwrap();
    // ldc.i4.s 42; pop; ret
    let path = body_file(&dir, &[0x1F, 0x2A, 0x26, 0x2A]);

    ilforge()
        .args(["roundtrip", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"))
        .stdout(predicate::str::contains("3 instructions"));
}

#[test]
fn roundtrip_backward_branch() {
    let dir = TempDir::new().unwrap();
    // nop; br.s -3 (back to the nop)
    let path = body_file(&dir, &[0x00, 0x2B, 0xFD]);

    ilforge()
        .args(["roundtrip", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn roundtrip_accepts_a_recompacted_encoding() {
    let dir = TempDir::new().unwrap();
    // nop; br -6 (long form back to the nop); ret — replay re-selects
    // br.s, so the body comes back smaller but equivalent.
    let path = body_file(&dir, &[0x00, 0x38, 0xFA, 0xFF, 0xFF, 0xFF, 0x2A]);

    ilforge()
        .args(["roundtrip", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("re-encoded 7 -> 4 bytes"))
        .stdout(predicate::str::contains("3 instructions"));
}

#[test]
fn roundtrip_misaligned_branch_exits_2() {
    let dir = TempDir::new().unwrap();
    // br.s +1 lands in the middle of the ldc.i4.s operand
    let path = body_file(&dir, &[0x2B, 0x01, 0x1F, 0x07, 0x2A]);

    ilforge()
        .args(["roundtrip", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("instruction boundary"));
}
