//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Production code in the panel crates MUST NOT use blocking I/O.
//! **Required**: `tokio::fs`, `tokio::process` and async `reqwest`.
//!
//! The config loader runs before any task is spawned and may read its file
//! synchronously.

use architectural_enforcement::find_violations;

/// Files allowed to use blocking file I/O
const STARTUP_FILES: &[&str] = &["panel/core/src/config/mod.rs"];

fn report(kind: &str, violations: &[architectural_enforcement::Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {kind} found in production code:");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!("\nFound {} {kind} violation(s).", violations.len());
}

#[test]
fn test_no_blocking_http() {
    report("blocking HTTP", &find_violations(&["reqwest::blocking"], &[]));
}

#[test]
fn test_no_blocking_subprocess() {
    report(
        "blocking subprocess",
        &find_violations(&["std::process::Command", "std::process::Stdio"], &[]),
    );
}

#[test]
fn test_no_blocking_file_io_outside_startup() {
    report(
        "blocking file I/O",
        &find_violations(&["std::fs::", "use std::fs", "std::net::"], STARTUP_FILES),
    );
}

#[test]
fn test_no_blocking_stdin() {
    report("blocking stdin", &find_violations(&["std::io::stdin", "io::stdin().lock"], &[]));
}
