//! Integration Test: Blocking Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT block a runtime worker with
//! `std::thread::sleep`. Delays go through `tokio::time`.

use architectural_enforcement::{find_violations, production_sources};

#[test]
fn test_no_thread_sleep_in_production_code() {
    let violations = find_violations(&["thread::sleep", "std::thread::park"], &[]);

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking sleeps found in production code:");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use tokio::time::sleep(..).await or tokio::time::interval");
        panic!("\nFound {} blocking sleep(s).", violations.len());
    }
}

#[test]
fn test_scanner_sees_the_render_loop() {
    // Guards against the scan silently covering nothing
    assert!(production_sources()
        .iter()
        .any(|p| p.ends_with("panel/core/src/render.rs")));
}
