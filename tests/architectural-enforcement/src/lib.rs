//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! of the panel crates:
//! - No blocking sleeps in production code
//! - Network, file and subprocess I/O through tokio and async reqwest
//!
//! The helpers here scan the production part of each source file, which is
//! everything before the first `#[cfg(test)]`, skipping comment lines.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Source directories holding production code, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["panel/core/src", "panel/daemon/src"];

/// A forbidden pattern found in production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the match
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// The workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Every `.rs` file under the production directories
pub fn production_sources() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files: Vec<PathBuf> = PRODUCTION_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .filter(|dir| dir.exists())
        .flat_map(|dir| {
            walkdir::WalkDir::new(dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
                .map(walkdir::DirEntry::into_path)
        })
        .collect();
    files.sort();
    files
}

/// Numbered non-comment lines before the first `#[cfg(test)]`
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(idx, line)| (idx + 1, line))
        .collect()
}

/// Find `patterns` in production code, skipping files whose path ends with
/// one of `allowed_files`
pub fn find_violations(patterns: &[&str], allowed_files: &[&str]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for path in production_sources() {
        if allowed_files.iter().any(|allowed| path.ends_with(allowed)) {
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        for (line, text) in production_lines(&content) {
            let code = text.split("//").next().unwrap_or(text);
            if patterns.iter().any(|p| code.contains(p)) {
                violations.push(Violation {
                    path: path.clone(),
                    line,
                    text: text.trim().to_string(),
                });
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let content = "use a;\n// comment\nfn f() {}\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(content);
        assert_eq!(lines, vec![(1, "use a;"), (3, "fn f() {}")]);
    }

    #[test]
    fn test_production_sources_found() {
        let files = production_sources();
        assert!(files.iter().any(|p| p.ends_with("panel/core/src/lib.rs")));
        assert!(files.iter().any(|p| p.ends_with("panel/daemon/src/main.rs")));
    }
}
