//! Common test utilities for integration tests
//!
//! Provides shared fixtures and a small Cobertura document builder used
//! across multiple integration test files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Create a temporary audit database
///
/// Returns a `sqlite:` URL pointing into a temporary directory.
#[allow(dead_code)]
pub fn temp_db_url() -> (TempDir, String) {
    let dir = temp_dir();
    let url = format!("sqlite:{}", dir.path().join("audit.db").display());
    (dir, url)
}

/// A `sqlite:` URL that can never be opened
///
/// The database would live under a regular file, so creating it fails.
#[allow(dead_code)]
pub fn unreachable_db_url() -> (TempDir, String) {
    let dir = temp_dir();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").expect("Failed to create blocker file");
    let url = format!("sqlite:{}", blocker.join("audit.db").display());
    (dir, url)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Builds Cobertura XML with per-class `<line>` detail.
#[derive(Debug, Default, Clone)]
pub struct CoberturaBuilder {
    classes: BTreeMap<String, Vec<String>>,
}

#[allow(dead_code)]
impl CoberturaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain line.
    pub fn line(mut self, file: &str, number: u32, hits: u32) -> Self {
        self.classes
            .entry(file.to_string())
            .or_default()
            .push(format!(
                r#"<line number="{number}" hits="{hits}" branch="False"/>"#
            ));
        self
    }

    /// Add `count` consecutive plain lines starting at `first`.
    pub fn lines(mut self, file: &str, first: u32, count: u32, hits: u32) -> Self {
        for number in first..first + count {
            self = self.line(file, number, hits);
        }
        self
    }

    /// Add a branch line with `covered/valid` condition coverage.
    pub fn branch(mut self, file: &str, number: u32, hits: u32, covered: u32, valid: u32) -> Self {
        let pct = if valid == 0 { 0 } else { covered * 100 / valid };
        self.classes
            .entry(file.to_string())
            .or_default()
            .push(format!(
                r#"<line number="{number}" hits="{hits}" branch="True" condition-coverage="{pct}% ({covered}/{valid})"/>"#
            ));
        self
    }

    /// Add a branch line with a raw `condition-coverage` attribute.
    pub fn raw_branch(mut self, file: &str, number: u32, hits: u32, expr: &str) -> Self {
        self.classes
            .entry(file.to_string())
            .or_default()
            .push(format!(
                r#"<line number="{number}" hits="{hits}" branch="True" condition-coverage="{expr}"/>"#
            ));
        self
    }

    pub fn build(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="utf-8"?>
<coverage line-rate="1" branch-rate="1" lines-covered="999" lines-valid="999" version="1.9" timestamp="1700000000">
  <sources><source>/src</source></sources>
  <packages>
    <package name="App" line-rate="1" branch-rate="1" complexity="1">
      <classes>
"#,
        );
        for (file, lines) in &self.classes {
            xml.push_str(&format!(
                "        <class name=\"{file}\" filename=\"{file}\" line-rate=\"1\" branch-rate=\"1\" complexity=\"1\">\n          <methods/>\n          <lines>\n"
            ));
            for line in lines {
                xml.push_str("            ");
                xml.push_str(line);
                xml.push('\n');
            }
            xml.push_str("          </lines>\n        </class>\n");
        }
        xml.push_str("      </classes>\n    </package>\n  </packages>\n</coverage>\n");
        xml
    }

    /// Write the document into `dir` and return its path.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).expect("Failed to write report");
        path
    }
}
