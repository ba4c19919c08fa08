//! Per-line coverage evidence extracted from a single report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of an input report, used to attribute parse errors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for ReportId {
    fn from(path: &Path) -> Self {
        Self(path.display().to_string())
    }
}

/// Where a report's bytes come from.
///
/// Opening a source twice yields two independent readers, so a report can be
/// re-read by a later run.
#[derive(Debug, Clone)]
pub enum ReportSource {
    /// A report file on disk.
    Path(PathBuf),
    /// A report already held in memory, under a caller-chosen name.
    Memory { name: String, bytes: Arc<[u8]> },
}

impl ReportSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn memory(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self::Memory {
            name: name.into(),
            bytes: Arc::from(bytes),
        }
    }

    pub fn id(&self) -> ReportId {
        match self {
            Self::Path(path) => ReportId::from(path.as_path()),
            Self::Memory { name, .. } => ReportId::new(name.clone()),
        }
    }

    /// Open a fresh buffered reader over the report.
    pub fn open(&self) -> io::Result<Box<dyn BufRead + Send>> {
        match self {
            Self::Path(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            Self::Memory { bytes, .. } => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }
}

/// Key of a coverable line: source file plus 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub file_path: String,
    pub line_number: u32,
}

impl LineKey {
    pub fn new(file_path: impl Into<String>, line_number: u32) -> Self {
        Self {
            file_path: file_path.into(),
            line_number,
        }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_path, self.line_number)
    }
}

/// Branch evidence for a line flagged as a branch point.
///
/// A condition-coverage expression that cannot be read is kept as
/// `Unparseable` instead of being defaulted, so it never looks like 0/0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchCoverage {
    Parsed { covered: u32, valid: u32 },
    Unparseable { raw: String },
}

impl BranchCoverage {
    /// Parse a Cobertura `condition-coverage` attribute.
    ///
    /// Accepts the descriptive form `"50% (1/2)"`, where the first
    /// parenthesised group holding a `covered/valid` pair is used, and the
    /// bare form `"1/2"`. Requires `covered <= valid`; `0/0` is a branch
    /// point with no recorded outcomes.
    pub fn parse(expr: &str) -> Self {
        let counts = if expr.contains('(') {
            parenthesised_groups(expr).find_map(parse_pair)
        } else {
            parse_pair(expr)
        };

        match counts {
            Some((covered, valid)) => Self::Parsed { covered, valid },
            None => Self::Unparseable {
                raw: expr.to_string(),
            },
        }
    }

    pub fn counts(&self) -> Option<(u32, u32)> {
        match self {
            Self::Parsed { covered, valid } => Some((*covered, *valid)),
            Self::Unparseable { .. } => None,
        }
    }
}

/// Closed `(...)` groups in order of appearance. An unclosed `(` ends the scan.
fn parenthesised_groups(expr: &str) -> impl Iterator<Item = &str> {
    let mut rest = expr;
    std::iter::from_fn(move || {
        let open = rest.find('(')?;
        let inner = &rest[open + 1..];
        let close = inner.find(')')?;
        rest = &inner[close + 1..];
        Some(&inner[..close])
    })
}

fn parse_pair(candidate: &str) -> Option<(u32, u32)> {
    let (covered, valid) = candidate.split_once('/')?;
    let covered = parse_count(covered)?;
    let valid = parse_count(valid)?;
    (covered <= valid).then_some((covered, valid))
}

fn parse_count(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// One executable line as observed by one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageFact {
    pub file_path: String,
    pub line_number: u32,
    /// Whether any execution reached the line.
    pub hit: bool,
    /// Present only when the report flags the line as a branch point.
    pub branch: Option<BranchCoverage>,
}

impl CoverageFact {
    /// A plain (non-branch) line.
    pub fn line(file_path: impl Into<String>, line_number: u32, hit: bool) -> Self {
        Self {
            file_path: file_path.into(),
            line_number,
            hit,
            branch: None,
        }
    }

    /// A branch line with parsed condition coverage.
    pub fn branch(
        file_path: impl Into<String>,
        line_number: u32,
        hit: bool,
        covered: u32,
        valid: u32,
    ) -> Self {
        Self::line(file_path, line_number, hit)
            .with_branch(BranchCoverage::Parsed { covered, valid })
    }

    pub fn with_branch(mut self, branch: BranchCoverage) -> Self {
        self.branch = Some(branch);
        self
    }

    pub fn is_branch(&self) -> bool {
        self.branch.is_some()
    }

    pub fn key(&self) -> LineKey {
        LineKey::new(self.file_path.clone(), self.line_number)
    }
}

/// A branch line whose condition coverage could not be read.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchParseFailure {
    pub file_path: String,
    pub line_number: u32,
    pub raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_parse_descriptive_condition_coverage() {
        assert_eq!(
            BranchCoverage::parse("50% (1/2)"),
            BranchCoverage::Parsed {
                covered: 1,
                valid: 2
            }
        );
        assert_eq!(
            BranchCoverage::parse("100% (4 / 4)"),
            BranchCoverage::Parsed {
                covered: 4,
                valid: 4
            }
        );
    }

    #[test]
    fn test_parse_bare_condition_coverage() {
        assert_eq!(BranchCoverage::parse("1/2").counts(), Some((1, 2)));
        assert_eq!(BranchCoverage::parse(" 0/6 ").counts(), Some((0, 6)));
    }

    #[test]
    fn test_zero_of_zero_is_a_parsed_branch() {
        assert_eq!(
            BranchCoverage::parse("0% (0/0)"),
            BranchCoverage::Parsed {
                covered: 0,
                valid: 0
            }
        );
        assert_eq!(BranchCoverage::parse("0/0").counts(), Some((0, 0)));
    }

    #[test]
    fn test_first_readable_group_wins() {
        assert_eq!(BranchCoverage::parse("n/a (none) (1/2)").counts(), Some((1, 2)));
        assert_eq!(BranchCoverage::parse("(x/y) (3/4) (1/4)").counts(), Some((3, 4)));
        // `1/2` outside parentheses is ignored once a group is present
        assert_eq!(
            BranchCoverage::parse("1/2 (none)"),
            BranchCoverage::Unparseable {
                raw: "1/2 (none)".to_string()
            }
        );
    }

    #[test]
    fn test_unparseable_condition_coverage_is_kept() {
        for raw in ["", "50%", "50% (1/2", "(a/b)", "(3/2)", "(-1/2)", "(+1/2)", "n/a (none)"] {
            assert_eq!(
                BranchCoverage::parse(raw),
                BranchCoverage::Unparseable {
                    raw: raw.to_string()
                },
                "expected {raw:?} to be unparseable"
            );
        }
    }

    #[test]
    fn test_fact_constructors() {
        let plain = CoverageFact::line("Foo.cs", 10, true);
        assert!(!plain.is_branch());
        assert_eq!(plain.key(), LineKey::new("Foo.cs", 10));

        let branch = CoverageFact::branch("Foo.cs", 12, false, 0, 2);
        assert!(branch.is_branch());
        assert_eq!(branch.branch.and_then(|b| b.counts()), Some((0, 2)));
    }

    #[test]
    fn test_memory_source_can_be_reopened() {
        let source = ReportSource::memory("inline.xml", b"<coverage/>".to_vec());
        for _ in 0..2 {
            let mut text = String::new();
            source.open().unwrap().read_to_string(&mut text).unwrap();
            assert_eq!(text, "<coverage/>");
        }
        assert_eq!(source.id().as_str(), "inline.xml");
    }
}
