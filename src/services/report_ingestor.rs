//! Cobertura report ingestion.
//!
//! Streams the `<line>` entries of a Cobertura XML document as
//! [`CoverageFact`]s. The root's summary attributes (`lines-covered`,
//! `line-rate`, ...) are ignored: totals are always recomputed from the
//! per-line detail by the union aggregator. `<line>` elements nested under
//! `<methods>` repeat the class-level lines and are skipped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use tracing::debug;

use crate::domain::errors::{ReportParseError, ReportParseErrorKind};
use crate::domain::models::{BranchCoverage, CoverageFact, ReportId, ReportSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootState {
    NotSeen,
    Open,
    Closed,
}

/// Lazy sequence of facts from one Cobertura document.
///
/// Yields at most one error, after which the sequence ends.
pub struct CoberturaFacts<R: BufRead> {
    report: ReportId,
    reader: Reader<R>,
    buf: Vec<u8>,
    root: RootState,
    current_file: Option<String>,
    methods_depth: usize,
    emitted: usize,
    finished: bool,
}

impl<R: BufRead> CoberturaFacts<R> {
    pub fn new(report: ReportId, source: R) -> Self {
        Self {
            report,
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            root: RootState::NotSeen,
            current_file: None,
            methods_depth: 0,
            emitted: 0,
            finished: false,
        }
    }

    pub fn report(&self) -> &ReportId {
        &self.report
    }

    fn error(&self, kind: ReportParseErrorKind) -> ReportParseError {
        ReportParseError::new(self.report.clone(), kind)
    }

    fn advance(&mut self, buf: &mut Vec<u8>) -> Option<Result<CoverageFact, ReportParseErrorKind>> {
        loop {
            buf.clear();
            let step = match self.reader.read_event_into(buf) {
                Err(err) => Err(ReportParseErrorKind::Xml(err.to_string())),
                Ok(Event::Start(element)) => self.open_element(&element, false),
                Ok(Event::Empty(element)) => self.open_element(&element, true),
                Ok(Event::End(element)) => {
                    self.close_element(element.name().as_ref());
                    Ok(None)
                }
                Ok(Event::Eof) => return self.finish().err().map(Err),
                Ok(_) => Ok(None),
            };

            match step {
                Ok(Some(fact)) => return Some(Ok(fact)),
                Ok(None) => {}
                Err(kind) => return Some(Err(kind)),
            }
        }
    }

    fn open_element(
        &mut self,
        element: &BytesStart<'_>,
        self_closing: bool,
    ) -> Result<Option<CoverageFact>, ReportParseErrorKind> {
        let name = element.name();
        let name = name.as_ref();

        if self.root == RootState::NotSeen {
            if name != b"coverage" {
                return Err(ReportParseErrorKind::UnexpectedRoot(
                    String::from_utf8_lossy(name).into_owned(),
                ));
            }
            self.root = if self_closing {
                RootState::Closed
            } else {
                RootState::Open
            };
            return Ok(None);
        }

        if self.root == RootState::Closed {
            return Err(ReportParseErrorKind::TrailingContent(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }

        match name {
            b"class" => {
                let [filename] = read_attributes(element, ["filename"])?;
                let filename = required("class", "filename", filename)?;
                if !self_closing {
                    self.current_file = Some(filename);
                }
                Ok(None)
            }
            b"methods" if !self_closing => {
                self.methods_depth += 1;
                Ok(None)
            }
            b"line" if self.methods_depth == 0 => self.line_fact(element).map(Some),
            _ => Ok(None),
        }
    }

    fn close_element(&mut self, name: &[u8]) {
        match name {
            b"coverage" => self.root = RootState::Closed,
            b"class" => self.current_file = None,
            b"methods" => self.methods_depth = self.methods_depth.saturating_sub(1),
            _ => {}
        }
    }

    fn line_fact(&self, element: &BytesStart<'_>) -> Result<CoverageFact, ReportParseErrorKind> {
        let Some(file_path) = self.current_file.clone() else {
            return Err(ReportParseErrorKind::OrphanLine);
        };

        let [number, hits, branch, condition] =
            read_attributes(element, ["number", "hits", "branch", "condition-coverage"])?;

        let number = required("line", "number", number)?;
        let line_number = number
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| invalid("line", "number", &number))?;

        let hits = required("line", "hits", hits)?;
        let hit_count = hits
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid("line", "hits", &hits))?;

        let mut fact = CoverageFact::line(file_path, line_number, hit_count > 0);
        if branch.is_some_and(|flag| flag.trim().eq_ignore_ascii_case("true")) {
            let coverage = condition.as_deref().map_or_else(
                || BranchCoverage::Unparseable { raw: String::new() },
                BranchCoverage::parse,
            );
            fact = fact.with_branch(coverage);
        }
        Ok(fact)
    }

    fn finish(&self) -> Result<(), ReportParseErrorKind> {
        match self.root {
            RootState::NotSeen => Err(ReportParseErrorKind::Empty),
            RootState::Open => Err(ReportParseErrorKind::Truncated),
            RootState::Closed => {
                debug!(report = %self.report, facts = self.emitted, "report ingested");
                Ok(())
            }
        }
    }
}

impl<R: BufRead> Iterator for CoberturaFacts<R> {
    type Item = Result<CoverageFact, ReportParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buf = std::mem::take(&mut self.buf);
        let item = self.advance(&mut buf);
        self.buf = buf;

        match item {
            Some(Ok(fact)) => {
                self.emitted += 1;
                Some(Ok(fact))
            }
            Some(Err(kind)) => {
                self.finished = true;
                Some(Err(self.error(kind)))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

/// Entry point for turning report sources into fact streams.
pub struct ReportIngestor;

impl ReportIngestor {
    /// Open a report for streaming. Fails only if the source cannot be opened.
    pub fn open(
        source: &ReportSource,
    ) -> Result<CoberturaFacts<Box<dyn BufRead + Send>>, ReportParseError> {
        let report = source.id();
        let reader = source.open().map_err(|err| {
            ReportParseError::new(report.clone(), ReportParseErrorKind::Io(err.to_string()))
        })?;
        debug!(report = %report, "ingesting coverage report");
        Ok(CoberturaFacts::new(report, reader))
    }

    /// Read every fact of a report, failing on the first malformed element.
    pub fn read_all(source: &ReportSource) -> Result<Vec<CoverageFact>, ReportParseError> {
        Self::open(source)?.collect()
    }
}

fn read_attributes<const N: usize>(
    element: &BytesStart<'_>,
    names: [&str; N],
) -> Result<[Option<String>; N], ReportParseErrorKind> {
    let mut values: [Option<String>; N] = std::array::from_fn(|_| None);
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|err| ReportParseErrorKind::Xml(err.to_string()))?;
        let key = attribute.key.as_ref();
        if let Some(index) = names.iter().position(|name| name.as_bytes() == key) {
            let value = attribute
                .unescape_value()
                .map_err(|err| ReportParseErrorKind::Xml(err.to_string()))?;
            values[index] = Some(value.into_owned());
        }
    }
    Ok(values)
}

fn required(
    element: &'static str,
    attribute: &'static str,
    value: Option<String>,
) -> Result<String, ReportParseErrorKind> {
    value.ok_or(ReportParseErrorKind::MissingAttribute { element, attribute })
}

fn invalid(element: &'static str, attribute: &'static str, value: &str) -> ReportParseErrorKind {
    ReportParseErrorKind::InvalidAttribute {
        element,
        attribute,
        value: value.to_string(),
    }
}
