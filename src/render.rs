use bson::{Bson, Document as BsonDocument};
use std::io::Write;

use crate::runner::{OperationReport, Outcome};

/// Receives each operation's outcome as soon as it completes.
pub trait ReportSink {
    fn section(&mut self, title: &str);
    fn operation(&mut self, report: &OperationReport);
}

/// Pretty relaxed extended JSON, the way the shell prints documents.
#[must_use]
pub fn to_pretty_json(docs: &[BsonDocument]) -> String {
    let values: Vec<serde_json::Value> =
        docs.iter().map(|d| Bson::Document(d.clone()).into_relaxed_extjson()).collect();
    serde_json::to_string_pretty(&values).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

#[must_use]
pub fn document_to_pretty_json(doc: &BsonDocument) -> String {
    let value = Bson::Document(doc.clone()).into_relaxed_extjson();
    serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

/// Writes results to `out` and failures to `err`, numbering operations within each section.
pub struct ConsoleSink<O: Write, E: Write> {
    out: O,
    err: E,
    sections: usize,
    position: usize,
}

impl ConsoleSink<std::io::Stdout, std::io::Stderr> {
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleSink<O, E> {
    pub const fn new(out: O, err: E) -> Self {
        Self { out, err, sections: 0, position: 0 }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }

    fn write_result(&mut self, label: &str, outcome: &Outcome) -> std::io::Result<()> {
        match outcome {
            Outcome::Documents(docs) => {
                writeln!(self.out, "\n{label}:")?;
                writeln!(self.out, "{}", to_pretty_json(docs))?;
            }
            Outcome::IndexName(name) => {
                writeln!(self.out, "\n{label}...")?;
                writeln!(self.out, "index: {name}")?;
            }
            Outcome::Stats(stats) => {
                writeln!(self.out, "\n{label}:")?;
                writeln!(self.out, "{}", document_to_pretty_json(stats))?;
            }
        }
        self.out.flush()
    }
}

impl<O: Write, E: Write> ReportSink for ConsoleSink<O, E> {
    fn section(&mut self, title: &str) {
        let sep = if self.sections == 0 { "" } else { "\n" };
        self.sections += 1;
        self.position = 0;
        if let Err(e) = writeln!(self.out, "{sep}{title}") {
            log::warn!("stdout write failed: {e}");
        }
    }

    fn operation(&mut self, report: &OperationReport) {
        self.position += 1;
        let label = format!("{}. {}", self.position, report.name);
        let written = match &report.outcome {
            Ok(outcome) => self.write_result(&label, outcome),
            Err(e) => writeln!(self.err, "Error in {:?}: {e}", report.name).and_then(|()| self.err.flush()),
        };
        if let Err(e) = written {
            log::warn!("console write failed: {e}");
        }
    }
}

/// Keeps a compact event trail in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<String>,
}

impl ReportSink for CollectingSink {
    fn section(&mut self, title: &str) {
        self.events.push(format!("section {title}"));
    }

    fn operation(&mut self, report: &OperationReport) {
        let status = if report.is_ok() { "ok" } else { "err" };
        self.events.push(format!("op {} {status}", report.name));
    }
}
