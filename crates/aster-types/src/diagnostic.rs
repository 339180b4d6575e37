//! Diagnostics interface between the core and its presentation layer.
//!
//! The core decides severity, location, and wording; the collaborator owns
//! the sink (terminal, LSP, test buffer). Nothing in this crate writes to
//! stdout or stderr.

use aster_ast::span::Span;

/// Severity of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Error,
    Warning,
    Info,
}

/// Receives formatted diagnostics from the typing passes.
pub trait Reporter {
    fn report(&mut self, kind: ReportKind, span: Span, message: &str);

    fn error(&mut self, span: Span, message: &str) {
        self.report(ReportKind::Error, span, message);
    }

    fn warn(&mut self, span: Span, message: &str) {
        self.report(ReportKind::Warning, span, message);
    }

    fn info(&mut self, span: Span, message: &str) {
        self.report(ReportKind::Info, span, message);
    }
}

/// A single buffered report.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub kind: ReportKind,
    pub span: Span,
    pub message: String,
}

/// Buffers reports in memory; the reporter used by tests and tooling.
#[derive(Debug, Default)]
pub struct CollectReporter {
    pub reports: Vec<Report>,
}

impl CollectReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter().filter(|r| r.kind == ReportKind::Error)
    }
}

impl Reporter for CollectReporter {
    fn report(&mut self, kind: ReportKind, span: Span, message: &str) {
        self.reports.push(Report { kind, span, message: message.to_string() });
    }
}
