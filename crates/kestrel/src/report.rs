use std::fmt;
use std::iter;

use kestrel_syntax::{Diagnostic, DiagnosticKind, Diagnostics, Reporter, TraceStatus};
use miette::{LabeledSpan, NamedSource, Severity, SourceCode, SourceSpan};

use crate::cli::Format;

/// One compiler diagnostic, labelled at its line of the source file.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub(crate) struct SourceDiagnostic {
    kind: DiagnosticKind,
    message: String,
    severity: Severity,
    src: NamedSource<String>,
    span: Option<SourceSpan>,
}

impl miette::Diagnostic for SourceDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn severity(&self) -> Option<Severity> {
        Some(self.severity)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(iter::once(LabeledSpan::new_with_span(None, span))))
    }
}

/// Prints diagnostics as they arrive (text mode) and keeps a copy of
/// everything for the JSON report.
pub(crate) struct ConsoleReporter {
    name: String,
    source: String,
    format: Format,
    trace: bool,
    pub(crate) collected: Diagnostics,
}

impl ConsoleReporter {
    pub(crate) fn new(name: &str, source: &str, format: Format, trace: bool) -> Self {
        ConsoleReporter {
            name: name.to_owned(),
            source: source.to_owned(),
            format,
            trace,
            collected: Diagnostics::new(),
        }
    }

    fn render(&self, diagnostic: &Diagnostic, severity: Severity) {
        if self.format != Format::Text {
            return;
        }
        let report = miette::Report::new(SourceDiagnostic {
            kind: diagnostic.kind,
            message: diagnostic.to_string(),
            severity,
            src: NamedSource::new(&self.name, self.source.clone()),
            span: diagnostic.line.and_then(|line| line_span(&self.source, line)),
        });
        eprintln!("{report:?}");
    }
}

impl Reporter for ConsoleReporter {
    fn report_error(&mut self, diagnostic: Diagnostic) {
        self.render(&diagnostic, Severity::Error);
        self.collected.report_error(diagnostic);
    }

    fn report_warning(&mut self, diagnostic: Diagnostic) {
        self.render(&diagnostic, Severity::Warning);
        self.collected.report_warning(diagnostic);
    }

    fn report_trace(&mut self, message: &str, status: TraceStatus) {
        if self.trace {
            match status {
                TraceStatus::Info => tracing::info!("{message}"),
                TraceStatus::Success => tracing::info!(status = "success", "{message}"),
                TraceStatus::Failure => tracing::warn!(status = "failure", "{message}"),
            }
        }
        self.collected.report_trace(message, status);
    }
}

/// Byte span of the 1-based `line`, without its line ending.
fn line_span(source: &str, line: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (index, text) in source.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            let len = text.trim_end_matches(['\n', '\r']).len();
            return Some(SourceSpan::from((offset, len)));
        }
        offset += text.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_span() {
        let source = "{\r\n  int a\n}";
        assert_eq!(line_span(source, 2), Some(SourceSpan::from((3, 7))));
        assert_eq!(line_span(source, 3), Some(SourceSpan::from((11, 1))));
        assert_eq!(line_span(source, 4), None);
    }
}
