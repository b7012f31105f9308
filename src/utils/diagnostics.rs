//! Error reporting.

use std::fmt;
use std::io::{self, IsTerminal};
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic as InnerDiagnostic, Label};
use codespan_reporting::diagnostic::Severity;
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use codespan_reporting::term::{self, Config};

/// A byte range in the source text.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span) -> Self {
        Span {
            start: span.start(),
            end: span.end(),
        }
    }
}

impl From<pest::error::InputLocation> for Span {
    fn from(location: pest::error::InputLocation) -> Self {
        match location {
            pest::error::InputLocation::Pos(pos) => Span {
                start: pos,
                end: pos,
            },
            pest::error::InputLocation::Span((start, end)) => {
                Span { start, end }
            }
        }
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

pub struct Diagnostic(InnerDiagnostic<()>);

impl Diagnostic {
    pub fn bug() -> Diagnostic {
        Self(InnerDiagnostic::bug())
    }

    pub fn error() -> Diagnostic {
        Self(InnerDiagnostic::error())
    }

    pub fn warning() -> Diagnostic {
        Self(InnerDiagnostic::warning())
    }

    pub fn with_message<M: Into<String>>(mut self, message: M) -> Diagnostic {
        self.0.message = message.into();
        self
    }

    pub fn with_primary<S, L>(mut self, span: S, label: L) -> Diagnostic
    where
        S: Into<Range<usize>>,
        L: Into<String>,
    {
        self.0
            .labels
            .push(Label::primary((), span).with_message(label));

        self
    }

    pub fn with_secondary<S, L>(mut self, span: S, label: L) -> Diagnostic
    where
        S: Into<Range<usize>>,
        L: Into<String>,
    {
        self.0
            .labels
            .push(Label::secondary((), span).with_message(label));

        self
    }

    pub fn with_note<N: Into<String>>(mut self, note: N) -> Diagnostic {
        self.0.notes.push(note.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn is_error(&self) -> bool {
        self.0.severity >= Severity::Error
    }
}

impl From<io::Error> for Diagnostic {
    fn from(err: io::Error) -> Self {
        Diagnostic::error().with_message(err.to_string())
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.0.severity, self.0.message)
    }
}

pub struct Reporter<'src> {
    file: SimpleFile<&'src str, &'src str>,
    writer: StandardStream,
    errors: usize,
}

impl Reporter<'_> {
    pub fn new<'src>(filename: &'src str, source: &'src str) -> Reporter<'src> {
        let choice = if std::io::stderr().is_terminal() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };

        Reporter {
            file: SimpleFile::new(filename, source),
            writer: StandardStream::stderr(choice),
            errors: 0,
        }
    }

    pub fn emit(&mut self, diagnostic: &Diagnostic) {
        if diagnostic.is_error() {
            self.errors += 1;
        }

        term::emit(
            &mut self.writer,
            &Config::default(),
            &self.file,
            &diagnostic.0,
        )
        .unwrap();
    }

    /// Number of errors emitted so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }
}
