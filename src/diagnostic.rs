use crate::span::Span;

/// A compiler error: which stage rejected the input, and why.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub stage: Stage,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

/// The pipeline stage an error originated from. The stage decides the
/// stderr prefix: parse errors carry a line number, the rest do not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Fold,
    Gen,
}

impl Diagnostic {
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self {
            stage: Stage::Parse,
            message: message.into(),
            span: Some(span),
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn fold(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Fold,
            message: message.into(),
            span: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn gen(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Gen,
            message: message.into(),
            span: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the diagnostic to stderr using ariadne. Only errors that
    /// carry a span (parse errors) produce a report; fold and generation
    /// errors have no source location to point at.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let Some(span) = self.span else {
            return;
        };

        let mut report = Report::build(ReportKind::Error, filename, span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, span.start as usize..span.end as usize))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        let _ = report.finish().eprint((filename, Source::from(source)));
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.stage, self.span) {
            (Stage::Parse, Some(span)) => {
                write!(f, "Parse error at line {}: {}", span.line, self.message)
            }
            (Stage::Parse, None) => write!(f, "Parse error: {}", self.message),
            _ => write!(f, "Error: {}", self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}
