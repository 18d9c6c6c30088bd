//! Ariadne-backed rendering of diagnostics and proof traces — one
//! `ariadne::Report` per diagnostic, anchored at its byte offset into the
//! originating source when one is known, else at the top of the file.

use ariadne::{Color, Label, Report, ReportKind, Source};
use line_col::LineColLookup;

use crate::errors::{Diagnostic, Level};

fn color_for(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::Yellow,
        Level::Ok => Color::Green,
        Level::Info => Color::Cyan,
    }
}

fn report_kind_for(level: Level) -> ReportKind<'static> {
    match level {
        Level::Error => ReportKind::Error,
        Level::Warn => ReportKind::Warning,
        Level::Ok | Level::Info => ReportKind::Advice,
    }
}

/// Render one diagnostic against `source_text` (the schema or stylesheet
/// text it was raised against) as an ariadne report string.
pub fn render_diagnostic(diagnostic: &Diagnostic, filename: &str, source_text: &str) -> String {
    let offset = diagnostic
        .byte_offset
        .unwrap_or(0)
        .min(source_text.len().saturating_sub(1).max(0));
    let lookup = LineColLookup::new(source_text);
    let (line, col) = if source_text.is_empty() {
        (1, 1)
    } else {
        lookup.get(offset.min(source_text.len() - 1))
    };

    let label_text = match &diagnostic.path {
        Some(path) => format!("{} (line {}, col {}, path {})", diagnostic.message, line, col, path),
        None => format!("{} (line {}, col {})", diagnostic.message, line, col),
    };

    let mut buffer = Vec::new();
    let span_end = (offset + 1).min(source_text.len().max(1));
    let write_result = Report::build(report_kind_for(diagnostic.level), (filename, offset..span_end))
        .with_message(diagnostic.message.clone())
        .with_label(
            Label::new((filename, offset..span_end))
                .with_message(label_text)
                .with_color(color_for(diagnostic.level)),
        )
        .finish()
        .write((filename, Source::from(source_text)), &mut buffer);

    if write_result.is_err() {
        return format!("{}", diagnostic);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Render an entire ordered trace, one report per entry, in order: the
/// proof trace is always consumed as an ordered sequence.
pub fn render_trace<'a>(
    diagnostics: impl IntoIterator<Item = &'a Diagnostic>,
    filename: &str,
    source_text: &str,
) -> String {
    diagnostics
        .into_iter()
        .map(|d| render_diagnostic(d, filename, source_text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_an_error_diagnostic() {
        let diagnostic = Diagnostic::at(Level::Error, "bad thing", "/a/b").with_offset(2);
        let rendered = render_diagnostic(&diagnostic, "test.xsd", "<a><b/></a>");
        assert!(rendered.contains("bad thing"));
    }

    #[test]
    fn tolerates_empty_source() {
        let diagnostic = Diagnostic::new(Level::Warn, "hm");
        let rendered = render_diagnostic(&diagnostic, "empty.xsd", "");
        assert!(rendered.contains("hm"));
    }
}
