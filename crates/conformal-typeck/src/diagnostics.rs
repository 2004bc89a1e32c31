//! Ariadne-based rendering of conformance issues.
//!
//! The engine never reports anything itself. A checker that finds a
//! conformance carrying missing, unavailable or isolated pieces collects
//! them with `ConformanceRef::collect_issues` and renders each one here.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use conformal_common::LineIndex;

use crate::error::ConformanceIssue;

/// Render a conformance issue as a colorless diagnostic string.
///
/// Issues without a span (missing conformances) are attached to the start
/// of `source`.
pub fn render_issue(issue: &ConformanceIssue, source: &str, _filename: &str) -> String {
    let config = Config::default().with_color(false);
    let source_len = source.len();
    let span: Range<usize> = match issue.span() {
        Some(span) => span.to_range(source_len),
        None => 0..source_len.min(1),
    };
    let msg = issue.to_string();

    let report = match issue {
        ConformanceIssue::Missing { ty, interface } => Report::build(ReportKind::Error, span.clone())
            .with_code(issue.code())
            .with_message(&msg)
            .with_config(config)
            .with_label(
                Label::new(span)
                    .with_message(format!("`{}` required here", interface))
                    .with_color(Color::Red),
            )
            .with_help(format!("add a conformance of `{}` to `{}`", ty, interface))
            .finish(),

        ConformanceIssue::Unavailable { .. } => {
            let index = LineIndex::new(source);
            let declared_at = issue
                .span()
                .map(|s| index.describe(s))
                .unwrap_or_else(|| "an unknown location".to_string());
            Report::build(ReportKind::Error, span.clone())
                .with_code(issue.code())
                .with_message(&msg)
                .with_config(config)
                .with_label(
                    Label::new(span)
                        .with_message("declared in an unavailable extension")
                        .with_color(Color::Red),
                )
                .with_note(format!("conformance declared at {}", declared_at))
                .finish()
        }

        ConformanceIssue::Isolated { actor, .. } => Report::build(ReportKind::Error, span.clone())
            .with_code(issue.code())
            .with_message(&msg)
            .with_config(config)
            .with_label(
                Label::new(span)
                    .with_message(format!("isolated to `{}`", actor))
                    .with_color(Color::Red),
            )
            .with_help(format!("use the conformance only from `{}`", actor))
            .finish(),
    };

    // Render to buffer without colors.
    let mut buf = Vec::new();
    let cache = Source::from(source);
    report.write(cache, &mut buf).expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}
