//! xUnit XML and JSON serializations of a [`LintReport`].

use std::path::Path;

use mxlint_types::{LintReport, Result, Testcase};

/// Render the testsuite tree as xUnit-style XML.
///
/// `testsuites > testsuite > testcase [> failure | skipped]`, one testsuite
/// per rule in discovery order.
pub fn render_xunit(report: &LintReport) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<testsuites tests=\"{}\" failures=\"{}\" skipped=\"{}\">\n",
        report.total_testcases(),
        report.failures(),
        report.skipped()
    ));

    for suite in &report.testsuites {
        out.push_str(&format!(
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{}\">\n",
            escape_xml(&suite.name),
            suite.tests,
            suite.failures,
            suite.skipped,
            suite.time
        ));
        for testcase in &suite.testcases {
            render_testcase(&mut out, testcase);
        }
        out.push_str("  </testsuite>\n");
    }

    out.push_str("</testsuites>\n");
    out
}

fn render_testcase(out: &mut String, testcase: &Testcase) {
    let open = format!(
        "    <testcase name=\"{}\" time=\"{}\"",
        escape_xml(&testcase.name),
        testcase.time
    );

    if let Some(failure) = &testcase.failure {
        out.push_str(&open);
        out.push_str(">\n");
        out.push_str(&format!(
            "      <failure message=\"{}\" type=\"{}\">{}</failure>\n",
            escape_xml(&failure.message),
            escape_xml(&failure.kind),
            escape_xml(&failure.data)
        ));
        out.push_str("    </testcase>\n");
    } else if let Some(skipped) = &testcase.skipped {
        out.push_str(&open);
        out.push_str(">\n");
        out.push_str(&format!(
            "      <skipped message=\"{}\"></skipped>\n",
            escape_xml(&skipped.message)
        ));
        out.push_str("    </testcase>\n");
    } else {
        out.push_str(&open);
        out.push_str("></testcase>\n");
    }
}

/// Escapes special XML characters in a string.
///
/// Line breaks and tabs become character references so attribute values keep
/// them. Characters XML 1.0 cannot carry at all are dropped.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            c if c < '\u{20}' || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Render `{testsuites, rules}` as indented JSON.
pub fn render_json(report: &LintReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write whichever reports have a destination. `None` skips that format.
pub fn write_reports(
    report: &LintReport,
    xunit: Option<&Path>,
    json: Option<&Path>,
) -> Result<()> {
    if let Some(path) = xunit {
        std::fs::write(path, render_xunit(report))?;
        tracing::info!(path = %path.display(), "Wrote xunit report");
    }
    if let Some(path) = json {
        std::fs::write(path, render_json(report)?)?;
        tracing::info!(path = %path.display(), "Wrote JSON report");
    }
    Ok(())
}
