//! Markdown export of stored reports

use crate::domain::Verdict;
use crate::engine::report::FinalReport;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*(.+?):\*\*(?:\s+(.+))?$").expect("heading pattern is valid")
});

const LEAD_TITLE: &str = "Executive Summary";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub title: String,
    pub body: String,
}

/// Split a consolidated summary into titled sections
///
/// A line `**Title:**` (optionally followed by text) opens a section. Text
/// before the first heading belongs to "Executive Summary". Lines holding
/// only `---` are dropped.
pub fn parse_sections(summary: &str) -> Vec<ReportSection> {
    let mut sections = Vec::new();
    let mut title = LEAD_TITLE.to_string();
    let mut lines: Vec<&str> = Vec::new();

    let flush = |title: &str, lines: &mut Vec<&str>, sections: &mut Vec<ReportSection>| {
        let body = lines.join("\n").trim().to_string();
        lines.clear();
        if !body.is_empty() {
            sections.push(ReportSection {
                title: title.to_string(),
                body,
            });
        }
    };

    for line in summary.lines() {
        let stripped = line.trim();
        if stripped == "---" {
            continue;
        }
        if let Some(caps) = HEADING.captures(stripped) {
            flush(&title, &mut lines, &mut sections);
            title = caps[1].trim().to_string();
            if let Some(inline) = caps.get(2) {
                lines.push(inline.as_str());
            }
            continue;
        }
        lines.push(line);
    }
    flush(&title, &mut lines, &mut sections);

    sections
}

fn verdict_banner(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Buy => "> **Verdict: BUY**",
        Verdict::NotBuy => "> **Verdict: NOT BUY**",
    }
}

/// Render a report as a standalone Markdown document
pub fn render_markdown(report: &FinalReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} Stock Report\n", report.symbol);
    let _ = writeln!(out, "{}\n", verdict_banner(report.verdict));

    for section in parse_sections(&report.summary) {
        let _ = writeln!(out, "## {}\n\n{}\n", section.title, section.body);
    }

    if !report.sections.is_empty() {
        out.push_str("## Specialist Findings\n\n");
        for (dimension, narrative) in &report.sections {
            let _ = writeln!(out, "### {}\n\n{}\n", dimension.title(), narrative.trim());
        }
    }

    if !report.limitations.is_empty() {
        out.push_str("## Data Limitations\n\n");
        for note in &report.limitations {
            let _ = writeln!(out, "- {note}");
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "---\n*Generated {} (verdict basis: {})*",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.verdict_basis.as_str()
    );
    out
}

/// `TEL_report.md`
pub fn default_file_name(report: &FinalReport) -> String {
    format!("{}_report.md", report.symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dimension, Symbol};
    use crate::engine::report::VerdictBasis;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    const SUMMARY: &str = "TEL looks fairly valued.\n\n---\n\
        **Price Analysis:**\nNear the middle of its range.\n\n\
        **Dividend Analysis:** Yield of 6.2% is well covered.\n\
        ---\n\
        **Verdict:** BUY\nSolid income play.";

    #[test]
    fn test_parse_sections() {
        let sections = parse_sections(SUMMARY);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Executive Summary", "Price Analysis", "Dividend Analysis", "Verdict"]
        );
        assert_eq!(sections[1].body, "Near the middle of its range.");
        assert_eq!(sections[2].body, "Yield of 6.2% is well covered.");
        assert_eq!(sections[3].body, "BUY\nSolid income play.");
        assert!(sections.iter().all(|s| !s.body.contains("---")));
    }

    #[test]
    fn test_parse_sections_without_headings() {
        let sections = parse_sections("Just one paragraph.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Executive Summary");
        assert!(parse_sections("").is_empty());
    }

    #[test]
    fn test_render_markdown() {
        let report = FinalReport {
            symbol: Symbol::parse("TEL").unwrap(),
            verdict: Verdict::Buy,
            summary: SUMMARY.to_string(),
            sections: BTreeMap::from([(Dimension::Price, "Mid-range.".to_string())]),
            limitations: vec!["Data limitation: Valuation Analysis unavailable (timed out).".to_string()],
            verdict_basis: VerdictBasis::Reasoning,
            generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
        };

        let md = render_markdown(&report);
        assert!(md.starts_with("# TEL Stock Report\n\n> **Verdict: BUY**"));
        assert!(md.contains("## Dividend Analysis\n\nYield of 6.2% is well covered."));
        assert!(md.contains("### Price Analysis\n\nMid-range."));
        assert!(md.contains("- Data limitation: Valuation Analysis unavailable"));
        assert!(md.contains("*Generated 2026-03-01 09:30 UTC (verdict basis: reasoning)*"));
        assert_eq!(default_file_name(&report), "TEL_report.md");
    }
}
