//! Markdown rendering of a finished mirror run.

use feed_mirror_core::contract::{EntryStatus, SynchroniseReport};

const RULE: &str = "\n---";

/// Renders the run as markdown: optional notes, an update stamp, then one
/// numbered section per source in source order.
pub fn render_report(report: &SynchroniseReport, notes: Option<&str>) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(notes) = notes {
        lines.push(notes.to_string());
        lines.push(RULE.to_string());
    }

    lines.push(format!(
        "\n# Updated: {}\n",
        report.updated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    for (idx, entry) in report.entries.iter().enumerate() {
        lines.push(format!("### {}. {}", idx + 1, entry.source.desc));
        lines.push(String::new());
        match &entry.status {
            EntryStatus::Failed { reason } => {
                lines.push("**Status:** 🔴 Failed".to_string());
                lines.push(format!("**Source:** `{}`", entry.source.url));
                lines.push(format!("**Reason:** {reason}"));
            }
            EntryStatus::Mirrored(linked) => {
                lines.push(format!("**Size:** {:.2} MB", linked.artifact.size_mb));
                lines.push(String::new());
                lines.push("- **Direct link:**".to_string());
                lines.push(format!("  - `{}`", linked.direct_url));
                lines.push(format!("  - Short: `{}`", linked.short_direct_url));
                lines.push("- **CDN link:**".to_string());
                lines.push(format!("  - `{}`", linked.cdn_url));
                lines.push(format!("  - Short: `{}`", linked.short_cdn_url));
            }
        }
        lines.push(RULE.to_string());
    }

    lines.join("\n")
}
