use crate::models::ReportEntry;

pub const POINTS_HEADER: &str = "Engagement points";
pub const NO_POINTS_LINE: &str = "- No points extracted";

pub trait ReportFormatter: Send + Sync {
    fn format(&self, entries: &[ReportEntry]) -> String;
}

/// One numbered block per article:
///
/// ```text
/// 01. 'Title'
/// https://link
///
/// Engagement points
/// 1. first
/// 2. second
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextFormatter;

impl ReportFormatter for PlainTextFormatter {
    fn format(&self, entries: &[ReportEntry]) -> String {
        if entries.is_empty() {
            tracing::warn!("No report entries to format");
            return String::new();
        }

        let mut output = String::new();
        for (i, entry) in entries.iter().enumerate() {
            output.push_str(&format!("{:02}. '{}'\n{}\n\n", i + 1, entry.title, entry.link));
            output.push_str(POINTS_HEADER);
            output.push('\n');
            if entry.points.is_empty() {
                output.push_str(NO_POINTS_LINE);
                output.push('\n');
            } else {
                for (j, point) in entry.points.iter().enumerate() {
                    output.push_str(&format!("{}. {}\n", j + 1, point));
                }
            }
            output.push('\n');
        }

        tracing::info!("Formatted {} report entries", entries.len());
        output.trim().to_string()
    }
}
