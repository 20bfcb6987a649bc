//! Output formatting functions.

use crate::cli::OutputFormat;
use crate::demo::{DemoReport, Outcome};

/// Format a value for output.
pub fn format_output<T: serde::Serialize>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(value).unwrap_or_default(),
        OutputFormat::Pretty => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

/// Format a demo report for display, one line per step.
pub fn format_report(report: &DemoReport) -> String {
    if report.steps.is_empty() {
        return "No steps recorded.".to_string();
    }

    let mut output = format!("DEMO ({} steps)\n", report.steps.len());
    output.push_str(&"-".repeat(40));
    let mut table = "";
    for step in &report.steps {
        if step.table != table {
            table = step.table.as_str();
            output.push_str(&format!("\n{table}"));
        }
        let mark = if step.matched { "ok" } else { "MISMATCH" };
        output.push_str(&format!("\n  [{mark}] {}: {}", step.action, describe(&step.outcome)));
        if !step.matched {
            output.push_str(&format!(" (expected {})", step.expected));
        }
    }

    let mismatches = report.mismatches().count();
    output.push_str(&format!(
        "\n{}\n{} matched, {} mismatched",
        "-".repeat(40),
        report.steps.len() - mismatches,
        mismatches
    ));
    output
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Done => "done".to_string(),
        Outcome::Found { record } => format!("found {record}"),
        Outcome::Absent => "absent".to_string(),
        Outcome::Failed { kind, error } => format!("{kind}: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::Step;

    fn step(table: &str, action: &str, matched: bool, outcome: Outcome) -> Step {
        Step {
            table: table.to_string(),
            action: action.to_string(),
            expected: "Done",
            matched,
            outcome,
        }
    }

    #[test]
    fn test_format_report_groups_by_table() {
        let report = DemoReport {
            steps: vec![
                step("test-table", "create device", true, Outcome::Done),
                step("test-table", "get deleted device", true, Outcome::Absent),
                step(
                    "test-table2",
                    "create device",
                    false,
                    Outcome::Failed {
                        kind: "Throttled",
                        error: "request throttled: slow down".to_string(),
                    },
                ),
            ],
        };

        let text = format_report(&report);
        assert_eq!(text.matches("test-table2").count(), 1);
        assert!(text.contains("[ok] create device: done"));
        assert!(text.contains("[MISMATCH] create device: Throttled"));
        assert!(text.contains("(expected Done)"));
        assert!(text.ends_with("2 matched, 1 mismatched"));
    }

    #[test]
    fn test_format_empty_report() {
        assert_eq!(format_report(&DemoReport::default()), "No steps recorded.");
    }

    #[test]
    fn test_json_output_is_compact() {
        let report = DemoReport {
            steps: vec![step("t", "create device", true, Outcome::Done)],
        };
        let json = format_output(&report, OutputFormat::Json);
        assert!(!json.contains('\n'));
        assert!(json.contains("\"status\":\"done\""));
    }
}
