use colored::Colorize;

use crate::decision::{ChangeReason, FieldChange, Outcome};
use crate::reconcile::{Plan, ReconcileReport};
use crate::value::Value;

/// Plain text lines for a list of field changes, one `<prefix> <path>` line
/// each. Secret values are never printed.
pub fn format_changes(changes: &[FieldChange]) -> String {
    let mut out = Vec::new();
    for change in changes {
        let line = match change.reason {
            ChangeReason::Added => format!(
                "+ {}: {}",
                change.path,
                display_value(change.after.as_ref())
            ),
            ChangeReason::Modified | ChangeReason::ListChanged => format!(
                "~ {}: {} -> {}",
                change.path,
                display_value(change.before.as_ref()),
                display_value(change.after.as_ref())
            ),
            ChangeReason::Secret => format!("! {}: (secret, always sent)", change.path),
        };
        out.push(line);
    }
    out.join("\n")
}

/// One-line summary: `outcome=<..> changed=<..> fields=<n>`.
pub fn format_summary(outcome: Outcome, changes: &[FieldChange]) -> String {
    format!(
        "outcome={} changed={} fields={}",
        outcome.as_str(),
        outcome != Outcome::Unchanged,
        changes.len()
    )
}

/// Render field changes for terminal output.
pub fn render_changes(changes: &[FieldChange]) -> String {
    let raw = format_changes(changes);
    let mut out = Vec::new();

    for line in raw.lines() {
        let colored = if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('~') {
            line.yellow().to_string()
        } else if line.starts_with('!') {
            line.magenta().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }

    out.join("\n")
}

/// Render a plan: changes followed by the summary line.
pub fn render_plan(key: &str, plan: &Plan) -> String {
    let mut out = vec![format!("resource {key}")];
    if !plan.change_set.changes.is_empty() {
        out.push(render_changes(&plan.change_set.changes));
    }
    out.push(
        format_summary(plan.change_set.outcome, &plan.change_set.changes)
            .cyan()
            .to_string(),
    );
    out.join("\n")
}

/// Render a reconcile report, including the remote response when one came back.
pub fn render_report(report: &ReconcileReport) -> String {
    let mut out = vec![format!("resource {}", report.key)];
    if !report.changes.is_empty() {
        out.push(render_changes(&report.changes));
    }
    out.push(
        format_summary(report.outcome, &report.changes)
            .cyan()
            .to_string(),
    );

    match &report.response {
        Some(response) => {
            out.push(format!("response status={} {}", response.status, response.message));
            for line in &response.diagnostics {
                out.push(format!("  {line}"));
            }
        }
        None if report.check_mode && report.changed => {
            out.push("check mode: nothing submitted".to_string());
        }
        None => {}
    }
    out.join("\n")
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None => "(unset)".to_string(),
        Some(value) => inline(value),
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::Scalar(s) => s.clone(),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(inline).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Record(record) => {
            let fields: Vec<String> = record
                .iter()
                .map(|(key, value)| format!("{key}={}", inline(value)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
    }
}
