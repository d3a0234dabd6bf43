//! Plain-text rendering of results and progress events for the terminal.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use hat_coordination::{DegradationLevel, Hat, HatOutput, WorkflowEvent, WorkflowResult};

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%H:%M:%S").to_string()
}

fn badge(output: &HatOutput) -> &'static str {
    match (output.level, output.search_used) {
        (DegradationLevel::Unavailable, _) => "unavailable",
        (DegradationLevel::Partial, _) => "no evidence",
        (DegradationLevel::Full, true) => "searched",
        (DegradationLevel::Full, false) => "",
    }
}

fn write_output(out: &mut String, output: &HatOutput) {
    let badge = badge(output);
    let _ = write!(out, "\n── {} ", output.hat.label());
    if !badge.is_empty() {
        let _ = write!(out, "[{badge}] ");
    }
    let _ = writeln!(
        out,
        "({} ms, {})",
        output.elapsed_ms,
        timestamp(&output.produced_at)
    );
    let _ = writeln!(out, "{}", output.text.trim());
}

/// Full report: analysis, every perspective, the final answer, and lookup
/// statistics.
pub fn render_result(result: &WorkflowResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Query: {}", result.query);
    let _ = writeln!(out, "{}", result.analysis.rationale);

    for hat in Hat::ALL {
        if hat == Hat::SYNTHESIS {
            continue;
        }
        if let Some(output) = result.output(hat) {
            write_output(&mut out, output);
        }
    }

    let _ = writeln!(out, "\n══ Final answer ({}) ══", Hat::SYNTHESIS.label());
    let _ = writeln!(out, "{}", result.final_output.trim());

    let stats = &result.stats;
    let _ = writeln!(
        out,
        "\nLookups: {}/{} executed, {} cache hits, {} duplicates prevented, {} failed ({} ms total)",
        stats.lookups_executed,
        stats.lookup_budget,
        stats.cache_hits,
        stats.duplicates_prevented,
        stats.provider_failures,
        stats.total_elapsed_ms,
    );
    for error in &result.errors {
        let _ = writeln!(out, "warning: {error}");
    }
    out
}

/// One line (plus the hat's text, for hat steps) per progress event.
pub fn render_event(event: &WorkflowEvent) -> String {
    match event {
        WorkflowEvent::Progress { tag, step, state } => {
            let mut out = format!("[{tag}] {step}");
            let hat = step
                .strip_suffix("_hat")
                .and_then(|name| name.parse::<Hat>().ok());
            match hat {
                Some(hat) if hat != Hat::SYNTHESIS => {
                    if let Some(output) = state.outputs().get(&hat) {
                        write_output(&mut out, output);
                    }
                }
                Some(_) => {}
                None if step == "query_analyzer" => {
                    if let Some(analysis) = &state.analysis {
                        let _ = write!(out, "\n{}", analysis.rationale);
                    }
                }
                None => {}
            }
            out
        }
        WorkflowEvent::Complete(result) => format!(
            "[done] {} lookups, {} ms",
            result.stats.lookups_executed, result.stats.total_elapsed_ms
        ),
        WorkflowEvent::Aborted { error } => format!("[aborted] {error}"),
    }
}
