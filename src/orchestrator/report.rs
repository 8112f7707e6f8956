//! Markdown rendering of a run's results
//!
//! Renders whatever stages completed, in order. A partial run renders only
//! its completed stages, so a failed run still produces something readable.

use crate::orchestrator::stages::{StageResult, StageResults};
use std::fmt::Write;

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "**{}:**", title);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
    out.push('\n');
}

fn push_optional(out: &mut String, title: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        let _ = writeln!(out, "**{}:** {}\n", title, value);
    }
}

/// Render available stage results as a Markdown document
pub fn render_markdown(results: &StageResults) -> String {
    let mut out = String::from("# Your WOOP Plan\n\n");

    for result in results.iter() {
        let stage = result.stage();
        let _ = writeln!(out, "## {}. {}\n", stage.number(), stage.name());

        match result {
            StageResult::Intake(intake) => {
                let _ = writeln!(out, "{}\n", intake.summary);
                push_list(&mut out, "Strengths", &intake.strengths);
                push_list(&mut out, "Interests", &intake.interests);
                push_list(&mut out, "Constraints", &intake.constraints);
                push_optional(
                    &mut out,
                    "Recommended track",
                    intake.recommended_track.as_deref(),
                );
            }
            StageResult::Wish(wish) => {
                let _ = writeln!(out, "> {}\n", wish.wish);
                push_optional(&mut out, "Why", wish.rationale.as_deref());
            }
            StageResult::Outcome(outcome) => {
                let _ = writeln!(out, "{}\n", outcome.outcome);
                push_list(&mut out, "Benefits", &outcome.benefits);
                push_optional(&mut out, "How it will feel", outcome.feeling.as_deref());
            }
            StageResult::Obstacles(obstacles) => {
                for obstacle in &obstacles.obstacles {
                    let _ = write!(out, "- **{}**", obstacle.obstacle);
                    if let Some(kind) = &obstacle.kind {
                        let _ = write!(out, " ({})", kind);
                    }
                    if let Some(description) = &obstacle.description {
                        let _ = write!(out, ": {}", description);
                    }
                    out.push('\n');
                }
                out.push('\n');
            }
            StageResult::Plan(plan) => {
                for step in &plan.plans {
                    let _ = writeln!(out, "- If {}, then {}", step.trigger, step.action);
                }
                out.push('\n');
                push_optional(&mut out, "First step", plan.first_step.as_deref());
                push_optional(&mut out, "Timeline", plan.timeline.as_deref());
            }
        }
    }

    out.trim_end().to_string() + "\n"
}
