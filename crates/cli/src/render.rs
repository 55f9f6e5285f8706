//! Plain-text rendering of run results.

use std::fmt::Write;
use std::path::PathBuf;

use ideagen_core::idea::{confidence_badge, IdeaDetail, RunIdeas};
use ideagen_core::types::{IdeaId, JobId};

/// Idea cards of a run, with the selected direction when there is one.
pub fn render_idea_list(run: &RunIdeas) -> String {
    let mut out = String::new();

    if let Some(direction) = run.selected_direction.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "Direction: {direction}\n");
    }

    if run.ideas.is_empty() {
        let _ = writeln!(out, "No ideas were generated for run {}.", run.run_id);
        return out;
    }

    let _ = writeln!(out, "{} idea(s) for run {}:\n", run.ideas.len(), run.run_id);
    for idea in &run.ideas {
        let _ = writeln!(
            out,
            "#{} {} [{}]",
            idea.id,
            idea.title,
            confidence_badge(&idea.confidence_level)
        );
        let _ = writeln!(out, "    Pain:    {}", idea.pain_description);
        let _ = writeln!(out, "    Segment: {}", idea.segment);
        out.push('\n');
    }
    out
}

/// Full idea card with analogues and action plans.
pub fn render_idea_detail(idea: &IdeaDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} [{}]\n",
        idea.title,
        confidence_badge(&idea.confidence_level)
    );
    let _ = writeln!(out, "Pain:     {}", idea.pain_description);
    let _ = writeln!(out, "Segment:  {}", idea.segment);

    let evidence = idea
        .detailed_evidence
        .as_deref()
        .or(idea.brief_evidence.as_deref());
    if let Some(evidence) = evidence {
        let _ = writeln!(out, "Evidence: {evidence}");
    }

    if !idea.analogues.is_empty() {
        let _ = writeln!(out, "\nAnalogues:");
        for a in &idea.analogues {
            let _ = writeln!(out, "  - {}: {} ({})", a.name, a.description, a.url);
        }
    }

    for (label, plan) in [
        ("7-day plan", &idea.plan_7days),
        ("30-day plan", &idea.plan_30days),
    ] {
        if let Some(plan) = plan.as_deref() {
            let _ = writeln!(out, "\n{label}:\n{plan}");
        }
    }
    out
}

/// Where `export` writes when no `--out` is given.
pub fn default_export_path(job_id: &JobId) -> PathBuf {
    PathBuf::from(format!("ideas-{job_id}.md"))
}

/// Parse a comma-separated list of idea ids. An empty list is an error:
/// exporting "no ideas" is never what the user meant.
pub fn parse_idea_ids(raw: &str) -> Result<Vec<IdeaId>, String> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<IdeaId>().map_err(|_| format!("`{s}` is not an idea id")))
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err("select at least one idea to export".to_string());
    }
    Ok(ids)
}
