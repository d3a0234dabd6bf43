//! Context assembly for the sequential and synthesis hats, plus prompt
//! rendering.
//!
//! Everything here is pure: inputs are the outputs and lookup contexts
//! already written to the workflow state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hats::Hat;
use crate::prompts::{RESPONSE_LIMIT, SEARCH_USAGE_NOTE};
use crate::resilience::HatOutput;
use crate::search::types::HatSearchContext;

pub const INSIGHTS_PER_HAT: usize = 3;
pub const INSIGHT_SNIPPET_CHARS: usize = 200;
pub const EVIDENCE_PER_HAT: usize = 2;
pub const EVIDENCE_EXCERPT_CHARS: usize = 150;
/// Content excerpt length when rendering lookup results into a prompt.
pub const SEARCH_CONTENT_CHARS: usize = 500;
pub const MAX_THEMES: usize = 5;

const THEME_VOCABULARY: [&str; 10] = [
    "opportunity",
    "risk",
    "benefit",
    "challenge",
    "innovation",
    "solution",
    "strategy",
    "advantage",
    "problem",
    "creative",
];

/// Complementary perspective pairs and the synthesis they suggest.
const SYNTHESIS_PAIRS: [(Hat, Hat, &str); 3] = [
    (Hat::Yellow, Hat::Black, "Balance benefits (Yellow) with risks (Black)"),
    (Hat::White, Hat::Green, "Use facts (White) to inform creativity (Green)"),
    (Hat::Red, Hat::Yellow, "Combine emotions (Red) with optimism (Yellow)"),
];

/// Cut `text` to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn key_themes<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<String> {
    let combined = texts.collect::<Vec<_>>().join(" ").to_lowercase();
    THEME_VOCABULARY
        .iter()
        .filter(|t| combined.contains(*t))
        .take(MAX_THEMES)
        .map(|t| t.to_string())
        .collect()
}

/// Pairs whose hats both produced a real (non-placeholder) output.
fn synthesis_opportunities(outputs: &BTreeMap<Hat, HatOutput>) -> Vec<String> {
    let real = |hat: Hat| outputs.get(&hat).is_some_and(|o| !o.is_placeholder());
    SYNTHESIS_PAIRS
        .iter()
        .filter(|(a, b, _)| real(*a) && real(*b))
        .map(|(_, _, text)| text.to_string())
        .collect()
}

// ── Aggregation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchInsight {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// What the creative hat sees of the parallel wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedContext {
    /// Every parallel hat's text, placeholders included.
    pub parallel_responses: BTreeMap<Hat, String>,
    pub search_insights: BTreeMap<Hat, Vec<SearchInsight>>,
    pub key_themes: Vec<String>,
    pub synthesis_opportunities: Vec<String>,
}

impl AggregatedContext {
    pub fn build(
        outputs: &BTreeMap<Hat, HatOutput>,
        contexts: &BTreeMap<Hat, HatSearchContext>,
    ) -> Self {
        let parallel_responses: BTreeMap<Hat, String> = outputs
            .iter()
            .filter(|(hat, _)| hat.is_parallel())
            .map(|(&hat, out)| (hat, out.text.clone()))
            .collect();

        let search_insights = contexts
            .iter()
            .filter(|(_, ctx)| !ctx.results.is_empty())
            .map(|(&hat, ctx)| {
                let insights = ctx
                    .results
                    .iter()
                    .take(INSIGHTS_PER_HAT)
                    .map(|r| SearchInsight {
                        title: r.title.clone(),
                        snippet: truncate_chars(&r.content, INSIGHT_SNIPPET_CHARS),
                        url: r.url.clone(),
                    })
                    .collect();
                (hat, insights)
            })
            .collect();

        let real_texts = outputs
            .values()
            .filter(|o| o.hat.is_parallel() && !o.is_placeholder())
            .map(|o| o.text.as_str());

        Self {
            key_themes: key_themes(real_texts),
            synthesis_opportunities: synthesis_opportunities(outputs),
            parallel_responses,
            search_insights,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("## Aggregated Perspectives from Parallel Hats:\n");
        for (hat, text) in &self.parallel_responses {
            out.push_str(&format!("\n### {}:\n{}\n", hat.label(), text));
        }
        if !self.search_insights.is_empty() {
            out.push_str("\n### Search Insights:\n");
            for (hat, insights) in &self.search_insights {
                for insight in insights {
                    out.push_str(&format!(
                        "- [{}] {}: {}\n",
                        hat.as_str(),
                        insight.title,
                        insight.snippet
                    ));
                }
            }
        }
        if !self.key_themes.is_empty() {
            out.push_str(&format!("\n### Key Themes Identified:\n{}\n", self.key_themes.join(", ")));
        }
        if !self.synthesis_opportunities.is_empty() {
            out.push_str("\n### Synthesis Opportunities:\n");
            for opp in &self.synthesis_opportunities {
                out.push_str(&format!("- {opp}\n"));
            }
        }
        out
    }
}

// ── Synthesis ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

/// What the synthesis hat sees of the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisContext {
    pub all_perspectives: BTreeMap<Hat, String>,
    pub search_evidence: BTreeMap<Hat, Vec<Evidence>>,
    pub synthesis_notes: String,
    pub synthesis_opportunities: Vec<String>,
}

impl SynthesisContext {
    /// `contexts` covers both lookup phases; a hat's sequential context
    /// replaces its initial one.
    pub fn build<'a>(
        outputs: &BTreeMap<Hat, HatOutput>,
        contexts: impl IntoIterator<Item = &'a HatSearchContext>,
    ) -> Self {
        let all_perspectives = outputs
            .iter()
            .filter(|(hat, _)| **hat != Hat::SYNTHESIS)
            .map(|(&hat, out)| (hat, out.text.clone()))
            .collect();

        let mut search_evidence = BTreeMap::new();
        for ctx in contexts {
            if ctx.results.is_empty() {
                continue;
            }
            let evidence: Vec<Evidence> = ctx
                .results
                .iter()
                .take(EVIDENCE_PER_HAT)
                .map(|r| Evidence {
                    title: r.title.clone(),
                    url: r.url.clone(),
                    excerpt: truncate_chars(&r.content, EVIDENCE_EXCERPT_CHARS),
                })
                .collect();
            search_evidence.insert(ctx.hat, evidence);
        }

        Self {
            synthesis_notes: synthesis_notes(outputs),
            synthesis_opportunities: synthesis_opportunities(outputs),
            all_perspectives,
            search_evidence,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("## All Thinking Hat Perspectives:\n");
        for (hat, text) in &self.all_perspectives {
            out.push_str(&format!("\n### {}:\n{}\n", hat.label(), text));
        }
        if !self.search_evidence.is_empty() {
            out.push_str("\n### Search Evidence:\n");
            for (hat, evidence) in &self.search_evidence {
                out.push_str(&format!("\n**{} Hat Evidence:**\n", hat.as_str().to_uppercase()));
                for item in evidence {
                    out.push_str(&format!("- {}: {}\n", item.title, item.excerpt));
                }
            }
        }
        if !self.synthesis_opportunities.is_empty() {
            out.push_str("\n### Synthesis Opportunities:\n");
            for opp in &self.synthesis_opportunities {
                out.push_str(&format!("- {opp}\n"));
            }
        }
        out.push_str(&format!("\n{}\n", self.synthesis_notes));
        out
    }
}

fn synthesis_notes(outputs: &BTreeMap<Hat, HatOutput>) -> String {
    let mut notes = vec!["Perspective Summary:".to_string()];
    for hat in Hat::ALL.into_iter().filter(|&h| h != Hat::SYNTHESIS) {
        match outputs.get(&hat) {
            Some(out) if out.is_placeholder() => {
                notes.push(format!("- {}: unavailable (placeholder)", hat.label()));
            }
            Some(out) => {
                notes.push(format!("- {}: {} characters", hat.label(), out.text.chars().count()));
            }
            None => notes.push(format!("- {}: missing", hat.label())),
        }
    }
    notes.push(String::new());
    notes.push(
        "Key Insight: the creative perspective was produced after reading the four parallel ones."
            .to_string(),
    );
    notes.join("\n")
}

// ── Prompt rendering ──────────────────────────────────────────────────────────

/// Numbered lookup results for a hat's system prompt.
pub fn render_search_context(ctx: &HatSearchContext) -> String {
    let mut parts = vec!["## Search Results Available:".to_string()];
    for (i, r) in ctx.results.iter().enumerate() {
        parts.push(format!("\n### Search Result {} (Score: {:.2})", i + 1, r.score));
        parts.push(format!("**Title:** {}", r.title));
        parts.push(format!("**URL:** {}", r.url));
        parts.push(format!("**Content:** {}", truncate_chars(&r.content, SEARCH_CONTENT_CHARS)));
    }
    parts.join("\n")
}

/// Preamble, then any extra sections, then the lookup results and the
/// length limit.
pub fn system_prompt(hat: Hat, sections: &[String], lookup: Option<&HatSearchContext>) -> String {
    let mut prompt = hat.preamble().to_string();
    for section in sections {
        prompt.push_str("\n\n");
        prompt.push_str(section);
    }
    if let Some(ctx) = lookup.filter(|c| !c.results.is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(&render_search_context(ctx));
        prompt.push_str("\n\n");
        prompt.push_str(SEARCH_USAGE_NOTE);
    }
    prompt.push_str("\n\n");
    prompt.push_str(RESPONSE_LIMIT);
    prompt
}
