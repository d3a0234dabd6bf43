//! Rule-based query classifier.
//!
//! Pure and deterministic: the same query always yields the same analysis.
//!
//! ## Complexity score
//!
//! | Signal                                         | Points |
//! |------------------------------------------------|--------|
//! | more than 15 words                             | +1     |
//! | technical term (quantum, blockchain, ai, ...)  | +2     |
//! | multiple clauses (`??`, and/or/but, 3+ commas) | +1     |
//! | comparison term (versus, trade-off, ...)       | +1     |
//!
//! `<= 1` simple, `2..=3` moderate, `>= 4` complex.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::CoordinationError;
use crate::hats::Hat;

use super::{BudgetAllocator, Complexity, QueryAnalysis, QueryType, SearchPriority, Topic};

static TECHNICAL_TERM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(algorithm|quantum|crypto|blockchain|ai|ml|neural|bioinformatics|pharmacology)\b")
        .expect("TECHNICAL_TERM_RE regex should compile")
});

static COMPARISON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(compare|versus|vs|difference|trade-off|pros/cons|advantage|disadvantage)\b")
        .expect("COMPARISON_RE regex should compile")
});

static CONJUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(and|or|but)\b").expect("CONJUNCTION_RE regex should compile")
});

/// Keyword tables, in tie-break order.
const TOPIC_KEYWORDS: &[(Topic, &[&str])] = &[
    (
        Topic::Business,
        &[
            "business", "company", "startup", "entrepreneur", "revenue", "profit", "market",
            "competition", "strategy", "investment", "funding", "ipo", "merger", "acquisition",
            "venture", "roi", "sales", "customer",
        ],
    ),
    (
        Topic::Health,
        &[
            "health", "medical", "disease", "treatment", "therapy", "doctor", "hospital",
            "medicine", "drug", "symptom", "diagnosis", "healthcare", "wellness", "nutrition",
            "exercise", "fitness", "mental health",
        ],
    ),
    (
        Topic::Technology,
        &[
            "technology", "software", "programming", "ai", "machine learning", "data",
            "algorithm", "tech", "digital", "computer", "internet", "cloud", "cybersecurity",
            "blockchain", "quantum", "robotics",
        ],
    ),
    (
        Topic::Emotional,
        &[
            "feel", "emotion", "feeling", "sad", "happy", "angry", "anxious", "relationship",
            "love", "family", "friendship", "personal", "mood", "psychology", "mental",
            "self-esteem", "confidence",
        ],
    ),
    (
        Topic::Social,
        &[
            "society", "social", "community", "culture", "political", "government", "policy",
            "law", "ethics", "justice", "equality", "diversity", "public", "social media",
            "news", "controversy",
        ],
    ),
    (
        Topic::Safety,
        &[
            "safety", "risk", "danger", "hazard", "security", "threat", "vulnerability",
            "accident", "injury", "harm", "warning", "liability", "insurance", "precaution",
        ],
    ),
];

const EMOTION_CUES: &[&str] = &["feel", "emotion", "reaction", "response", "sentiment"];
const BENEFIT_CUES: &[&str] = &["benefit", "advantage", "opportunity", "success", "positive"];
const RISK_CUES: &[&str] = &["risk", "problem", "failure", "danger", "criticism"];
const CREATIVE_CUES: &[&str] = &["creative", "innovation", "alternative", "solution", "breakthrough"];

/// Query-type rules, first match wins.
const QUERY_TYPE_RULES: &[(QueryType, &[&str])] = &[
    (QueryType::Recommendation, &["should", "must", "recommend", "suggest"]),
    (QueryType::Informational, &["what", "who", "where", "when", "how"]),
    (QueryType::Comparative, &["compare", "vs", "versus", "difference"]),
    (QueryType::Analytical, &["analyze", "evaluate", "assess"]),
];

/// Lower-cased query plus its token set, computed once per analysis.
struct Normalized {
    text: String,
    tokens: HashSet<String>,
}

impl Normalized {
    fn new(query: &str) -> Self {
        let text = query.to_lowercase();
        let tokens = text
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        Self { text, tokens }
    }

    /// Short keywords (three letters or fewer) match whole tokens so that
    /// "ai" does not fire inside "said"; longer ones match as substrings.
    fn contains(&self, keyword: &str) -> bool {
        if keyword.len() <= 3 && !keyword.contains(' ') {
            self.tokens.contains(keyword)
        } else {
            self.text.contains(keyword)
        }
    }

    fn contains_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.contains(k))
    }

    fn hits(&self, keywords: &[&str]) -> usize {
        keywords.iter().filter(|k| self.contains(k)).count()
    }
}

#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    allocator: BudgetAllocator,
}

impl QueryAnalyzer {
    pub fn new(budget: usize) -> Self {
        Self {
            allocator: BudgetAllocator::new(budget),
        }
    }

    /// Classify `query`, assign priorities and lookup strings, and allocate
    /// the budget.
    ///
    /// An empty query is an analysis error. A broken allocation post-condition
    /// is returned as a fatal `BudgetInvariant` error.
    pub fn analyze(&self, query: &str) -> Result<QueryAnalysis, CoordinationError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(CoordinationError::Analysis("query is empty".into()));
        }

        let norm = Normalized::new(trimmed);
        let complexity = complexity(trimmed, &norm);
        let topic = topic(&norm);
        let query_type = query_type(&norm);
        let priorities = priorities(&norm, complexity, topic);
        let queries: BTreeMap<Hat, String> = Hat::ALL
            .into_iter()
            .map(|hat| (hat, hat.lookup_query(trimmed, topic)))
            .collect();

        let allocation = self.allocator.allocate(&priorities)?;
        let rationale = rationale(complexity, topic, &allocation, &priorities);

        debug!(
            complexity = %complexity,
            topic = %topic,
            query_type = %query_type,
            allocated = allocation.len(),
            "query analyzed"
        );

        Ok(QueryAnalysis {
            query: trimmed.to_string(),
            complexity,
            topic,
            query_type,
            priorities,
            queries,
            allocation,
            rationale,
        })
    }
}

fn complexity(query: &str, norm: &Normalized) -> Complexity {
    let mut score = 0u8;

    if query.split_whitespace().count() > 15 {
        score += 1;
    }
    if TECHNICAL_TERM_RE.is_match(&norm.text) {
        score += 2;
    }
    let multi_clause = query.matches('?').count() > 1
        || CONJUNCTION_RE.is_match(&norm.text)
        || query.matches(',').count() >= 3;
    if multi_clause {
        score += 1;
    }
    if COMPARISON_RE.is_match(&norm.text) {
        score += 1;
    }

    match score {
        0..=1 => Complexity::Simple,
        2..=3 => Complexity::Moderate,
        _ => Complexity::Complex,
    }
}

fn topic(norm: &Normalized) -> Topic {
    let mut best = (Topic::General, 0usize);
    for &(topic, keywords) in TOPIC_KEYWORDS {
        let hits = norm.hits(keywords);
        // Strictly greater keeps the earliest topic on ties.
        if hits > best.1 {
            best = (topic, hits);
        }
    }
    best.0
}

fn query_type(norm: &Normalized) -> QueryType {
    QUERY_TYPE_RULES
        .iter()
        .find(|(_, words)| words.iter().any(|w| norm.tokens.contains(*w)))
        .map(|&(t, _)| t)
        .unwrap_or(QueryType::General)
}

fn priorities(
    norm: &Normalized,
    complexity: Complexity,
    topic: Topic,
) -> BTreeMap<Hat, SearchPriority> {
    use SearchPriority::*;

    let complex = complexity == Complexity::Complex;
    let red = if matches!(topic, Topic::Emotional | Topic::Social) || norm.contains_any(EMOTION_CUES)
    {
        High
    } else {
        Medium
    };
    let yellow = if topic == Topic::Business || complex || norm.contains_any(BENEFIT_CUES) {
        High
    } else {
        Medium
    };
    let black = if matches!(topic, Topic::Health | Topic::Safety) || norm.contains_any(RISK_CUES) {
        High
    } else {
        Medium
    };
    let green = if complex || norm.contains_any(CREATIVE_CUES) {
        Medium
    } else {
        Low
    };

    BTreeMap::from([
        (Hat::White, Critical),
        (Hat::Red, red),
        (Hat::Yellow, yellow),
        (Hat::Black, black),
        (Hat::Green, green),
        (Hat::Blue, Low),
    ])
}

fn rationale(
    complexity: Complexity,
    topic: Topic,
    allocation: &[Hat],
    priorities: &BTreeMap<Hat, SearchPriority>,
) -> String {
    let mut text = format!("Query classified as {complexity} complexity, {topic} topic.");
    if allocation.is_empty() {
        text.push_str(" No search budget allocated.");
        return text;
    }
    let hats: Vec<String> = allocation
        .iter()
        .map(|hat| {
            let tier = priorities.get(hat).copied().unwrap_or(SearchPriority::Never);
            format!("{} ({tier})", hat.short_label())
        })
        .collect();
    text.push_str(&format!(
        " Search budget allocated to {} hats: {}.",
        allocation.len(),
        hats.join(", ")
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(query: &str) -> QueryAnalysis {
        QueryAnalyzer::new(4).analyze(query).unwrap()
    }

    #[test]
    fn quantum_question_is_moderate_technology() {
        let a = analyze("What is quantum computing?");
        assert_eq!(a.complexity, Complexity::Moderate);
        assert_eq!(a.topic, Topic::Technology);
        assert_eq!(a.query_type, QueryType::Informational);
        assert_eq!(a.priority(Hat::White), SearchPriority::Critical);
        assert_eq!(a.allocation, vec![Hat::White, Hat::Red, Hat::Yellow, Hat::Black]);
        assert!(a.rationale.starts_with(
            "Query classified as moderate complexity, technology topic. \
             Search budget allocated to 4 hats: White (Facts) (critical)"
        ));
    }

    #[test]
    fn complex_comparison_raises_yellow_and_green() {
        let a = analyze(
            "Compare the trade-off between neural network algorithm accuracy and energy cost",
        );
        assert_eq!(a.complexity, Complexity::Complex);
        assert_eq!(a.priority(Hat::Yellow), SearchPriority::High);
        assert_eq!(a.priority(Hat::Green), SearchPriority::Medium);
        assert_eq!(a.query_type, QueryType::Comparative);
        // Green is eligible but outranked by the four parallel hats.
        assert_eq!(a.allocation.len(), 4);
        assert!(!a.is_allocated(Hat::Green));
    }

    #[test]
    fn short_plain_query_is_simple_general() {
        let a = analyze("Tell me about gardening");
        assert_eq!(a.complexity, Complexity::Simple);
        assert_eq!(a.topic, Topic::General);
        assert_eq!(a.priority(Hat::Green), SearchPriority::Low);
        assert_eq!(a.priority(Hat::Blue), SearchPriority::Low);
    }

    #[test]
    fn topic_ties_go_to_earlier_category() {
        // One business hit ("startup"), one health hit ("therapy").
        let a = analyze("startup therapy");
        assert_eq!(a.topic, Topic::Business);
    }

    #[test]
    fn health_topic_raises_black() {
        let a = analyze("Is this new drug treatment effective?");
        assert_eq!(a.topic, Topic::Health);
        assert_eq!(a.priority(Hat::Black), SearchPriority::High);
        assert_eq!(
            a.query_for(Hat::Black),
            Some("Is this new drug treatment effective? health risks side effects dangers problems")
        );
    }

    #[test]
    fn short_keywords_match_whole_words_only() {
        // "said" must not count as "ai", "flaw" must not count as "law".
        let a = analyze("She said the flaw was minor");
        assert_eq!(a.topic, Topic::General);
        assert_eq!(a.complexity, Complexity::Simple);
    }

    #[test]
    fn emotional_cue_raises_red() {
        let a = analyze("How do people feel about remote work");
        assert_eq!(a.priority(Hat::Red), SearchPriority::High);
    }

    #[test]
    fn recommendation_takes_precedence_over_informational() {
        let a = analyze("What should I invest in?");
        assert_eq!(a.query_type, QueryType::Recommendation);
    }

    #[test]
    fn every_hat_gets_a_lookup_string() {
        let a = analyze("Should my startup raise venture funding?");
        assert_eq!(a.queries.len(), Hat::ALL.len());
        assert!(a.query_for(Hat::Yellow).unwrap().ends_with("success case studies"));
    }

    #[test]
    fn empty_query_is_an_analysis_error() {
        let err = QueryAnalyzer::new(4).analyze("   ").unwrap_err();
        assert!(matches!(err, CoordinationError::Analysis(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn zero_budget_rationale() {
        let a = QueryAnalyzer::new(0).analyze("What is quantum computing?").unwrap();
        assert!(a.allocation.is_empty());
        assert!(a.rationale.ends_with("No search budget allocated."));
    }
}
