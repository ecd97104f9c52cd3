//! Memory triage: a fast heuristic classifier deciding whether an incoming
//! write warrants entity extraction and episodic graph storage, run ahead of
//! the write saga.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::TriageConfig;

/// Coarse content classification, distinct from [`crate::domain::ContentVariant`]
/// (which names the storage shape, not the triage category).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageVariant {
    Conversational,
    Factual,
    Code,
    Document,
    System,
}

impl TriageVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageVariant::Conversational => "conversational",
            TriageVariant::Factual => "factual",
            TriageVariant::Code => "code",
            TriageVariant::Document => "document",
            TriageVariant::System => "system",
        }
    }
}

/// Result of [`MemoryTriage::analyze`].
#[derive(Debug, Clone)]
pub struct TriageDecision {
    pub needs_entity_extraction: bool,
    pub needs_episodic: bool,
    pub variant: TriageVariant,
    pub confidence: f64,
    pub reason: String,
}

static PROPER_NOUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[.!?]\s+|\s)([A-Z][a-z]{2,})").expect("static pattern is valid"));
static TECH_ORG_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(inc|corp|llc|ltd|api|sdk|street|avenue|city|county|gmbh|university)\b")
        .expect("static pattern is valid")
});
static RELATIONSHIP_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(works? (at|for)|founded|married to|reports to|located in|acquired|partnered with)\b")
        .expect("static pattern is valid")
});
static DEFINITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(is a|is an|refers to|means|is defined as)\b").expect("static pattern is valid"));
static QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(\.\d+)?\s*(%|percent|km|kg|usd|\$)?\b").expect("static pattern is valid"));
static CODE_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(function|class|import|const|struct|impl|fn |def |=>|;\s*$)\b").expect("static pattern is valid")
});
static SYSTEM_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\[(DEBUG|INFO|WARN|ERROR)\]|[A-Z][A-Z0-9_]+=\S+)").expect("static pattern is valid")
});

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Heuristic-first memory triage classifier. Holds no mutable state; safe to
/// share behind an `Arc` across requests.
pub struct MemoryTriage {
    config: TriageConfig,
}

impl MemoryTriage {
    pub fn new(config: TriageConfig) -> Self {
        Self { config }
    }

    /// `analyze(text) -> decision`. Pure and total: every input, including
    /// an empty string, produces a decision.
    pub fn analyze(&self, text: &str) -> TriageDecision {
        let trimmed = text.trim();

        if trimmed.len() < self.config.min_content_length || SYSTEM_TRIGGER.is_match(trimmed) {
            return TriageDecision {
                needs_entity_extraction: false,
                needs_episodic: false,
                variant: TriageVariant::System,
                confidence: 0.9,
                reason: "short or system-tagged content short-circuits to no extraction".into(),
            };
        }

        let proper_nouns = PROPER_NOUN.find_iter(trimmed).count() as f64;
        let tech_org_location = TECH_ORG_LOCATION.find_iter(trimmed).count() as f64;
        let relationship_verbs = RELATIONSHIP_VERB.find_iter(trimmed).count() as f64;
        let definitions = DEFINITION.find_iter(trimmed).count() as f64;
        let quantities = QUANTITY.find_iter(trimmed).count() as f64;

        let words = trimmed.split_whitespace().count().max(1) as f64;

        // Category contributions are capped by match count, not diluted by
        // overall text length: a couple of proper nouns or one definition is
        // as strong a signal in a long document as in a short one.
        let entity_score = clamp01(
            0.5 * (proper_nouns / 3.0).min(1.0)
                + 0.35 * tech_org_location.min(1.0)
                + 0.15 * relationship_verbs.min(1.0),
        );
        let fact_score = clamp01(
            0.4 * definitions.min(1.0) + 0.35 * relationship_verbs.min(1.0) + 0.25 * quantities.min(1.0),
        );

        let needs_entity = entity_score >= self.config.entity_threshold;
        let needs_episodic = needs_entity || fact_score >= self.config.fact_threshold;

        let signal = entity_score.max(fact_score);
        let confidence = if signal >= self.config.unambiguous_high || signal <= self.config.unambiguous_low {
            0.9
        } else if signal >= (self.config.unambiguous_high + self.config.fact_threshold) / 2.0 {
            0.8
        } else {
            0.65
        };

        let variant = if CODE_TRIGGER.is_match(trimmed) {
            TriageVariant::Code
        } else if fact_score >= self.config.fact_threshold {
            TriageVariant::Factual
        } else if words > 60.0 {
            TriageVariant::Document
        } else {
            TriageVariant::Conversational
        };

        let reason = format!(
            "entity_score={entity_score:.2} fact_score={fact_score:.2} (proper_nouns={proper_nouns}, tech/org/loc={tech_org_location}, relationship_verbs={relationship_verbs}, definitions={definitions}, quantities={quantities})"
        );

        TriageDecision { needs_entity_extraction: needs_entity, needs_episodic, variant, confidence, reason }
    }
}
