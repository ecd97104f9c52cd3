//! Query-pattern detection: a pure, total classifier selecting one of five
//! fixed vector/metadata/fts weight triples.

use crate::config::{PatternWeights, SearchConfig};

/// The detected query pattern, used for weight selection and explainability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPattern {
    TitleSearch,
    ExactPhrase,
    CodeSearch,
    Semantic,
    Hybrid,
}

impl QueryPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPattern::TitleSearch => "title_search",
            QueryPattern::ExactPhrase => "exact_phrase",
            QueryPattern::CodeSearch => "code_search",
            QueryPattern::Semantic => "semantic",
            QueryPattern::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for QueryPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const TITLE_TRIGGERS: &[&str] = &["titled", "named", "called", "title", "file named"];
const CODE_TRIGGERS: &[&str] =
    &["function", "class", "import", "async", "const", "struct", "impl", "fn ", "def "];
const SEMANTIC_TRIGGERS: &[&str] = &["related", "similar", "like", "about", "concept", "concepts"];

/// Detects the query pattern. Total: every query, including an empty one
/// (callers reject empty queries before this point), maps to exactly one
/// pattern.
pub fn detect_query_pattern(query: &str) -> QueryPattern {
    let lower = query.to_lowercase();
    let trimmed = query.trim();

    let is_quoted = trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"');
    if is_quoted {
        return QueryPattern::ExactPhrase;
    }

    if TITLE_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return QueryPattern::TitleSearch;
    }

    if CODE_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return QueryPattern::CodeSearch;
    }

    if SEMANTIC_TRIGGERS.iter().any(|t| lower.contains(t)) {
        return QueryPattern::Semantic;
    }

    QueryPattern::Hybrid
}

/// Looks up the fixed weight triple for a detected pattern.
pub fn weights_for(pattern: QueryPattern, config: &SearchConfig) -> PatternWeights {
    match pattern {
        QueryPattern::TitleSearch => config.title_search,
        QueryPattern::ExactPhrase => config.exact_phrase,
        QueryPattern::CodeSearch => config.code_search,
        QueryPattern::Semantic => config.semantic,
        QueryPattern::Hybrid => config.hybrid,
    }
}
