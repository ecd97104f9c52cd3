//! Advanced semantic search: query expansion, contextual reranking,
//! diversification, clustering, and query insights layered over hybrid search.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::tenant::TenantContext;

use super::hybrid::{HybridSearchEngine, SearchHit, SearchOptions};

/// Small synonym table driving query expansion.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("search", &["find", "look for", "query", "retrieve"]),
    ("fix", &["repair", "resolve", "patch"]),
    ("show", &["display", "list", "view"]),
    ("delete", &["remove", "erase"]),
];

/// Up to five alternative phrasings of `query`, one per matched synonym.
pub fn expand_query(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut expansions = Vec::new();

    for (word, alts) in SYNONYMS {
        if lower.split_whitespace().any(|w| w == *word) {
            for alt in *alts {
                let expanded = lower.replacen(word, alt, 1);
                if expanded != lower {
                    expansions.push(expanded);
                }
                if expansions.len() >= 5 {
                    return expansions;
                }
            }
        }
    }
    expansions
}

/// Per-user personalization signals consulted by contextual reranking.
#[derive(Debug, Clone, Default)]
pub struct UserPreferences {
    pub recently_accessed: Vec<String>,
    pub preferred_type: Option<crate::domain::ContentVariant>,
    pub preferred_source: Option<String>,
}

/// Per-node creation timestamp, needed by the recency rerank factor (the
/// hybrid search hit shape itself carries no timestamp).
pub type CreatedAtLookup = HashMap<String, DateTime<Utc>>;

/// Rerank `hits` in place by contextual factors, capped at `max_rerank`
/// candidates (the remainder pass through unscored).
pub fn contextual_rerank(
    hits: &mut Vec<SearchHit>,
    prefs: &UserPreferences,
    sources: &HashMap<String, String>,
    created_at: &CreatedAtLookup,
    max_rerank: usize,
    at: DateTime<Utc>,
) {
    let rerank_count = hits.len().min(max_rerank);
    for hit in hits.iter_mut().take(rerank_count) {
        let mut factor = 1.0;
        if prefs.recently_accessed.iter().any(|id| id == &hit.id) {
            factor *= 1.20;
        }
        if prefs.preferred_type == Some(hit.variant) {
            factor *= 1.15;
        }
        if let (Some(preferred), Some(actual)) = (&prefs.preferred_source, sources.get(&hit.id)) {
            if preferred == actual {
                factor *= 1.10;
            }
        }
        if let Some(created) = created_at.get(&hit.id) {
            let age = at - *created;
            if age <= chrono::Duration::days(7) {
                factor *= 1.15;
            } else if age <= chrono::Duration::days(30) {
                factor *= 1.05;
            }
        }
        hit.combined_score *= factor;
    }
    hits[..rerank_count].sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(std::cmp::Ordering::Equal));
}

/// Penalise repeat-source and repeat-type hits as `diversity_factor` grows.
pub fn diversify(hits: &mut [SearchHit], sources: &HashMap<String, String>, diversity_factor: f64) {
    if diversity_factor <= 0.0 {
        return;
    }
    let mut seen_sources: HashMap<String, u32> = HashMap::new();
    let mut seen_types: HashMap<crate::domain::ContentVariant, u32> = HashMap::new();

    for hit in hits.iter_mut() {
        let source = sources.get(&hit.id).cloned().unwrap_or_default();
        let source_seen = *seen_sources.get(&source).unwrap_or(&0);
        let type_seen = *seen_types.get(&hit.variant).unwrap_or(&0);

        if source_seen > 0 {
            hit.combined_score *= 1.0 - 0.5 * diversity_factor;
        }
        if type_seen > 0 {
            hit.combined_score *= 1.0 - 0.3 * diversity_factor;
        }

        *seen_sources.entry(source).or_insert(0) += 1;
        *seen_types.entry(hit.variant).or_insert(0) += 1;
    }
}

/// A cluster of related hits, grouped by `(variant, source)`.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub label: String,
    pub member_ids: Vec<String>,
    pub coherence: f64,
}

/// Clusters `hits` by `(variant, source)` when at least 5 results are
/// present; only clusters with 2+ members are emitted.
pub fn cluster(hits: &[SearchHit], sources: &HashMap<String, String>) -> Vec<Cluster> {
    if hits.len() < 5 {
        return Vec::new();
    }

    let mut groups: HashMap<(crate::domain::ContentVariant, String), Vec<&SearchHit>> = HashMap::new();
    for hit in hits {
        let source = sources.get(&hit.id).cloned().unwrap_or_default();
        groups.entry((hit.variant, source)).or_default().push(hit);
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|((variant, source), members)| {
            let scores: Vec<f64> = members.iter().map(|h| h.combined_score).collect();
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
            Cluster {
                label: format!("{}/{}", variant.as_str(), source),
                member_ids: members.iter().map(|h| h.id.clone()).collect(),
                coherence: 1.0 / (1.0 + variance),
            }
        })
        .collect()
}

/// Intent classification for query-insight generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    Factual,
    Exploratory,
    Navigational,
    Transactional,
}

/// Complexity bucket by word count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryComplexity {
    Simple,
    Moderate,
    Complex,
}

/// Synthesised insight about a query: intent, complexity, and up to three
/// suggested follow-up queries built from the top result tags.
#[derive(Debug, Clone)]
pub struct QueryInsight {
    pub intent: QueryIntent,
    pub complexity: QueryComplexity,
    pub suggested_queries: Vec<String>,
}

const FACTUAL_LEADS: &[&str] = &["what", "who", "when", "where", "how many"];
const NAVIGATIONAL_LEADS: &[&str] = &["open", "go to", "find the"];
const TRANSACTIONAL_LEADS: &[&str] = &["create", "delete", "update", "buy", "schedule"];

pub fn classify_intent(query: &str) -> QueryIntent {
    let lower = query.trim().to_lowercase();
    if TRANSACTIONAL_LEADS.iter().any(|l| lower.starts_with(l)) {
        QueryIntent::Transactional
    } else if NAVIGATIONAL_LEADS.iter().any(|l| lower.starts_with(l)) {
        QueryIntent::Navigational
    } else if FACTUAL_LEADS.iter().any(|l| lower.starts_with(l)) {
        QueryIntent::Factual
    } else {
        QueryIntent::Exploratory
    }
}

pub fn classify_complexity(query: &str) -> QueryComplexity {
    let words = query.split_whitespace().count();
    if words <= 3 {
        QueryComplexity::Simple
    } else if words <= 7 {
        QueryComplexity::Moderate
    } else {
        QueryComplexity::Complex
    }
}

pub fn synthesize_insight(query: &str, top_tags: &[String]) -> QueryInsight {
    let suggested_queries = top_tags
        .iter()
        .take(3)
        .map(|tag| format!("{query} {tag}"))
        .collect();

    QueryInsight { intent: classify_intent(query), complexity: classify_complexity(query), suggested_queries }
}

/// Runs hybrid search across the original query plus its top-2 expansions,
/// merging and deduping by id (boosting duplicate hits by ×1.1).
pub async fn multi_query_search(
    engine: &HybridSearchEngine,
    tenant: &TenantContext,
    query: &str,
    opts: SearchOptions,
) -> crate::error::Result<Vec<SearchHit>> {
    let expansions = expand_query(query);
    let queries: Vec<&str> = std::iter::once(query).chain(expansions.iter().take(2).map(|s| s.as_str())).collect();

    let mut merged: HashMap<String, SearchHit> = HashMap::new();
    for q in queries {
        let response = engine.search(tenant, q, opts.clone()).await?;
        for hit in response.results {
            merged
                .entry(hit.id.clone())
                .and_modify(|existing| existing.combined_score = (existing.combined_score.max(hit.combined_score)) * 1.1)
                .or_insert(hit);
        }
    }

    let mut hits: Vec<SearchHit> = merged.into_values().collect();
    hits.sort_by(|a, b| b.combined_score.partial_cmp(&a.combined_score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContentVariant;
    use crate::search::hybrid::Subscores;

    fn hit(id: &str, variant: ContentVariant, score: f64) -> SearchHit {
        SearchHit { id: id.to_string(), variant, combined_score: score, subscores: Subscores::default() }
    }

    #[test]
    fn expansion_caps_at_five() {
        let expansions = expand_query("search search search search search search");
        assert!(expansions.len() <= 5);
    }

    #[test]
    fn expansion_returns_empty_for_unmatched_query() {
        assert!(expand_query("quarterly revenue").is_empty());
    }

    #[test]
    fn rerank_boosts_recently_accessed_and_preferred_source() {
        let mut hits = vec![hit("a", ContentVariant::Memory, 1.0), hit("b", ContentVariant::Memory, 1.0)];
        let prefs = UserPreferences {
            recently_accessed: vec!["a".into()],
            preferred_type: None,
            preferred_source: Some("blog".into()),
        };
        let mut sources = HashMap::new();
        sources.insert("a".into(), "blog".into());
        let created_at = CreatedAtLookup::new();

        contextual_rerank(&mut hits, &prefs, &sources, &created_at, 10, Utc::now());
        assert!(hits[0].id == "a");
        assert!(hits[0].combined_score > hits[1].combined_score);
    }

    #[test]
    fn diversify_penalizes_repeat_source_and_type() {
        let mut hits = vec![
            hit("a", ContentVariant::Memory, 1.0),
            hit("b", ContentVariant::Memory, 1.0),
        ];
        let mut sources = HashMap::new();
        sources.insert("a".into(), "s1".into());
        sources.insert("b".into(), "s1".into());

        diversify(&mut hits, &sources, 0.5);
        assert_eq!(hits[0].combined_score, 1.0);
        assert!(hits[1].combined_score < 1.0);
    }

    #[test]
    fn cluster_requires_minimum_result_count() {
        let hits = vec![hit("a", ContentVariant::Memory, 1.0), hit("b", ContentVariant::Memory, 0.9)];
        assert!(cluster(&hits, &HashMap::new()).is_empty());
    }

    #[test]
    fn cluster_groups_by_variant_and_source() {
        let hits: Vec<SearchHit> = (0..6).map(|i| hit(&format!("n{i}"), ContentVariant::Memory, 1.0 - i as f64 * 0.05)).collect();
        let mut sources = HashMap::new();
        for i in 0..6 {
            sources.insert(format!("n{i}"), "shared-source".to_string());
        }
        let clusters = cluster(&hits, &sources);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_ids.len(), 6);
    }

    #[test]
    fn intent_and_complexity_classify_as_expected() {
        assert_eq!(classify_intent("what is eventual consistency"), QueryIntent::Factual);
        assert_eq!(classify_intent("create a new project"), QueryIntent::Transactional);
        assert_eq!(classify_intent("rust ownership"), QueryIntent::Exploratory);

        assert_eq!(classify_complexity("rust ownership"), QueryComplexity::Simple);
        assert_eq!(classify_complexity("how does rust manage memory safety"), QueryComplexity::Moderate);
        assert_eq!(classify_complexity("explain in detail how rust's borrow checker prevents data races across threads"), QueryComplexity::Complex);
    }
}
