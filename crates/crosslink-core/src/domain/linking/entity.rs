//! Linking entities and related types
//!
//! Defines the core types for the link graph: articles, authority sources,
//! edges, match types, and run bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of a link edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Cross-reference to another article in the same corpus
    Internal,
    /// Citation of a third-party authority source
    External,
}

impl LinkKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "internal" => Some(Self::Internal),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a link target was matched to its source article
///
/// A closed set so exhaustiveness is checked at compile time; never
/// represented as open string tags outside the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// The target article's primary keyword appears in the source body
    Keyword,
    /// Enough of the target article's title words appear in the source body
    Title,
    /// The article and the source share a topical keyword group
    Category,
    /// Catalog-order fallback when nothing qualified
    GenericFallback,
}

impl MatchType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Title => "title",
            Self::Category => "category",
            Self::GenericFallback => "generic_fallback",
        }
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keyword" => Some(Self::Keyword),
            "title" => Some(Self::Title),
            "category" => Some(Self::Category),
            "generic_fallback" | "generic-fallback" => Some(Self::GenericFallback),
            _ => None,
        }
    }

    /// Get all match types
    pub fn all() -> &'static [MatchType] {
        &[
            Self::Keyword,
            Self::Title,
            Self::Category,
            Self::GenericFallback,
        ]
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A published article from the editorial corpus
///
/// Owned by the content repository; the linking pipeline treats it as
/// read-only input and never mutates it, except indirectly through the
/// derived metrics keyed by its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: Uuid,
    /// URL slug
    pub slug: String,
    /// Display title
    pub title: String,
    /// Full body text used for matching
    pub body: String,
    /// Primary SEO keyword, if the editors set one
    pub primary_keyword: Option<String>,
    /// When the article went live
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Create a new article
    pub fn new(slug: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: title.into(),
            body: body.into(),
            primary_keyword: None,
            published_at: None,
        }
    }

    /// Set the primary keyword
    pub fn with_primary_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.primary_keyword = Some(keyword.into());
        self
    }

    /// Set the publication timestamp
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Case-folded title + keyword + body, used for topical matching
    pub fn combined_text(&self) -> String {
        let mut text = String::with_capacity(
            self.title.len()
                + self.primary_keyword.as_deref().map_or(0, str::len)
                + self.body.len()
                + 2,
        );
        text.push_str(&self.title);
        text.push(' ');
        if let Some(keyword) = &self.primary_keyword {
            text.push_str(keyword);
            text.push(' ');
        }
        text.push_str(&self.body);
        text.to_lowercase()
    }
}

/// A cataloged external domain used as a citation target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritySource {
    /// Unique identifier
    pub id: Uuid,
    /// Canonical URL to cite
    pub url: String,
    /// Registered domain, for display and dedup
    pub domain: String,
    /// Display name (also used as anchor text)
    pub name: String,
    /// Short description of what the source covers
    pub description: String,
    /// Topical category tag
    pub category: String,
    /// Authority weight; higher is more authoritative
    pub trust_score: f64,
    /// How many times this source has been chosen as a link target
    pub usage_count: i64,
}

impl AuthoritySource {
    /// Create a new authority source
    pub fn new(
        url: impl Into<String>,
        domain: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            domain: domain.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            trust_score: 0.0,
            usage_count: 0,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the category tag
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the trust score
    pub fn with_trust_score(mut self, trust_score: f64) -> Self {
        self.trust_score = trust_score;
        self
    }

    /// Case-folded name + description + category, used for topical matching
    pub fn combined_metadata(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.category).to_lowercase()
    }
}

/// One directed cross-reference edge, as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEdge {
    /// Unique identifier
    pub id: Uuid,
    /// Article the link renders in
    pub source_article_id: Uuid,
    /// Internal or external
    pub kind: LinkKind,
    /// Target article id (internal) or authority-source id (external)
    pub target_id: Uuid,
    /// Literal text rendered as the link label
    pub anchor_text: String,
    /// How the target was matched
    pub match_type: MatchType,
    /// When the edge was created
    pub created_at: DateTime<Utc>,
}

/// An edge accepted by the selector, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewLinkEdge {
    /// Article the link renders in
    pub source_article_id: Uuid,
    /// Internal or external
    pub kind: LinkKind,
    /// Target article id (internal) or authority-source id (external)
    pub target_id: Uuid,
    /// Literal text rendered as the link label
    pub anchor_text: String,
    /// How the target was matched
    pub match_type: MatchType,
}

impl NewLinkEdge {
    /// Create an internal article-to-article edge
    pub fn internal(
        source: Uuid,
        target: Uuid,
        anchor_text: impl Into<String>,
        match_type: MatchType,
    ) -> Self {
        Self {
            source_article_id: source,
            kind: LinkKind::Internal,
            target_id: target,
            anchor_text: anchor_text.into(),
            match_type,
        }
    }

    /// Create an external article-to-source edge
    pub fn external(
        source: Uuid,
        target: Uuid,
        anchor_text: impl Into<String>,
        match_type: MatchType,
    ) -> Self {
        Self {
            source_article_id: source,
            kind: LinkKind::External,
            target_id: target,
            anchor_text: anchor_text.into(),
            match_type,
        }
    }
}

/// One scored candidate produced by the relevance scorer
///
/// Internal suggestions carry no numeric score: selection on that path is
/// by tier and discovery order only. External suggestions carry the
/// additive topical score used for ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSuggestion {
    /// Target article id (internal) or authority-source id (external)
    pub target_id: Uuid,
    /// Literal text rendered as the link label
    pub anchor_text: String,
    /// How the target was matched
    pub match_type: MatchType,
    /// Additive score (external linking only)
    pub score: Option<f64>,
}

/// Derived per-article link counters
///
/// Recomputed from the edge store after each processed article; never
/// incrementally maintained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Article these counters belong to
    pub article_id: Uuid,
    /// Outgoing internal edge count
    pub internal_links: u32,
    /// Outgoing external edge count
    pub external_links: u32,
    /// When the counters were last recomputed
    pub updated_at: DateTime<Utc>,
}

/// Which source articles a run processes
///
/// The candidate universe is always the full corpus, independent of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobScope {
    /// Process every published article
    All,
    /// Process a single article by id
    Single(Uuid),
}

impl JobScope {
    /// String form used in run records and logs
    pub fn describe(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Single(id) => id.to_string(),
        }
    }
}

impl fmt::Display for JobScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Aggregate counters returned by each batch entry point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Edges actually inserted
    pub links_created: u64,
    /// Source articles fully processed
    pub articles_processed: u64,
    /// Candidates that reached the scorer
    pub suggestions_considered: u64,
    /// Per-edge storage failures (logged, not fatal)
    pub write_failures: u64,
}

impl RunSummary {
    /// Combine two summaries (used when running both jobs in sequence)
    pub fn combine(self, other: Self) -> Self {
        Self {
            links_created: self.links_created + other.links_created,
            articles_processed: self.articles_processed + other.articles_processed,
            suggestions_considered: self.suggestions_considered + other.suggestions_considered,
            write_failures: self.write_failures + other.write_failures,
        }
    }
}

/// Audit record of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique identifier
    pub id: Uuid,
    /// Which job ran
    pub kind: LinkKind,
    /// Scope the run was invoked with ("all" or an article id)
    pub scope: String,
    /// Edges actually inserted
    pub links_created: u64,
    /// Source articles fully processed
    pub articles_processed: u64,
    /// Candidates that reached the scorer
    pub suggestions_considered: u64,
    /// Per-edge storage failures
    pub write_failures: u64,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl RunRecord {
    /// Create a record from a finished run
    pub fn new(
        kind: LinkKind,
        scope: JobScope,
        summary: RunSummary,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            scope: scope.describe(),
            links_created: summary.links_created,
            articles_processed: summary.articles_processed,
            suggestions_considered: summary.suggestions_considered,
            write_failures: summary.write_failures,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_type_roundtrip() {
        for match_type in MatchType::all() {
            assert_eq!(MatchType::parse(match_type.as_str()), Some(*match_type));
        }
        assert_eq!(
            MatchType::parse("generic-fallback"),
            Some(MatchType::GenericFallback)
        );
        assert_eq!(MatchType::parse("unknown"), None);
    }

    #[test]
    fn test_link_kind_roundtrip() {
        assert_eq!(LinkKind::parse("internal"), Some(LinkKind::Internal));
        assert_eq!(LinkKind::parse("EXTERNAL"), Some(LinkKind::External));
        assert_eq!(LinkKind::parse("sideways"), None);
    }

    #[test]
    fn test_article_combined_text_is_case_folded() {
        let article = Article::new("slug", "Mercado de Carbono", "Corpo do TEXTO.")
            .with_primary_keyword("Crédito Verde");

        let combined = article.combined_text();
        assert!(combined.contains("mercado de carbono"));
        assert!(combined.contains("crédito verde"));
        assert!(combined.contains("corpo do texto"));
        assert_eq!(combined, combined.to_lowercase());
    }

    #[test]
    fn test_source_combined_metadata() {
        let source = AuthoritySource::new("https://ipcc.ch", "ipcc.ch", "IPCC")
            .with_description("Relatórios Climáticos")
            .with_category("Carbono");

        let combined = source.combined_metadata();
        assert!(combined.contains("ipcc"));
        assert!(combined.contains("relatórios climáticos"));
        assert!(combined.contains("carbono"));
    }

    #[test]
    fn test_job_scope_describe() {
        assert_eq!(JobScope::All.describe(), "all");
        let id = Uuid::new_v4();
        assert_eq!(JobScope::Single(id).describe(), id.to_string());
    }

    #[test]
    fn test_run_summary_combine() {
        let a = RunSummary {
            links_created: 3,
            articles_processed: 2,
            suggestions_considered: 10,
            write_failures: 1,
        };
        let b = RunSummary {
            links_created: 1,
            articles_processed: 2,
            suggestions_considered: 4,
            write_failures: 0,
        };
        let combined = a.combine(b);
        assert_eq!(combined.links_created, 4);
        assert_eq!(combined.articles_processed, 4);
        assert_eq!(combined.suggestions_considered, 14);
        assert_eq!(combined.write_failures, 1);
    }

    #[test]
    fn test_run_summary_json_shape() {
        // The summary is what the admin surface receives; field names are
        // part of the contract
        let summary = RunSummary {
            links_created: 2,
            articles_processed: 1,
            suggestions_considered: 6,
            write_failures: 0,
        };
        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["links_created"], 2);
        assert_eq!(json["articles_processed"], 1);
        assert_eq!(json["suggestions_considered"], 6);
        assert_eq!(json["write_failures"], 0);
    }

    #[test]
    fn test_match_type_serializes_snake_case() {
        let json = serde_json::to_string(&MatchType::GenericFallback).expect("serialize");
        assert_eq!(json, "\"generic_fallback\"");
        let parsed: MatchType = serde_json::from_str("\"keyword\"").expect("parse");
        assert_eq!(parsed, MatchType::Keyword);
    }

    #[test]
    fn test_run_record_captures_summary() {
        let summary = RunSummary {
            links_created: 2,
            articles_processed: 1,
            suggestions_considered: 6,
            write_failures: 0,
        };
        let record = RunRecord::new(LinkKind::Internal, JobScope::All, summary, Utc::now());
        assert_eq!(record.kind, LinkKind::Internal);
        assert_eq!(record.scope, "all");
        assert_eq!(record.links_created, 2);
        assert!(record.finished_at >= record.started_at);
    }
}
