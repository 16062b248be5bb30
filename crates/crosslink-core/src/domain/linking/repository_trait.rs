//! Repository traits for the linking pipeline
//!
//! The content store, the authority-source catalog, and the link-edge
//! store are external collaborators of the pipeline; these traits are the
//! seams. The SQLite implementations live in [`super::repository`].

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Result;

use super::entity::{
    Article, AuthoritySource, DerivedMetrics, LinkKind, NewLinkEdge, RunRecord,
};

/// Read access to the published-article corpus
///
/// Owned by the editorial CMS; the pipeline only reads from it.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// List all published articles, in stable corpus order
    async fn list_published(&self) -> Result<Vec<Article>>;

    /// Get a single article by id
    async fn get_article(&self, id: Uuid) -> Result<Option<Article>>;
}

/// Read access to the authority-source catalog, plus the usage counter
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// List all active sources, in stable catalog order
    async fn list_active(&self) -> Result<Vec<AuthoritySource>>;

    /// Atomically increment a source's usage counter
    async fn increment_usage(&self, id: Uuid) -> Result<()>;
}

/// The link-edge store and its derived counters
#[async_trait]
pub trait LinkRepository: Send + Sync {
    // ========== Edge Operations ==========

    /// Insert an edge unless it already exists or the source article is at
    /// its cap for this kind. Returns whether a row was actually inserted;
    /// a duplicate is success-no-op.
    async fn insert_edge(&self, edge: &NewLinkEdge, cap: u32) -> Result<bool>;

    /// All target ids already linked from a source article, batch-loaded
    /// once per article (never queried per candidate)
    async fn linked_target_ids(&self, source: Uuid, kind: LinkKind) -> Result<HashSet<Uuid>>;

    /// Count outgoing edges of one kind for a source article
    async fn count_outgoing(&self, source: Uuid, kind: LinkKind) -> Result<u64>;

    // ========== Derived Metrics ==========

    /// Recount both link kinds for an article directly from the edge
    /// store and upsert the derived metrics row with a fresh timestamp
    async fn recompute_metrics(&self, article_id: Uuid) -> Result<DerivedMetrics>;

    /// Get the derived metrics row for an article, if present
    async fn get_metrics(&self, article_id: Uuid) -> Result<Option<DerivedMetrics>>;

    // ========== Run Audit Trail ==========

    /// Record a finished batch run
    async fn record_run(&self, record: &RunRecord) -> Result<()>;

    /// Most recent run records, newest first
    async fn list_runs(&self, limit: u32) -> Result<Vec<RunRecord>>;
}
