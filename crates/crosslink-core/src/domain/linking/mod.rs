//! Linking domain module
//!
//! Builds the relevance-based link graph over an editorial corpus: which
//! articles should cross-link to which other articles (internal linking),
//! and which articles should cite which external authority sources
//! (external linking).
//!
//! # Architecture
//!
//! Both jobs are the same pipeline with a different candidate universe and
//! scoring function:
//!
//! ```text
//! corpus snapshot -> candidates -> relevance scoring -> capped selection
//!                 -> idempotent persistence -> metrics recomputation
//! ```
//!
//! - **Entities**: `Article`, `AuthoritySource`, `LinkEdge`, `MatchType`
//! - **Scoring**: pure substring/token-overlap heuristics in [`scoring`]
//! - **Repositories**: traits for the content store, source catalog, and
//!   edge store; SQLite implementations in [`repository`]
//! - **Service**: `LinkingService` orchestrates one batch run
//!
//! # Example
//!
//! ```ignore
//! use crosslink_core::domain::linking::{JobScope, LinkingService};
//!
//! let service = LinkingService::from_pool(db.pool().clone(), config.linking);
//!
//! // Link one article
//! let summary = service.run_internal(JobScope::Single(article_id)).await?;
//!
//! // Cite authority sources across the whole corpus
//! let summary = service.run_external(JobScope::All).await?;
//! ```

pub mod entity;
pub mod repository;
pub mod repository_trait;
pub mod scoring;
pub mod service;

// Re-export main types
pub use entity::{
    Article, AuthoritySource, DerivedMetrics, JobScope, LinkEdge, LinkKind, LinkSuggestion,
    MatchType, NewLinkEdge, RunRecord, RunSummary,
};
pub use repository::{SqliteArticleRepository, SqliteLinkRepository, SqliteSourceCatalog};
pub use repository_trait::{ArticleRepository, LinkRepository, SourceCatalog};
pub use scoring::{score_external, score_internal, title_tokens};
pub use service::LinkingService;
