//! Linking service
//!
//! Orchestrates one batch run: corpus snapshot, candidate generation,
//! relevance scoring, cap-constrained selection, idempotent persistence,
//! and metrics recomputation. Internal and external linking are the same
//! pipeline with a different candidate universe and scoring function.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, LinkingConfig, RetryConfig};
use crate::error::{Error, Result};

use super::entity::{
    Article, AuthoritySource, JobScope, LinkKind, LinkSuggestion, MatchType, NewLinkEdge,
    RunRecord, RunSummary,
};
use super::repository::{SqliteArticleRepository, SqliteLinkRepository, SqliteSourceCatalog};
use super::repository_trait::{ArticleRepository, LinkRepository, SourceCatalog};
use super::scoring::{score_external, score_internal};

/// One run's read-only snapshot of the corpus.
///
/// The candidate universe is always the full corpus, independent of the
/// processing scope.
struct CorpusSnapshot {
    to_process: Vec<Article>,
    universe: Vec<Article>,
    catalog: Vec<AuthoritySource>,
}

/// Service for building the link graph over an editorial corpus
pub struct LinkingService<A, S, L> {
    articles: Arc<A>,
    sources: Arc<S>,
    links: Arc<L>,
    config: LinkingConfig,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl LinkingService<SqliteArticleRepository, SqliteSourceCatalog, SqliteLinkRepository> {
    /// Create a service over the SQLite store
    pub fn from_pool(pool: SqlitePool, config: Config) -> Self {
        Self::new(
            Arc::new(SqliteArticleRepository::new(pool.clone())),
            Arc::new(SqliteSourceCatalog::new(pool.clone())),
            Arc::new(SqliteLinkRepository::new(pool)),
            config.linking,
            config.retry,
        )
    }
}

impl<A, S, L> LinkingService<A, S, L>
where
    A: ArticleRepository,
    S: SourceCatalog,
    L: LinkRepository,
{
    /// Create a new linking service
    pub fn new(
        articles: Arc<A>,
        sources: Arc<S>,
        links: Arc<L>,
        config: LinkingConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            articles,
            sources,
            links,
            config,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the cancellation token checked between articles
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    // ========== Entry Points ==========

    /// Run the internal-linking job
    pub async fn run_internal(&self, scope: JobScope) -> Result<RunSummary> {
        let started_at = Utc::now();
        let corpus = self.load_corpus(scope).await?;
        info!(
            scope = %scope,
            articles = corpus.to_process.len(),
            "Starting internal linking run"
        );

        let mut summary = RunSummary::default();
        for article in &corpus.to_process {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self
                .link_article_internal(article, &corpus.universe, &mut summary)
                .await
            {
                Ok(()) => summary.articles_processed += 1,
                Err(e) if !e.is_fatal() => {
                    warn!(article_id = %article.id, error = %e, "Skipping article");
                }
                Err(e) => return Err(e),
            }
        }

        self.record_run(LinkKind::Internal, scope, summary, started_at)
            .await;
        info!(
            links_created = summary.links_created,
            articles_processed = summary.articles_processed,
            "Internal linking run finished"
        );
        Ok(summary)
    }

    /// Run the external-linking job
    pub async fn run_external(&self, scope: JobScope) -> Result<RunSummary> {
        let started_at = Utc::now();
        let corpus = self.load_corpus(scope).await?;
        info!(
            scope = %scope,
            articles = corpus.to_process.len(),
            sources = corpus.catalog.len(),
            "Starting external linking run"
        );

        let mut summary = RunSummary::default();
        for article in &corpus.to_process {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match self
                .link_article_external(article, &corpus.catalog, &mut summary)
                .await
            {
                Ok(()) => summary.articles_processed += 1,
                Err(e) if !e.is_fatal() => {
                    warn!(article_id = %article.id, error = %e, "Skipping article");
                }
                Err(e) => return Err(e),
            }
        }

        self.record_run(LinkKind::External, scope, summary, started_at)
            .await;
        info!(
            links_created = summary.links_created,
            articles_processed = summary.articles_processed,
            "External linking run finished"
        );
        Ok(summary)
    }

    /// Run both jobs in sequence over the same scope
    pub async fn run_all(&self, scope: JobScope) -> Result<RunSummary> {
        let internal = self.run_internal(scope).await?;
        let external = self.run_external(scope).await?;
        Ok(internal.combine(external))
    }

    // ========== Corpus Snapshot Loader ==========

    /// Load the full corpus and resolve the processing scope.
    ///
    /// Any read failure aborts the run: scoring against an incomplete
    /// candidate set would silently under-link.
    async fn load_corpus(&self, scope: JobScope) -> Result<CorpusSnapshot> {
        let universe = self
            .articles
            .list_published()
            .await
            .map_err(|e| Error::RepositoryUnavailable(e.to_string()))?;
        let catalog = self
            .sources
            .list_active()
            .await
            .map_err(|e| Error::RepositoryUnavailable(e.to_string()))?;

        let to_process = match scope {
            JobScope::All => universe.clone(),
            JobScope::Single(id) => {
                let article = universe
                    .iter()
                    .find(|article| article.id == id)
                    .cloned()
                    .ok_or(Error::ArticleNotFound(id))?;
                vec![article]
            }
        };

        Ok(CorpusSnapshot {
            to_process,
            universe,
            catalog,
        })
    }

    // ========== Internal Linking ==========

    /// Process one source article for internal links.
    ///
    /// Candidates are consumed in corpus order, tier 1 before tier 2 per
    /// candidate, and accepted until the cap: a first-N policy, since no
    /// numeric score exists on this path.
    async fn link_article_internal(
        &self,
        source: &Article,
        universe: &[Article],
        summary: &mut RunSummary,
    ) -> Result<()> {
        let cap = self.config.max_internal_links;
        let linked = self
            .with_retry("linked_target_ids", || {
                self.links.linked_target_ids(source.id, LinkKind::Internal)
            })
            .await?;

        let mut budget = cap.saturating_sub(linked.len() as u32);
        let source_body = source.body.to_lowercase();

        for candidate in universe {
            if budget == 0 {
                break;
            }
            if candidate.id == source.id || linked.contains(&candidate.id) {
                continue;
            }
            summary.suggestions_considered += 1;

            let Some(suggestion) = score_internal(&source_body, candidate) else {
                continue;
            };
            debug!(
                source_id = %source.id,
                target_id = %suggestion.target_id,
                match_type = %suggestion.match_type,
                "Internal link suggestion accepted"
            );

            let edge = NewLinkEdge::internal(
                source.id,
                suggestion.target_id,
                suggestion.anchor_text,
                suggestion.match_type,
            );
            if self.persist_edge(&edge, cap, summary).await {
                budget -= 1;
            }
        }

        // Runs even when zero edges were created
        self.with_retry("recompute_metrics", || {
            self.links.recompute_metrics(source.id)
        })
        .await?;
        Ok(())
    }

    // ========== External Linking ==========

    /// Process one source article for external citations.
    async fn link_article_external(
        &self,
        article: &Article,
        catalog: &[AuthoritySource],
        summary: &mut RunSummary,
    ) -> Result<()> {
        let cap = self.config.max_external_links;
        let linked = self
            .with_retry("linked_target_ids", || {
                self.links.linked_target_ids(article.id, LinkKind::External)
            })
            .await?;
        let existing = linked.len() as u32;

        // Hard short-circuit at the cap: no candidates are generated
        if existing >= cap {
            debug!(article_id = %article.id, "External cap reached, skipping candidates");
            self.with_retry("recompute_metrics", || {
                self.links.recompute_metrics(article.id)
            })
            .await?;
            return Ok(());
        }

        let article_text = article.combined_text();
        let mut qualifying: Vec<LinkSuggestion> = Vec::new();
        for source in catalog {
            if linked.contains(&source.id) {
                continue;
            }
            summary.suggestions_considered += 1;

            let score = score_external(&article_text, source, self.config.group_bonus);
            if score > self.config.min_external_score {
                qualifying.push(LinkSuggestion {
                    target_id: source.id,
                    anchor_text: source.name.clone(),
                    match_type: MatchType::Category,
                    score: Some(score),
                });
            }
        }

        let selected = if qualifying.is_empty() {
            // Fallback: catalog order regardless of score, so every
            // article receives at least some outbound citations
            let fallback_budget = self
                .config
                .fallback_external_links
                .saturating_sub(existing) as usize;
            catalog
                .iter()
                .filter(|source| !linked.contains(&source.id))
                .take(fallback_budget)
                .map(|source| LinkSuggestion {
                    target_id: source.id,
                    anchor_text: source.name.clone(),
                    match_type: MatchType::GenericFallback,
                    score: None,
                })
                .collect()
        } else {
            // Stable sort: catalog order breaks score ties
            qualifying.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
            });
            qualifying.truncate(cap.saturating_sub(existing) as usize);
            qualifying
        };

        for suggestion in selected {
            debug!(
                article_id = %article.id,
                source_id = %suggestion.target_id,
                match_type = %suggestion.match_type,
                score = suggestion.score,
                "External link suggestion accepted"
            );
            let edge = NewLinkEdge::external(
                article.id,
                suggestion.target_id,
                suggestion.anchor_text,
                suggestion.match_type,
            );
            if self.persist_edge(&edge, cap, summary).await {
                if let Err(e) = self
                    .with_retry("increment_usage", || {
                        self.sources.increment_usage(edge.target_id)
                    })
                    .await
                {
                    warn!(source_id = %edge.target_id, error = %e, "Failed to bump usage counter");
                }
            }
        }

        self.with_retry("recompute_metrics", || {
            self.links.recompute_metrics(article.id)
        })
        .await?;
        Ok(())
    }

    // ========== Persistence Helpers ==========

    /// Insert one accepted edge. A duplicate or a cap hit is a no-op; a
    /// storage failure is logged and counted but never aborts the batch.
    /// Returns whether a row was actually inserted.
    async fn persist_edge(&self, edge: &NewLinkEdge, cap: u32, summary: &mut RunSummary) -> bool {
        match self
            .with_retry("insert_edge", || self.links.insert_edge(edge, cap))
            .await
        {
            Ok(true) => {
                summary.links_created += 1;
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(
                    source_id = %edge.source_article_id,
                    target_id = %edge.target_id,
                    error = %e,
                    "Failed to persist edge"
                );
                summary.write_failures += 1;
                false
            }
        }
    }

    /// Write the audit record; a failure here must not fail the run
    async fn record_run(
        &self,
        kind: LinkKind,
        scope: JobScope,
        summary: RunSummary,
        started_at: chrono::DateTime<Utc>,
    ) {
        let record = RunRecord::new(kind, scope, summary, started_at);
        if let Err(e) = self.links.record_run(&record).await {
            warn!(error = %e, "Failed to record run");
        }
    }

    /// Run a storage call under the configured timeout and retry budget
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.retry.max_attempts;
        let per_attempt = Duration::from_secs(self.retry.op_timeout_secs);

        for attempt in 1..=attempts {
            match timeout(per_attempt, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    debug!(operation, attempt, error = %e, "Storage call failed");
                }
                Err(_) => {
                    debug!(operation, attempt, "Storage call timed out");
                }
            }
        }

        Err(Error::RetriesExhausted {
            operation,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use uuid::Uuid;

    struct Harness {
        _db: Database,
        articles: Arc<SqliteArticleRepository>,
        sources: Arc<SqliteSourceCatalog>,
        links: Arc<SqliteLinkRepository>,
        service: LinkingService<SqliteArticleRepository, SqliteSourceCatalog, SqliteLinkRepository>,
    }

    async fn harness() -> Harness {
        let db = Database::in_memory()
            .await
            .expect("Failed to create test database");
        let pool = db.pool().clone();
        let articles = Arc::new(SqliteArticleRepository::new(pool.clone()));
        let sources = Arc::new(SqliteSourceCatalog::new(pool.clone()));
        let links = Arc::new(SqliteLinkRepository::new(pool));
        let config = Config::default();
        let service = LinkingService::new(
            articles.clone(),
            sources.clone(),
            links.clone(),
            config.linking,
            config.retry,
        );
        Harness {
            _db: db,
            articles,
            sources,
            links,
            service,
        }
    }

    async fn seed(h: &Harness, article: &Article) {
        h.articles
            .insert_article(article)
            .await
            .expect("insert article");
    }

    async fn seed_source(h: &Harness, source: &AuthoritySource) {
        h.sources
            .insert_source(source)
            .await
            .expect("insert source");
    }

    // ========== Internal linking ==========

    #[tokio::test]
    async fn test_keyword_match_creates_edge() {
        let h = harness().await;
        let source = Article::new(
            "mercados",
            "Mercados Regulados",
            "O setor aposta na tokenização verde para escalar projetos.",
        );
        let target = Article::new("tokenizacao", "Guia da Tokenização", "corpo")
            .with_primary_keyword("tokenização verde");
        seed(&h, &source).await;
        seed(&h, &target).await;

        let summary = h
            .service
            .run_internal(JobScope::Single(source.id))
            .await
            .expect("run");
        assert_eq!(summary.links_created, 1);
        assert_eq!(summary.articles_processed, 1);

        let edges = h
            .links
            .list_edges_for_article(source.id)
            .await
            .expect("edges");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].match_type, MatchType::Keyword);
        assert_eq!(edges[0].anchor_text, "tokenização verde");
        assert_eq!(edges[0].target_id, target.id);
    }

    #[tokio::test]
    async fn test_internal_run_is_idempotent() {
        let h = harness().await;
        let source = Article::new(
            "a",
            "Artigo A",
            "Texto que cita o crédito e o carbono do brasil.",
        );
        let target = Article::new("b", "Crédito de Carbono no Brasil", "corpo");
        seed(&h, &source).await;
        seed(&h, &target).await;

        let first = h.service.run_internal(JobScope::All).await.expect("first");
        assert!(first.links_created > 0);

        let second = h
            .service
            .run_internal(JobScope::All)
            .await
            .expect("second");
        assert_eq!(
            second.links_created, 0,
            "second run over an unchanged corpus must create nothing"
        );
    }

    #[tokio::test]
    async fn test_no_self_link() {
        let h = harness().await;
        // The article's own keyword appears in its own body
        let article = Article::new("a", "Tokenização", "Tudo sobre tokenização verde aqui.")
            .with_primary_keyword("tokenização verde");
        seed(&h, &article).await;

        h.service.run_internal(JobScope::All).await.expect("run");

        let edges = h
            .links
            .list_edges_for_article(article.id)
            .await
            .expect("edges");
        assert!(edges.iter().all(|e| e.target_id != article.id));
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn test_cap_stops_linking() {
        let h = harness().await;
        let source = Article::new("source", "Fonte", "tokenização verde em todo lugar");
        seed(&h, &source).await;

        // Eight candidates, all keyword matches; only five may land
        for i in 0..8 {
            let candidate = Article::new(format!("c{i}"), format!("Candidato {i}"), "corpo")
                .with_primary_keyword("tokenização verde");
            seed(&h, &candidate).await;
        }

        let summary = h
            .service
            .run_internal(JobScope::Single(source.id))
            .await
            .expect("run");
        assert_eq!(summary.links_created, 5);
        assert_eq!(
            h.links
                .count_outgoing(source.id, LinkKind::Internal)
                .await
                .expect("count"),
            5
        );

        // Already at the cap: nothing more, regardless of candidates
        let again = h
            .service
            .run_internal(JobScope::Single(source.id))
            .await
            .expect("run again");
        assert_eq!(again.links_created, 0);
    }

    #[tokio::test]
    async fn test_no_duplicate_edges_across_runs() {
        let h = harness().await;
        let source = Article::new("a", "Artigo A", "fala de tokenização verde e mais");
        let target = Article::new("b", "Artigo B", "corpo").with_primary_keyword("tokenização verde");
        seed(&h, &source).await;
        seed(&h, &target).await;

        for _ in 0..3 {
            h.service.run_internal(JobScope::All).await.expect("run");
        }

        let edges = h
            .links
            .list_edges_for_article(source.id)
            .await
            .expect("edges");
        assert_eq!(edges.len(), 1);
    }

    #[tokio::test]
    async fn test_single_scope_unknown_article_fails() {
        let h = harness().await;
        let err = h
            .service
            .run_internal(JobScope::Single(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ArticleNotFound(_)));
    }

    #[tokio::test]
    async fn test_single_scope_links_only_target_article() {
        let h = harness().await;
        let a = Article::new("a", "Artigo A", "texto com tokenização verde");
        let b = Article::new("b", "Artigo B", "texto com tokenização verde");
        let keyword_owner = Article::new("c", "Artigo C", "corpo")
            .with_primary_keyword("tokenização verde");
        seed(&h, &a).await;
        seed(&h, &b).await;
        seed(&h, &keyword_owner).await;

        h.service
            .run_internal(JobScope::Single(a.id))
            .await
            .expect("run");

        assert_eq!(
            h.links
                .count_outgoing(a.id, LinkKind::Internal)
                .await
                .expect("count"),
            1
        );
        assert_eq!(
            h.links
                .count_outgoing(b.id, LinkKind::Internal)
                .await
                .expect("count"),
            0,
            "articles outside the scope must not be processed"
        );
    }

    #[tokio::test]
    async fn test_metrics_written_even_without_matches() {
        let h = harness().await;
        let article = Article::new("a", "Sem Par", "um corpo sem nenhum candidato");
        seed(&h, &article).await;

        h.service.run_internal(JobScope::All).await.expect("run");

        let metrics = h
            .links
            .get_metrics(article.id)
            .await
            .expect("get")
            .expect("metrics row must exist");
        assert_eq!(metrics.internal_links, 0);
    }

    // ========== External linking ==========

    #[tokio::test]
    async fn test_external_category_match_and_usage_counter() {
        let h = harness().await;
        let article = Article::new(
            "carbono",
            "Mercado de Carbono",
            "Como as emissões de carbono são precificadas no Brasil.",
        );
        seed(&h, &article).await;

        let matching = AuthoritySource::new("https://ipcc.ch", "ipcc.ch", "IPCC")
            .with_description("Painel sobre emissões e carbono")
            .with_category("carbono")
            .with_trust_score(40.0);
        let unrelated = AuthoritySource::new("https://example.org", "example.org", "Culinária")
            .with_description("Receitas")
            .with_trust_score(10.0);
        seed_source(&h, &matching).await;
        seed_source(&h, &unrelated).await;

        let summary = h
            .service
            .run_external(JobScope::Single(article.id))
            .await
            .expect("run");
        assert_eq!(summary.links_created, 1);

        let edges = h
            .links
            .list_edges_for_article(article.id)
            .await
            .expect("edges");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].match_type, MatchType::Category);
        assert_eq!(edges[0].target_id, matching.id);
        assert_eq!(edges[0].anchor_text, "IPCC");

        let bumped = h
            .sources
            .get_source(matching.id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(bumped.usage_count, 1);
    }

    #[tokio::test]
    async fn test_external_ranked_by_score() {
        let h = harness().await;
        let article = Article::new(
            "carbono",
            "Carbono",
            "emissões de carbono e certificação regulatória",
        );
        seed(&h, &article).await;

        // Both match the carbon group; the second also matches regulatory
        // and carries a higher trust score, so it must rank first
        let weaker = AuthoritySource::new("https://a.org", "a.org", "Fonte A")
            .with_description("dados de carbono")
            .with_trust_score(10.0);
        let stronger = AuthoritySource::new("https://b.org", "b.org", "Fonte B")
            .with_description("auditoria e certificação de carbono")
            .with_trust_score(50.0);
        seed_source(&h, &weaker).await;
        seed_source(&h, &stronger).await;

        h.service
            .run_external(JobScope::Single(article.id))
            .await
            .expect("run");

        let edges = h
            .links
            .list_edges_for_article(article.id)
            .await
            .expect("edges");
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].target_id, stronger.id, "higher score links first");
    }

    #[tokio::test]
    async fn test_external_fallback_tops_up_to_three() {
        let h = harness().await;
        // Article text matches no topical group
        let article = Article::new("alheio", "Assunto Alheio", "nada temático aqui");
        seed(&h, &article).await;

        let mut catalog = Vec::new();
        for i in 0..4 {
            let source = AuthoritySource::new(
                format!("https://s{i}.org"),
                format!("s{i}.org"),
                format!("Fonte {i}"),
            )
            .with_trust_score(1.0);
            seed_source(&h, &source).await;
            catalog.push(source);
        }

        // Two pre-existing external links
        for source in catalog.iter().take(2) {
            let edge = NewLinkEdge::external(
                article.id,
                source.id,
                source.name.clone(),
                MatchType::GenericFallback,
            );
            assert!(h.links.insert_edge(&edge, 5).await.expect("seed edge"));
        }

        let summary = h
            .service
            .run_external(JobScope::Single(article.id))
            .await
            .expect("run");

        // Fallback budget is 3 - 2 = 1
        assert_eq!(summary.links_created, 1);
        let edges = h
            .links
            .list_edges_for_article(article.id)
            .await
            .expect("edges");
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2].match_type, MatchType::GenericFallback);
    }

    #[tokio::test]
    async fn test_external_short_circuit_at_cap() {
        let h = harness().await;
        let article = Article::new(
            "carbono",
            "Carbono",
            "emissões de carbono por todo o texto",
        );
        seed(&h, &article).await;

        // Five pre-existing external links fill the cap
        for i in 0..5 {
            let source = AuthoritySource::new(
                format!("https://s{i}.org"),
                format!("s{i}.org"),
                format!("Fonte {i}"),
            );
            seed_source(&h, &source).await;
            let edge = NewLinkEdge::external(
                article.id,
                source.id,
                source.name.clone(),
                MatchType::Category,
            );
            assert!(h.links.insert_edge(&edge, 5).await.expect("seed edge"));
        }

        // A fresh source that would match never gets considered
        let fresh = AuthoritySource::new("https://fresh.org", "fresh.org", "Fresca")
            .with_description("carbono")
            .with_trust_score(90.0);
        seed_source(&h, &fresh).await;

        let summary = h
            .service
            .run_external(JobScope::Single(article.id))
            .await
            .expect("run");
        assert_eq!(summary.links_created, 0);
        assert_eq!(
            summary.suggestions_considered, 0,
            "cap short-circuit must skip candidate generation entirely"
        );
    }

    #[tokio::test]
    async fn test_external_cap_invariant_across_runs() {
        let h = harness().await;
        let article = Article::new("carbono", "Carbono", "emissões de carbono e esg");
        seed(&h, &article).await;

        for i in 0..8 {
            let source = AuthoritySource::new(
                format!("https://s{i}.org"),
                format!("s{i}.org"),
                format!("Fonte {i}"),
            )
            .with_description("relatórios de carbono e sustentabilidade")
            .with_trust_score(30.0);
            seed_source(&h, &source).await;
        }

        for _ in 0..3 {
            h.service
                .run_external(JobScope::Single(article.id))
                .await
                .expect("run");
        }

        assert_eq!(
            h.links
                .count_outgoing(article.id, LinkKind::External)
                .await
                .expect("count"),
            5
        );
    }

    // ========== Run bookkeeping ==========

    #[tokio::test]
    async fn test_runs_are_recorded() {
        let h = harness().await;
        let article = Article::new("a", "Artigo", "corpo");
        seed(&h, &article).await;

        h.service.run_internal(JobScope::All).await.expect("run");
        h.service.run_external(JobScope::All).await.expect("run");

        let runs = h.links.list_runs(10).await.expect("list");
        assert_eq!(runs.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_aborts_between_articles() {
        let h = harness().await;
        let article = Article::new("a", "Artigo", "corpo");
        seed(&h, &article).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = Config::default();
        let service = LinkingService::new(
            h.articles.clone(),
            h.sources.clone(),
            h.links.clone(),
            config.linking,
            config.retry,
        )
        .with_cancellation(cancel);

        let err = service.run_internal(JobScope::All).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_run_all_combines_summaries() {
        let h = harness().await;
        let source = Article::new("a", "Artigo A", "texto com tokenização verde e carbono");
        let target = Article::new("b", "Artigo B", "corpo").with_primary_keyword("tokenização verde");
        seed(&h, &source).await;
        seed(&h, &target).await;
        let citation = AuthoritySource::new("https://ipcc.ch", "ipcc.ch", "IPCC")
            .with_description("emissões de carbono")
            .with_trust_score(40.0);
        seed_source(&h, &citation).await;

        let summary = h.service.run_all(JobScope::All).await.expect("run");
        assert!(summary.links_created >= 2);
        assert_eq!(summary.articles_processed, 4, "two articles, two jobs");
    }

    // ========== Failure isolation ==========

    /// Link store that always fails, to exercise the retry budget
    struct FailingLinkRepository;

    #[async_trait]
    impl LinkRepository for FailingLinkRepository {
        async fn insert_edge(&self, _edge: &NewLinkEdge, _cap: u32) -> Result<bool> {
            Err(Error::Other("store down".into()))
        }

        async fn linked_target_ids(
            &self,
            _source: Uuid,
            _kind: LinkKind,
        ) -> Result<HashSet<Uuid>> {
            Err(Error::Other("store down".into()))
        }

        async fn count_outgoing(&self, _source: Uuid, _kind: LinkKind) -> Result<u64> {
            Err(Error::Other("store down".into()))
        }

        async fn recompute_metrics(&self, _article_id: Uuid) -> Result<super::super::entity::DerivedMetrics> {
            Err(Error::Other("store down".into()))
        }

        async fn get_metrics(
            &self,
            _article_id: Uuid,
        ) -> Result<Option<super::super::entity::DerivedMetrics>> {
            Ok(None)
        }

        async fn record_run(&self, _record: &RunRecord) -> Result<()> {
            Ok(())
        }

        async fn list_runs(&self, _limit: u32) -> Result<Vec<RunRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_link_store_failure_skips_article_not_run() {
        let h = harness().await;
        let article = Article::new("a", "Artigo", "corpo");
        seed(&h, &article).await;

        let config = Config {
            retry: crate::config::RetryConfig {
                max_attempts: 2,
                op_timeout_secs: 1,
            },
            ..Config::default()
        };
        let service = LinkingService::new(
            h.articles.clone(),
            h.sources.clone(),
            Arc::new(FailingLinkRepository),
            config.linking,
            config.retry,
        );

        // The run itself succeeds; the broken article is skipped
        let summary = service.run_internal(JobScope::All).await.expect("run");
        assert_eq!(summary.articles_processed, 0);
        assert_eq!(summary.links_created, 0);
    }
}
