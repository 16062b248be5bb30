//! SQLite repositories for the linking pipeline
//!
//! Handles all database interactions for articles, authority sources,
//! link edges, derived metrics, and the run audit trail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::entity::{
    Article, AuthoritySource, DerivedMetrics, LinkEdge, LinkKind, MatchType, NewLinkEdge,
    RunRecord,
};
use super::repository_trait::{ArticleRepository, LinkRepository, SourceCatalog};

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Parse(format!("Invalid id '{}': {}", s, e)))
}

fn parse_kind(s: &str) -> Result<LinkKind> {
    LinkKind::parse(s).ok_or_else(|| Error::Parse(format!("Unknown link kind '{}'", s)))
}

fn parse_match_type(s: &str) -> Result<MatchType> {
    MatchType::parse(s).ok_or_else(|| Error::Parse(format!("Unknown match type '{}'", s)))
}

// ========== Articles ==========

/// SQLite-backed article corpus
#[derive(Debug, Clone)]
pub struct SqliteArticleRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: String,
    slug: String,
    title: String,
    body: String,
    primary_keyword: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

impl ArticleRow {
    fn into_article(self) -> Result<Article> {
        Ok(Article {
            id: parse_uuid(&self.id)?,
            slug: self.slug,
            title: self.title,
            body: self.body,
            primary_keyword: self.primary_keyword,
            published_at: self.published_at,
        })
    }
}

impl SqliteArticleRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a published article (corpus ingestion and tests)
    pub async fn insert_article(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles (id, slug, title, body, primary_keyword, status, published_at)
            VALUES (?, ?, ?, ?, ?, 'published', ?)
            "#,
        )
        .bind(article.id.to_string())
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.body)
        .bind(&article.primary_keyword)
        .bind(article.published_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ArticleRepository for SqliteArticleRepository {
    async fn list_published(&self) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(
            r#"
            SELECT id, slug, title, body, primary_keyword, published_at
            FROM articles
            WHERE status = 'published'
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ArticleRow::into_article).collect()
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(
            r#"
            SELECT id, slug, title, body, primary_keyword, published_at
            FROM articles
            WHERE id = ? AND status = 'published'
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into_article()?)),
            None => Ok(None),
        }
    }
}

// ========== Authority Sources ==========

/// SQLite-backed authority-source catalog
#[derive(Debug, Clone)]
pub struct SqliteSourceCatalog {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: String,
    url: String,
    domain: String,
    name: String,
    description: String,
    category: String,
    trust_score: f64,
    usage_count: i64,
}

impl SourceRow {
    fn into_source(self) -> Result<AuthoritySource> {
        Ok(AuthoritySource {
            id: parse_uuid(&self.id)?,
            url: self.url,
            domain: self.domain,
            name: self.name,
            description: self.description,
            category: self.category,
            trust_score: self.trust_score,
            usage_count: self.usage_count,
        })
    }
}

impl SqliteSourceCatalog {
    /// Create a new catalog with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an active source (catalog ingestion and tests)
    pub async fn insert_source(&self, source: &AuthoritySource) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO authority_sources
                (id, url, domain, name, description, category, trust_score, usage_count, active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(source.id.to_string())
        .bind(&source.url)
        .bind(&source.domain)
        .bind(&source.name)
        .bind(&source.description)
        .bind(&source.category)
        .bind(source.trust_score)
        .bind(source.usage_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a single source by id (tests and inspection)
    pub async fn get_source(&self, id: Uuid) -> Result<Option<AuthoritySource>> {
        let row: Option<SourceRow> = sqlx::query_as(
            r#"
            SELECT id, url, domain, name, description, category, trust_score, usage_count
            FROM authority_sources
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into_source()?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SourceCatalog for SqliteSourceCatalog {
    async fn list_active(&self) -> Result<Vec<AuthoritySource>> {
        let rows: Vec<SourceRow> = sqlx::query_as(
            r#"
            SELECT id, url, domain, name, description, category, trust_score, usage_count
            FROM authority_sources
            WHERE active = 1
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SourceRow::into_source).collect()
    }

    async fn increment_usage(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE authority_sources
            SET usage_count = usage_count + 1, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::SourceNotFound(id));
        }
        Ok(())
    }
}

// ========== Link Edges ==========

/// SQLite-backed link-edge store with derived metrics and run audit trail
#[derive(Debug, Clone)]
pub struct SqliteLinkRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    id: String,
    source_article_id: String,
    kind: String,
    target_id: String,
    anchor_text: String,
    match_type: String,
    created_at: DateTime<Utc>,
}

impl EdgeRow {
    fn into_edge(self) -> Result<LinkEdge> {
        Ok(LinkEdge {
            id: parse_uuid(&self.id)?,
            source_article_id: parse_uuid(&self.source_article_id)?,
            kind: parse_kind(&self.kind)?,
            target_id: parse_uuid(&self.target_id)?,
            anchor_text: self.anchor_text,
            match_type: parse_match_type(&self.match_type)?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    kind: String,
    scope: String,
    links_created: i64,
    articles_processed: i64,
    suggestions_considered: i64,
    write_failures: i64,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl RunRow {
    fn into_record(self) -> Result<RunRecord> {
        Ok(RunRecord {
            id: parse_uuid(&self.id)?,
            kind: parse_kind(&self.kind)?,
            scope: self.scope,
            links_created: self.links_created as u64,
            articles_processed: self.articles_processed as u64,
            suggestions_considered: self.suggestions_considered as u64,
            write_failures: self.write_failures as u64,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

impl SqliteLinkRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All outgoing edges for an article, oldest first (inspection and tests)
    pub async fn list_edges_for_article(&self, source: Uuid) -> Result<Vec<LinkEdge>> {
        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT id, source_article_id, kind, target_id, anchor_text, match_type, created_at
            FROM link_edges
            WHERE source_article_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(source.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EdgeRow::into_edge).collect()
    }
}

#[async_trait]
impl LinkRepository for SqliteLinkRepository {
    async fn insert_edge(&self, edge: &NewLinkEdge, cap: u32) -> Result<bool> {
        // Single statement: the cap guard and the uniqueness check both
        // happen inside SQLite, so interleaved runs cannot overshoot the
        // cap or duplicate an edge.
        let result = sqlx::query(
            r#"
            INSERT INTO link_edges
                (id, source_article_id, kind, target_id, anchor_text, match_type, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE (
                SELECT COUNT(*) FROM link_edges
                WHERE source_article_id = ? AND kind = ?
            ) < ?
            ON CONFLICT (source_article_id, kind, target_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(edge.source_article_id.to_string())
        .bind(edge.kind.as_str())
        .bind(edge.target_id.to_string())
        .bind(&edge.anchor_text)
        .bind(edge.match_type.as_str())
        .bind(Utc::now())
        .bind(edge.source_article_id.to_string())
        .bind(edge.kind.as_str())
        .bind(cap as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn linked_target_ids(&self, source: Uuid, kind: LinkKind) -> Result<HashSet<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT target_id FROM link_edges
            WHERE source_article_id = ? AND kind = ?
            "#,
        )
        .bind(source.to_string())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|(id,)| parse_uuid(&id)).collect()
    }

    async fn count_outgoing(&self, source: Uuid, kind: LinkKind) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM link_edges
            WHERE source_article_id = ? AND kind = ?
            "#,
        )
        .bind(source.to_string())
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn recompute_metrics(&self, article_id: Uuid) -> Result<DerivedMetrics> {
        let internal = self.count_outgoing(article_id, LinkKind::Internal).await?;
        let external = self.count_outgoing(article_id, LinkKind::External).await?;
        let updated_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO article_link_metrics (article_id, internal_links, external_links, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(article_id) DO UPDATE SET
                internal_links = excluded.internal_links,
                external_links = excluded.external_links,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(article_id.to_string())
        .bind(internal as i64)
        .bind(external as i64)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(DerivedMetrics {
            article_id,
            internal_links: internal as u32,
            external_links: external as u32,
            updated_at,
        })
    }

    async fn get_metrics(&self, article_id: Uuid) -> Result<Option<DerivedMetrics>> {
        let row: Option<(String, i64, i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT article_id, internal_links, external_links, updated_at
            FROM article_link_metrics
            WHERE article_id = ?
            "#,
        )
        .bind(article_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((id, internal, external, updated_at)) => Ok(Some(DerivedMetrics {
                article_id: parse_uuid(&id)?,
                internal_links: internal as u32,
                external_links: external as u32,
                updated_at,
            })),
            None => Ok(None),
        }
    }

    async fn record_run(&self, record: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO link_runs
                (id, kind, scope, links_created, articles_processed,
                 suggestions_considered, write_failures, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.kind.as_str())
        .bind(&record.scope)
        .bind(record.links_created as i64)
        .bind(record.articles_processed as i64)
        .bind(record.suggestions_considered as i64)
        .bind(record.write_failures as i64)
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT id, kind, scope, links_created, articles_processed,
                   suggestions_considered, write_failures, started_at, finished_at
            FROM link_runs
            ORDER BY started_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RunRow::into_record).collect()
    }
}
