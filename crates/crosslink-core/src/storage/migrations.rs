//! Database migrations
//!
//! This module manages SQLite schema migrations for crosslink.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Corpus tables
///
/// The article corpus and the authority-source catalog. Both are inputs to
/// the linking pipeline; articles are owned by the editorial CMS and only
/// read here, sources carry a usage counter the pipeline increments.
const MIGRATION_V1: &str = r#"
    -- Published articles (read-only corpus input)
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        primary_keyword TEXT,
        status TEXT NOT NULL DEFAULT 'published' CHECK (status IN ('draft', 'published', 'archived')),
        published_at TIMESTAMP,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
    CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at);

    -- Authority-source catalog for external citations
    CREATE TABLE IF NOT EXISTS authority_sources (
        id TEXT PRIMARY KEY NOT NULL,
        url TEXT NOT NULL,
        domain TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT '',
        trust_score REAL NOT NULL DEFAULT 0.0,
        usage_count INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_authority_sources_active ON authority_sources(active);
    CREATE INDEX IF NOT EXISTS idx_authority_sources_domain ON authority_sources(domain);
"#;

/// Migration 2: Link graph tables
///
/// Edges, derived per-article counters, and the run audit trail. The
/// UNIQUE constraint on (source, kind, target) is what makes edge inserts
/// idempotent under concurrent runs.
const MIGRATION_V2: &str = r#"
    -- Directed cross-reference edges
    CREATE TABLE IF NOT EXISTS link_edges (
        id TEXT PRIMARY KEY NOT NULL,
        source_article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        kind TEXT NOT NULL CHECK (kind IN ('internal', 'external')),
        target_id TEXT NOT NULL,
        anchor_text TEXT NOT NULL,
        match_type TEXT NOT NULL CHECK (match_type IN ('keyword', 'title', 'category', 'generic_fallback')),
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (source_article_id, kind, target_id)
    );

    CREATE INDEX IF NOT EXISTS idx_link_edges_source ON link_edges(source_article_id, kind);
    CREATE INDEX IF NOT EXISTS idx_link_edges_target ON link_edges(target_id);

    -- Derived per-article link counters (recomputed, not incremented)
    CREATE TABLE IF NOT EXISTS article_link_metrics (
        article_id TEXT PRIMARY KEY NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        internal_links INTEGER NOT NULL DEFAULT 0,
        external_links INTEGER NOT NULL DEFAULT 0,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Audit trail of batch runs
    CREATE TABLE IF NOT EXISTS link_runs (
        id TEXT PRIMARY KEY NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('internal', 'external')),
        scope TEXT NOT NULL,
        links_created INTEGER NOT NULL DEFAULT 0,
        articles_processed INTEGER NOT NULL DEFAULT 0,
        suggestions_considered INTEGER NOT NULL DEFAULT 0,
        write_failures INTEGER NOT NULL DEFAULT 0,
        started_at TIMESTAMP NOT NULL,
        finished_at TIMESTAMP NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_link_runs_started_at ON link_runs(started_at);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    // Get the latest version
    let row: Option<(i32,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    // Apply migrations in order
    if current_version < 1 {
        tracing::info!("Applying migration v1: Corpus tables");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Link graph tables");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}
