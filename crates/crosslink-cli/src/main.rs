//! Crosslink CLI - relevance-based link graph builder

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crosslink_core::config::Config;
use crosslink_core::domain::linking::{
    Article, AuthoritySource, JobScope, LinkingService, RunSummary, SqliteArticleRepository,
    SqliteLinkRepository, SqliteSourceCatalog,
};
use crosslink_core::domain::linking::repository_trait::{ArticleRepository, LinkRepository};
use crosslink_core::storage::{Database, DatabaseConfig};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "crosslink")]
#[command(author, version, about = "Relevance-based link graph builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the SQLite store (defaults to the config directory)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build internal article-to-article links
    Internal {
        /// Process a single article instead of the whole corpus
        #[arg(short, long)]
        article: Option<Uuid>,
    },

    /// Build external citations to authority sources
    External {
        /// Process a single article instead of the whole corpus
        #[arg(short, long)]
        article: Option<Uuid>,
    },

    /// Run both linking jobs in sequence
    Run {
        /// Process a single article instead of the whole corpus
        #[arg(short, long)]
        article: Option<Uuid>,
    },

    /// Load articles and authority sources from a JSON file
    Import {
        /// Path to the corpus file
        file: PathBuf,
    },

    /// Show derived link metrics
    Metrics {
        /// Show a single article instead of the whole corpus
        #[arg(short, long)]
        article: Option<Uuid>,
    },

    /// Show recent batch runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// Run health check
    Doctor,
}

/// Corpus import file: articles and authority sources
#[derive(Deserialize)]
struct ImportFile {
    #[serde(default)]
    articles: Vec<ImportArticle>,
    #[serde(default)]
    sources: Vec<ImportSource>,
}

#[derive(Deserialize)]
struct ImportArticle {
    slug: String,
    title: String,
    body: String,
    #[serde(default)]
    primary_keyword: Option<String>,
}

#[derive(Deserialize)]
struct ImportSource {
    url: String,
    domain: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    trust_score: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crosslink=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let db_config = match &cli.database {
        Some(path) => DatabaseConfig::with_path(path.clone()),
        None => DatabaseConfig::default(),
    };
    let db = Database::new(db_config).await?;

    match cli.command {
        Commands::Internal { article } => {
            let summary = service(&db)?
                .run_internal(scope_from(article))
                .await?;
            print_summary("internal", &summary, cli.format, cli.quiet)
        }

        Commands::External { article } => {
            let summary = service(&db)?
                .run_external(scope_from(article))
                .await?;
            print_summary("external", &summary, cli.format, cli.quiet)
        }

        Commands::Run { article } => {
            let summary = service(&db)?.run_all(scope_from(article)).await?;
            print_summary("all", &summary, cli.format, cli.quiet)
        }

        Commands::Import { file } => cmd_import(&db, &file, cli.quiet).await,

        Commands::Metrics { article } => cmd_metrics(&db, article, cli.format).await,

        Commands::Runs { limit } => cmd_runs(&db, limit, cli.format).await,

        Commands::Doctor => cmd_doctor(&db, cli.quiet).await,
    }
}

fn service(
    db: &Database,
) -> anyhow::Result<LinkingService<SqliteArticleRepository, SqliteSourceCatalog, SqliteLinkRepository>>
{
    let config = Config::load()?;
    Ok(LinkingService::from_pool(db.pool().clone(), config))
}

fn scope_from(article: Option<Uuid>) -> JobScope {
    match article {
        Some(id) => JobScope::Single(id),
        None => JobScope::All,
    }
}

fn print_summary(
    job: &str,
    summary: &RunSummary,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => {
            if quiet {
                println!("{}", summary.links_created);
            } else {
                println!("Linking run ({job}) finished");
                println!("  links created:          {}", summary.links_created);
                println!("  articles processed:     {}", summary.articles_processed);
                println!("  suggestions considered: {}", summary.suggestions_considered);
                if summary.write_failures > 0 {
                    println!("  write failures:         {}", summary.write_failures);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_import(db: &Database, file: &PathBuf, quiet: bool) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read corpus file: {}", file.display()))?;
    let import: ImportFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse corpus file: {}", file.display()))?;

    let articles = SqliteArticleRepository::new(db.pool().clone());
    let sources = SqliteSourceCatalog::new(db.pool().clone());

    let mut imported_articles = 0usize;
    for entry in import.articles {
        let mut article = Article::new(entry.slug, entry.title, entry.body);
        if let Some(keyword) = entry.primary_keyword {
            article = article.with_primary_keyword(keyword);
        }
        articles
            .insert_article(&article)
            .await
            .with_context(|| format!("Failed to import article '{}'", article.slug))?;
        imported_articles += 1;
    }

    let mut imported_sources = 0usize;
    for entry in import.sources {
        let source = AuthoritySource::new(entry.url, entry.domain, entry.name)
            .with_description(entry.description)
            .with_category(entry.category)
            .with_trust_score(entry.trust_score);
        sources
            .insert_source(&source)
            .await
            .with_context(|| format!("Failed to import source '{}'", source.name))?;
        imported_sources += 1;
    }

    info!(
        articles = imported_articles,
        sources = imported_sources,
        "Corpus import finished"
    );
    if !quiet {
        println!("Imported {imported_articles} articles and {imported_sources} sources");
    }
    Ok(())
}

async fn cmd_metrics(
    db: &Database,
    article: Option<Uuid>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let articles = SqliteArticleRepository::new(db.pool().clone());
    let links = SqliteLinkRepository::new(db.pool().clone());

    let targets = match article {
        Some(id) => {
            let article = articles
                .get_article(id)
                .await?
                .ok_or(crosslink_core::Error::ArticleNotFound(id))?;
            vec![article]
        }
        None => articles.list_published().await?,
    };

    let mut rows = Vec::new();
    for article in &targets {
        let metrics = links.get_metrics(article.id).await?;
        rows.push((article, metrics));
    }

    match format {
        OutputFormat::Json => {
            let payload: Vec<_> = rows
                .iter()
                .map(|(article, metrics)| {
                    serde_json::json!({
                        "article_id": article.id,
                        "slug": article.slug,
                        "internal_links": metrics.as_ref().map(|m| m.internal_links),
                        "external_links": metrics.as_ref().map(|m| m.external_links),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Text => {
            for (article, metrics) in rows {
                match metrics {
                    Some(m) => println!(
                        "{:<40} internal: {:<3} external: {}",
                        article.slug, m.internal_links, m.external_links
                    ),
                    None => println!("{:<40} (no metrics yet)", article.slug),
                }
            }
        }
    }
    Ok(())
}

async fn cmd_runs(db: &Database, limit: u32, format: OutputFormat) -> anyhow::Result<()> {
    let links = SqliteLinkRepository::new(db.pool().clone());
    let runs = links.list_runs(limit).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&runs)?),
        OutputFormat::Text => {
            if runs.is_empty() {
                println!("No runs recorded yet");
            }
            for run in runs {
                println!(
                    "{} {:<8} scope={:<36} created={:<3} processed={:<3} considered={}",
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.kind,
                    run.scope,
                    run.links_created,
                    run.articles_processed,
                    run.suggestions_considered
                );
            }
        }
    }
    Ok(())
}

async fn cmd_doctor(db: &Database, quiet: bool) -> anyhow::Result<()> {
    db.health_check().await?;
    let status = db.migration_status().await?;

    if quiet {
        println!("ok");
    } else {
        println!("Database: healthy ({})", db.path().display());
        println!(
            "Schema:   v{} (target v{}){}",
            status.current_version,
            status.target_version,
            if status.needs_migration {
                " - migration needed"
            } else {
                ""
            }
        );
    }
    Ok(())
}
