//! Nexus CLI
//!
//! Command-line harness for the multi-tenant retrieval and relevance core:
//! wires a `NexusCore` over the SQLite/in-process store adapters and exposes
//! its operation surface as subcommands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nexus_core::config::Config;
use nexus_core::domain::{AccessKind, ContentNode, ContentVariant, ContextKind, TenantCoordinates};
use nexus_core::stores::cache_store::DashMapCache;
use nexus_core::stores::graph_store::InMemoryGraphStore;
use nexus_core::stores::metrics_store::InMemoryMetricsStore;
use nexus_core::stores::queue_store::SqliteQueue;
use nexus_core::stores::relational_sqlite::SqliteRelationalStore;
use nexus_core::stores::{Cache, EmbeddingProvider, GraphStore, MetricsStore, Queue, RelationalStore, VectorStore};
use nexus_core::tenant::TenantContext;
use nexus_core::{CoreDeps, NexusCore};

#[cfg(feature = "vector-search")]
use nexus_core::stores::vector_store::UsearchVectorStore;
#[cfg(not(feature = "vector-search"))]
use nexus_core::stores::vector_store::InMemoryVectorStore;

#[cfg(feature = "embeddings")]
use nexus_core::embeddings::FastEmbedProvider;

/// Nexus - multi-tenant retrieval and relevance core CLI
#[derive(Parser)]
#[command(name = "nexus-cli")]
#[command(author = "Nexus Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the Nexus retrieval and relevance core")]
struct Cli {
    /// Directory holding the SQLite database and durable queue (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit machine-readable JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Tenant company id
    #[arg(long, global = true, default_value = "default")]
    company: String,

    /// Tenant application id
    #[arg(long, global = true, default_value = "cli")]
    app: String,

    /// Acting user id
    #[arg(long, global = true, default_value = "cli-user")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a content node through the write saga
    Store {
        /// Body text
        body: String,
        /// Content variant: memory, document, episode, or chunk
        #[arg(long, default_value = "memory")]
        variant: String,
        /// Title (matched by title_search query patterns)
        #[arg(long)]
        title: Option<String>,
        /// Tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,
        /// Provenance source (URL, file path, conversation id)
        #[arg(long)]
        source: Option<String>,
        /// Idempotency key; defaults to a fresh UUID (retries should reuse it)
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Hybrid search over vector, metadata, and full-text candidates
    Search {
        /// Query text
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 0.3)]
        score_threshold: f64,
        /// Restrict to one content variant
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Relevance-ordered retrieval over stored metrics
    Retrieve {
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        min_retrievability: Option<f64>,
        #[arg(long)]
        min_stability: Option<f64>,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Record an access event against a stored node
    RecordAccess {
        content_id: String,
        /// retrieve, view, edit, or share
        #[arg(long, default_value = "view")]
        kind: String,
        /// query, related, manual, or system
        #[arg(long, default_value = "manual")]
        context: String,
        /// Observed relevance score at access time, in [0, 1]
        #[arg(long)]
        score: Option<f64>,
    },

    /// Set a node's user-importance value
    SetImportance {
        content_id: String,
        /// New importance value, in [0, 1]
        value: f64,
    },

    /// Fetch a node's current composite score breakdown
    GetScore { content_id: String },

    /// Propagate a recall boost across the relationship graph
    PropagateBoost { content_id: String },

    /// Run the next available decay-maintenance job for this tenant
    RunDecayJob {
        /// Schedule a job first if the queue is empty
        #[arg(long)]
        schedule: bool,
    },
}

fn build_core(data_dir: Option<PathBuf>) -> anyhow::Result<NexusCore> {
    let mut config = Config::from_env();
    if let Some(dir) = data_dir {
        std::fs::create_dir_all(&dir)?;
        config.db_path = dir.join("nexus.db");
    } else if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let queue_path = config.db_path.with_file_name("nexus-queue.db");

    let relational: Arc<dyn RelationalStore> = Arc::new(SqliteRelationalStore::open(config.db_path.clone())?);
    let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
    let cache: Arc<dyn Cache> = Arc::new(DashMapCache::new());
    let queue: Arc<dyn Queue> = Arc::new(SqliteQueue::open(queue_path)?);
    let metrics: Arc<dyn MetricsStore> = Arc::new(InMemoryMetricsStore::new());

    #[cfg(feature = "vector-search")]
    let vector: Arc<dyn VectorStore> = Arc::new(UsearchVectorStore::new(config.saga.embedding_dimensions));
    #[cfg(not(feature = "vector-search"))]
    let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

    #[cfg(feature = "embeddings")]
    let embeddings: Option<Arc<dyn EmbeddingProvider>> = Some(Arc::new(FastEmbedProvider::new()));
    #[cfg(not(feature = "embeddings"))]
    let embeddings: Option<Arc<dyn EmbeddingProvider>> = None;

    let deps = CoreDeps { relational, vector, graph, cache, queue, metrics, embeddings };
    Ok(NexusCore::new(config, deps))
}

fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.as_deref()
        .map(|t| t.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn header(title: &str) {
    println!("{}", format!("=== {title} ===").cyan().bold());
    println!();
}

fn parse_context(s: &str) -> anyhow::Result<ContextKind> {
    match s.to_lowercase().as_str() {
        "query" => Ok(ContextKind::Query),
        "related" => Ok(ContextKind::Related),
        "manual" => Ok(ContextKind::Manual),
        "system" => Ok(ContextKind::System),
        other => Err(anyhow::anyhow!("unknown access context '{other}' (expected query, related, manual, or system)")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_target(false)
        .init();

    let core = build_core(cli.data_dir)?;
    let tenant = TenantContext::new(&cli.company, &cli.app, &cli.user)?;
    let json = cli.json;

    match cli.command {
        Commands::Store { body, variant, title, tags, source, idempotency_key } => {
            let content_variant = ContentVariant::parse_name(&variant)
                .ok_or_else(|| anyhow::anyhow!("unknown content variant '{variant}' (expected memory, document, episode, or chunk)"))?;
            let coords = TenantCoordinates {
                company_id: tenant.company_id.clone(),
                app_id: tenant.app_id.clone(),
                user_id: tenant.user_id.clone(),
                session_id: tenant.session_id.clone(),
            };
            let mut node = ContentNode::new(content_variant, body, coords);
            node.title = title;
            node.source = source;
            node.tags = parse_tags(tags);
            let key = idempotency_key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let outcome = core.store(&node, &key).await?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "id": outcome.id,
                        "version": outcome.version,
                        "partialVisibility": outcome.partial_visibility,
                    }))?
                );
            } else {
                header("Nexus Store");
                println!("{}: {}", "Node ID".white().bold(), outcome.id);
                println!("{}: {}", "Version".white().bold(), outcome.version);
                if outcome.partial_visibility {
                    println!("{}: {}", "Visibility".yellow().bold(), "partial (vector write not yet confirmed)".yellow());
                } else {
                    println!("{}: {}", "Visibility".green().bold(), "confirmed".green());
                }
            }
        }

        Commands::Search { query, limit, offset, score_threshold, content_type } => {
            let content_type = content_type
                .map(|s| ContentVariant::parse_name(&s).ok_or_else(|| anyhow::anyhow!("unknown content variant '{s}'")))
                .transpose()?;
            let opts = nexus_core::search::SearchOptions { limit, offset, score_threshold, content_type };
            let response = core.search(&tenant, &query, opts).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                header("Nexus Search");
                println!(
                    "{}: {} ({} total, {}ms, pattern={}, cached={})",
                    "Results".white().bold(),
                    response.results.len(),
                    response.pagination.total,
                    response.perf.elapsed_ms,
                    response.perf.pattern,
                    response.perf.cached,
                );
                println!();
                for hit in &response.results {
                    println!(
                        "  {} [{}] score={:.3} (v={:.3} m={:.3} f={:.3})",
                        hit.id.dimmed(),
                        hit.variant.as_str(),
                        hit.combined_score,
                        hit.subscores.vector,
                        hit.subscores.metadata,
                        hit.subscores.fts,
                    );
                }
            }
        }

        Commands::Retrieve { content_type, tags, min_retrievability, min_stability, min_score, limit, offset } => {
            let content_type = content_type
                .map(|s| ContentVariant::parse_name(&s).ok_or_else(|| anyhow::anyhow!("unknown content variant '{s}'")))
                .transpose()?;
            let filter = nexus_core::relevance::RetrieveFilter {
                content_type,
                tags: parse_tags(tags),
                min_retrievability,
                min_stability,
                min_relevance_score: min_score,
                limit,
                offset,
                use_cache: true,
            };
            let result = core.retrieve(&tenant, filter).await?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "total": result.total,
                        "hasMore": result.has_more,
                        "fallbackNodeCount": result.fallback_node_count,
                        "rows": result.rows.iter().map(|r| serde_json::json!({ "nodeId": r.node_id, "breakdown": r.breakdown })).collect::<Vec<_>>(),
                    }))?
                );
            } else {
                header("Nexus Retrieve");
                println!("{}: {} ({} total, has_more={})", "Rows".white().bold(), result.rows.len(), result.total, result.has_more);
                println!("{}: {}", "Fallback scores computed".white().bold(), result.fallback_node_count);
                println!();
                for row in &result.rows {
                    println!("  {} total={:.3}", row.node_id.dimmed(), row.breakdown.total);
                }
            }
        }

        Commands::RecordAccess { content_id, kind, context, score } => {
            let kind = AccessKind::parse_name(&kind)?;
            let context = parse_context(&context)?;
            let updated = core.record_access(&tenant, &content_id, kind, context, score).await?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "contentId": updated.content_id,
                        "accessCount": updated.access_count,
                        "stability": updated.stability,
                        "retrievability": updated.retrievability,
                    }))?
                );
            } else {
                header("Nexus Record Access");
                println!("{}: {}", "Access count".white().bold(), updated.access_count);
                println!("{}: {:.4}", "Stability".white().bold(), updated.stability);
                println!("{}: {:.4}", "Retrievability".white().bold(), updated.retrievability);
            }
        }

        Commands::SetImportance { content_id, value } => {
            let new_value = core.set_importance(&tenant, &content_id, value).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "importance": new_value }))?);
            } else {
                header("Nexus Set Importance");
                println!("{}: {:.3}", "New importance".white().bold(), new_value);
            }
        }

        Commands::GetScore { content_id } => {
            let breakdown = core.get_score(&tenant, &content_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
            } else {
                header("Nexus Get Score");
                println!("{}: {:.4}", "Total".white().bold(), breakdown.total);
                println!("  vector={:.4} stability={:.4} retrievability={:.4}", breakdown.vector, breakdown.stability, breakdown.retrievability);
                println!(
                    "  user_importance={:.4} ai_importance={:.4} graph={:.4}",
                    breakdown.user_importance, breakdown.ai_importance, breakdown.graph
                );
                if breakdown.used_fallback {
                    println!("{}", "(no query vector supplied; vector weight redistributed)".yellow());
                }
            }
        }

        Commands::PropagateBoost { content_id } => {
            let result = core.propagate_boost(&tenant, &content_id).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "affectedNodes": result.affected_nodes.len(),
                        "maxDepthReached": result.max_depth_reached,
                        "totalBoost": result.total_boost,
                    }))?
                );
            } else {
                header("Nexus Propagate Boost");
                println!("{}: {}", "Affected nodes".white().bold(), result.affected_nodes.len());
                println!("{}: {}", "Max depth reached".white().bold(), result.max_depth_reached);
                println!("{}: {:.4}", "Total boost".white().bold(), result.total_boost);
            }
        }

        Commands::RunDecayJob { schedule } => {
            if schedule {
                let job_id = core.schedule_decay_job(&tenant).await?;
                info!(job_id, "scheduled decay maintenance job");
            }
            let summary = core.run_decay_job().await?;
            match summary {
                Some(summary) if json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "updatedCount": summary.updated_count,
                            "avgRetrievability": summary.avg_retrievability,
                            "minRetrievability": summary.min_retrievability,
                            "maxRetrievability": summary.max_retrievability,
                            "processingMs": summary.processing_ms,
                        }))?
                    );
                }
                Some(summary) => {
                    header("Nexus Decay Maintenance");
                    println!("{}: {}", "Updated nodes".white().bold(), summary.updated_count);
                    println!("{}: {:.4}", "Avg retrievability".white().bold(), summary.avg_retrievability);
                    println!(
                        "{}: {:.4} .. {:.4}",
                        "Range".white().bold(),
                        summary.min_retrievability,
                        summary.max_retrievability
                    );
                    println!("{}: {}ms", "Processing time".white().bold(), summary.processing_ms);
                }
                None if json => {
                    println!("{}", serde_json::json!({ "ran": false }));
                }
                None => {
                    println!("{}", "No decay maintenance job was pending.".dimmed());
                }
            }
        }
    }

    Ok(())
}
