//! TailorBiz CRM core — lead scoring and funnel stage management over JSON
//! documents exported from the client and funnel collections.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use tailorbiz_core::config::AppConfig;
use tailorbiz_core::funnel::Funnel;
use tailorbiz_core::types::Client;
use tailorbiz_funnel::{FunnelRepository, FunnelStageManager, InMemoryFunnelStore};
use tailorbiz_scoring::{LeadRecommendation, LeadScorer, ScoreBreakdown};

#[derive(Parser, Debug)]
#[command(name = "tailorbiz")]
#[command(about = "Lead scoring and nurturing funnel management")]
#[command(version)]
struct Cli {
    /// Optional TOML config file (environment variables override it)
    #[arg(long, env = "TAILORBIZ_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a client snapshot, or an array of snapshots
    Score {
        path: PathBuf,
        /// Include the per-factor breakdown
        #[arg(long, default_value_t = false)]
        explain: bool,
    },
    /// Apply a lifecycle event to a funnel document (written back in place)
    Funnel {
        #[command(subcommand)]
        op: FunnelOp,
    },
}

#[derive(Subcommand, Debug)]
enum FunnelOp {
    /// Place a lead in a stage
    Add {
        path: PathBuf,
        #[arg(long)]
        stage: u32,
        #[arg(long)]
        lead: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        campaign: Option<String>,
    },
    /// Move a lead between stages
    Move {
        path: PathBuf,
        #[arg(long)]
        lead: String,
        #[arg(long)]
        from: u32,
        #[arg(long)]
        to: u32,
    },
    /// Recompute conversion rates and stage dwell times
    Rates { path: PathBuf },
}

#[derive(Serialize)]
struct ScoredClient {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(flatten)]
    recommendation: LeadRecommendation,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakdown: Option<ScoreBreakdown>,
}

fn score_one(scorer: &LeadScorer, value: serde_json::Value, explain: bool) -> anyhow::Result<ScoredClient> {
    let client = Client::from_json(value)?;
    let now = chrono::Utc::now();
    let recommendation = scorer.get_recommended_action_at(&client, now)?;
    let breakdown = if explain {
        Some(scorer.score_breakdown(&client, now)?)
    } else {
        None
    };
    Ok(ScoredClient {
        id: client.id,
        recommendation,
        breakdown,
    })
}

fn run_score(config: &AppConfig, path: &Path, explain: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let scorer = LeadScorer::new(&config.scoring);

    let output = match value {
        serde_json::Value::Array(items) => {
            let mut scored = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                match score_one(&scorer, item, explain) {
                    Ok(s) => scored.push(serde_json::to_value(s)?),
                    Err(e) => {
                        warn!(index = i, error = %e, "Skipping client");
                        scored.push(serde_json::json!({"index": i, "error": e.to_string()}));
                    }
                }
            }
            info!(clients = scored.len(), "Scored client batch");
            serde_json::Value::Array(scored)
        }
        single => serde_json::to_value(score_one(&scorer, single, explain)?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_funnel(config: &AppConfig, op: FunnelOp) -> anyhow::Result<()> {
    let path = match &op {
        FunnelOp::Add { path, .. } | FunnelOp::Move { path, .. } | FunnelOp::Rates { path } => {
            path.clone()
        }
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let funnel: Funnel = serde_json::from_str(&raw)
        .with_context(|| format!("parsing funnel document {}", path.display()))?;
    funnel
        .validate()
        .with_context(|| format!("invalid funnel document {}", path.display()))?;

    let store = Arc::new(InMemoryFunnelStore::new());
    let funnel_id = store.insert(funnel).await?.id;
    let manager = FunnelStageManager::new(store, &config.funnel);

    let (funnel, triggered) = match op {
        FunnelOp::Add {
            stage,
            lead,
            source,
            campaign,
            ..
        } => {
            let change = manager
                .add_lead_to_stage(funnel_id, stage, &lead, source, campaign)
                .await?;
            (change.funnel, change.triggered)
        }
        FunnelOp::Move { lead, from, to, .. } => {
            let change = manager.move_lead_to_stage(funnel_id, &lead, from, to).await?;
            (change.funnel, change.triggered)
        }
        FunnelOp::Rates { .. } => (manager.recalculate_conversion_rates(funnel_id).await?, Vec::new()),
    };

    std::fs::write(&path, serde_json::to_string_pretty(&funnel)?)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(funnel_id = %funnel_id, version = funnel.version, path = %path.display(), "Funnel document updated");

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "funnelId": funnel_id,
            "version": funnel.version,
            "totalLeads": funnel.analytics.total_leads,
            "overallConversionRate": funnel.analytics.overall_conversion_rate,
            "triggered": triggered,
        }))?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tailorbiz=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    match cli.command {
        Command::Score { path, explain } => run_score(&config, &path, explain),
        Command::Funnel { op } => run_funnel(&config, op).await,
    }
}
