use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod api;
mod app;
mod config;
#[cfg(test)]
mod fake_api;
mod filter;
mod models;
mod mutation;
mod report;
mod scoring;
mod selection;
mod sync;

use api::{HttpApi, IdeasApi};
use app::{Dashboard, Row};
use config::DashboardConfig;
use filter::ActiveFilter;
use models::DEFAULT_SCAN_DAYS;
use mutation::{MutationCoordinator, ScanOutcome};
use sync::QuerySynchronizer;

#[derive(Parser)]
#[command(name = "saas-ideas")]
#[command(about = "Live dashboard for scored SaaS ideas", long_about = None)]
struct Cli {
    /// Base URL of the ideas service (falls back to SAAS_FINDER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live dashboard with periodic refresh; reads commands from stdin
    Watch {
        #[arg(long, value_enum, default_value_t = ActiveFilter::All)]
        filter: ActiveFilter,
    },
    /// Print the ideas table once
    List {
        #[arg(long, value_enum, default_value_t = ActiveFilter::All)]
        filter: ActiveFilter,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Show one idea in detail
    Show { id: i64 },
    /// Print dashboard statistics
    Stats,
    /// Ask the service to scan for new ideas
    Scan {
        #[arg(long = "hashtag")]
        hashtags: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_SCAN_DAYS)]
        days: u32,
    },
    /// Toggle the favorite flag on an idea
    Favorite { id: i64 },
    /// Attach a note to an idea
    Note { id: i64, note: String },
    /// List known categories
    Categories,
    /// Generate a markdown report of the filtered view
    Report {
        #[arg(long, value_enum, default_value_t = ActiveFilter::All)]
        filter: ActiveFilter,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "ideas-report.md")]
        out: PathBuf,
    },
    /// Export the filtered view as CSV
    Export {
        #[arg(long, value_enum, default_value_t = ActiveFilter::All)]
        filter: ActiveFilter,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "ideas.csv")]
        out: PathBuf,
    },
}

async fn fetch_rows(
    api: &dyn IdeasApi,
    filter: ActiveFilter,
    search: &str,
) -> anyhow::Result<Vec<Row>> {
    let ideas = api
        .list_ideas(filter)
        .await
        .context("failed to load ideas")?;
    Ok(filter::search(&ideas, search)
        .into_iter()
        .map(Row::from_idea)
        .collect())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = DashboardConfig::resolve(cli.api_url.as_deref())?;
    let api: Arc<dyn IdeasApi> = Arc::new(HttpApi::new(&config));

    match cli.command {
        Commands::Watch { filter } => {
            let dashboard = Dashboard::new(config, api, filter);
            app::run(dashboard).await?;
        }
        Commands::List { filter, search } => {
            let rows = fetch_rows(api.as_ref(), filter, &search).await?;
            if rows.is_empty() {
                println!("No ideas match.");
                return Ok(());
            }
            print!("{}", report::render_table(&rows));
        }
        Commands::Show { id } => {
            let idea = api
                .get_idea(id)
                .await
                .with_context(|| format!("failed to load idea {id}"))?;
            print!("{}", report::render_detail(&Row::from_idea(&idea)));
        }
        Commands::Stats => {
            let stats = api.stats().await.unwrap_or_else(|e| {
                tracing::debug!(error = %e, "stats unavailable, showing zeros");
                Default::default()
            });
            println!("{}", report::render_stats(&stats));
        }
        Commands::Scan { hashtags, days } => {
            let coordinator = MutationCoordinator::new(
                Arc::clone(&api),
                QuerySynchronizer::new(),
                config.status_display,
            );
            match coordinator.trigger_scan(hashtags, days).await {
                ScanOutcome::Finished { status, .. } => println!("{status}"),
                ScanOutcome::Skipped => println!("A scan is already running."),
            }
        }
        Commands::Favorite { id } => {
            api.toggle_favorite(id)
                .await
                .with_context(|| format!("failed to toggle favorite on idea {id}"))?;
            println!("Toggled favorite on idea {id}.");
        }
        Commands::Note { id, note } => {
            api.add_note(id, &note)
                .await
                .with_context(|| format!("failed to add note to idea {id}"))?;
            println!("Note added to idea {id}.");
        }
        Commands::Categories => {
            let categories = api
                .categories()
                .await
                .context("failed to load categories")?;
            if categories.is_empty() {
                println!("No categories yet.");
            }
            for category in categories {
                println!("- {category}");
            }
        }
        Commands::Report {
            filter,
            search,
            out,
        } => {
            let rows = fetch_rows(api.as_ref(), filter, &search).await?;
            let stats = api.stats().await.unwrap_or_default();
            let report =
                report::build_report(filter, &search, chrono::Utc::now(), &stats, &rows);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            filter,
            search,
            out,
        } => {
            let rows = fetch_rows(api.as_ref(), filter, &search).await?;
            let written = report::write_csv(&rows, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Exported {written} ideas to {}.", out.display());
        }
    }

    Ok(())
}
