use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::api::IdeasApi;
use crate::config::DashboardConfig;
use crate::filter::{self, ActiveFilter, QueryKey};
use crate::models::{Idea, IdeaId, Stats, DEFAULT_SCAN_DAYS};
use crate::mutation::{MutationCoordinator, ScanOutcome};
use crate::report;
use crate::scoring::{self, Verdict};
use crate::selection::{Resolved, SelectionController};
use crate::sync::{FetchFuture, Fetcher, Phase, QuerySynchronizer, Subscription};

pub fn ideas_fetcher(api: Arc<dyn IdeasApi>, filter: ActiveFilter) -> Fetcher<Vec<Idea>> {
    Arc::new(move || -> FetchFuture<Vec<Idea>> {
        let api = Arc::clone(&api);
        Box::pin(async move { api.list_ideas(filter).await })
    })
}

pub fn stats_fetcher(api: Arc<dyn IdeasApi>) -> Fetcher<Stats> {
    Arc::new(move || -> FetchFuture<Stats> {
        let api = Arc::clone(&api);
        Box::pin(async move { api.stats().await })
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub idea: Idea,
    pub total: f64,
    pub verdict: Verdict,
}

impl Row {
    pub fn from_idea(idea: &Idea) -> Self {
        let total = scoring::compute_total(idea);
        Self {
            idea: idea.clone(),
            total,
            verdict: scoring::classify(total),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    Empty,
    Selected(Row),
    NotFound(IdeaId),
}

/// Everything needed to draw one screen.
#[derive(Debug, Clone)]
pub struct Frame {
    pub filter: ActiveFilter,
    pub search: String,
    pub stats: Stats,
    pub rows: Vec<Row>,
    pub loading: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub ideas_error: Option<String>,
    pub detail: Detail,
    pub status: Option<String>,
    pub scanning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Filter(ActiveFilter),
    Search(String),
    Select(IdeaId),
    Deselect,
    Favorite(IdeaId),
    Scan { days: u32, hashtags: Vec<String> },
    Refresh,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match verb {
            "filter" => rest.parse().map(Command::Filter),
            "search" | "/" => Ok(Command::Search(rest.to_string())),
            "select" => parse_id(rest).map(Command::Select),
            "deselect" => Ok(Command::Deselect),
            "fav" | "favorite" => parse_id(rest).map(Command::Favorite),
            "scan" => {
                let mut parts = rest.split_whitespace().peekable();
                let days = match parts.peek().and_then(|p| p.parse::<u32>().ok()) {
                    Some(days) => {
                        parts.next();
                        days
                    }
                    None => DEFAULT_SCAN_DAYS,
                };
                let hashtags = parts
                    .map(|tag| tag.trim_start_matches('#').to_string())
                    .collect();
                Ok(Command::Scan { days, hashtags })
            }
            "refresh" | "r" => Ok(Command::Refresh),
            "help" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command: {other} (try `help`)")),
        }
    }
}

fn parse_id(raw: &str) -> Result<IdeaId, String> {
    raw.parse()
        .map_err(|_| format!("expected an idea id, got `{raw}`"))
}

pub struct Dashboard {
    config: DashboardConfig,
    api: Arc<dyn IdeasApi>,
    ideas: QuerySynchronizer<Vec<Idea>>,
    ideas_sub: Subscription<Vec<Idea>>,
    stats_sub: Subscription<Stats>,
    filter: ActiveFilter,
    search: String,
    selection: SelectionController,
    mutations: MutationCoordinator,
}

impl Dashboard {
    /// Subscribes to the ideas list and the stats aggregate. Needs a tokio runtime.
    pub fn new(config: DashboardConfig, api: Arc<dyn IdeasApi>, filter: ActiveFilter) -> Self {
        let ideas = QuerySynchronizer::new();
        let stats = QuerySynchronizer::new();
        let ideas_sub = ideas.subscribe(
            QueryKey::Ideas(filter),
            ideas_fetcher(Arc::clone(&api), filter),
            config.ideas_refresh,
        );
        let stats_sub = stats.subscribe(
            QueryKey::Stats,
            stats_fetcher(Arc::clone(&api)),
            config.stats_refresh,
        );
        let mutations =
            MutationCoordinator::new(Arc::clone(&api), ideas.clone(), config.status_display);

        Self {
            config,
            api,
            ideas,
            ideas_sub,
            stats_sub,
            filter,
            search: String::new(),
            selection: SelectionController::new(),
            mutations,
        }
    }

    pub fn selected_id(&self) -> Option<IdeaId> {
        self.selection.selected_id()
    }

    /// Switching filters moves to a different cache key; the old key is released.
    pub fn set_filter(&mut self, filter: ActiveFilter) {
        if filter == self.filter {
            return;
        }
        info!(filter = filter.as_str(), "filter changed");
        let next = self.ideas.subscribe(
            QueryKey::Ideas(filter),
            ideas_fetcher(Arc::clone(&self.api), filter),
            self.config.ideas_refresh,
        );
        self.ideas_sub = next;
        self.filter = filter;
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    pub fn select(&mut self, id: IdeaId) {
        self.selection.select(id);
    }

    pub fn deselect(&mut self) {
        self.selection.deselect();
    }

    /// Never touches the selection, even for the selected row.
    pub async fn toggle_favorite(&self, id: IdeaId) {
        self.mutations.toggle_favorite(id).await;
    }

    pub async fn trigger_scan(&self, hashtags: Vec<String>, days: u32) -> ScanOutcome {
        self.mutations.trigger_scan(hashtags, days).await
    }

    pub async fn refresh_ideas(&self) {
        if let Err(e) = self.ideas_sub.revalidate().await {
            debug!(error = %e, "ideas refresh skipped");
        }
    }

    pub async fn refresh(&self) {
        let (ideas, stats) =
            tokio::join!(self.ideas_sub.revalidate(), self.stats_sub.revalidate());
        if let Err(e) = ideas.and(stats.map(|_| ())) {
            debug!(error = %e, "refresh skipped");
        }
    }

    /// Applies a command without waiting on the network: mutations run in the background.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Filter(filter) => self.set_filter(filter),
            Command::Search(text) => self.set_search(text),
            Command::Select(id) => self.select(id),
            Command::Deselect => self.deselect(),
            Command::Favorite(id) => {
                let mutations = self.mutations.clone();
                tokio::spawn(async move { mutations.toggle_favorite(id).await });
            }
            Command::Scan { days, hashtags } => {
                let mutations = self.mutations.clone();
                tokio::spawn(async move { mutations.trigger_scan(hashtags, days).await });
            }
            Command::Refresh => {
                let ideas = self.ideas.clone();
                let key = self.ideas_sub.key();
                tokio::spawn(async move { ideas.revalidate(key).await });
            }
            Command::Help | Command::Quit => {}
        }
    }

    pub fn frame(&mut self) -> Frame {
        let ideas_entry = self.ideas_sub.snapshot();
        let stats = self
            .stats_sub
            .snapshot()
            .data
            .map(|stats| (*stats).clone())
            .unwrap_or_default();

        let ideas: &[Idea] = ideas_entry.data.as_deref().map(Vec::as_slice).unwrap_or(&[]);
        let has_data = ideas_entry.data.is_some();
        if has_data {
            self.selection
                .observe(self.ideas_sub.key(), ideas_entry.version, ideas);
        }

        let rows = filter::search(ideas, &self.search)
            .into_iter()
            .map(Row::from_idea)
            .collect();
        // Until the current key has data there is nothing to resolve against.
        let detail = match self.selection.resolve(ideas) {
            Resolved::Found(idea) => Detail::Selected(Row::from_idea(idea)),
            Resolved::Missing(id) if has_data => Detail::NotFound(id),
            Resolved::Missing(_) | Resolved::Nothing => Detail::Empty,
        };

        Frame {
            filter: self.filter,
            search: self.search.clone(),
            stats,
            rows,
            loading: ideas_entry.data.is_none() && ideas_entry.phase() == Phase::Fetching,
            updated_at: ideas_entry.last_fetched_at,
            ideas_error: ideas_entry.error.clone(),
            detail,
            status: self.mutations.status(),
            scanning: self.mutations.is_scanning(),
        }
    }
}

/// Interactive loop: reads commands from stdin and redraws when the screen changes.
pub async fn run(mut dashboard: Dashboard) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut last_screen = String::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read command")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(Command::Help) => {
                        println!("{}", report::HELP);
                        last_screen.clear();
                        continue;
                    }
                    Ok(command) => dashboard.apply(command),
                    Err(message) => {
                        eprintln!("{message}");
                        continue;
                    }
                }
            }
            _ = ticker.tick() => {}
        }

        let screen = report::render_frame(&dashboard.frame());
        if screen != last_screen {
            println!("\x1b[2J\x1b[H{screen}");
            last_screen = screen;
        }
    }

    Ok(())
}
