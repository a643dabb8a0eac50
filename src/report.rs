use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::app::{Detail, Frame, Row};
use crate::filter::ActiveFilter;
use crate::models::Stats;
use crate::scoring::{self, Verdict};

pub const HELP: &str = "\
commands:
  filter all|strong|favorites   change the server-side filter
  search <text>                 narrow the current list (empty clears)
  select <id> | deselect        inspect an idea
  fav <id>                      toggle favorite
  scan [days] [hashtags...]     trigger a scan
  refresh                       re-fetch the list now
  quit";

/// Something that can draw itself into `size` terminal columns.
pub trait Renderable {
    fn render(&self, size: usize) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Lightbulb,
    Dollar,
    Target,
    Star,
    Chart,
    Radar,
}

impl Icon {
    fn glyph(self) -> &'static str {
        match self {
            Icon::Lightbulb => "*",
            Icon::Dollar => "$",
            Icon::Target => "@",
            Icon::Star => "\u{2605}",
            Icon::Chart => "#",
            Icon::Radar => "~",
        }
    }
}

impl Renderable for Icon {
    fn render(&self, size: usize) -> String {
        fit(self.glyph(), size)
    }
}

impl Renderable for Verdict {
    fn render(&self, size: usize) -> String {
        fit(self.label(), size)
    }
}

fn fit(text: &str, size: usize) -> String {
    let truncated: String = text.chars().take(size).collect();
    format!("{truncated:<size$}")
}

fn bar(value: f64, max: f64, width: usize) -> String {
    let filled = if max <= 0.0 {
        0
    } else {
        ((value / max).clamp(0.0, 1.0) * width as f64).round() as usize
    };
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}

fn format_mrr(mrr: Option<f64>) -> String {
    match mrr {
        Some(value) if value > 0.0 => format!("${value:.0}"),
        _ => "-".to_string(),
    }
}

pub fn stats_cards(stats: &Stats) -> Vec<(Icon, &'static str, String)> {
    vec![
        (Icon::Lightbulb, "Ideas", stats.total_ideas.to_string()),
        (Icon::Dollar, "With MRR", stats.with_mrr.to_string()),
        (Icon::Target, "Score 70+", stats.high_score_ideas.to_string()),
        (Icon::Star, "Favorites", stats.favorites.to_string()),
        (Icon::Chart, "Avg MRR", format!("${:.0}", stats.average_mrr)),
        (Icon::Radar, "Avg score", format!("{:.1}", stats.average_score)),
    ]
}

fn card(icon: &dyn Renderable, label: &str, value: &str) -> String {
    format!("{} {label}: {value}", icon.render(1))
}

pub fn render_stats(stats: &Stats) -> String {
    stats_cards(stats)
        .iter()
        .map(|(icon, label, value)| card(icon, label, value))
        .collect::<Vec<_>>()
        .join("  |  ")
}

pub fn render_table(rows: &[Row]) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:>5}  {:1}  {:<22} {:<16} {:<16} {:>5}  {:<12} {:>8}",
        "id", "", "product", "author", "category", "score", "verdict", "mrr"
    );
    for row in rows {
        let favorite: &dyn Renderable = &Icon::Star;
        let _ = writeln!(
            output,
            "{:>5}  {}  {} {} {} {:>5.0}  {} {:>8}",
            row.idea.id,
            if row.idea.is_favorited {
                favorite.render(1)
            } else {
                " ".to_string()
            },
            fit(&row.idea.product_name, 22),
            fit(&row.idea.author, 16),
            fit(&row.idea.category, 16),
            row.total,
            row.verdict.render(12),
            format_mrr(row.idea.reported_mrr),
        );
    }
    output
}

pub fn render_detail(row: &Row) -> String {
    let idea = &row.idea;
    let mut output = String::new();
    let grade = idea
        .grade
        .clone()
        .unwrap_or_else(|| scoring::grade(row.total).to_string());

    let _ = writeln!(output, "{} ({})", idea.product_name, idea.author);
    if let Some(url) = &idea.product_url {
        let _ = writeln!(output, "  {url}");
    }
    let _ = writeln!(
        output,
        "  total {:.0} / grade {} / {}",
        row.total, grade, row.verdict
    );
    let _ = writeln!(
        output,
        "  MRR {}{}",
        format_mrr(idea.reported_mrr),
        if idea.has_screenshot {
            " (screenshot)"
        } else {
            ""
        }
    );
    if let Some(complexity) = &idea.complexity {
        let _ = writeln!(output, "  complexity {complexity}");
    }

    if let Some(breakdown) = &idea.score_breakdown {
        for (label, value, max) in [
            ("traction", breakdown.traction, 30.0),
            ("growth", breakdown.growth, 25.0),
            ("traffic", breakdown.traffic, 25.0),
            ("simplicity", breakdown.simplicity, 20.0),
        ] {
            let value = value.unwrap_or(0.0);
            let _ = writeln!(
                output,
                "  {label:<10} {} {value:>4.0}/{max:.0}",
                bar(value, max, 20)
            );
        }
    }

    if let Some(traffic) = &idea.traffic_source {
        let _ = writeln!(output, "  traffic sources:");
        for (channel, percent) in traffic.channels() {
            match percent {
                Some(percent) => {
                    let _ = writeln!(
                        output,
                        "    {channel:<9} {} {percent:>3.0}%",
                        bar(percent, 100.0, 20)
                    );
                }
                None => {
                    let _ = writeln!(output, "    {channel:<9} n/a");
                }
            }
        }
    }

    if let Some(engagement) = &idea.engagement {
        let _ = writeln!(
            output,
            "  {} likes, {} retweets, {} replies ({} engagement)",
            engagement.likes,
            engagement.retweets,
            engagement.replies,
            engagement.rate.as_deref().unwrap_or("n/a")
        );
    }
    match (&idea.replicability, &idea.replicability_note) {
        (Some(level), Some(note)) => {
            let _ = writeln!(output, "  replicability {level}: {note}");
        }
        (Some(level), None) => {
            let _ = writeln!(output, "  replicability {level}");
        }
        (None, Some(note)) => {
            let _ = writeln!(output, "  replicability: {note}");
        }
        (None, None) => {}
    }
    if let Some(tweet) = &idea.found_in_tweet {
        let _ = writeln!(output, "  \"{tweet}\"");
    }
    if let Some(url) = &idea.tweet_url {
        let _ = writeln!(
            output,
            "  {url} ({})",
            idea.tweet_date.as_deref().unwrap_or("undated")
        );
    }
    output
}

pub fn render_frame(frame: &Frame) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", render_stats(&frame.stats));
    let _ = writeln!(
        output,
        "filter: {}   search: {}",
        frame.filter.as_str(),
        if frame.search.is_empty() {
            "-"
        } else {
            frame.search.as_str()
        }
    );
    if let Some(updated_at) = frame.updated_at {
        let _ = writeln!(output, "updated {}", updated_at.format("%H:%M:%S UTC"));
    }
    if frame.scanning {
        let _ = writeln!(output, "scanning...");
    }
    if let Some(status) = &frame.status {
        let _ = writeln!(output, "{status}");
    }
    let _ = writeln!(output);

    if let Some(error) = &frame.ideas_error {
        let _ = writeln!(output, "!! could not load ideas: {error}");
    }
    if frame.loading {
        let _ = writeln!(output, "loading ideas...");
    } else if frame.rows.is_empty() {
        if frame.ideas_error.is_none() {
            let _ = writeln!(output, "No ideas match.");
        }
    } else {
        output.push_str(&render_table(&frame.rows));
    }

    let _ = writeln!(output);
    match &frame.detail {
        Detail::Empty => {
            let _ = writeln!(output, "Select an idea to see details.");
        }
        Detail::Selected(row) => output.push_str(&render_detail(row)),
        Detail::NotFound(id) => {
            let _ = writeln!(output, "Idea {id} is no longer in this list.");
        }
    }
    output
}

pub fn build_report(
    filter: ActiveFilter,
    search: &str,
    generated_at: DateTime<Utc>,
    stats: &Stats,
    rows: &[Row],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# SaaS Idea Report");
    let _ = writeln!(
        output,
        "Generated {} for filter `{}`{}",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        filter.as_str(),
        if search.is_empty() {
            String::new()
        } else {
            format!(" matching \"{search}\"")
        }
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    for (_, label, value) in stats_cards(stats) {
        let _ = writeln!(output, "- {label}: {value}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Verdict Mix");
    if rows.is_empty() {
        let _ = writeln!(output, "No ideas in this view.");
    } else {
        for verdict in [
            Verdict::StrongBuild,
            Verdict::Exploring,
            Verdict::Caution,
            Verdict::Skip,
        ] {
            let count = rows.iter().filter(|row| row.verdict == verdict).count();
            let _ = writeln!(output, "- {verdict}: {count}");
        }
    }

    let mut ranked: Vec<&Row> = rows.iter().collect();
    ranked.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Ideas");
    if ranked.is_empty() {
        let _ = writeln!(output, "No ideas in this view.");
    } else {
        for row in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) score {:.0} {} MRR {}",
                row.idea.product_name,
                row.idea.author,
                row.idea.category,
                row.total,
                row.verdict,
                format_mrr(row.idea.reported_mrr)
            );
        }
    }

    output
}

pub fn write_csv(rows: &[Row], path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Serialize)]
    struct CsvRow<'a> {
        id: i64,
        product_name: &'a str,
        author: &'a str,
        category: &'a str,
        total_score: f64,
        verdict: &'static str,
        reported_mrr: Option<f64>,
        is_favorited: bool,
        product_url: Option<&'a str>,
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(CsvRow {
            id: row.idea.id,
            product_name: &row.idea.product_name,
            author: &row.idea.author,
            category: &row.idea.category,
            total_score: row.total,
            verdict: row.verdict.label(),
            reported_mrr: row.idea.reported_mrr,
            is_favorited: row.idea.is_favorited,
            product_url: row.idea.product_url.as_deref(),
        })?;
    }
    writer.flush()?;
    Ok(rows.len())
}
