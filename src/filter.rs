use std::fmt;
use std::str::FromStr;

use crate::models::Idea;

pub const STRONG_MIN_SCORE: u32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum ActiveFilter {
    #[default]
    All,
    Strong,
    Favorites,
}

impl ActiveFilter {
    pub fn query_params(self) -> Vec<(&'static str, String)> {
        match self {
            ActiveFilter::All => Vec::new(),
            ActiveFilter::Strong => vec![("min_score", STRONG_MIN_SCORE.to_string())],
            ActiveFilter::Favorites => vec![("favorites", "true".to_string())],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActiveFilter::All => "all",
            ActiveFilter::Strong => "strong",
            ActiveFilter::Favorites => "favorites",
        }
    }
}

impl FromStr for ActiveFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ActiveFilter::All),
            "strong" => Ok(ActiveFilter::Strong),
            "favorites" | "favourites" => Ok(ActiveFilter::Favorites),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}

/// Partition key for cached server data: endpoint plus server-side filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Ideas(ActiveFilter),
    Stats,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Ideas(filter) => {
                let params = filter.query_params();
                if params.is_empty() {
                    f.write_str("/api/ideas")
                } else {
                    let query: Vec<String> =
                        params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    write!(f, "/api/ideas?{}", query.join("&"))
                }
            }
            QueryKey::Stats => f.write_str("/api/stats"),
        }
    }
}

/// Client-side narrowing of an already fetched list. Order is preserved and
/// an empty query keeps every item.
pub fn search<'a>(ideas: &'a [Idea], text: &str) -> Vec<&'a Idea> {
    if text.is_empty() {
        return ideas.iter().collect();
    }
    let needle = text.to_lowercase();
    ideas.iter().filter(|idea| matches(idea, &needle)).collect()
}

fn matches(idea: &Idea, needle: &str) -> bool {
    [&idea.product_name, &idea.author, &idea.category]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}
