use serde::{Deserialize, Deserializer, Serialize};

pub type IdeaId = i64;

pub const UNKNOWN_PRODUCT: &str = "Unknown";
pub const UNKNOWN_AUTHOR: &str = "@unknown";
pub const OTHER_CATEGORY: &str = "Other";

/// Nullable columns come back as explicit `null`; read them like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_or<'de, D>(deserializer: D, fallback: &str) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(|| fallback.to_string()))
}

fn unknown_product() -> String {
    UNKNOWN_PRODUCT.to_string()
}

fn unknown_author() -> String {
    UNKNOWN_AUTHOR.to_string()
}

fn other_category() -> String {
    OTHER_CATEGORY.to_string()
}

fn product_name_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text_or(deserializer, UNKNOWN_PRODUCT)
}

fn author_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text_or(deserializer, UNKNOWN_AUTHOR)
}

fn category_or_other<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text_or(deserializer, OTHER_CATEGORY)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub traction: Option<f64>,
    #[serde(default)]
    pub growth: Option<f64>,
    #[serde(default)]
    pub traffic: Option<f64>,
    #[serde(default)]
    pub simplicity: Option<f64>,
}

impl ScoreBreakdown {
    pub fn sum(&self) -> f64 {
        self.traction.unwrap_or(0.0)
            + self.growth.unwrap_or(0.0)
            + self.traffic.unwrap_or(0.0)
            + self.simplicity.unwrap_or(0.0)
    }
}

/// The service sends `score` either as a bare total or as the component record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Total(f64),
    Breakdown(ScoreBreakdown),
}

/// Channel percentages as reported; they need not sum to 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSource {
    #[serde(default)]
    pub organic: Option<f64>,
    #[serde(default)]
    pub social: Option<f64>,
    #[serde(default)]
    pub direct: Option<f64>,
    #[serde(default)]
    pub referral: Option<f64>,
}

impl TrafficSource {
    pub fn channels(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("organic", self.organic),
            ("social", self.social),
            ("direct", self.direct),
            ("referral", self.referral),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub retweets: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub replies: u64,
    #[serde(default)]
    pub rate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: IdeaId,
    #[serde(default = "unknown_product", deserialize_with = "product_name_or_unknown")]
    pub product_name: String,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub product_domain: Option<String>,
    #[serde(default)]
    pub found_in_tweet: Option<String>,
    #[serde(default)]
    pub tweet_url: Option<String>,
    #[serde(default = "unknown_author", deserialize_with = "author_or_unknown")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author_followers: u64,
    #[serde(default)]
    pub reported_mrr: Option<f64>,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub score_breakdown: Option<ScoreBreakdown>,
    #[serde(default)]
    pub engagement: Option<Engagement>,
    #[serde(default)]
    pub traffic_source: Option<TrafficSource>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_screenshot: bool,
    #[serde(default)]
    pub replicability: Option<String>,
    #[serde(default)]
    pub replicability_note: Option<String>,
    #[serde(default = "other_category", deserialize_with = "category_or_other")]
    pub category: String,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub date_found: Option<String>,
    #[serde(default)]
    pub tweet_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_favorited: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_ideas: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub with_mrr: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub high_score_ideas: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorites: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub average_mrr: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub hashtags: Vec<String>,
    pub days: u32,
    pub max_results: u32,
}

impl ScanRequest {
    pub fn new(hashtags: Vec<String>, days: u32) -> Self {
        let hashtags = if hashtags.is_empty() {
            DEFAULT_HASHTAGS.iter().map(|tag| tag.to_string()).collect()
        } else {
            hashtags
        };
        Self {
            hashtags,
            days,
            max_results: DEFAULT_SCAN_RESULTS,
        }
    }
}

pub const DEFAULT_HASHTAGS: [&str; 3] = ["buildinpublic", "indiehackers", "saas"];
pub const DEFAULT_SCAN_DAYS: u32 = 7;
pub const DEFAULT_SCAN_RESULTS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub total_found: u64,
    pub new_saved: u64,
    #[serde(default)]
    pub status: Option<String>,
}
