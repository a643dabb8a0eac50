use std::time::Duration;

use anyhow::Context;

pub const API_URL_ENV: &str = "SAAS_FINDER_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Built once in `main` and handed to every component that talks to the service.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub ideas_refresh: Duration,
    pub stats_refresh: Duration,
    pub status_display: Duration,
    pub request_timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            ideas_refresh: Duration::from_secs(30),
            stats_refresh: Duration::from_secs(60),
            status_display: Duration::from_secs(3),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl DashboardConfig {
    /// `--api-url` wins over the environment, which wins over the default.
    pub fn resolve(flag: Option<&str>) -> anyhow::Result<Self> {
        let env_value = std::env::var(API_URL_ENV).ok();
        Self::from_sources(flag, env_value.as_deref())
    }

    pub(crate) fn from_sources(
        flag: Option<&str>,
        env_value: Option<&str>,
    ) -> anyhow::Result<Self> {
        let raw = flag
            .or(env_value)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_API_URL);

        let parsed = reqwest::Url::parse(raw)
            .with_context(|| format!("invalid API base URL: {raw}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("API base URL must be http or https: {raw}");
        }

        Ok(Self {
            api_base_url: raw.trim_end_matches('/').to_string(),
            ..Self::default()
        })
    }
}
