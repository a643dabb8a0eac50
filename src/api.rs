use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::DashboardConfig;
use crate::filter::ActiveFilter;
use crate::models::{Idea, IdeaId, ScanRequest, ScanResponse, Stats};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },
    #[error("could not decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

/// REST boundary of the scoring service.
#[async_trait]
pub trait IdeasApi: Send + Sync {
    async fn list_ideas(&self, filter: ActiveFilter) -> Result<Vec<Idea>, ApiError>;
    async fn stats(&self) -> Result<Stats, ApiError>;
    async fn toggle_favorite(&self, id: IdeaId) -> Result<(), ApiError>;
    async fn trigger_scan(&self, request: &ScanRequest) -> Result<ScanResponse, ApiError>;
    async fn get_idea(&self, id: IdeaId) -> Result<Idea, ApiError>;
    async fn categories(&self) -> Result<Vec<String>, ApiError>;
    async fn add_note(&self, id: IdeaId, note: &str) -> Result<(), ApiError>;
}

pub struct HttpApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(config: &DashboardConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: config.api_base_url.clone(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await.map_err(|source| ApiError::Transport {
            path: path.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(|e| ApiError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl IdeasApi for HttpApi {
    #[instrument(name = "api_list_ideas", skip(self))]
    async fn list_ideas(&self, filter: ActiveFilter) -> Result<Vec<Idea>, ApiError> {
        let path = "/api/ideas";
        let request = self.client.get(self.url(path)).query(&filter.query_params());
        let response = self.send(path, request).await?;
        let ideas: Vec<Idea> = Self::decode(path, response).await?;
        debug!(count = ideas.len(), "ideas fetched");
        Ok(ideas)
    }

    #[instrument(name = "api_stats", skip(self))]
    async fn stats(&self) -> Result<Stats, ApiError> {
        let path = "/api/stats";
        let response = self.send(path, self.client.get(self.url(path))).await?;
        Self::decode(path, response).await
    }

    #[instrument(name = "api_toggle_favorite", skip(self))]
    async fn toggle_favorite(&self, id: IdeaId) -> Result<(), ApiError> {
        let path = format!("/api/ideas/{id}/favorite");
        self.send(&path, self.client.post(self.url(&path))).await?;
        Ok(())
    }

    #[instrument(name = "api_trigger_scan", skip(self))]
    async fn trigger_scan(&self, request: &ScanRequest) -> Result<ScanResponse, ApiError> {
        let path = "/api/scan";
        let response = self
            .send(path, self.client.post(self.url(path)).json(request))
            .await?;
        Self::decode(path, response).await
    }

    #[instrument(name = "api_get_idea", skip(self))]
    async fn get_idea(&self, id: IdeaId) -> Result<Idea, ApiError> {
        let path = format!("/api/ideas/{id}");
        let response = self.send(&path, self.client.get(self.url(&path))).await?;
        Self::decode(&path, response).await
    }

    #[instrument(name = "api_categories", skip(self))]
    async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let path = "/api/categories";
        let response = self.send(path, self.client.get(self.url(path))).await?;
        Self::decode(path, response).await
    }

    #[instrument(name = "api_add_note", skip(self, note))]
    async fn add_note(&self, id: IdeaId, note: &str) -> Result<(), ApiError> {
        let path = format!("/api/ideas/{id}/note");
        let body = serde_json::json!({ "note": note });
        self.send(&path, self.client.post(self.url(&path)).json(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::http::{Method, StatusCode, Uri};
    use axum::response::IntoResponse;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        uri: String,
        body: String,
    }

    type Log = Arc<Mutex<Vec<Seen>>>;

    /// Local service answering every request with `reply`, recording what arrived.
    async fn serve(status: StatusCode, reply: Value) -> (HttpApi, Log) {
        let seen: Log = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let app = Router::new().fallback(move |method: Method, uri: Uri, body: String| {
            let log = Arc::clone(&log);
            let reply = reply.clone();
            async move {
                log.lock().unwrap().push(Seen {
                    method,
                    uri: uri.to_string(),
                    body,
                });
                (status, Json(reply)).into_response()
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });

        let config = DashboardConfig::from_sources(Some(&format!("http://{addr}/")), None)
            .expect("config");
        let api = HttpApi {
            base_url: config.api_base_url.clone(),
            client: reqwest::Client::builder()
                .no_proxy()
                .timeout(config.request_timeout)
                .build()
                .expect("client"),
        };
        (api, seen)
    }

    fn requests(log: &Log) -> Vec<(Method, String)> {
        log.lock()
            .unwrap()
            .iter()
            .map(|seen| (seen.method.clone(), seen.uri.clone()))
            .collect()
    }

    #[tokio::test]
    async fn list_sends_filter_as_query() {
        let (api, log) = serve(
            StatusCode::OK,
            json!([{"id": 1, "product_name": "InvoiceBot", "score": 82}]),
        )
        .await;

        let ideas = api.list_ideas(ActiveFilter::All).await.unwrap();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].product_name, "InvoiceBot");
        api.list_ideas(ActiveFilter::Strong).await.unwrap();
        api.list_ideas(ActiveFilter::Favorites).await.unwrap();

        assert_eq!(
            requests(&log),
            vec![
                (Method::GET, "/api/ideas".to_string()),
                (Method::GET, "/api/ideas?min_score=70".to_string()),
                (Method::GET, "/api/ideas?favorites=true".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn stats_reads_the_aggregate() {
        let (api, log) = serve(
            StatusCode::OK,
            json!({"total_ideas": 12, "favorites": 2, "average_score": 48.5}),
        )
        .await;

        let stats = api.stats().await.unwrap();
        assert_eq!(stats.total_ideas, 12);
        assert_eq!(stats.favorites, 2);
        assert_eq!(requests(&log), vec![(Method::GET, "/api/stats".to_string())]);
    }

    #[tokio::test]
    async fn favorite_posts_to_the_idea() {
        let (api, log) = serve(StatusCode::OK, json!({"success": true})).await;

        api.toggle_favorite(7).await.unwrap();
        assert_eq!(
            requests(&log),
            vec![(Method::POST, "/api/ideas/7/favorite".to_string())]
        );
    }

    #[tokio::test]
    async fn scan_posts_hashtags_and_days() {
        let (api, log) = serve(
            StatusCode::OK,
            json!({"total_found": 12, "new_saved": 4, "status": "success"}),
        )
        .await;

        let response = api
            .trigger_scan(&ScanRequest::new(vec!["saas".to_string()], 3))
            .await
            .unwrap();
        assert_eq!((response.total_found, response.new_saved), (12, 4));

        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, Method::POST);
        assert_eq!(seen.uri, "/api/scan");
        let body: Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(
            body,
            json!({"hashtags": ["saas"], "days": 3, "max_results": 100})
        );
    }

    #[tokio::test]
    async fn get_idea_reads_one_record() {
        let (api, log) = serve(
            StatusCode::OK,
            json!({"id": 3, "product_name": "TweetHunter", "category": null}),
        )
        .await;

        let idea = api.get_idea(3).await.unwrap();
        assert_eq!(idea.id, 3);
        assert_eq!(idea.category, "Other");
        assert_eq!(requests(&log), vec![(Method::GET, "/api/ideas/3".to_string())]);
    }

    #[tokio::test]
    async fn categories_are_listed() {
        let (api, log) = serve(StatusCode::OK, json!(["Developer Tools", "Finance"])).await;

        let categories = api.categories().await.unwrap();
        assert_eq!(categories, vec!["Developer Tools", "Finance"]);
        assert_eq!(
            requests(&log),
            vec![(Method::GET, "/api/categories".to_string())]
        );
    }

    #[tokio::test]
    async fn note_is_posted_as_json() {
        let (api, log) = serve(StatusCode::OK, json!({"success": true})).await;

        api.add_note(3, "ask about churn").await.unwrap();
        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, Method::POST);
        assert_eq!(seen.uri, "/api/ideas/3/note");
        let body: Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(body, json!({"note": "ask about churn"}));
    }

    #[tokio::test]
    async fn non_success_maps_to_status_error() {
        let (api, _log) = serve(StatusCode::INTERNAL_SERVER_ERROR, json!({"detail": "boom"})).await;

        match api.toggle_favorite(7).await {
            Err(ApiError::Status { path, status }) => {
                assert_eq!(path, "/api/ideas/7/favorite");
                assert_eq!(status, 500);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            api.list_ideas(ActiveFilter::All).await,
            Err(ApiError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn unexpected_body_is_a_decode_error() {
        let (api, _log) = serve(StatusCode::OK, json!({"ideas": []})).await;

        assert!(matches!(
            api.list_ideas(ActiveFilter::All).await,
            Err(ApiError::Decode { .. })
        ));
    }
}
