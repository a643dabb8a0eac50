use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ApiError, IdeasApi};
use crate::filter::{ActiveFilter, STRONG_MIN_SCORE};
use crate::models::{Idea, IdeaId, ScanRequest, ScanResponse, Score, Stats};
use crate::scoring::compute_total;

/// In-memory service double that filters like the real backend and counts calls.
pub struct FakeApi {
    pub ideas: Mutex<Vec<Idea>>,
    pub list_calls: AtomicU64,
    pub stats_calls: AtomicU64,
    pub favorite_calls: Mutex<Vec<IdeaId>>,
    pub scan_calls: AtomicU64,
    pub latency: Duration,
    pub fail_list: Mutex<bool>,
    pub fail_stats: bool,
    pub fail_favorite: bool,
    pub fail_scan: bool,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            ideas: Mutex::new(Vec::new()),
            list_calls: AtomicU64::new(0),
            stats_calls: AtomicU64::new(0),
            favorite_calls: Mutex::new(Vec::new()),
            scan_calls: AtomicU64::new(0),
            latency: Duration::from_millis(50),
            fail_list: Mutex::new(false),
            fail_stats: false,
            fail_favorite: false,
            fail_scan: false,
        }
    }
}

impl FakeApi {
    pub fn with_ideas(ideas: Vec<Idea>) -> Self {
        Self {
            ideas: Mutex::new(ideas),
            ..Default::default()
        }
    }

    pub fn set_fail_list(&self, fail: bool) {
        *self.fail_list.lock().unwrap() = fail;
    }

    pub fn list_count(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn stats_count(&self) -> u64 {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn scan_count(&self) -> u64 {
        self.scan_calls.load(Ordering::SeqCst)
    }

    fn failure(path: &str) -> ApiError {
        ApiError::Status {
            path: path.to_string(),
            status: 500,
        }
    }
}

pub fn idea(id: IdeaId, name: &str, total: f64) -> Idea {
    let mut idea: Idea = serde_json::from_value(serde_json::json!({ "id": id }))
        .expect("minimal idea payload");
    idea.product_name = name.to_string();
    idea.author = format!("@{}", name.to_lowercase());
    idea.category = "SaaS".to_string();
    idea.score = Some(Score::Total(total));
    idea
}

#[async_trait]
impl IdeasApi for FakeApi {
    async fn list_ideas(&self, filter: ActiveFilter) -> Result<Vec<Idea>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if *self.fail_list.lock().unwrap() {
            return Err(Self::failure("/api/ideas"));
        }
        let ideas = self.ideas.lock().unwrap().clone();
        Ok(ideas
            .into_iter()
            .filter(|idea| match filter {
                ActiveFilter::All => true,
                ActiveFilter::Strong => compute_total(idea) >= f64::from(STRONG_MIN_SCORE),
                ActiveFilter::Favorites => idea.is_favorited,
            })
            .collect())
    }

    async fn stats(&self) -> Result<Stats, ApiError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if self.fail_stats {
            return Err(Self::failure("/api/stats"));
        }
        let ideas = self.ideas.lock().unwrap();
        Ok(Stats {
            total_ideas: ideas.len() as u64,
            favorites: ideas.iter().filter(|idea| idea.is_favorited).count() as u64,
            ..Default::default()
        })
    }

    async fn toggle_favorite(&self, id: IdeaId) -> Result<(), ApiError> {
        self.favorite_calls.lock().unwrap().push(id);
        tokio::time::sleep(self.latency).await;
        if self.fail_favorite {
            return Err(Self::failure(&format!("/api/ideas/{id}/favorite")));
        }
        if let Some(idea) = self.ideas.lock().unwrap().iter_mut().find(|idea| idea.id == id) {
            idea.is_favorited = !idea.is_favorited;
        }
        Ok(())
    }

    async fn trigger_scan(&self, _request: &ScanRequest) -> Result<ScanResponse, ApiError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        if self.fail_scan {
            return Err(Self::failure("/api/scan"));
        }
        Ok(ScanResponse {
            total_found: 12,
            new_saved: 4,
            status: Some("success".to_string()),
        })
    }

    async fn get_idea(&self, id: IdeaId) -> Result<Idea, ApiError> {
        self.ideas
            .lock()
            .unwrap()
            .iter()
            .find(|idea| idea.id == id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                path: format!("/api/ideas/{id}"),
                status: 404,
            })
    }

    async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let mut categories: Vec<String> = self
            .ideas
            .lock()
            .unwrap()
            .iter()
            .map(|idea| idea.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn add_note(&self, _id: IdeaId, _note: &str) -> Result<(), ApiError> {
        Ok(())
    }
}
