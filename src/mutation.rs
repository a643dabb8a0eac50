use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::IdeasApi;
use crate::models::{Idea, IdeaId, ScanRequest};
use crate::sync::QuerySynchronizer;

pub const SCAN_FAILED: &str = "Scan failed";

#[derive(Debug)]
pub enum ScanOutcome {
    /// A scan was already running; nothing was sent.
    Skipped,
    Finished {
        status: String,
        /// Clears the status line and refreshes the ideas list after the display delay.
        followup: JoinHandle<()>,
    },
}

/// Writes go through the API and are only reflected locally by re-fetching.
#[derive(Clone)]
pub struct MutationCoordinator {
    api: Arc<dyn IdeasApi>,
    ideas: QuerySynchronizer<Vec<Idea>>,
    status: Arc<Mutex<Option<String>>>,
    is_scanning: Arc<AtomicBool>,
    status_display: Duration,
}

struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MutationCoordinator {
    pub fn new(
        api: Arc<dyn IdeasApi>,
        ideas: QuerySynchronizer<Vec<Idea>>,
        status_display: Duration,
    ) -> Self {
        Self {
            api,
            ideas,
            status: Arc::new(Mutex::new(None)),
            is_scanning: Arc::new(AtomicBool::new(false)),
            status_display,
        }
    }

    pub fn status(&self) -> Option<String> {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning.load(Ordering::SeqCst)
    }

    /// Failures are logged and otherwise ignored; the list is re-fetched either way.
    pub async fn toggle_favorite(&self, id: IdeaId) {
        match self.api.toggle_favorite(id).await {
            Ok(()) => info!(id, "favorite toggled"),
            Err(e) => warn!(id, error = %e, "favorite toggle failed"),
        }
        revalidate_ideas(&self.ideas).await;
    }

    pub async fn trigger_scan(&self, hashtags: Vec<String>, days: u32) -> ScanOutcome {
        if self
            .is_scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("scan already running, ignoring request");
            return ScanOutcome::Skipped;
        }
        let guard = ScanGuard(&self.is_scanning);

        let request = ScanRequest::new(hashtags, days);
        info!(hashtags = ?request.hashtags, days = request.days, "scan requested");
        let status = match self.api.trigger_scan(&request).await {
            Ok(response) => {
                info!(
                    total_found = response.total_found,
                    new_saved = response.new_saved,
                    status = response.status.as_deref().unwrap_or("unknown"),
                    "scan finished"
                );
                format!(
                    "Found {} ideas, {} new!",
                    response.total_found, response.new_saved
                )
            }
            Err(e) => {
                warn!(error = %e, "scan failed");
                SCAN_FAILED.to_string()
            }
        };
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = Some(status.clone());
        drop(guard);

        let followup = self.spawn_followup(status.clone());
        ScanOutcome::Finished { status, followup }
    }

    fn spawn_followup(&self, status: String) -> JoinHandle<()> {
        let slot = Arc::clone(&self.status);
        let ideas = self.ideas.clone();
        let delay = self.status_display;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
                if current.as_deref() == Some(status.as_str()) {
                    *current = None;
                }
            }
            revalidate_ideas(&ideas).await;
        })
    }
}

async fn revalidate_ideas(ideas: &QuerySynchronizer<Vec<Idea>>) {
    for key in ideas.keys() {
        if let Err(e) = ideas.revalidate(key).await {
            debug!(%key, error = %e, "skipped revalidation");
        }
    }
}
