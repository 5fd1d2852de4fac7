use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

use crate::db::models::leaderboard::LeaderboardSnapshot;

pub type NotifyResult<T> = core::result::Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Receives a freshly recomputed leaderboard after each committed award.
/// Publishing is strictly best-effort: the award has already succeeded by the
/// time this runs.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, snapshot: &LeaderboardSnapshot) -> NotifyResult<()>;
}

/// POSTs each snapshot as JSON to a configured endpoint.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    #[instrument(skip(self, snapshot), fields(entries = snapshot.entries.len()))]
    async fn publish(&self, snapshot: &LeaderboardSnapshot) -> NotifyResult<()> {
        self.client
            .post(&self.url)
            .json(snapshot)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// Fallback sink when no webhook endpoint is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, snapshot: &LeaderboardSnapshot) -> NotifyResult<()> {
        tracing::info!(
            entries = snapshot.entries.len(),
            last_updated = %snapshot.last_updated,
            "leaderboard snapshot ready"
        );

        Ok(())
    }
}
