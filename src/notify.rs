use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::ingest::ArticleDraft;
use crate::subscriptions::SubscriptionRegistry;

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct DispatchError(pub String);

/// Receives every newly persisted article once, after the run commits.
///
/// Errors are reported back to the ingester, which logs them and carries on.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, category: &str, article: &ArticleDraft) -> Result<(), DispatchError>;
}

/// Text sent to subscribers for one article.
pub fn compose_message(category: &str, article: &ArticleDraft) -> String {
    format!("[{}] {}\n{}", category, article.title, article.source_url)
}

/// Logs the message that would go out to the current subscribers.
// TODO: replace with an SMS gateway client once a provider is chosen.
pub struct LogDispatcher {
    registry: Arc<SubscriptionRegistry>,
}

impl LogDispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Dispatcher for LogDispatcher {
    async fn dispatch(&self, category: &str, article: &ArticleDraft) -> Result<(), DispatchError> {
        let audience = self
            .registry
            .subscribers()
            .await
            .map_err(|e| DispatchError(format!("could not load subscribers: {e:#}")))?;

        info!(
            "Notification for {} subscriber(s): {}",
            audience.len(),
            compose_message(category, article).replace('\n', " ")
        );
        Ok(())
    }
}

pub struct NoopDispatcher;

#[async_trait]
impl Dispatcher for NoopDispatcher {
    async fn dispatch(&self, _category: &str, _article: &ArticleDraft) -> Result<(), DispatchError> {
        Ok(())
    }
}
