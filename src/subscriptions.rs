use std::sync::Arc;

use tracing::{error, info};

use crate::db::Database;

pub const REPLY_ADDED: &str =
    "Subscrição efectuada com sucesso. Envie OUT para deixar de receber notícias.";
pub const REPLY_ALREADY_SUBSCRIBED: &str = "Este número já está subscrito.";
pub const REPLY_REMOVED: &str = "Subscrição cancelada. Envie IN para voltar a subscrever.";
pub const REPLY_NOT_SUBSCRIBED: &str = "Este número não está subscrito.";
pub const REPLY_INVALID_FORMAT: &str =
    "Formato inválido. Envie IN para subscrever ou OUT para cancelar.";
pub const REPLY_UNAVAILABLE: &str =
    "Serviço temporariamente indisponível. Tente novamente mais tarde.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Subscribe,
    Unsubscribe,
}

impl Command {
    /// `IN` or `OUT`, ignoring case and surrounding whitespace.
    pub fn parse(body: &str) -> Option<Self> {
        let keyword = body.trim();
        if keyword.eq_ignore_ascii_case("IN") {
            Some(Self::Subscribe)
        } else if keyword.eq_ignore_ascii_case("OUT") {
            Some(Self::Unsubscribe)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadySubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotSubscribed,
}

/// Phone numbers opted into article notifications.
///
/// The check-then-act of both operations is a single statement against the
/// `subscriptions` primary key, so concurrent requests for the same number
/// cannot both succeed.
pub struct SubscriptionRegistry {
    db: Arc<Database>,
}

impl SubscriptionRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn subscribe(&self, phone_number: &str) -> anyhow::Result<SubscribeOutcome> {
        if self.db.add_subscription(phone_number).await? {
            info!("Subscribed {}", phone_number);
            Ok(SubscribeOutcome::Added)
        } else {
            Ok(SubscribeOutcome::AlreadySubscribed)
        }
    }

    pub async fn unsubscribe(&self, phone_number: &str) -> anyhow::Result<UnsubscribeOutcome> {
        if self.db.remove_subscription(phone_number).await? {
            info!("Unsubscribed {}", phone_number);
            Ok(UnsubscribeOutcome::Removed)
        } else {
            Ok(UnsubscribeOutcome::NotSubscribed)
        }
    }

    pub async fn subscribers(&self) -> anyhow::Result<Vec<String>> {
        let subscribers = self.db.list_subscribers().await?;
        Ok(subscribers.into_iter().map(|s| s.phone_number).collect())
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        self.db.subscriber_count().await
    }

    /// Apply an inbound message and return the reply text for the sender.
    pub async fn handle_message(&self, from: Option<&str>, body: Option<&str>) -> String {
        let phone_number = match from.map(str::trim).filter(|f| !f.is_empty()) {
            Some(number) => number,
            None => return REPLY_INVALID_FORMAT.to_string(),
        };

        let reply = match body.and_then(Command::parse) {
            Some(Command::Subscribe) => self.subscribe(phone_number).await.map(|o| match o {
                SubscribeOutcome::Added => REPLY_ADDED,
                SubscribeOutcome::AlreadySubscribed => REPLY_ALREADY_SUBSCRIBED,
            }),
            Some(Command::Unsubscribe) => self.unsubscribe(phone_number).await.map(|o| match o {
                UnsubscribeOutcome::Removed => REPLY_REMOVED,
                UnsubscribeOutcome::NotSubscribed => REPLY_NOT_SUBSCRIBED,
            }),
            None => Ok(REPLY_INVALID_FORMAT),
        };

        match reply {
            Ok(text) => text.to_string(),
            Err(e) => {
                error!("Subscription command from {} failed: {:#}", phone_number, e);
                REPLY_UNAVAILABLE.to_string()
            }
        }
    }
}
