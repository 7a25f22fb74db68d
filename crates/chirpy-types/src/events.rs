use serde::Deserialize;
use thiserror::Error;

/// Event name sent by the billing provider when a user buys Chirpy Red.
pub const USER_UPGRADED: &str = "user.upgraded";

/// Events posted to the billing webhook.
///
/// Known events are decoded into their own variant; anything else lands in
/// `Unhandled` so the endpoint can acknowledge it without acting on it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawWebhookEvent")]
pub enum WebhookEvent {
    /// A user's account should be upgraded to Chirpy Red
    UserUpgraded { user_id: u64 },

    /// Any event this server does not act on
    Unhandled { event: String },
}

impl WebhookEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::UserUpgraded { .. } => USER_UPGRADED,
            Self::Unhandled { event } => event,
        }
    }
}

/// Envelope exactly as it arrives on the wire: `{"event": ..., "data": {...}}`.
#[derive(Debug, Deserialize)]
pub struct RawWebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct UserEventData {
    user_id: u64,
}

#[derive(Debug, Error)]
#[error("malformed data for event {event}: {source}")]
pub struct WebhookEventError {
    pub event: String,
    #[source]
    pub source: serde_json::Error,
}

impl TryFrom<RawWebhookEvent> for WebhookEvent {
    type Error = WebhookEventError;

    fn try_from(raw: RawWebhookEvent) -> Result<Self, Self::Error> {
        match raw.event.as_str() {
            USER_UPGRADED => {
                let data: UserEventData =
                    serde_json::from_value(raw.data).map_err(|source| WebhookEventError {
                        event: raw.event.clone(),
                        source,
                    })?;
                Ok(Self::UserUpgraded {
                    user_id: data.user_id,
                })
            }
            _ => Ok(Self::Unhandled { event: raw.event }),
        }
    }
}
