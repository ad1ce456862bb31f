use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::entities::broadcasters::BroadcasterEntity;
use crate::domain::value_objects::enums::delivery_modes::DeliveryMode;

/// The provider's "broadcaster went live" payload, reduced to the fields the
/// fan-out needs.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamOnlineEvent {
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    pub broadcaster_name: String,
    pub started_at: DateTime<Utc>,
}

/// One community interested in a broadcaster, with every subscribed user in
/// that community. Produced by `SubscriptionRepository::list_interested`.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestedCommunity {
    pub community_id: String,
    pub notification_channel_id: String,
    pub delivery_mode: DeliveryMode,
    pub sanitized_alerts: bool,
    pub owner_user_id: String,
    pub user_ids: Vec<String>,
}

/// How a single community gets notified for one live event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryAction {
    Skip,
    PostPlain,
    PostBroadcast,
    PostMentions(Vec<String>),
}

/// Result of an unnotify batch: which broadcasters had a subscription row
/// removed, which had none, and which were left orphaned (no subscriptions
/// anywhere) and deleted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovalOutcome {
    pub removed: Vec<String>,
    pub missing: Vec<String>,
    pub orphaned: Vec<BroadcasterEntity>,
}
