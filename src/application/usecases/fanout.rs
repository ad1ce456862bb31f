use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::application::usecases::identifier_resolver::IdentityGateway;
use crate::application::usecases::notification_policy::decide;
use crate::domain::repositories::subscriptions::SubscriptionRepository;
use crate::domain::value_objects::alerts::{
    AlertContent, AlertImagery, AlertVariant, render_alert,
};
use crate::domain::value_objects::notifications::{
    DeliveryAction, InterestedCommunity, StreamOnlineEvent,
};

pub const BROADCAST_PERMISSION_NOTICE: &str =
    "The bot doesn't have permission to mention everyone. Mentioning here instead.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Delivered,
    /// The channel no longer resolves (deleted or inaccessible). Expected,
    /// not an error.
    ChannelUnavailable,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_alert(&self, channel_id: &str, alert: &AlertContent) -> Result<SendStatus>;
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<SendStatus>;
    async fn has_broadcast_permission(&self, community_id: &str) -> Result<bool>;
}

/// Drives one "broadcaster went live" event to every interested community.
pub struct StreamOnlineFanout<R, S, G>
where
    R: SubscriptionRepository + Send + Sync + 'static,
    S: MessageSink + Send + Sync + 'static,
    G: IdentityGateway + Send + Sync + 'static,
{
    subscription_repository: Arc<R>,
    sink: Arc<S>,
    identities: Arc<G>,
}

impl<R, S, G> StreamOnlineFanout<R, S, G>
where
    R: SubscriptionRepository + Send + Sync + 'static,
    S: MessageSink + Send + Sync + 'static,
    G: IdentityGateway + Send + Sync + 'static,
{
    pub fn new(subscription_repository: Arc<R>, sink: Arc<S>, identities: Arc<G>) -> Self {
        Self {
            subscription_repository,
            sink,
            identities,
        }
    }

    /// Provider callback entry point. Schedules the fan-out onto the runtime
    /// and returns immediately so the provider's delivery is never blocked on
    /// sink I/O.
    pub fn on_stream_online(self: Arc<Self>, event: StreamOnlineEvent) {
        tokio::spawn(async move {
            if let Err(err) = self.fan_out(event).await {
                error!(error = ?err, "fanout: stream-online fan-out failed");
            }
        });
    }

    pub async fn fan_out(&self, event: StreamOnlineEvent) -> Result<()> {
        let variant = AlertVariant::choose(&mut rand::thread_rng());
        self.fan_out_with_variant(event, variant).await
    }

    /// The non-neutral variant is chosen once per event so every
    /// non-sanitized community sees the same content.
    async fn fan_out_with_variant(
        &self,
        event: StreamOnlineEvent,
        variant: AlertVariant,
    ) -> Result<()> {
        let interested = self
            .subscription_repository
            .list_interested(&event.broadcaster_id)
            .await?;
        if interested.is_empty() {
            debug!(
                broadcaster_id = %event.broadcaster_id,
                "fanout: nobody is subscribed, dropping event"
            );
            return Ok(());
        }

        info!(
            broadcaster_id = %event.broadcaster_id,
            communities = interested.len(),
            variant = ?variant,
            "fanout: dispatching stream-online alert"
        );

        // Profile imagery backs the neutral variant only. One upstream
        // lookup per event, and only when some community needs it.
        let imagery = if interested.iter().any(|community| community.sanitized_alerts) {
            match self.identities.profile(&event.broadcaster_id).await {
                Ok(profile) => Some(AlertImagery {
                    thumbnail_url: profile.profile_image_url,
                    image_url: profile.offline_image_url,
                }),
                Err(err) => {
                    warn!(
                        broadcaster_id = %event.broadcaster_id,
                        error = ?err,
                        "fanout: profile lookup failed, sending neutral alert without imagery"
                    );
                    None
                }
            }
        } else {
            None
        };

        let flavored_alert = render_alert(variant, &event, None);
        let neutral_alert = render_alert(AlertVariant::Neutral, &event, imagery.as_ref());

        for community in &interested {
            let owner_subscribed = community
                .user_ids
                .iter()
                .any(|user_id| user_id == &community.owner_user_id);
            let action = decide(community.delivery_mode, owner_subscribed, &community.user_ids);
            let alert = if community.sanitized_alerts {
                &neutral_alert
            } else {
                &flavored_alert
            };

            if let Err(err) = self.deliver(community, alert, action).await {
                error!(
                    community_id = %community.community_id,
                    error = ?err,
                    "fanout: delivery failed for community"
                );
            }
        }

        Ok(())
    }

    async fn deliver(
        &self,
        community: &InterestedCommunity,
        alert: &AlertContent,
        action: DeliveryAction,
    ) -> Result<()> {
        if action == DeliveryAction::Skip {
            debug!(
                community_id = %community.community_id,
                "fanout: owner not subscribed, skipping community"
            );
            return Ok(());
        }

        let channel_id = &community.notification_channel_id;
        match self.sink.send_alert(channel_id, alert).await? {
            SendStatus::Delivered => {}
            SendStatus::ChannelUnavailable => {
                debug!(
                    community_id = %community.community_id,
                    channel_id = %channel_id,
                    "fanout: notification channel unavailable, skipping"
                );
                return Ok(());
            }
        }

        match action {
            DeliveryAction::Skip | DeliveryAction::PostPlain => {}
            DeliveryAction::PostBroadcast => {
                let can_broadcast = self
                    .sink
                    .has_broadcast_permission(&community.community_id)
                    .await
                    .unwrap_or_else(|err| {
                        warn!(
                            community_id = %community.community_id,
                            error = ?err,
                            "fanout: broadcast permission probe failed, assuming none"
                        );
                        false
                    });
                if can_broadcast {
                    self.sink.send_text(channel_id, "@everyone").await?;
                } else {
                    self.sink
                        .send_text(channel_id, BROADCAST_PERMISSION_NOTICE)
                        .await?;
                    self.sink.send_text(channel_id, "@here").await?;
                }
            }
            DeliveryAction::PostMentions(user_ids) => {
                let mentions = user_ids
                    .iter()
                    .map(|user_id| format!("<@{user_id}>"))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.sink.send_text(channel_id, &mentions).await?;
            }
        }

        Ok(())
    }
}
