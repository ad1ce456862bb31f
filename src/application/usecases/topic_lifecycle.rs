use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::entities::broadcasters::BroadcasterEntity;
use crate::domain::repositories::subscriptions::SubscriptionRepository;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushTopicGateway: Send + Sync {
    /// Subscribes to the broadcaster's live event upstream and returns the
    /// topic handle.
    async fn register_topic(&self, broadcaster_id: &str) -> Result<String>;

    /// Cancels the upstream topic. `Ok(false)` means the provider refused.
    async fn deregister_topic(&self, topic_handle: &str) -> Result<bool>;
}

/// Owns the mapping between tracked broadcasters and upstream push topics:
/// one registration per broadcaster, deregistration when the last
/// subscription disappears, and a full re-registration pass at startup.
pub struct TopicLifecycle<P, R>
where
    P: PushTopicGateway + Send + Sync + 'static,
    R: SubscriptionRepository + Send + Sync + 'static,
{
    push_gateway: Arc<P>,
    subscription_repository: Arc<R>,
}

impl<P, R> TopicLifecycle<P, R>
where
    P: PushTopicGateway + Send + Sync + 'static,
    R: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(push_gateway: Arc<P>, subscription_repository: Arc<R>) -> Self {
        Self {
            push_gateway,
            subscription_repository,
        }
    }

    /// Registration failure propagates: a broadcaster must never be recorded
    /// as tracked without a live topic.
    pub async fn register(&self, broadcaster_id: &str) -> Result<String> {
        let topic_handle = self
            .push_gateway
            .register_topic(broadcaster_id)
            .await
            .map_err(|err| {
                error!(
                    broadcaster_id,
                    error = ?err,
                    "topic_lifecycle: topic registration failed"
                );
                err
            })?;

        info!(
            broadcaster_id,
            topic_handle = %topic_handle,
            "topic_lifecycle: topic registered"
        );
        Ok(topic_handle)
    }

    /// Deregistration failure never blocks local pruning. Upstream is
    /// eventually consistent with the store; a leaked topic is observable in
    /// the logs.
    pub async fn deregister(&self, broadcaster: &BroadcasterEntity) {
        let Some(topic_handle) = broadcaster.topic_handle.as_deref() else {
            warn!(
                broadcaster_id = %broadcaster.broadcaster_id,
                "topic_lifecycle: no topic handle recorded, nothing to deregister"
            );
            return;
        };

        match self.push_gateway.deregister_topic(topic_handle).await {
            Ok(true) => info!(
                broadcaster_id = %broadcaster.broadcaster_id,
                topic_handle,
                "topic_lifecycle: topic deregistered"
            ),
            Ok(false) => warn!(
                broadcaster_id = %broadcaster.broadcaster_id,
                topic_handle,
                "topic_lifecycle: provider refused topic deregistration"
            ),
            Err(err) => error!(
                broadcaster_id = %broadcaster.broadcaster_id,
                topic_handle,
                error = ?err,
                "topic_lifecycle: topic deregistration failed, topic left upstream"
            ),
        }
    }

    /// Re-registers every tracked broadcaster's topic. Upstream subscriptions
    /// do not survive a restart or a callback-URL change, so the stored
    /// handles are stale after boot. All refreshed handles are committed in
    /// one transaction at the end of the pass.
    pub async fn resync_all(&self) -> Result<()> {
        let tracked = self.subscription_repository.list_tracked_broadcasters().await?;
        if tracked.is_empty() {
            info!("topic_lifecycle: no tracked broadcasters to resync");
            return Ok(());
        }

        let mut handles = Vec::with_capacity(tracked.len());
        for broadcaster in &tracked {
            let topic_handle = self
                .push_gateway
                .register_topic(&broadcaster.broadcaster_id)
                .await?;
            handles.push((broadcaster.broadcaster_id.clone(), topic_handle));
        }

        self.subscription_repository
            .update_topic_handles(handles)
            .await?;

        info!(
            count = tracked.len(),
            "topic_lifecycle: resynced stream-online topics"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::repositories::subscriptions::MockSubscriptionRepository;

    fn sample_broadcaster(id: &str, topic_handle: Option<&str>) -> BroadcasterEntity {
        BroadcasterEntity {
            broadcaster_id: id.to_string(),
            display_name: format!("name-{id}"),
            topic_handle: topic_handle.map(|h| h.to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn resync_refreshes_every_handle_in_one_commit() {
        let mut push_gateway = MockPushTopicGateway::new();
        let mut repository = MockSubscriptionRepository::new();

        repository
            .expect_list_tracked_broadcasters()
            .times(1)
            .returning(|| {
                Box::pin(async {
                    Ok(vec![
                        sample_broadcaster("111", Some("stale-a")),
                        sample_broadcaster("222", None),
                    ])
                })
            });
        push_gateway
            .expect_register_topic()
            .times(2)
            .returning(|id| Ok(format!("fresh-{id}")));
        repository
            .expect_update_topic_handles()
            .withf(|handles| {
                *handles
                    == [
                        ("111".to_string(), "fresh-111".to_string()),
                        ("222".to_string(), "fresh-222".to_string()),
                    ]
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let lifecycle = TopicLifecycle::new(Arc::new(push_gateway), Arc::new(repository));
        lifecycle.resync_all().await.unwrap();
    }

    #[tokio::test]
    async fn resync_with_nothing_tracked_touches_nothing_upstream() {
        let push_gateway = MockPushTopicGateway::new();
        let mut repository = MockSubscriptionRepository::new();

        repository
            .expect_list_tracked_broadcasters()
            .times(1)
            .returning(|| Box::pin(async { Ok(Vec::new()) }));

        let lifecycle = TopicLifecycle::new(Arc::new(push_gateway), Arc::new(repository));
        lifecycle.resync_all().await.unwrap();
    }

    #[tokio::test]
    async fn deregister_without_a_recorded_handle_skips_the_provider() {
        let push_gateway = MockPushTopicGateway::new();
        let repository = MockSubscriptionRepository::new();

        let lifecycle = TopicLifecycle::new(Arc::new(push_gateway), Arc::new(repository));
        lifecycle
            .deregister(&sample_broadcaster("111", None))
            .await;
    }

    #[tokio::test]
    async fn deregister_swallows_provider_failure() {
        let mut push_gateway = MockPushTopicGateway::new();
        let repository = MockSubscriptionRepository::new();

        push_gateway
            .expect_deregister_topic()
            .withf(|handle| handle == "topic-1")
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("provider exploded")));

        let lifecycle = TopicLifecycle::new(Arc::new(push_gateway), Arc::new(repository));
        lifecycle
            .deregister(&sample_broadcaster("111", Some("topic-1")))
            .await;
    }
}
