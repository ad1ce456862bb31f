use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::application::usecases::subscriptions::{CommandError, CommandResult};
use crate::application::usecases::topic_lifecycle::{PushTopicGateway, TopicLifecycle};
use crate::domain::entities::communities::{EditCommunityEntity, InsertCommunityEntity};
use crate::domain::repositories::communities::CommunityRepository;
use crate::domain::repositories::subscriptions::SubscriptionRepository;
use crate::domain::value_objects::enums::delivery_modes::DeliveryMode;

/// Owner-requested reconfiguration, absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunityConfigChange {
    pub notification_channel_id: Option<String>,
    pub delivery_mode: Option<DeliveryMode>,
    pub sanitized_alerts: Option<bool>,
}

pub struct CommunityUseCase<C, R, P>
where
    C: CommunityRepository + Send + Sync + 'static,
    R: SubscriptionRepository + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    community_repository: Arc<C>,
    subscription_repository: Arc<R>,
    topic_lifecycle: Arc<TopicLifecycle<P, R>>,
}

impl<C, R, P> CommunityUseCase<C, R, P>
where
    C: CommunityRepository + Send + Sync + 'static,
    R: SubscriptionRepository + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    pub fn new(
        community_repository: Arc<C>,
        subscription_repository: Arc<R>,
        topic_lifecycle: Arc<TopicLifecycle<P, R>>,
    ) -> Self {
        Self {
            community_repository,
            subscription_repository,
            topic_lifecycle,
        }
    }

    /// Onboarding: the community starts in opt-in mode with unsanitized
    /// alerts, posting to the fallback channel until the owner reconfigures.
    pub async fn on_community_joined(
        &self,
        community_id: &str,
        owner_user_id: &str,
        fallback_channel_id: &str,
    ) -> Result<()> {
        self.community_repository
            .insert(InsertCommunityEntity {
                community_id: community_id.to_string(),
                owner_user_id: owner_user_id.to_string(),
                notification_channel_id: fallback_channel_id.to_string(),
                delivery_mode: DeliveryMode::default().as_str().to_string(),
                sanitized_alerts: false,
                created_at: Utc::now(),
            })
            .await?;

        info!(community_id, owner_user_id, "communities: community onboarded");
        Ok(())
    }

    /// Offboarding: the community row goes away (subscriptions cascade), and
    /// any broadcaster nobody references anymore is pruned with its topic.
    pub async fn on_community_left(&self, community_id: &str) -> Result<()> {
        let orphaned = self
            .subscription_repository
            .prune_community(community_id)
            .await?;

        for broadcaster in &orphaned {
            self.topic_lifecycle.deregister(broadcaster).await;
        }

        info!(
            community_id,
            pruned = orphaned.len(),
            "communities: community removed"
        );
        Ok(())
    }

    pub async fn change_config(
        &self,
        caller_user_id: &str,
        community_id: &str,
        change: CommunityConfigChange,
    ) -> CommandResult<()> {
        let community = self
            .community_repository
            .find(community_id)
            .await?
            .ok_or(CommandError::UnknownCommunity)?;

        if community.owner_user_id != caller_user_id {
            warn!(
                caller_user_id,
                community_id,
                "communities: non-owner attempted reconfiguration"
            );
            return Err(CommandError::PermissionDenied);
        }

        self.community_repository
            .update_config(
                community_id,
                EditCommunityEntity {
                    notification_channel_id: change.notification_channel_id,
                    delivery_mode: change
                        .delivery_mode
                        .map(|mode| mode.as_str().to_string()),
                    sanitized_alerts: change.sanitized_alerts,
                },
            )
            .await?;

        info!(community_id, "communities: configuration updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    use crate::application::usecases::topic_lifecycle::MockPushTopicGateway;
    use crate::domain::entities::broadcasters::BroadcasterEntity;
    use crate::domain::entities::communities::CommunityEntity;
    use crate::domain::repositories::communities::MockCommunityRepository;
    use crate::domain::repositories::subscriptions::MockSubscriptionRepository;

    fn sample_community(owner: &str) -> CommunityEntity {
        CommunityEntity {
            community_id: "c1".to_string(),
            owner_user_id: owner.to_string(),
            notification_channel_id: "chan-1".to_string(),
            delivery_mode: "optin".to_string(),
            sanitized_alerts: false,
            created_at: Utc::now(),
        }
    }

    fn sample_broadcaster(id: &str, topic_handle: Option<&str>) -> BroadcasterEntity {
        BroadcasterEntity {
            broadcaster_id: id.to_string(),
            display_name: format!("name-{id}"),
            topic_handle: topic_handle.map(|h| h.to_string()),
            created_at: Utc::now(),
        }
    }

    fn build_usecase(
        communities: MockCommunityRepository,
        repository: MockSubscriptionRepository,
        push_gateway: MockPushTopicGateway,
    ) -> CommunityUseCase<
        MockCommunityRepository,
        MockSubscriptionRepository,
        MockPushTopicGateway,
    > {
        let lifecycle = TopicLifecycle::new(
            Arc::new(push_gateway),
            Arc::new(MockSubscriptionRepository::new()),
        );
        CommunityUseCase::new(Arc::new(communities), Arc::new(repository), Arc::new(lifecycle))
    }

    #[tokio::test]
    async fn onboarding_starts_in_opt_in_mode_with_unsanitized_alerts() {
        let mut communities = MockCommunityRepository::new();
        let repository = MockSubscriptionRepository::new();
        let push_gateway = MockPushTopicGateway::new();

        communities
            .expect_insert()
            .withf(|community| {
                community.community_id == "c1"
                    && community.owner_user_id == "owner-1"
                    && community.notification_channel_id == "chan-1"
                    && community.delivery_mode == "optin"
                    && !community.sanitized_alerts
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = build_usecase(communities, repository, push_gateway);
        usecase
            .on_community_joined("c1", "owner-1", "chan-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn offboarding_prunes_and_deregisters_orphaned_broadcasters() {
        let communities = MockCommunityRepository::new();
        let mut repository = MockSubscriptionRepository::new();
        let mut push_gateway = MockPushTopicGateway::new();

        repository
            .expect_prune_community()
            .withf(|community| community == "c1")
            .times(1)
            .returning(|_| {
                Box::pin(async {
                    Ok(vec![
                        sample_broadcaster("111", Some("topic-a")),
                        sample_broadcaster("222", Some("topic-b")),
                    ])
                })
            });
        push_gateway
            .expect_deregister_topic()
            .with(eq("topic-a"))
            .times(1)
            .returning(|_| Ok(true));
        push_gateway
            .expect_deregister_topic()
            .with(eq("topic-b"))
            .times(1)
            .returning(|_| Ok(true));

        let usecase = build_usecase(communities, repository, push_gateway);
        usecase.on_community_left("c1").await.unwrap();
    }

    #[tokio::test]
    async fn config_change_is_owner_only() {
        let mut communities = MockCommunityRepository::new();
        let repository = MockSubscriptionRepository::new();
        let push_gateway = MockPushTopicGateway::new();

        communities
            .expect_find()
            .returning(|_| Box::pin(async { Ok(Some(sample_community("owner-1"))) }));

        let usecase = build_usecase(communities, repository, push_gateway);
        let result = usecase
            .change_config("intruder", "c1", CommunityConfigChange::default())
            .await;

        assert!(matches!(result, Err(CommandError::PermissionDenied)));
    }

    #[tokio::test]
    async fn config_change_maps_the_delivery_mode_to_its_stored_form() {
        let mut communities = MockCommunityRepository::new();
        let repository = MockSubscriptionRepository::new();
        let push_gateway = MockPushTopicGateway::new();

        communities
            .expect_find()
            .returning(|_| Box::pin(async { Ok(Some(sample_community("owner-1"))) }));
        communities
            .expect_update_config()
            .withf(|community, edit| {
                community == "c1"
                    && edit.delivery_mode.as_deref() == Some("passive")
                    && edit.sanitized_alerts == Some(true)
                    && edit.notification_channel_id.is_none()
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let usecase = build_usecase(communities, repository, push_gateway);
        usecase
            .change_config(
                "owner-1",
                "c1",
                CommunityConfigChange {
                    notification_channel_id: None,
                    delivery_mode: Some(DeliveryMode::Passive),
                    sanitized_alerts: Some(true),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn config_change_for_unknown_community_is_rejected() {
        let mut communities = MockCommunityRepository::new();
        let repository = MockSubscriptionRepository::new();
        let push_gateway = MockPushTopicGateway::new();

        communities
            .expect_find()
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = build_usecase(communities, repository, push_gateway);
        let result = usecase
            .change_config("owner-1", "c1", CommunityConfigChange::default())
            .await;

        assert!(matches!(result, Err(CommandError::UnknownCommunity)));
    }
}
