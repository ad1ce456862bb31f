use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::usecases::identifier_resolver::{
    IdentifierResolver, IdentityGateway, ResolvedBroadcaster,
};
use crate::application::usecases::topic_lifecycle::{PushTopicGateway, TopicLifecycle};
use crate::domain::entities::broadcasters::InsertBroadcasterEntity;
use crate::domain::entities::communities::CommunityEntity;
use crate::domain::entities::subscriptions::InsertSubscriptionEntity;
use crate::domain::repositories::communities::CommunityRepository;
use crate::domain::repositories::subscriptions::{
    InsertSubscriptionError, SubscriptionRepository,
};
use crate::domain::value_objects::enums::delivery_modes::DeliveryMode;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("you do not have permission to manage notifications in this community")]
    PermissionDenied,
    #[error("this community has not been set up for notifications")]
    UnknownCommunity,
    #[error("unable to find the given streamer(s), please try again")]
    UnresolvedBroadcasters,
    #[error("you are already subscribed to some or all of the given streamer(s)")]
    AlreadySubscribed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CommandError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CommandError::PermissionDenied => StatusCode::FORBIDDEN,
            CommandError::UnknownCommunity => StatusCode::NOT_FOUND,
            CommandError::UnresolvedBroadcasters => StatusCode::UNPROCESSABLE_ENTITY,
            CommandError::AlreadySubscribed => StatusCode::CONFLICT,
            CommandError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type CommandResult<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyReceipt {
    /// Display names of everything the caller is now subscribed to.
    pub subscribed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnnotifyReceipt {
    /// Display names of broadcasters the caller unsubscribed from.
    pub removed: Vec<String>,
    /// Raw command tokens that had no matching subscription.
    pub failed: Vec<String>,
}

pub struct SubscriptionUseCase<R, C, G, P>
where
    R: SubscriptionRepository + Send + Sync + 'static,
    C: CommunityRepository + Send + Sync + 'static,
    G: IdentityGateway + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    subscription_repository: Arc<R>,
    community_repository: Arc<C>,
    resolver: Arc<IdentifierResolver<G>>,
    topic_lifecycle: Arc<TopicLifecycle<P, R>>,
}

impl<R, C, G, P> SubscriptionUseCase<R, C, G, P>
where
    R: SubscriptionRepository + Send + Sync + 'static,
    C: CommunityRepository + Send + Sync + 'static,
    G: IdentityGateway + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    pub fn new(
        subscription_repository: Arc<R>,
        community_repository: Arc<C>,
        resolver: Arc<IdentifierResolver<G>>,
        topic_lifecycle: Arc<TopicLifecycle<P, R>>,
    ) -> Self {
        Self {
            subscription_repository,
            community_repository,
            resolver,
            topic_lifecycle,
        }
    }

    pub async fn notify(
        &self,
        user_id: &str,
        community_id: &str,
        raw_tokens: &[String],
    ) -> CommandResult<NotifyReceipt> {
        info!(
            user_id,
            community_id,
            tokens = raw_tokens.len(),
            "subscriptions: notify requested"
        );

        self.authorize_subscriber(user_id, community_id).await?;
        let resolved = self.resolve_tokens(raw_tokens).await?;

        let now = Utc::now();

        // A broadcaster only counts as tracked once its topic registration
        // succeeded, so register before persisting the row. Registration
        // failure aborts the whole command.
        for broadcaster in &resolved {
            let already_tracked = self
                .subscription_repository
                .find_broadcaster(&broadcaster.broadcaster_id)
                .await?
                .is_some();
            if already_tracked {
                continue;
            }

            let topic_handle = self
                .topic_lifecycle
                .register(&broadcaster.broadcaster_id)
                .await?;
            self.subscription_repository
                .ensure_broadcaster_tracked(InsertBroadcasterEntity {
                    broadcaster_id: broadcaster.broadcaster_id.clone(),
                    display_name: broadcaster.display_name.clone(),
                    topic_handle: Some(topic_handle),
                    created_at: now,
                })
                .await?;
        }

        let rows = resolved
            .iter()
            .map(|broadcaster| InsertSubscriptionEntity {
                user_id: user_id.to_string(),
                community_id: community_id.to_string(),
                broadcaster_id: broadcaster.broadcaster_id.clone(),
                created_at: now,
            })
            .collect();

        self.subscription_repository
            .add_subscriptions(rows)
            .await
            .map_err(|err| match err {
                InsertSubscriptionError::Duplicate => {
                    warn!(
                        user_id,
                        community_id,
                        "subscriptions: duplicate in notify batch, rolled back"
                    );
                    CommandError::AlreadySubscribed
                }
                InsertSubscriptionError::Other(err) => CommandError::Internal(err),
            })?;

        info!(
            user_id,
            community_id,
            count = resolved.len(),
            "subscriptions: notify applied"
        );
        Ok(NotifyReceipt {
            subscribed: resolved
                .into_iter()
                .map(|broadcaster| broadcaster.display_name)
                .collect(),
        })
    }

    pub async fn unnotify(
        &self,
        user_id: &str,
        community_id: &str,
        raw_tokens: &[String],
    ) -> CommandResult<UnnotifyReceipt> {
        info!(
            user_id,
            community_id,
            tokens = raw_tokens.len(),
            "subscriptions: unnotify requested"
        );

        self.authorize_subscriber(user_id, community_id).await?;
        let resolved = self.resolve_tokens(raw_tokens).await?;

        let broadcaster_ids: Vec<String> = resolved
            .iter()
            .map(|broadcaster| broadcaster.broadcaster_id.clone())
            .collect();

        let outcome = self
            .subscription_repository
            .remove_subscription_batch(user_id, community_id, &broadcaster_ids)
            .await?;

        for broadcaster in &outcome.orphaned {
            self.topic_lifecycle.deregister(broadcaster).await;
        }

        // Successes are reported by display name; failures by the token the
        // caller actually typed, since resolution may have changed it.
        let removed = outcome
            .removed
            .iter()
            .filter_map(|id| {
                resolved
                    .iter()
                    .find(|broadcaster| &broadcaster.broadcaster_id == id)
                    .map(|broadcaster| broadcaster.display_name.clone())
            })
            .collect();
        let failed = outcome
            .missing
            .iter()
            .filter_map(|id| {
                resolved
                    .iter()
                    .find(|broadcaster| &broadcaster.broadcaster_id == id)
                    .map(|broadcaster| broadcaster.raw_token.clone())
            })
            .collect();

        info!(
            user_id,
            community_id,
            pruned = outcome.orphaned.len(),
            "subscriptions: unnotify applied"
        );
        Ok(UnnotifyReceipt { removed, failed })
    }

    pub async fn notifs(&self, user_id: &str, community_id: &str) -> CommandResult<Vec<String>> {
        let broadcasters = self
            .subscription_repository
            .list_user_subscriptions(user_id, community_id)
            .await?;
        Ok(broadcasters
            .into_iter()
            .map(|broadcaster| broadcaster.display_name)
            .collect())
    }

    /// Subscriptions may be managed by anyone while the community runs in
    /// opt-in mode, otherwise only by the owner.
    async fn authorize_subscriber(
        &self,
        user_id: &str,
        community_id: &str,
    ) -> CommandResult<CommunityEntity> {
        let community = self
            .community_repository
            .find(community_id)
            .await?
            .ok_or(CommandError::UnknownCommunity)?;

        let delivery_mode =
            DeliveryMode::from_str(&community.delivery_mode).unwrap_or_default();
        if delivery_mode != DeliveryMode::OptIn && community.owner_user_id != user_id {
            warn!(
                user_id,
                community_id,
                delivery_mode = %delivery_mode,
                "subscriptions: caller is not the owner in a non-opt-in community"
            );
            return Err(CommandError::PermissionDenied);
        }

        Ok(community)
    }

    async fn resolve_tokens(
        &self,
        raw_tokens: &[String],
    ) -> CommandResult<Vec<ResolvedBroadcaster>> {
        let resolved = self.resolver.resolve(raw_tokens).await.map_err(|err| {
            warn!(error = %err, "subscriptions: broadcaster resolution failed");
            CommandError::UnresolvedBroadcasters
        })?;

        if resolved.is_empty() {
            return Err(CommandError::UnresolvedBroadcasters);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    use crate::application::usecases::identifier_resolver::{
        IdentityRecord, MockIdentityGateway,
    };
    use crate::application::usecases::topic_lifecycle::MockPushTopicGateway;
    use crate::domain::entities::broadcasters::BroadcasterEntity;
    use crate::domain::repositories::communities::MockCommunityRepository;
    use crate::domain::repositories::subscriptions::MockSubscriptionRepository;
    use crate::domain::value_objects::notifications::RemovalOutcome;

    fn sample_community(mode: DeliveryMode, owner: &str) -> CommunityEntity {
        CommunityEntity {
            community_id: "c1".to_string(),
            owner_user_id: owner.to_string(),
            notification_channel_id: "chan-1".to_string(),
            delivery_mode: mode.as_str().to_string(),
            sanitized_alerts: false,
            created_at: Utc::now(),
        }
    }

    fn sample_broadcaster(id: &str, name: &str, topic_handle: Option<&str>) -> BroadcasterEntity {
        BroadcasterEntity {
            broadcaster_id: id.to_string(),
            display_name: name.to_string(),
            topic_handle: topic_handle.map(|h| h.to_string()),
            created_at: Utc::now(),
        }
    }

    fn record(id: &str, login: &str, name: &str) -> IdentityRecord {
        IdentityRecord {
            broadcaster_id: id.to_string(),
            login: login.to_string(),
            display_name: name.to_string(),
        }
    }

    fn expect_opt_in_community(communities: &mut MockCommunityRepository) {
        communities.expect_find().returning(|_| {
            Box::pin(async { Ok(Some(sample_community(DeliveryMode::OptIn, "owner-1"))) })
        });
    }

    fn build_usecase(
        repository: MockSubscriptionRepository,
        communities: MockCommunityRepository,
        identities: MockIdentityGateway,
        push_gateway: MockPushTopicGateway,
    ) -> SubscriptionUseCase<
        MockSubscriptionRepository,
        MockCommunityRepository,
        MockIdentityGateway,
        MockPushTopicGateway,
    > {
        // The lifecycle only consults its repository during resync, so the
        // command tests can hand it an expectation-free double.
        let lifecycle = TopicLifecycle::new(
            Arc::new(push_gateway),
            Arc::new(MockSubscriptionRepository::new()),
        );
        SubscriptionUseCase::new(
            Arc::new(repository),
            Arc::new(communities),
            Arc::new(IdentifierResolver::new(Arc::new(identities))),
            Arc::new(lifecycle),
        )
    }

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn notify_registers_one_topic_per_newly_tracked_broadcaster() {
        let mut repository = MockSubscriptionRepository::new();
        let mut communities = MockCommunityRepository::new();
        let mut identities = MockIdentityGateway::new();
        let mut push_gateway = MockPushTopicGateway::new();

        expect_opt_in_community(&mut communities);
        identities
            .expect_users_by_ids()
            .times(2)
            .returning(|_| Ok(vec![record("90492842", "akula", "Akula")]));

        // First notify sees an untracked broadcaster, the second one does not.
        let mut tracked = false;
        repository.expect_find_broadcaster().times(2).returning(move |_| {
            let known = tracked;
            tracked = true;
            Box::pin(async move {
                Ok(known.then(|| sample_broadcaster("90492842", "Akula", Some("topic-1"))))
            })
        });

        push_gateway
            .expect_register_topic()
            .with(eq("90492842"))
            .times(1)
            .returning(|_| Ok("topic-1".to_string()));
        repository
            .expect_ensure_broadcaster_tracked()
            .withf(|broadcaster| {
                broadcaster.broadcaster_id == "90492842"
                    && broadcaster.topic_handle.as_deref() == Some("topic-1")
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        repository
            .expect_add_subscriptions()
            .times(2)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let receipt = usecase
            .notify("u1", "c1", &tokens(&["90492842"]))
            .await
            .unwrap();
        assert_eq!(receipt.subscribed, vec!["Akula".to_string()]);

        usecase
            .notify("u2", "c1", &tokens(&["90492842"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn notify_rolls_back_whole_batch_on_duplicate() {
        let mut repository = MockSubscriptionRepository::new();
        let mut communities = MockCommunityRepository::new();
        let mut identities = MockIdentityGateway::new();
        let push_gateway = MockPushTopicGateway::new();

        expect_opt_in_community(&mut communities);
        identities
            .expect_users_by_ids()
            .times(1)
            .returning(|_| Ok(vec![record("90492842", "akula", "Akula")]));
        repository.expect_find_broadcaster().returning(|_| {
            Box::pin(async { Ok(Some(sample_broadcaster("90492842", "Akula", Some("topic-1")))) })
        });
        repository
            .expect_add_subscriptions()
            .times(1)
            .returning(|_| Box::pin(async { Err(InsertSubscriptionError::Duplicate) }));

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let result = usecase.notify("u1", "c1", &tokens(&["90492842"])).await;
        assert!(matches!(result, Err(CommandError::AlreadySubscribed)));
    }

    #[tokio::test]
    async fn notify_aborts_without_state_change_when_resolution_fails() {
        let repository = MockSubscriptionRepository::new();
        let mut communities = MockCommunityRepository::new();
        let mut identities = MockIdentityGateway::new();
        let push_gateway = MockPushTopicGateway::new();

        expect_opt_in_community(&mut communities);
        identities.expect_users_by_logins().times(1).returning(|_| {
            Err(crate::application::usecases::identifier_resolver::IdentityLookupError::NotFound)
        });

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let result = usecase.notify("u1", "c1", &tokens(&["nosuchlogin"])).await;
        assert!(matches!(result, Err(CommandError::UnresolvedBroadcasters)));
    }

    #[tokio::test]
    async fn notify_propagates_topic_registration_failure_before_any_insert() {
        let mut repository = MockSubscriptionRepository::new();
        let mut communities = MockCommunityRepository::new();
        let mut identities = MockIdentityGateway::new();
        let mut push_gateway = MockPushTopicGateway::new();

        expect_opt_in_community(&mut communities);
        identities
            .expect_users_by_ids()
            .times(1)
            .returning(|_| Ok(vec![record("90492842", "akula", "Akula")]));
        repository
            .expect_find_broadcaster()
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));
        push_gateway
            .expect_register_topic()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("eventsub rejected the callback")));

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let result = usecase.notify("u1", "c1", &tokens(&["90492842"])).await;
        assert!(matches!(result, Err(CommandError::Internal(_))));
    }

    #[tokio::test]
    async fn notify_requires_owner_outside_opt_in_mode() {
        let repository = MockSubscriptionRepository::new();
        let mut communities = MockCommunityRepository::new();
        let identities = MockIdentityGateway::new();
        let push_gateway = MockPushTopicGateway::new();

        communities.expect_find().returning(|_| {
            Box::pin(async { Ok(Some(sample_community(DeliveryMode::Global, "owner-1"))) })
        });

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let result = usecase.notify("u1", "c1", &tokens(&["90492842"])).await;
        assert!(matches!(result, Err(CommandError::PermissionDenied)));

        // unnotify goes through the same gate
        let result = usecase.unnotify("u1", "c1", &tokens(&["90492842"])).await;
        assert!(matches!(result, Err(CommandError::PermissionDenied)));
    }

    #[tokio::test]
    async fn unnotify_reports_partial_success_and_failure() {
        let mut repository = MockSubscriptionRepository::new();
        let mut communities = MockCommunityRepository::new();
        let mut identities = MockIdentityGateway::new();
        let push_gateway = MockPushTopicGateway::new();

        expect_opt_in_community(&mut communities);
        identities.expect_users_by_logins().times(1).returning(|_| {
            Ok(vec![
                record("111", "subbed", "Subbed"),
                record("222", "notsubbed", "NotSubbed"),
            ])
        });
        repository
            .expect_remove_subscription_batch()
            .withf(|user, community, ids| {
                user == "u1" && community == "c1" && *ids == ["111", "222"]
            })
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(RemovalOutcome {
                        removed: vec!["111".to_string()],
                        missing: vec!["222".to_string()],
                        orphaned: Vec::new(),
                    })
                })
            });

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let receipt = usecase
            .unnotify("u1", "c1", &tokens(&["subbed", "notsubbed"]))
            .await
            .unwrap();
        assert_eq!(receipt.removed, vec!["Subbed".to_string()]);
        assert_eq!(receipt.failed, vec!["notsubbed".to_string()]);
    }

    #[tokio::test]
    async fn unnotify_deregisters_orphaned_broadcasters_exactly_once() {
        let mut repository = MockSubscriptionRepository::new();
        let mut communities = MockCommunityRepository::new();
        let mut identities = MockIdentityGateway::new();
        let mut push_gateway = MockPushTopicGateway::new();

        expect_opt_in_community(&mut communities);
        identities
            .expect_users_by_ids()
            .times(1)
            .returning(|_| Ok(vec![record("111", "akula", "Akula")]));
        repository
            .expect_remove_subscription_batch()
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(RemovalOutcome {
                        removed: vec!["111".to_string()],
                        missing: Vec::new(),
                        orphaned: vec![sample_broadcaster("111", "Akula", Some("topic-1"))],
                    })
                })
            });
        push_gateway
            .expect_deregister_topic()
            .with(eq("topic-1"))
            .times(1)
            .returning(|_| Ok(true));

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let receipt = usecase.unnotify("u1", "c1", &tokens(&["111"])).await.unwrap();
        assert_eq!(receipt.removed, vec!["Akula".to_string()]);
        assert!(receipt.failed.is_empty());
    }

    #[tokio::test]
    async fn unnotify_still_succeeds_when_deregistration_fails_upstream() {
        let mut repository = MockSubscriptionRepository::new();
        let mut communities = MockCommunityRepository::new();
        let mut identities = MockIdentityGateway::new();
        let mut push_gateway = MockPushTopicGateway::new();

        expect_opt_in_community(&mut communities);
        identities
            .expect_users_by_ids()
            .times(1)
            .returning(|_| Ok(vec![record("111", "akula", "Akula")]));
        repository
            .expect_remove_subscription_batch()
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async {
                    Ok(RemovalOutcome {
                        removed: vec!["111".to_string()],
                        missing: Vec::new(),
                        orphaned: vec![sample_broadcaster("111", "Akula", Some("topic-1"))],
                    })
                })
            });
        push_gateway
            .expect_deregister_topic()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("provider timeout")));

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let receipt = usecase.unnotify("u1", "c1", &tokens(&["111"])).await.unwrap();
        assert_eq!(receipt.removed, vec!["Akula".to_string()]);
    }

    #[tokio::test]
    async fn notifs_lists_display_names() {
        let mut repository = MockSubscriptionRepository::new();
        let communities = MockCommunityRepository::new();
        let identities = MockIdentityGateway::new();
        let push_gateway = MockPushTopicGateway::new();

        repository
            .expect_list_user_subscriptions()
            .withf(|user, community| user == "u1" && community == "c1")
            .times(1)
            .returning(|_, _| {
                Box::pin(async {
                    Ok(vec![
                        sample_broadcaster("111", "Akula", Some("t1")),
                        sample_broadcaster("222", "StreamerX", Some("t2")),
                    ])
                })
            });

        let usecase = build_usecase(repository, communities, identities, push_gateway);

        let names = usecase.notifs("u1", "c1").await.unwrap();
        assert_eq!(names, vec!["Akula".to_string(), "StreamerX".to_string()]);
    }
}
