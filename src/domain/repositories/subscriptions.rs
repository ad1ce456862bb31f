use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::entities::broadcasters::{BroadcasterEntity, InsertBroadcasterEntity};
use crate::domain::entities::subscriptions::InsertSubscriptionEntity;
use crate::domain::value_objects::notifications::{InterestedCommunity, RemovalOutcome};

/// The subscription batch insert distinguishes the unique-constraint hit so
/// the command layer can report "already subscribed" instead of a generic
/// failure.
#[derive(Debug, Error)]
pub enum InsertSubscriptionError {
    #[error("duplicate subscription")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    /// Insert-if-absent. A concurrent insert of the same broadcaster is not
    /// an error.
    async fn ensure_broadcaster_tracked(&self, broadcaster: InsertBroadcasterEntity)
    -> Result<()>;

    async fn find_broadcaster(&self, broadcaster_id: &str) -> Result<Option<BroadcasterEntity>>;

    /// Single multi-row insert. Any unique violation rolls back the whole
    /// batch and surfaces as [`InsertSubscriptionError::Duplicate`].
    async fn add_subscriptions(
        &self,
        subscriptions: Vec<InsertSubscriptionEntity>,
    ) -> Result<(), InsertSubscriptionError>;

    /// Removes the caller's subscriptions to the given broadcasters in one
    /// transaction. Broadcasters left with zero subscriptions anywhere are
    /// deleted in the same transaction and returned as `orphaned` so their
    /// topics can be deregistered.
    async fn remove_subscription_batch(
        &self,
        user_id: &str,
        community_id: &str,
        broadcaster_ids: &[String],
    ) -> Result<RemovalOutcome>;

    /// Deletes the community row (subscriptions go with it via cascade) and
    /// prunes any broadcaster left unreferenced, all in one transaction.
    /// Returns the pruned broadcasters for topic deregistration.
    async fn prune_community(&self, community_id: &str) -> Result<Vec<BroadcasterEntity>>;

    /// Every community interested in a broadcaster, grouped with its
    /// subscribed user ids and delivery configuration.
    async fn list_interested(&self, broadcaster_id: &str) -> Result<Vec<InterestedCommunity>>;

    async fn list_user_subscriptions(
        &self,
        user_id: &str,
        community_id: &str,
    ) -> Result<Vec<BroadcasterEntity>>;

    async fn list_tracked_broadcasters(&self) -> Result<Vec<BroadcasterEntity>>;

    /// Applies refreshed topic handles in a single transaction (startup
    /// resync writes all-or-nothing).
    async fn update_topic_handles(&self, handles: Vec<(String, String)>) -> Result<()>;
}
