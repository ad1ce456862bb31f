use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::result::DatabaseErrorKind;
use diesel::{Connection, insert_into, prelude::*};

use crate::domain::entities::broadcasters::{BroadcasterEntity, InsertBroadcasterEntity};
use crate::domain::entities::communities::CommunityEntity;
use crate::domain::entities::subscriptions::InsertSubscriptionEntity;
use crate::domain::repositories::subscriptions::{
    InsertSubscriptionError, SubscriptionRepository,
};
use crate::domain::value_objects::enums::delivery_modes::DeliveryMode;
use crate::domain::value_objects::notifications::{InterestedCommunity, RemovalOutcome};
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::schema::{broadcasters, communities, subscriptions};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn ensure_broadcaster_tracked(
        &self,
        broadcaster: InsertBroadcasterEntity,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // A concurrent notify racing on the same broadcaster means someone
        // else just created it, not a failure.
        insert_into(broadcasters::table)
            .values(&broadcaster)
            .on_conflict(broadcasters::broadcaster_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_broadcaster(&self, broadcaster_id: &str) -> Result<Option<BroadcasterEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = broadcasters::table
            .find(broadcaster_id)
            .first::<BroadcasterEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn add_subscriptions(
        &self,
        rows: Vec<InsertSubscriptionEntity>,
    ) -> Result<(), InsertSubscriptionError> {
        let mut conn = Arc::clone(&self.db_pool)
            .get()
            .map_err(|err| InsertSubscriptionError::Other(err.into()))?;

        // One multi-row statement: a unique violation anywhere in the batch
        // rolls back every row of it.
        insert_into(subscriptions::table)
            .values(&rows)
            .execute(&mut conn)
            .map_err(|err| match err {
                diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    InsertSubscriptionError::Duplicate
                }
                other => InsertSubscriptionError::Other(other.into()),
            })?;

        Ok(())
    }

    async fn remove_subscription_batch(
        &self,
        user_id: &str,
        community_id: &str,
        broadcaster_ids: &[String],
    ) -> Result<RemovalOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<RemovalOutcome, diesel::result::Error, _>(|tx| {
            let mut outcome = RemovalOutcome::default();

            for broadcaster_id in broadcaster_ids {
                let deleted = diesel::delete(
                    subscriptions::table
                        .filter(subscriptions::user_id.eq(user_id))
                        .filter(subscriptions::community_id.eq(community_id))
                        .filter(subscriptions::broadcaster_id.eq(broadcaster_id)),
                )
                .execute(tx)?;

                if deleted == 0 {
                    outcome.missing.push(broadcaster_id.clone());
                    continue;
                }
                outcome.removed.push(broadcaster_id.clone());

                // Post-delete count decides pruning.
                let remaining: i64 = subscriptions::table
                    .filter(subscriptions::broadcaster_id.eq(broadcaster_id))
                    .count()
                    .get_result(tx)?;
                if remaining == 0 {
                    let broadcaster = broadcasters::table
                        .find(broadcaster_id)
                        .first::<BroadcasterEntity>(tx)?;
                    diesel::delete(broadcasters::table.find(broadcaster_id)).execute(tx)?;
                    outcome.orphaned.push(broadcaster);
                }
            }

            Ok(outcome)
        })?;

        Ok(outcome)
    }

    async fn prune_community(&self, community_id: &str) -> Result<Vec<BroadcasterEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let orphaned = conn.transaction::<Vec<BroadcasterEntity>, diesel::result::Error, _>(
            |tx| {
                diesel::delete(communities::table.find(community_id)).execute(tx)?;

                // The cascade just removed this community's subscriptions;
                // broadcasters nobody references anymore go with it.
                let orphaned = broadcasters::table
                    .left_join(subscriptions::table)
                    .filter(subscriptions::id.nullable().is_null())
                    .select(BroadcasterEntity::as_select())
                    .load::<BroadcasterEntity>(tx)?;

                if !orphaned.is_empty() {
                    let ids: Vec<&String> =
                        orphaned.iter().map(|b| &b.broadcaster_id).collect();
                    diesel::delete(
                        broadcasters::table.filter(broadcasters::broadcaster_id.eq_any(ids)),
                    )
                    .execute(tx)?;
                }

                Ok(orphaned)
            },
        )?;

        Ok(orphaned)
    }

    async fn list_interested(&self, broadcaster_id: &str) -> Result<Vec<InterestedCommunity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows: Vec<(CommunityEntity, String)> = subscriptions::table
            .inner_join(communities::table)
            .filter(subscriptions::broadcaster_id.eq(broadcaster_id))
            .select((CommunityEntity::as_select(), subscriptions::user_id))
            .order(communities::community_id.asc())
            .load(&mut conn)?;

        // Rows arrive ordered by community, so adjacent grouping suffices.
        let mut groups: Vec<InterestedCommunity> = Vec::new();
        for (community, user_id) in rows {
            match groups.last_mut() {
                Some(group) if group.community_id == community.community_id => {
                    group.user_ids.push(user_id);
                }
                _ => groups.push(InterestedCommunity {
                    community_id: community.community_id,
                    notification_channel_id: community.notification_channel_id,
                    delivery_mode: DeliveryMode::from_str(&community.delivery_mode)
                        .unwrap_or_default(),
                    sanitized_alerts: community.sanitized_alerts,
                    owner_user_id: community.owner_user_id,
                    user_ids: vec![user_id],
                }),
            }
        }

        Ok(groups)
    }

    async fn list_user_subscriptions(
        &self,
        user_id: &str,
        community_id: &str,
    ) -> Result<Vec<BroadcasterEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = subscriptions::table
            .inner_join(broadcasters::table)
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::community_id.eq(community_id))
            .select(BroadcasterEntity::as_select())
            .order(broadcasters::display_name.asc())
            .load::<BroadcasterEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_tracked_broadcasters(&self) -> Result<Vec<BroadcasterEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = broadcasters::table
            .order(broadcasters::broadcaster_id.asc())
            .load::<BroadcasterEntity>(&mut conn)?;

        Ok(results)
    }

    async fn update_topic_handles(&self, handles: Vec<(String, String)>) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<(), diesel::result::Error, _>(|tx| {
            for (broadcaster_id, topic_handle) in &handles {
                diesel::update(broadcasters::table.find(broadcaster_id))
                    .set(broadcasters::topic_handle.eq(Some(topic_handle)))
                    .execute(tx)?;
            }
            Ok(())
        })?;

        Ok(())
    }
}
