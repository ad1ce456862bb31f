use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use diesel::{insert_into, prelude::*};

use crate::domain::entities::communities::{
    CommunityEntity, EditCommunityEntity, InsertCommunityEntity,
};
use crate::domain::repositories::communities::CommunityRepository;
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::schema::communities;

pub struct CommunityPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CommunityPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CommunityRepository for CommunityPostgres {
    async fn insert(&self, community: InsertCommunityEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(communities::table)
            .values(&community)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find(&self, community_id: &str) -> Result<Option<CommunityEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = communities::table
            .find(community_id)
            .first::<CommunityEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn update_config(&self, community_id: &str, edit: EditCommunityEntity) -> Result<()> {
        // Diesel rejects an UPDATE with no changed columns.
        if edit.notification_channel_id.is_none()
            && edit.delivery_mode.is_none()
            && edit.sanitized_alerts.is_none()
        {
            return Ok(());
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(communities::table.find(community_id))
            .set(&edit)
            .execute(&mut conn)?;

        Ok(())
    }
}
