use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::communities::{
    CommunityEntity, EditCommunityEntity, InsertCommunityEntity,
};

#[async_trait]
#[automock]
pub trait CommunityRepository {
    async fn insert(&self, community: InsertCommunityEntity) -> Result<()>;
    async fn find(&self, community_id: &str) -> Result<Option<CommunityEntity>>;
    async fn update_config(&self, community_id: &str, edit: EditCommunityEntity) -> Result<()>;
}
