use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::communities;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(primary_key(community_id))]
#[diesel(table_name = communities)]
pub struct CommunityEntity {
    pub community_id: String,
    pub owner_user_id: String,
    pub notification_channel_id: String,
    pub delivery_mode: String,
    pub sanitized_alerts: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = communities)]
pub struct InsertCommunityEntity {
    pub community_id: String,
    pub owner_user_id: String,
    pub notification_channel_id: String,
    pub delivery_mode: String,
    pub sanitized_alerts: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial reconfiguration, `None` fields keep their current value.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = communities)]
pub struct EditCommunityEntity {
    pub notification_channel_id: Option<String>,
    pub delivery_mode: Option<String>,
    pub sanitized_alerts: Option<bool>,
}
