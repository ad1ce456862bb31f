use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::broadcasters;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(primary_key(broadcaster_id))]
#[diesel(table_name = broadcasters)]
pub struct BroadcasterEntity {
    pub broadcaster_id: String,
    pub display_name: String,
    /// Upstream push-subscription handle, `None` while no topic is registered.
    pub topic_handle: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = broadcasters)]
pub struct InsertBroadcasterEntity {
    pub broadcaster_id: String,
    pub display_name: String,
    pub topic_handle: Option<String>,
    pub created_at: DateTime<Utc>,
}
