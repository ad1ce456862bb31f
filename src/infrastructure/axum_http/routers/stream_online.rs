use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::application::usecases::fanout::{MessageSink, StreamOnlineFanout};
use crate::application::usecases::identifier_resolver::IdentityGateway;
use crate::domain::repositories::subscriptions::SubscriptionRepository;
use crate::domain::value_objects::notifications::StreamOnlineEvent;
use crate::infrastructure::discord::discord_sink::DiscordRestSink;
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::repositories::subscriptions::SubscriptionPostgres;
use crate::infrastructure::twitch::twitch_client::TwitchClient;

#[derive(Debug, Deserialize)]
pub struct StreamOnlineCallback {
    /// Present only during the provider's endpoint verification handshake.
    pub challenge: Option<String>,
    pub event: Option<StreamOnlineEventPayload>,
}

#[derive(Debug, Deserialize)]
pub struct StreamOnlineEventPayload {
    pub broadcaster_user_id: String,
    pub broadcaster_user_login: String,
    pub broadcaster_user_name: String,
    pub started_at: DateTime<Utc>,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    sink: Arc<DiscordRestSink>,
    twitch: Arc<TwitchClient>,
) -> Router {
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
    let fanout = StreamOnlineFanout::new(subscription_repository, sink, twitch);

    Router::new()
        .route("/", post(stream_online))
        .with_state(Arc::new(fanout))
}

pub async fn stream_online<R, S, G>(
    State(fanout): State<Arc<StreamOnlineFanout<R, S, G>>>,
    Json(payload): Json<StreamOnlineCallback>,
) -> Response
where
    R: SubscriptionRepository + Send + Sync + 'static,
    S: MessageSink + Send + Sync + 'static,
    G: IdentityGateway + Send + Sync + 'static,
{
    if let Some(challenge) = payload.challenge {
        return (StatusCode::OK, challenge).into_response();
    }

    let Some(event) = payload.event else {
        return (StatusCode::BAD_REQUEST, "missing event payload").into_response();
    };

    info!(
        broadcaster_id = %event.broadcaster_user_id,
        broadcaster_name = %event.broadcaster_user_name,
        "stream_online: live event received"
    );

    // The fan-out runs detached; the provider only needs a prompt 2xx.
    fanout.on_stream_online(StreamOnlineEvent {
        broadcaster_id: event.broadcaster_user_id,
        broadcaster_login: event.broadcaster_user_login,
        broadcaster_name: event.broadcaster_user_name,
        started_at: event.started_at,
    });

    (StatusCode::OK, "ok").into_response()
}
