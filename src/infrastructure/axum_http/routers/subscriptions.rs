use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::error;

use crate::application::usecases::identifier_resolver::{IdentifierResolver, IdentityGateway};
use crate::application::usecases::subscriptions::{CommandError, SubscriptionUseCase};
use crate::application::usecases::topic_lifecycle::{PushTopicGateway, TopicLifecycle};
use crate::domain::repositories::communities::CommunityRepository;
use crate::domain::repositories::subscriptions::SubscriptionRepository;
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::repositories::communities::CommunityPostgres;
use crate::infrastructure::postgres::repositories::subscriptions::SubscriptionPostgres;
use crate::infrastructure::twitch::twitch_client::TwitchClient;

#[derive(Debug, Deserialize)]
pub struct SubscriptionCommandRequest {
    pub user_id: String,
    pub community_id: String,
    pub broadcasters: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotifsQuery {
    pub user_id: String,
    pub community_id: String,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, twitch: Arc<TwitchClient>) -> Router {
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
    let community_repository = Arc::new(CommunityPostgres::new(Arc::clone(&db_pool)));
    let resolver = Arc::new(IdentifierResolver::new(Arc::clone(&twitch)));
    let topic_lifecycle = Arc::new(TopicLifecycle::new(
        Arc::clone(&twitch),
        Arc::clone(&subscription_repository),
    ));
    let usecase = SubscriptionUseCase::new(
        subscription_repository,
        community_repository,
        resolver,
        topic_lifecycle,
    );

    Router::new()
        .route("/notify", post(notify))
        .route("/unnotify", post(unnotify))
        .route("/notifs", get(notifs))
        .with_state(Arc::new(usecase))
}

pub async fn notify<R, C, G, P>(
    State(usecase): State<Arc<SubscriptionUseCase<R, C, G, P>>>,
    Json(payload): Json<SubscriptionCommandRequest>,
) -> Response
where
    R: SubscriptionRepository + Send + Sync + 'static,
    C: CommunityRepository + Send + Sync + 'static,
    G: IdentityGateway + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    match usecase
        .notify(&payload.user_id, &payload.community_id, &payload.broadcasters)
        .await
    {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => command_error_response("notify", err),
    }
}

pub async fn unnotify<R, C, G, P>(
    State(usecase): State<Arc<SubscriptionUseCase<R, C, G, P>>>,
    Json(payload): Json<SubscriptionCommandRequest>,
) -> Response
where
    R: SubscriptionRepository + Send + Sync + 'static,
    C: CommunityRepository + Send + Sync + 'static,
    G: IdentityGateway + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    match usecase
        .unnotify(&payload.user_id, &payload.community_id, &payload.broadcasters)
        .await
    {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => command_error_response("unnotify", err),
    }
}

pub async fn notifs<R, C, G, P>(
    State(usecase): State<Arc<SubscriptionUseCase<R, C, G, P>>>,
    Query(query): Query<NotifsQuery>,
) -> Response
where
    R: SubscriptionRepository + Send + Sync + 'static,
    C: CommunityRepository + Send + Sync + 'static,
    G: IdentityGateway + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    match usecase.notifs(&query.user_id, &query.community_id).await {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(err) => command_error_response("notifs", err),
    }
}

fn command_error_response(label: &str, err: CommandError) -> Response {
    let status = err.status_code();
    error!(
        status = status.as_u16(),
        error = %err,
        "subscriptions router: {} failed",
        label
    );
    (status, err.to_string()).into_response()
}
