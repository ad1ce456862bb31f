use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, patch, post},
};
use serde::Deserialize;
use tracing::error;

use crate::application::usecases::communities::{CommunityConfigChange, CommunityUseCase};
use crate::application::usecases::topic_lifecycle::{PushTopicGateway, TopicLifecycle};
use crate::domain::repositories::communities::CommunityRepository;
use crate::domain::repositories::subscriptions::SubscriptionRepository;
use crate::domain::value_objects::enums::delivery_modes::DeliveryMode;
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::repositories::communities::CommunityPostgres;
use crate::infrastructure::postgres::repositories::subscriptions::SubscriptionPostgres;
use crate::infrastructure::twitch::twitch_client::TwitchClient;

#[derive(Debug, Deserialize)]
pub struct CommunityJoinedRequest {
    pub community_id: String,
    pub owner_user_id: String,
    pub fallback_channel_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeConfigRequest {
    pub caller_user_id: String,
    pub notification_channel_id: Option<String>,
    pub delivery_mode: Option<DeliveryMode>,
    pub sanitized_alerts: Option<bool>,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, twitch: Arc<TwitchClient>) -> Router {
    let community_repository = Arc::new(CommunityPostgres::new(Arc::clone(&db_pool)));
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
    let topic_lifecycle = Arc::new(TopicLifecycle::new(
        twitch,
        Arc::clone(&subscription_repository),
    ));
    let usecase = CommunityUseCase::new(
        community_repository,
        subscription_repository,
        topic_lifecycle,
    );

    Router::new()
        .route("/", post(community_joined))
        .route("/:community_id", delete(community_left))
        .route("/:community_id/config", patch(change_config))
        .with_state(Arc::new(usecase))
}

pub async fn community_joined<C, R, P>(
    State(usecase): State<Arc<CommunityUseCase<C, R, P>>>,
    Json(payload): Json<CommunityJoinedRequest>,
) -> Response
where
    C: CommunityRepository + Send + Sync + 'static,
    R: SubscriptionRepository + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    match usecase
        .on_community_joined(
            &payload.community_id,
            &payload.owner_user_id,
            &payload.fallback_channel_id,
        )
        .await
    {
        Ok(()) => (StatusCode::CREATED, "community onboarded").into_response(),
        Err(err) => internal_error_response("community_joined", err),
    }
}

pub async fn community_left<C, R, P>(
    State(usecase): State<Arc<CommunityUseCase<C, R, P>>>,
    Path(community_id): Path<String>,
) -> Response
where
    C: CommunityRepository + Send + Sync + 'static,
    R: SubscriptionRepository + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    match usecase.on_community_left(&community_id).await {
        Ok(()) => (StatusCode::OK, "community removed").into_response(),
        Err(err) => internal_error_response("community_left", err),
    }
}

pub async fn change_config<C, R, P>(
    State(usecase): State<Arc<CommunityUseCase<C, R, P>>>,
    Path(community_id): Path<String>,
    Json(payload): Json<ChangeConfigRequest>,
) -> Response
where
    C: CommunityRepository + Send + Sync + 'static,
    R: SubscriptionRepository + Send + Sync + 'static,
    P: PushTopicGateway + Send + Sync + 'static,
{
    let change = CommunityConfigChange {
        notification_channel_id: payload.notification_channel_id,
        delivery_mode: payload.delivery_mode,
        sanitized_alerts: payload.sanitized_alerts,
    };

    match usecase
        .change_config(&payload.caller_user_id, &community_id, change)
        .await
    {
        Ok(()) => (StatusCode::OK, "configuration updated").into_response(),
        Err(err) => {
            let status = err.status_code();
            error!(
                status = status.as_u16(),
                error = %err,
                "communities router: change_config failed"
            );
            (status, err.to_string()).into_response()
        }
    }
}

fn internal_error_response(label: &str, err: anyhow::Error) -> Response {
    error!(
        status = StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        error = %err,
        "communities router: {} failed",
        label
    );
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}
