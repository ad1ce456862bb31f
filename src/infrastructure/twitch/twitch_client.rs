use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::application::usecases::identifier_resolver::{
    BroadcasterProfile, IdentityGateway, IdentityLookupError, IdentityRecord,
};
use crate::application::usecases::topic_lifecycle::PushTopicGateway;
use crate::config::config_model::Twitch;

/// Minimal Helix + EventSub client built on reqwest, authenticated with an
/// app access token from the client-credentials flow.
pub struct TwitchClient {
    http: reqwest::Client,
    api_base: String,
    auth_base: String,
    client_id: String,
    client_secret: String,
    callback_url: String,
    eventsub_secret: String,
    app_token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct HelixUsersResponse {
    data: Vec<HelixUser>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
    display_name: String,
    profile_image_url: Option<String>,
    offline_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventSubCreateResponse {
    data: Vec<EventSubSubscription>,
}

#[derive(Debug, Deserialize)]
struct EventSubSubscription {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TwitchErrorEnvelope {
    error: Option<String>,
    status: Option<u16>,
    message: Option<String>,
}

impl TwitchClient {
    pub fn new(config: &Twitch) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            auth_base: config.auth_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback_url: config.callback_url.clone(),
            eventsub_secret: config.eventsub_secret.clone(),
            app_token: Mutex::new(None),
        }
    }

    async fn app_token(&self) -> Result<String> {
        let mut cached = self.app_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        debug!("twitch: refreshing app access token");
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.auth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "twitch: token request failed");
            bail!("twitch token request failed with status {status}");
        }

        let token: TokenResponse = response.json().await?;
        // Refresh a minute early so in-flight requests never carry an
        // expired token.
        let expires_at = Utc::now() + Duration::seconds((token.expires_in - 60).max(0));
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });

        Ok(access_token)
    }

    async fn get_users(
        &self,
        query: &[(&str, &str)],
        expected: usize,
    ) -> Result<Vec<IdentityRecord>, IdentityLookupError> {
        let token = self.app_token().await?;

        let response = self
            .http
            .get(format!("{}/users", self.api_base))
            .header("Client-Id", &self.client_id)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .query(query)
            .send()
            .await
            .map_err(|err| IdentityLookupError::Upstream(err.into()))?;

        // Helix responds 400 when any id or login in the batch is malformed.
        if response.status() == StatusCode::BAD_REQUEST {
            return Err(IdentityLookupError::NotFound);
        }
        if !response.status().is_success() {
            let status = response.status();
            let envelope = response.json::<TwitchErrorEnvelope>().await.ok();
            error!(
                status = status.as_u16(),
                message = envelope.as_ref().and_then(|e| e.message.as_deref()),
                "twitch: get users failed"
            );
            return Err(IdentityLookupError::Upstream(anyhow!(
                "twitch get users failed with status {status}"
            )));
        }

        let body: HelixUsersResponse = response
            .json()
            .await
            .map_err(|err| IdentityLookupError::Upstream(err.into()))?;

        // Unknown-but-well-formed entries are silently dropped from the
        // response; a short batch means somebody in it does not exist.
        if body.data.len() != expected {
            return Err(IdentityLookupError::NotFound);
        }

        Ok(body
            .data
            .into_iter()
            .map(|user| IdentityRecord {
                broadcaster_id: user.id,
                login: user.login,
                display_name: user.display_name,
            })
            .collect())
    }
}

#[async_trait]
impl IdentityGateway for TwitchClient {
    async fn users_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<IdentityRecord>, IdentityLookupError> {
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("id", id.as_str())).collect();
        self.get_users(&query, ids.len()).await
    }

    async fn users_by_logins(
        &self,
        logins: &[String],
    ) -> Result<Vec<IdentityRecord>, IdentityLookupError> {
        let query: Vec<(&str, &str)> = logins
            .iter()
            .map(|login| ("login", login.as_str()))
            .collect();
        self.get_users(&query, logins.len()).await
    }

    async fn profile(&self, broadcaster_id: &str) -> Result<BroadcasterProfile> {
        let token = self.app_token().await?;

        let response = self
            .http
            .get(format!("{}/users", self.api_base))
            .header("Client-Id", &self.client_id)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .query(&[("id", broadcaster_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            bail!(
                "twitch profile lookup failed with status {}",
                response.status()
            );
        }

        let body: HelixUsersResponse = response.json().await?;
        let user = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("broadcaster {broadcaster_id} not found"))?;

        Ok(BroadcasterProfile {
            profile_image_url: user.profile_image_url.filter(|url| !url.is_empty()),
            offline_image_url: user.offline_image_url.filter(|url| !url.is_empty()),
        })
    }
}

#[async_trait]
impl PushTopicGateway for TwitchClient {
    async fn register_topic(&self, broadcaster_id: &str) -> Result<String> {
        let token = self.app_token().await?;

        let response = self
            .http
            .post(format!("{}/eventsub/subscriptions", self.api_base))
            .header("Client-Id", &self.client_id)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&json!({
                "type": "stream.online",
                "version": "1",
                "condition": { "broadcaster_user_id": broadcaster_id },
                "transport": {
                    "method": "webhook",
                    "callback": self.callback_url,
                    "secret": self.eventsub_secret,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let envelope = response.json::<TwitchErrorEnvelope>().await.ok();
            error!(
                broadcaster_id,
                status = status.as_u16(),
                error = envelope.as_ref().and_then(|e| e.error.as_deref()),
                message = envelope.as_ref().and_then(|e| e.message.as_deref()),
                "twitch: eventsub subscription failed"
            );
            bail!("eventsub subscription failed with status {status}");
        }

        let body: EventSubCreateResponse = response.json().await?;
        let subscription = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("eventsub create returned no subscription"))?;

        info!(
            broadcaster_id,
            topic_handle = %subscription.id,
            "twitch: stream.online subscription created"
        );
        Ok(subscription.id)
    }

    async fn deregister_topic(&self, topic_handle: &str) -> Result<bool> {
        let token = self.app_token().await?;

        let response = self
            .http
            .delete(format!("{}/eventsub/subscriptions", self.api_base))
            .header("Client-Id", &self.client_id)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .query(&[("id", topic_handle)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(true),
            // Already gone upstream counts as a refusal, not a failure.
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let envelope = response.json::<TwitchErrorEnvelope>().await.ok();
                error!(
                    topic_handle,
                    status = status.as_u16(),
                    status_detail = envelope.as_ref().and_then(|e| e.status),
                    "twitch: eventsub unsubscribe failed"
                );
                bail!("eventsub unsubscribe failed with status {status}")
            }
        }
    }
}
