use anyhow::{Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::application::usecases::fanout::{MessageSink, SendStatus};
use crate::config::config_model::Discord;
use crate::domain::value_objects::alerts::AlertContent;

/// Permission bit for mentioning @everyone/@here, per the chat platform's
/// permission flags.
const MENTION_EVERYONE: u64 = 1 << 17;

pub struct DiscordRestSink {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct PartialGuild {
    id: String,
    permissions: Option<String>,
}

impl DiscordRestSink {
    pub fn new(config: &Discord) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client must build");

        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        }
    }

    async fn post_message(&self, channel_id: &str, payload: Value) -> Result<SendStatus> {
        let response = self
            .http
            .post(format!("{}/channels/{}/messages", self.api_base, channel_id))
            .header(AUTHORIZATION, format!("Bot {}", self.bot_token))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(SendStatus::Delivered),
            // Deleted channel or revoked access: expected, the caller skips.
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                debug!(channel_id, "discord: channel did not resolve");
                Ok(SendStatus::ChannelUnavailable)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                error!(
                    channel_id,
                    status = status.as_u16(),
                    body = %body,
                    "discord: message post failed"
                );
                bail!("discord message post failed with status {status}")
            }
        }
    }
}

#[async_trait]
impl MessageSink for DiscordRestSink {
    async fn send_alert(&self, channel_id: &str, alert: &AlertContent) -> Result<SendStatus> {
        let mut embed = json!({
            "title": alert.title,
            "description": alert.body,
            "url": alert.link,
        });
        if let Some(thumbnail_url) = &alert.thumbnail_url {
            embed["thumbnail"] = json!({ "url": thumbnail_url });
        }
        if let Some(image_url) = &alert.image_url {
            embed["image"] = json!({ "url": image_url });
        }

        self.post_message(channel_id, json!({ "embeds": [embed] }))
            .await
    }

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<SendStatus> {
        self.post_message(channel_id, json!({ "content": text }))
            .await
    }

    async fn has_broadcast_permission(&self, community_id: &str) -> Result<bool> {
        let response = self
            .http
            .get(format!("{}/users/@me/guilds", self.api_base))
            .header(AUTHORIZATION, format!("Bot {}", self.bot_token))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!(
                "discord guild listing failed with status {}",
                response.status()
            );
        }

        let guilds: Vec<PartialGuild> = response.json().await?;
        let permitted = guilds
            .iter()
            .find(|guild| guild.id == community_id)
            .and_then(|guild| guild.permissions.as_deref())
            .and_then(|permissions| permissions.parse::<u64>().ok())
            .map(|permissions| permissions & MENTION_EVERYONE != 0)
            .unwrap_or(false);

        Ok(permitted)
    }
}
