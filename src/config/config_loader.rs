use anyhow::{Ok, Result};

use super::config_model::{Database, Discord, DotEnvyConfig, Server, Twitch};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let twitch = Twitch {
        client_id: std::env::var("TWITCH_CLIENT_ID").expect("TWITCH_CLIENT_ID is invalid"),
        client_secret: std::env::var("TWITCH_CLIENT_SECRET")
            .expect("TWITCH_CLIENT_SECRET is invalid"),
        api_base: std::env::var("TWITCH_API_BASE")
            .unwrap_or_else(|_| "https://api.twitch.tv/helix".to_string()),
        auth_base: std::env::var("TWITCH_AUTH_BASE")
            .unwrap_or_else(|_| "https://id.twitch.tv".to_string()),
        callback_url: std::env::var("WEBHOOK_URL").expect("WEBHOOK_URL is invalid"),
        eventsub_secret: std::env::var("TWITCH_EVENTSUB_SECRET")
            .expect("TWITCH_EVENTSUB_SECRET is invalid"),
    };

    let discord = Discord {
        bot_token: std::env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN is invalid"),
        api_base: std::env::var("DISCORD_API_BASE")
            .unwrap_or_else(|_| "https://discord.com/api/v10".to_string()),
    };

    Ok(DotEnvyConfig {
        server,
        database,
        twitch,
        discord,
    })
}
