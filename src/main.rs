use std::sync::Arc;

use anyhow::Result;
use stream_herald::application::usecases::topic_lifecycle::TopicLifecycle;
use stream_herald::config::config_loader;
use stream_herald::infrastructure::axum_http::http_serve;
use stream_herald::infrastructure::discord::discord_sink::DiscordRestSink;
use stream_herald::infrastructure::postgres::postgres_connection;
use stream_herald::infrastructure::postgres::repositories::subscriptions::SubscriptionPostgres;
use stream_herald::infrastructure::twitch::twitch_client::TwitchClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("stream-herald exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = Arc::new(postgres_connection::establish_connection(
        &dotenvy_env.database.url,
    )?);
    info!("Postgres connection has been established");

    let twitch = Arc::new(TwitchClient::new(&dotenvy_env.twitch));
    let sink = Arc::new(DiscordRestSink::new(&dotenvy_env.discord));

    // Upstream push subscriptions do not survive a restart or a callback-URL
    // change; refresh every tracked broadcaster's topic before serving.
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&postgres_pool)));
    let topic_lifecycle = TopicLifecycle::new(Arc::clone(&twitch), subscription_repository);
    topic_lifecycle.resync_all().await?;

    http_serve::start(Arc::new(dotenvy_env), postgres_pool, twitch, sink).await?;

    Ok(())
}
