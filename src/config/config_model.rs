#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub twitch: Twitch,
    pub discord: Discord,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Twitch {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub auth_base: String,
    /// Public URL the provider posts stream-online callbacks to.
    pub callback_url: String,
    pub eventsub_secret: String,
}

#[derive(Debug, Clone)]
pub struct Discord {
    pub bot_token: String,
    pub api_base: String,
}
