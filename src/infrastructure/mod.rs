pub mod axum_http;
pub mod discord;
pub mod postgres;
pub mod twitch;
