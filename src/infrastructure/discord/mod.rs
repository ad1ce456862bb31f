pub mod discord_sink;
