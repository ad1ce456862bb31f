pub mod twitch_client;
