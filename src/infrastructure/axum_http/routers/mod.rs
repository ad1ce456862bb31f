pub mod communities;
pub mod stream_online;
pub mod subscriptions;
