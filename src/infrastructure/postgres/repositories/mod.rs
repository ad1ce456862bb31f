pub mod communities;
pub mod subscriptions;
