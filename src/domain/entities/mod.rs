pub mod broadcasters;
pub mod communities;
pub mod subscriptions;
