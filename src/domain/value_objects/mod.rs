pub mod alerts;
pub mod broadcaster_token;
pub mod enums;
pub mod notifications;
