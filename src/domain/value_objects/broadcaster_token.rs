use url::Url;

/// Hosts whose profile URLs we recognize. Anything else is resolved as a
/// literal login string.
pub const PLATFORM_PROFILE_HOSTS: [&str; 3] = ["twitch.tv", "www.twitch.tv", "m.twitch.tv"];

pub const MAX_TOKEN_LEN: usize = 2048;

/// A raw `notify`/`unnotify` argument, classified for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcasterToken {
    /// Purely numeric input, a candidate canonical id that still needs
    /// upstream validation.
    Id(String),
    /// A login name that needs upstream resolution to a canonical id.
    Login(String),
}

pub fn classify_token(raw: &str) -> BroadcasterToken {
    let trimmed = raw.trim();

    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return BroadcasterToken::Id(trimmed.to_string());
    }

    if let Some(login) = extract_profile_login(trimmed) {
        return BroadcasterToken::Login(login);
    }

    BroadcasterToken::Login(trimmed.to_string())
}

/// Extracts the login segment from a canonical profile URL
/// (`https://<platform host>/<login>`). Inputs that do not match the pattern
/// return `None` and are treated as literal logins by the caller.
fn extract_profile_login(raw: &str) -> Option<String> {
    if raw.len() > MAX_TOKEN_LEN {
        return None;
    }

    let url = Url::parse(raw).ok()?;
    if url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?.to_ascii_lowercase();
    if !PLATFORM_PROFILE_HOSTS.contains(&host.as_str()) {
        return None;
    }

    let path = url.path().trim_matches('/');
    if path.is_empty() || path.contains('/') {
        return None;
    }

    Some(path.to_string())
}
