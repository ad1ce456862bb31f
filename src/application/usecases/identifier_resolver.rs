use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::domain::value_objects::broadcaster_token::{BroadcasterToken, classify_token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub broadcaster_id: String,
    pub login: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcasterProfile {
    pub profile_image_url: Option<String>,
    pub offline_image_url: Option<String>,
}

/// Identity lookups are all-or-nothing per batch: the upstream API rejects
/// the whole request when any entry is unknown.
#[derive(Debug, Error)]
pub enum IdentityLookupError {
    #[error("one or more broadcasters were not found upstream")]
    NotFound,
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn users_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<IdentityRecord>, IdentityLookupError>;

    async fn users_by_logins(
        &self,
        logins: &[String],
    ) -> Result<Vec<IdentityRecord>, IdentityLookupError>;

    async fn profile(&self, broadcaster_id: &str) -> anyhow::Result<BroadcasterProfile>;
}

/// A canonical broadcaster id paired with the raw command token that produced
/// it. Unresolvable-token reporting in `unnotify` needs the original token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBroadcaster {
    pub broadcaster_id: String,
    pub display_name: String,
    pub raw_token: String,
}

pub struct IdentifierResolver<G>
where
    G: IdentityGateway + Send + Sync + 'static,
{
    identities: Arc<G>,
}

impl<G> IdentifierResolver<G>
where
    G: IdentityGateway + Send + Sync + 'static,
{
    pub fn new(identities: Arc<G>) -> Self {
        Self { identities }
    }

    /// Turns raw command tokens into validated canonical ids. Tokens are
    /// bucketed (numeric id / login), deduplicated, and each non-empty bucket
    /// costs exactly one upstream call. Any failure in either batch fails the
    /// whole resolution.
    pub async fn resolve(
        &self,
        raw_tokens: &[String],
    ) -> Result<Vec<ResolvedBroadcaster>, IdentityLookupError> {
        let mut id_bucket: Vec<(String, String)> = Vec::new();
        let mut login_bucket: Vec<(String, String)> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_logins: HashSet<String> = HashSet::new();

        for raw in raw_tokens {
            if raw.trim().is_empty() {
                continue;
            }
            match classify_token(raw) {
                BroadcasterToken::Id(id) => {
                    if seen_ids.insert(id.clone()) {
                        id_bucket.push((id, raw.clone()));
                    }
                }
                BroadcasterToken::Login(login) => {
                    if seen_logins.insert(login.to_ascii_lowercase()) {
                        login_bucket.push((login, raw.clone()));
                    }
                }
            }
        }

        if id_bucket.is_empty() && login_bucket.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            ids = id_bucket.len(),
            logins = login_bucket.len(),
            "identifier_resolver: resolving broadcaster tokens"
        );

        let mut resolved: Vec<ResolvedBroadcaster> = Vec::new();
        let mut seen_canonical: HashSet<String> = HashSet::new();

        if !id_bucket.is_empty() {
            let ids: Vec<String> = id_bucket.iter().map(|(id, _)| id.clone()).collect();
            let raw_by_id: HashMap<String, String> = id_bucket.into_iter().collect();

            for record in self.identities.users_by_ids(&ids).await? {
                let raw_token = raw_by_id
                    .get(&record.broadcaster_id)
                    .cloned()
                    .unwrap_or_else(|| record.broadcaster_id.clone());
                if seen_canonical.insert(record.broadcaster_id.clone()) {
                    resolved.push(ResolvedBroadcaster {
                        broadcaster_id: record.broadcaster_id,
                        display_name: record.display_name,
                        raw_token,
                    });
                }
            }
        }

        if !login_bucket.is_empty() {
            let logins: Vec<String> = login_bucket.iter().map(|(login, _)| login.clone()).collect();
            let raw_by_login: HashMap<String, String> = login_bucket
                .into_iter()
                .map(|(login, raw)| (login.to_ascii_lowercase(), raw))
                .collect();

            for record in self.identities.users_by_logins(&logins).await? {
                let raw_token = raw_by_login
                    .get(&record.login.to_ascii_lowercase())
                    .cloned()
                    .unwrap_or_else(|| record.login.clone());
                if seen_canonical.insert(record.broadcaster_id.clone()) {
                    resolved.push(ResolvedBroadcaster {
                        broadcaster_id: record.broadcaster_id,
                        display_name: record.display_name,
                        raw_token,
                    });
                }
            }
        }

        Ok(resolved)
    }
}
