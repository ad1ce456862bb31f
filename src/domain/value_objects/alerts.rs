use rand::Rng;
use rand::seq::SliceRandom;

use crate::domain::value_objects::notifications::StreamOnlineEvent;

/// The flavored alert bodies rotate per live event; sanitized communities
/// always receive [`AlertVariant::Neutral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertVariant {
    Draft,
    Recruitment,
    Bulletin,
    Neutral,
}

pub const VARIANT_POOL: [AlertVariant; 3] = [
    AlertVariant::Draft,
    AlertVariant::Recruitment,
    AlertVariant::Bulletin,
];

impl AlertVariant {
    /// Picks one non-neutral variant. Called once per live event so every
    /// non-sanitized community sees the same content for that event.
    pub fn choose<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *VARIANT_POOL.choose(rng).unwrap_or(&AlertVariant::Draft)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertContent {
    pub title: String,
    pub body: String,
    pub link: String,
    pub thumbnail_url: Option<String>,
    pub image_url: Option<String>,
}

/// Imagery for the neutral variant, fetched from the broadcaster's profile
/// at most once per live event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertImagery {
    pub thumbnail_url: Option<String>,
    pub image_url: Option<String>,
}

const DRAFT_THUMBNAIL_URL: &str = "https://i.imgur.com/beTJRFF.png";
const RECRUITMENT_THUMBNAIL_URL: &str = "https://i.imgur.com/egYCwpv.jpg";
const BULLETIN_THUMBNAIL_URL: &str = "https://i.imgur.com/rC4do2n.png";

pub fn render_alert(
    variant: AlertVariant,
    event: &StreamOnlineEvent,
    imagery: Option<&AlertImagery>,
) -> AlertContent {
    let name = &event.broadcaster_name;
    let link = format!("https://www.twitch.tv/{}", event.broadcaster_login);

    match variant {
        AlertVariant::Draft => AlertContent {
            title: ":rotating_light: MANDATORY STREAM SNIPING DRAFT :rotating_light:".to_string(),
            body: format!(
                "You have been drafted to stream snipe {name}.\n\n\
                 Report to your nearest stream sniping channel IMMEDIATELY! \
                 Failure to do so is punishable by fines up to $250,000. :saluting_face:"
            ),
            link,
            thumbnail_url: Some(DRAFT_THUMBNAIL_URL.to_string()),
            image_url: None,
        },
        AlertVariant::Recruitment => AlertContent {
            title: ":rotating_light: ATTENTION RECRUITS :rotating_light:".to_string(),
            body: format!(
                "{name} has taken to the airwaves. Basic training is over.\n\n\
                 Assemble in the notification channel and await further orders. \
                 Deserters will be mocked relentlessly."
            ),
            link,
            thumbnail_url: Some(RECRUITMENT_THUMBNAIL_URL.to_string()),
            image_url: None,
        },
        AlertVariant::Bulletin => AlertContent {
            title: ":rotating_light: ALL POINTS BULLETIN :rotating_light:".to_string(),
            body: format!(
                "Be on the lookout: {name} was last seen going live.\n\n\
                 Considered armed with a broadcast and extremely online. \
                 Approach with chat messages."
            ),
            link,
            thumbnail_url: Some(BULLETIN_THUMBNAIL_URL.to_string()),
            image_url: None,
        },
        AlertVariant::Neutral => {
            let imagery = imagery.cloned().unwrap_or_default();
            AlertContent {
                title: format!(":rotating_light: {name} is LIVE! :rotating_light:"),
                body: "Streamer is currently live and ripe for sniping :relaxed:".to_string(),
                link,
                thumbnail_url: imagery.thumbnail_url,
                image_url: imagery.image_url,
            }
        }
    }
}
