use crate::domain::value_objects::enums::delivery_modes::DeliveryMode;
use crate::domain::value_objects::notifications::DeliveryAction;

/// Per-community delivery decision for one live event.
///
/// `OptIn` mentions every subscriber and never gates on the owner. `Global`
/// and `Passive` only fire when the community owner is subscribed to the
/// broadcaster.
pub fn decide(
    delivery_mode: DeliveryMode,
    owner_subscribed: bool,
    user_ids: &[String],
) -> DeliveryAction {
    match delivery_mode {
        DeliveryMode::OptIn => DeliveryAction::PostMentions(user_ids.to_vec()),
        DeliveryMode::Global if owner_subscribed => DeliveryAction::PostBroadcast,
        DeliveryMode::Passive if owner_subscribed => DeliveryAction::PostPlain,
        DeliveryMode::Global | DeliveryMode::Passive => DeliveryAction::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn opt_in_mentions_subscribers_regardless_of_owner() {
        let subscribed = users(&["u1", "u2"]);

        let action = decide(DeliveryMode::OptIn, false, &subscribed);
        assert_eq!(action, DeliveryAction::PostMentions(subscribed.clone()));

        let action = decide(DeliveryMode::OptIn, true, &subscribed);
        assert_eq!(action, DeliveryAction::PostMentions(subscribed));
    }

    #[test]
    fn global_skips_when_owner_not_subscribed() {
        let action = decide(DeliveryMode::Global, false, &users(&["u1"]));
        assert_eq!(action, DeliveryAction::Skip);
    }

    #[test]
    fn global_broadcasts_when_owner_subscribed() {
        let action = decide(DeliveryMode::Global, true, &users(&["u1"]));
        assert_eq!(action, DeliveryAction::PostBroadcast);
    }

    #[test]
    fn passive_skips_when_owner_not_subscribed() {
        let action = decide(DeliveryMode::Passive, false, &users(&["u1"]));
        assert_eq!(action, DeliveryAction::Skip);
    }

    #[test]
    fn passive_posts_plain_when_owner_subscribed() {
        let action = decide(DeliveryMode::Passive, true, &users(&["u1"]));
        assert_eq!(action, DeliveryAction::PostPlain);
    }
}
