//! Tier Ranker
//!
//! Dispatch order is star, then paid, then free; ties by profile id so the
//! same input always produces the same sequence.

use refdir_common::db::PartnerProfile;

/// Drop non-active partners and sort the rest into dispatch order
pub fn rank_partners(candidates: Vec<PartnerProfile>) -> Vec<PartnerProfile> {
    let mut ranked: Vec<PartnerProfile> =
        candidates.into_iter().filter(|p| p.is_active()).collect();
    ranked.sort_by(|a, b| {
        a.tier
            .rank()
            .cmp(&b.tier.rank())
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdir_common::db::{PartnerStatus, Tier};

    fn partner(id: &str, tier: Tier, status: PartnerStatus) -> PartnerProfile {
        PartnerProfile {
            id: id.to_string(),
            user_id: format!("user-{}", id),
            name: id.to_uppercase(),
            status,
            tier,
            discussion_message_id: Some(1),
            channel_post_id: Some(1),
            category_ids: Vec::new(),
            profession: None,
            city: None,
            phone: None,
            tg_channel: None,
            website: None,
            youtube: None,
            rutube: None,
            dzen: None,
            vk_video: None,
            tg_video: None,
            self_description: None,
            agency_name: None,
            agency_description: None,
            office_address: None,
            photo_url: None,
        }
    }

    fn ids(ranked: &[PartnerProfile]) -> Vec<&str> {
        ranked.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_tier_order_then_id() {
        let ranked = rank_partners(vec![
            partner("f2", Tier::Free, PartnerStatus::Active),
            partner("p1", Tier::Paid, PartnerStatus::Active),
            partner("f1", Tier::Free, PartnerStatus::Active),
            partner("s9", Tier::Star, PartnerStatus::Active),
            partner("s1", Tier::Star, PartnerStatus::Active),
        ]);
        assert_eq!(ids(&ranked), vec!["s1", "s9", "p1", "f1", "f2"]);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].tier.rank() <= pair[1].tier.rank()));
    }

    #[test]
    fn test_inactive_and_archived_dropped() {
        let ranked = rank_partners(vec![
            partner("a", Tier::Star, PartnerStatus::Inactive),
            partner("b", Tier::Paid, PartnerStatus::Archived),
            partner("c", Tier::Free, PartnerStatus::Active),
        ]);
        assert_eq!(ids(&ranked), vec!["c"]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let make = || {
            vec![
                partner("b", Tier::Paid, PartnerStatus::Active),
                partner("a", Tier::Paid, PartnerStatus::Active),
                partner("c", Tier::Star, PartnerStatus::Active),
            ]
        };
        let mut reversed = make();
        reversed.reverse();
        assert_eq!(ids(&rank_partners(make())), ids(&rank_partners(reversed)));
    }

    #[test]
    fn test_no_active_partners() {
        assert!(rank_partners(vec![partner("x", Tier::Star, PartnerStatus::Inactive)]).is_empty());
    }
}
