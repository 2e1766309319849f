//! # Action Policy Engine
//! Pure, testable logic that maps `(reason, offense history)` → recommended
//! `ActionSet`. No I/O. The moderator can override every flag before
//! confirmation; this table only supplies the defaults.

use crate::report::{ActionSet, Category, Modifier, ReportReason};

/// Repeat-offender threshold for `Suspicious Link`: at this many prior
/// confirmed offenses a ban is recommended instead of probation.
const LINK_BAN_OFFENSES: u32 = 2;

/// Deterministic category-first dispatch; modifiers refine the category.
pub fn recommend(reason: &ReportReason, offense_count: u32) -> ActionSet {
    let mut actions = ActionSet::default();

    match reason.category {
        Category::Blackmail => {
            let explicit = reason.has_modifier(Modifier::ExplicitContent);
            let threat = reason.has_modifier(Modifier::ThreatPhysicalHarm);
            let sensitive = reason.has_modifier(Modifier::PersonalSensitiveInfo);
            if explicit || threat || sensitive {
                actions.remove_post = true;
            }
            if threat || sensitive {
                actions.ban_user = true;
            }
            if threat {
                actions.report_to_platform = true;
            }
        }
        Category::InvestmentScam => {
            actions.remove_post = true;
            actions.ban_user = true;
            if reason.has_modifier(Modifier::AssetsSent)
                || reason.has_modifier(Modifier::SuspicionOfImpersonation)
            {
                actions.report_to_platform = true;
            }
        }
        Category::SuspiciousLink => {
            actions.remove_post = true;
            if offense_count >= LINK_BAN_OFFENSES {
                actions.ban_user = true;
            } else {
                actions.place_on_probation = true;
            }
        }
        Category::ImminentDanger => {
            actions.remove_post = true;
            actions.ban_user = true;
            actions.report_to_platform = true;
        }
        Category::Other => {}
    }

    actions
}
