// tests/policy_matrix.rs
//
// Policy and triage scenarios over the public API: the recommendation
// table, its offense-history branch, and the priority weights.

use moderation_decision_engine::policy::recommend;
use moderation_decision_engine::report::{Action, Category, Modifier, ReportReason};
use moderation_decision_engine::triage::{self, TriageError};

fn reason(category: Category, mods: &[Modifier]) -> ReportReason {
    mods.iter()
        .fold(ReportReason::new(category), |r, m| r.with_modifier(*m))
}

#[test]
fn investment_scam_with_assets_sent_gets_the_full_set() {
    let r = reason(Category::InvestmentScam, &[Modifier::AssetsSent]);
    let actions = recommend(&r, 0);
    assert_eq!(
        actions.selected(),
        vec![Action::BanUser, Action::RemovePost, Action::ReportToPlatform]
    );
}

#[test]
fn suspicious_link_branches_on_offense_count() {
    let r = reason(Category::SuspiciousLink, &[]);
    assert_eq!(
        recommend(&r, 1).selected(),
        vec![Action::RemovePost, Action::PlaceOnProbation]
    );
    assert_eq!(
        recommend(&r, 2).selected(),
        vec![Action::BanUser, Action::RemovePost]
    );
}

#[test]
fn recommendation_is_a_pure_function() {
    for offense_count in 0..4 {
        for category in Category::ALL {
            let r = reason(category, &[Modifier::ThreatPhysicalHarm]);
            assert_eq!(
                recommend(&r, offense_count),
                recommend(&r, offense_count),
                "same inputs must yield the same action set"
            );
        }
    }
}

#[test]
fn imminent_danger_always_triages_p1() {
    let variants = [
        reason(Category::ImminentDanger, &[]),
        reason(Category::ImminentDanger, &[Modifier::ExplicitContent]),
        reason(
            Category::ImminentDanger,
            &[Modifier::SuspicionOfImpersonation, Modifier::AssetsSent],
        ),
    ];
    for r in variants {
        assert_eq!(triage::priority(&r).unwrap().level(), 1);
    }
}

#[test]
fn priority_takes_the_most_severe_modifier() {
    let r = reason(
        Category::SuspiciousLink,
        &[Modifier::ExplicitContent, Modifier::ThreatPhysicalHarm],
    );
    assert_eq!(triage::priority(&r).unwrap().level(), 1);
}

#[test]
fn other_alone_requires_manual_assignment() {
    let r = reason(Category::Other, &[]);
    assert_eq!(triage::priority(&r), Err(TriageError::Undetermined));
}

#[test]
fn unknown_revision_text_is_a_parse_error_not_a_default() {
    let err = ReportReason::parse("Suspicious Vibes - Bad Aura").unwrap_err();
    assert_eq!(err.0, "Suspicious Vibes");
}
