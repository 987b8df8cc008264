use std::collections::HashSet;

use uuid::Uuid;

use skillswap_types::models::UserProfile;

use crate::score::compatibility_score;

/// A candidate annotated with its compatibility score.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub user: &'a UserProfile,
    pub score: u8,
}

/// Rank `candidates` against `reference`, best match first.
///
/// The reference profile itself and every identity it has blocked are
/// excluded, zero-score candidates are dropped, and the result is capped at
/// `max_results`. Equal scores keep their input order (stable sort).
pub fn find_matches<'a>(
    reference: &UserProfile,
    candidates: &'a [UserProfile],
    max_results: usize,
) -> Vec<ScoredCandidate<'a>> {
    let blocked: HashSet<Uuid> = reference.blocked.iter().copied().collect();

    let mut matches: Vec<ScoredCandidate<'a>> = candidates
        .iter()
        .filter(|user| user.id != reference.id && !blocked.contains(&user.id))
        .map(|user| ScoredCandidate {
            user,
            score: compatibility_score(reference, user),
        })
        .filter(|m| m.score > 0)
        .collect();

    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(max_results);
    matches
}

/// Candidates who can teach `topic`, sorted by overall compatibility.
///
/// Unlike [`find_matches`] this keeps zero-score entries (the topic skill is
/// the relevance signal here) and applies no result cap.
pub fn topic_recommendations<'a>(
    reference: &UserProfile,
    candidates: &'a [UserProfile],
    topic: &str,
) -> Vec<ScoredCandidate<'a>> {
    let blocked: HashSet<Uuid> = reference.blocked.iter().copied().collect();

    let mut recommendations: Vec<ScoredCandidate<'a>> = candidates
        .iter()
        .filter(|user| user.id != reference.id && !blocked.contains(&user.id))
        .filter(|user| user.skills.iter().any(|skill| skill == topic))
        .map(|user| ScoredCandidate {
            user,
            score: compatibility_score(reference, user),
        })
        .collect();

    recommendations.sort_by(|a, b| b.score.cmp(&a.score));
    recommendations
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use skillswap_types::models::{AccountStatus, Role, Streak, UserProfile};
    use uuid::Uuid;

    pub fn profile(n: u128, skills: &[&str], needs: &[&str]) -> UserProfile {
        UserProfile {
            id: Uuid::from_u128(n),
            email: format!("user{n}@example.com"),
            display_name: format!("User {n}"),
            photo_url: None,
            bio: String::new(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            needs: needs.iter().map(|s| s.to_string()).collect(),
            blocked: Vec::new(),
            role: Role::User,
            status: AccountStatus::Active,
            streak: Streak::default(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::profile;
    use super::*;

    #[test]
    fn excludes_self_and_blocked() {
        let mut me = profile(1, &["math"], &["art"]);
        me.blocked.push(Uuid::from_u128(3));

        let candidates = vec![
            profile(1, &["art"], &["math"]), // same identity as reference
            profile(2, &["art"], &["math"]),
            profile(3, &["art"], &["math"]), // blocked
        ];

        let matches = find_matches(&me, &candidates, 10);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].user.id, Uuid::from_u128(2));
    }

    #[test]
    fn drops_zero_scores_and_sorts_descending() {
        let me = profile(1, &["math"], &["art", "music"]);
        let candidates = vec![
            profile(2, &["chess"], &[]),           // score 0, dropped
            profile(3, &["art"], &[]),             // meets 1 of 2 -> 50
            profile(4, &["art", "music"], &["math"]), // 3 of 3 -> 100
        ];

        let matches = find_matches(&me, &candidates, 10);
        let ids: Vec<Uuid> = matches.iter().map(|m| m.user.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(4), Uuid::from_u128(3)]);
        assert!(matches.iter().all(|m| m.score > 0));
        assert_eq!(matches[0].score, 100);
        assert_eq!(matches[1].score, 50);
    }

    #[test]
    fn ties_keep_input_order() {
        let me = profile(1, &[], &["math", "art"]);
        // Both meet exactly one need -> equal scores.
        let candidates = vec![profile(2, &["math"], &[]), profile(3, &["art"], &[])];

        let matches = find_matches(&me, &candidates, 10);
        let ids: Vec<Uuid> = matches.iter().map(|m| m.user.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);
    }

    #[test]
    fn caps_at_max_results() {
        let me = profile(1, &[], &["math"]);
        let candidates: Vec<_> = (2..12).map(|n| profile(n, &["math"], &[])).collect();

        let matches = find_matches(&me, &candidates, 3);
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn topic_recommendations_filter_by_skill() {
        let mut me = profile(1, &["math"], &["art"]);
        me.blocked.push(Uuid::from_u128(5));

        let candidates = vec![
            profile(2, &["art", "music"], &["math"]), // teaches art, mutual -> 100
            profile(3, &["art"], &[]),                // teaches art, 50
            profile(4, &["music"], &["math"]),        // does not teach art
            profile(5, &["art"], &["math"]),          // blocked
        ];

        let recs = topic_recommendations(&me, &candidates, "art");
        let ids: Vec<Uuid> = recs.iter().map(|m| m.user.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);
    }

    #[test]
    fn topic_recommendations_keep_zero_scores() {
        let me = profile(1, &[], &[]);
        let candidates = vec![profile(2, &["art"], &[])];

        // No needs anywhere -> score 0, but the teacher of the topic is
        // still recommended.
        let recs = topic_recommendations(&me, &candidates, "art");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].score, 0);
    }
}
