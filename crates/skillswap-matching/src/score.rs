use std::collections::HashSet;

use skillswap_types::models::UserProfile;

/// Compatibility score between two profiles, as an integer percentage.
///
/// Counts how many of each side's needs the other side can teach, over the
/// total number of needs on both sides. Summing both directions makes the
/// score symmetric: `compatibility_score(a, b) == compatibility_score(b, a)`.
/// When neither profile lists any needs there is nothing to meet and the
/// score is 0.
pub fn compatibility_score(a: &UserProfile, b: &UserProfile) -> u8 {
    let a_skills: HashSet<&str> = a.skills.iter().map(String::as_str).collect();
    let b_skills: HashSet<&str> = b.skills.iter().map(String::as_str).collect();

    let a_needs_met_by_b = a
        .needs
        .iter()
        .filter(|need| b_skills.contains(need.as_str()))
        .count();
    let b_needs_met_by_a = b
        .needs
        .iter()
        .filter(|need| a_skills.contains(need.as_str()))
        .count();

    let total_needs = a.needs.len() + b.needs.len();
    if total_needs == 0 {
        return 0;
    }

    let total_matches = a_needs_met_by_b + b_needs_met_by_a;
    ((total_matches as f64 / total_needs as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::test_support::profile;

    #[test]
    fn perfect_mutual_match_scores_100() {
        let alice = profile(1, &["math"], &["art"]);
        let bob = profile(2, &["art"], &["math"]);
        assert_eq!(compatibility_score(&alice, &bob), 100);
    }

    #[test]
    fn one_sided_match_scores_half() {
        // Alice needs math and art; Bob teaches math and needs nothing.
        // One of two total needs is met.
        let alice = profile(1, &[], &["math", "art"]);
        let bob = profile(2, &["math"], &[]);
        assert_eq!(compatibility_score(&alice, &bob), 50);
    }

    #[test]
    fn no_needs_on_either_side_scores_zero() {
        let a = profile(1, &["math", "music"], &[]);
        let b = profile(2, &["art"], &[]);
        assert_eq!(compatibility_score(&a, &b), 0);
    }

    #[test]
    fn symmetric_for_arbitrary_profiles() {
        let a = profile(1, &["rust", "piano"], &["sketching", "french"]);
        let b = profile(2, &["french"], &["rust", "go"]);
        assert_eq!(compatibility_score(&a, &b), compatibility_score(&b, &a));
    }

    #[test]
    fn score_is_bounded() {
        let a = profile(1, &["x", "y", "z"], &["x", "y", "z"]);
        let b = profile(2, &["x", "y", "z"], &["x", "y", "z"]);
        let s = compatibility_score(&a, &b);
        assert!(s <= 100);
        assert_eq!(s, 100);
    }

    #[test]
    fn unmet_needs_lower_the_score() {
        // Bob meets one of Alice's three needs; Alice meets none of Bob's one.
        let alice = profile(1, &[], &["math", "art", "music"]);
        let bob = profile(2, &["math"], &["chess"]);
        // 1 of 4 total needs met -> 25.
        assert_eq!(compatibility_score(&alice, &bob), 25);
    }
}
