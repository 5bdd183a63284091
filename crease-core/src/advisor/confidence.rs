//! Heuristic confidence score for an answer.

const BASE_SCORE: f64 = 0.5;
const DYNAMIC_BOOST: f64 = 0.2;
const STATIC_BOOST: f64 = 0.15;
const LENGTH_BOOST: f64 = 0.1;
const LENGTH_THRESHOLD: usize = 200;
const TERM_BOOST: f64 = 0.02;
const TERM_BOOST_CAP: f64 = 0.1;

/// Domain terms; each counts at most once however often it appears.
pub const DOMAIN_TERMS: &[&str] = &[
    "ipl", "cricket", "fantasy", "player", "team", "match", "runs", "wickets",
];

/// Score in `[0, 1]` from how much context backed the answer and how
/// substantial and on-topic the answer reads.
pub fn confidence_score(dynamic_count: usize, static_count: usize, response: &str) -> f64 {
    let mut score = BASE_SCORE;
    if dynamic_count > 0 {
        score += DYNAMIC_BOOST;
    }
    if static_count > 0 {
        score += STATIC_BOOST;
    }
    if response.chars().count() > LENGTH_THRESHOLD {
        score += LENGTH_BOOST;
    }

    let lower = response.to_lowercase();
    let terms = DOMAIN_TERMS.iter().filter(|t| lower.contains(*t)).count();
    score += (terms as f64 * TERM_BOOST).min(TERM_BOOST_CAP);

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn bare_answer_scores_base() {
        assert!(close(confidence_score(0, 0, "Pick him."), 0.5));
    }

    #[test]
    fn context_boosts_add_up() {
        assert!(close(confidence_score(1, 0, "ok"), 0.7));
        assert!(close(confidence_score(0, 3, "ok"), 0.65));
        assert!(close(confidence_score(2, 3, "ok"), 0.85));
    }

    #[test]
    fn long_answers_get_length_boost() {
        let long = "x".repeat(201);
        assert!(close(confidence_score(0, 0, &long), 0.6));
        let exactly = "x".repeat(200);
        assert!(close(confidence_score(0, 0, &exactly), 0.5));
    }

    #[test]
    fn terms_count_once_each() {
        // "match" and "runs", each repeated.
        let response = "MATCH match match, runs runs";
        assert!(close(confidence_score(0, 0, response), 0.54));
    }

    #[test]
    fn term_bonus_is_capped() {
        let response = "ipl cricket fantasy player team match runs wickets";
        assert!(close(confidence_score(0, 0, response), 0.6));
    }

    #[test]
    fn all_boosts_clamp_to_one() {
        let response = "IPL cricket fantasy player team match runs wickets. ".repeat(6);
        assert!(response.chars().count() > 200);
        let score = confidence_score(2, 3, &response);
        assert!(close(score, 1.0), "got {score}");
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let long = "team ".repeat(60);
        for dynamic in 0..3 {
            for stat in 0..3 {
                for response in ["", "short", long.as_str()] {
                    let s = confidence_score(dynamic, stat, response);
                    assert!((0.0..=1.0).contains(&s));
                }
            }
        }
    }
}
