//! Hedging-phrase analysis of generated answers.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const HIGH_PHRASES: &[&str] = &[
    "highly recommend",
    "strongly suggest",
    "definitely",
    "certainly",
    "confident",
];
const MEDIUM_PHRASES: &[&str] = &[
    "likely",
    "probably",
    "good option",
    "should consider",
    "recommended",
];
const LOW_PHRASES: &[&str] = &[
    "might",
    "could",
    "uncertain",
    "limited data",
    "not sure",
    "maybe",
];

static STATISTICS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\.?\d*\s*(%|runs|wickets|average|strike rate)")
        .expect("statistics pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

/// Number of distinct phrases of each level present in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhraseCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceIndicators {
    pub phrase_counts: PhraseCounts,
    pub overall_confidence: ConfidenceLevel,
    pub response_length: usize,
    pub contains_statistics: bool,
}

fn count_present(haystack: &str, phrases: &[&str]) -> usize {
    phrases.iter().filter(|p| haystack.contains(*p)).count()
}

impl ConfidenceIndicators {
    pub fn extract(response: &str) -> Self {
        let lower = response.to_lowercase();
        let phrase_counts = PhraseCounts {
            high: count_present(&lower, HIGH_PHRASES),
            medium: count_present(&lower, MEDIUM_PHRASES),
            low: count_present(&lower, LOW_PHRASES),
        };

        let overall_confidence = if phrase_counts.high > phrase_counts.medium
            && phrase_counts.high > phrase_counts.low
        {
            ConfidenceLevel::High
        } else if phrase_counts.medium > phrase_counts.low {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        Self {
            phrase_counts,
            overall_confidence,
            response_length: response.chars().count(),
            contains_statistics: STATISTICS.is_match(&lower),
        }
    }
}
