//! Ordered keyword rules: query classification and live-fetch triggers.
//!
//! Every check is a case-insensitive substring test against the query, and
//! rules are evaluated top to bottom.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    PlayerQuery,
    MatchQuery,
    TeamQuery,
    StrategyQuery,
    GeneralQuery,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayerQuery => "player_query",
            Self::MatchQuery => "match_query",
            Self::TeamQuery => "team_query",
            Self::StrategyQuery => "strategy_query",
            Self::GeneralQuery => "general_query",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First matching row wins; no match means [`QueryType::GeneralQuery`].
pub const CLASSIFICATION_RULES: &[(&[&str], QueryType)] = &[
    (&["player", "batsman", "bowler"], QueryType::PlayerQuery),
    (&["match", "versus", "vs"], QueryType::MatchQuery),
    (&["team", "squad"], QueryType::TeamQuery),
    (&["strategy", "captain", "vice-captain"], QueryType::StrategyQuery),
];

pub const PLAYER_TRIGGER_TERMS: &[&str] = &["player", "batsman", "bowler", "all-rounder", "all rounder"];
pub const MATCHUP_TRIGGER_TERMS: &[&str] = &["match", "versus", "vs", "against", "playing"];

/// Capitalized words that start questions rather than name players.
pub const INTERROGATIVES: &[&str] = &["what", "when", "where", "which", "who", "why", "how"];

pub const IPL_TEAMS: &[&str] = &[
    "Mumbai Indians",
    "Chennai Super Kings",
    "Royal Challengers Bangalore",
    "Kolkata Knight Riders",
    "Delhi Capitals",
    "Punjab Kings",
    "Rajasthan Royals",
    "Sunrisers Hyderabad",
    "Gujarat Titans",
    "Lucknow Super Giants",
];

fn contains_any(query_lower: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| query_lower.contains(t))
}

pub fn classify_query(query: &str) -> QueryType {
    let lower = query.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|(terms, _)| contains_any(&lower, terms))
        .map(|(_, tag)| *tag)
        .unwrap_or(QueryType::GeneralQuery)
}

/// First whitespace token that looks like a proper name: leading uppercase
/// letter, more than three characters, not an interrogative.
pub fn extract_player_candidate(query: &str) -> Option<&str> {
    query.split_whitespace().find(|word| {
        word.chars().next().is_some_and(char::is_uppercase)
            && word.chars().count() > 3
            && !INTERROGATIVES.contains(&word.to_lowercase().as_str())
    })
}

/// The first two teams, in list order, whose full name or last word appears
/// in the (already lowercased) query.
pub fn extract_teams(query_lower: &str) -> (Option<&'static str>, Option<&'static str>) {
    let mut matched = IPL_TEAMS.iter().copied().filter(|team| {
        let full = team.to_lowercase();
        let last = team
            .split_whitespace()
            .last()
            .unwrap_or(*team)
            .to_lowercase();
        query_lower.contains(&full) || query_lower.contains(&last)
    });
    let team1 = matched.next();
    let team2 = matched.next();
    (team1, team2)
}

/// A live fetch the query asks for, in the order its results are fused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicRequest<'q> {
    PlayerStats {
        player: Option<&'q str>,
    },
    Matchup {
        team1: Option<&'static str>,
        team2: Option<&'static str>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    PlayerStats,
    Matchup,
}

const TRIGGER_RULES: &[(&[&str], Trigger)] = &[
    (PLAYER_TRIGGER_TERMS, Trigger::PlayerStats),
    (MATCHUP_TRIGGER_TERMS, Trigger::Matchup),
];

/// Every live fetch this query triggers. Rules are independent, so a query
/// may yield both a player and a matchup request. A matchup request is made
/// even when no team is recognized.
pub fn plan_dynamic_context(query: &str) -> Vec<DynamicRequest<'_>> {
    let lower = query.to_lowercase();
    TRIGGER_RULES
        .iter()
        .filter(|(terms, _)| contains_any(&lower, terms))
        .map(|(_, trigger)| match trigger {
            Trigger::PlayerStats => DynamicRequest::PlayerStats {
                player: extract_player_candidate(query),
            },
            Trigger::Matchup => {
                let (team1, team2) = extract_teams(&lower);
                DynamicRequest::Matchup { team1, team2 }
            }
        })
        .collect()
}
