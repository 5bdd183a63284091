pub mod exa;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderError;

/// One article or page returned by a live search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedItem {
    pub title: String,
    pub url: String,
    pub text: String,
    pub published_date: Option<String>,
}

/// Source of fresh cricket content, both bulk (refresh) and entity-specific.
///
/// Results may be empty and carry no ordering guarantee.
pub trait Fetcher: Send + Sync {
    fn fetch_latest_news(&self)
    -> impl Future<Output = Result<Vec<FetchedItem>, ProviderError>> + Send;

    fn fetch_injury_reports(
        &self,
    ) -> impl Future<Output = Result<Vec<FetchedItem>, ProviderError>> + Send;

    /// Stats for one player, or general player stats when `player` is `None`.
    fn fetch_player_stats(
        &self,
        player: Option<&str>,
    ) -> impl Future<Output = Result<Vec<FetchedItem>, ProviderError>> + Send;

    /// Head-to-head analysis, or a generic matchup search unless both teams
    /// are known.
    fn fetch_matchup_analysis(
        &self,
        team1: Option<&str>,
        team2: Option<&str>,
    ) -> impl Future<Output = Result<Vec<FetchedItem>, ProviderError>> + Send;
}
