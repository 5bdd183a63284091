use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::provider::{ProviderError, build_client, endpoint_url, map_error_status};

use super::{FetchedItem, Fetcher};

const NEWS_QUERY: &str = "IPL cricket latest news updates fantasy league";
const INJURY_QUERY: &str = "IPL cricket player injuries updates team changes";
const GENERAL_STATS_QUERY: &str = "IPL cricket player statistics performance";
const GENERAL_MATCHUP_QUERY: &str = "IPL cricket matchup analysis team performance comparison";

/// Parameters for one search call.
#[derive(Debug, Clone, PartialEq)]
struct SearchRequest {
    query: String,
    num_results: usize,
    max_characters: usize,
    /// Only include pages published within this many days.
    window_days: Option<i64>,
    livecrawl: bool,
}

impl SearchRequest {
    fn news() -> Self {
        Self {
            query: NEWS_QUERY.into(),
            num_results: 10,
            max_characters: 5000,
            window_days: Some(3),
            livecrawl: false,
        }
    }

    fn injuries() -> Self {
        Self {
            query: INJURY_QUERY.into(),
            num_results: 5,
            max_characters: 3000,
            window_days: Some(7),
            livecrawl: true,
        }
    }

    fn player_stats(player: Option<&str>) -> Self {
        let query = match player {
            Some(name) => format!("IPL cricket {name} statistics performance"),
            None => GENERAL_STATS_QUERY.to_string(),
        };
        Self {
            query,
            num_results: 5,
            max_characters: 5000,
            window_days: None,
            livecrawl: true,
        }
    }

    fn matchup(team1: Option<&str>, team2: Option<&str>) -> Self {
        let query = match (team1, team2) {
            (Some(t1), Some(t2)) => format!("IPL cricket {t1} vs {t2} matchup analysis prediction"),
            _ => GENERAL_MATCHUP_QUERY.to_string(),
        };
        Self {
            query,
            num_results: 3,
            max_characters: 4000,
            window_days: None,
            livecrawl: true,
        }
    }

    fn to_body(&self, now: DateTime<Utc>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "query": self.query,
            "type": "auto",
            "numResults": self.num_results,
            "contents": {
                "text": { "maxCharacters": self.max_characters },
            },
        });
        if let Some(days) = self.window_days {
            let start = now - Duration::days(days);
            body["startPublishedDate"] = serde_json::json!(start.format("%Y-%m-%d").to_string());
            body["endPublishedDate"] = serde_json::json!(now.format("%Y-%m-%d").to_string());
        }
        if self.livecrawl {
            body["contents"]["livecrawl"] = serde_json::json!("always");
        }
        body
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

impl From<SearchHit> for FetchedItem {
    fn from(hit: SearchHit) -> Self {
        Self {
            title: hit.title.unwrap_or_default(),
            url: hit.url,
            text: hit.text.unwrap_or_default(),
            published_date: hit.published_date,
        }
    }
}

fn parse_results(body: &str) -> Result<Vec<FetchedItem>, ProviderError> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("invalid search JSON: {e}")))?;
    Ok(parsed.results.into_iter().map(FetchedItem::from).collect())
}

/// Exa search client (`POST {endpoint}/search`).
pub struct ExaFetcher {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl ExaFetcher {
    pub fn new(config: &SearchConfig, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config.timeout())?,
            api_key,
            endpoint: config.endpoint.clone(),
        })
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<FetchedItem>, ProviderError> {
        let url = endpoint_url(&self.endpoint, "search");
        let body = request.to_body(Utc::now());

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(map_error_status(status.as_u16(), &text));
        }

        let items = parse_results(&text)?;
        log::debug!("search '{}' returned {} results", request.query, items.len());
        Ok(items)
    }
}

impl Fetcher for ExaFetcher {
    async fn fetch_latest_news(&self) -> Result<Vec<FetchedItem>, ProviderError> {
        self.search(SearchRequest::news()).await
    }

    async fn fetch_injury_reports(&self) -> Result<Vec<FetchedItem>, ProviderError> {
        self.search(SearchRequest::injuries()).await
    }

    async fn fetch_player_stats(&self, player: Option<&str>) -> Result<Vec<FetchedItem>, ProviderError> {
        self.search(SearchRequest::player_stats(player)).await
    }

    async fn fetch_matchup_analysis(
        &self,
        team1: Option<&str>,
        team2: Option<&str>,
    ) -> Result<Vec<FetchedItem>, ProviderError> {
        self.search(SearchRequest::matchup(team1, team2)).await
    }
}
