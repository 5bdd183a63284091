pub mod confidence;
pub mod rules;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::AdvisorConfig;
use crate::fetcher::{FetchedItem, Fetcher};
use crate::generator::ResponseGenerator;
use crate::memory::{SourceType, VectorStore, VectorStoreError};
use crate::provider::ProviderError;

pub use confidence::confidence_score;
pub use rules::{DynamicRequest, QueryType, classify_query, plan_dynamic_context};

/// Errors surfaced by refresh and advice requests.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("vector store: {0}")]
    Store(#[from] VectorStoreError),
    #[error("fetch failed: {0}")]
    Fetch(ProviderError),
    #[error("generation failed: {0}")]
    Generate(ProviderError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub news_count: usize,
    pub injury_reports_count: usize,
    pub player_stats_count: usize,
    pub refresh_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceResult {
    pub response_text: String,
    pub confidence_score: f64,
    pub dynamic_context_count: usize,
    pub static_context_count: usize,
    /// Length of the fused context in characters.
    pub total_context_length: usize,
    pub query_type: QueryType,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct AdvisorSettings {
    /// Maximum age of the last bulk refresh before a query forces a new one.
    pub staleness_window: Duration,
    /// Static documents retrieved per query.
    pub search_limit: usize,
}

impl AdvisorSettings {
    pub fn from_config(config: &AdvisorConfig) -> Self {
        let hours = i64::try_from(config.staleness_hours).unwrap_or(i64::MAX);
        Self {
            staleness_window: Duration::try_hours(hours).unwrap_or(Duration::MAX),
            search_limit: config.search_limit,
        }
    }
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self::from_config(&AdvisorConfig::default())
    }
}

/// True when nothing has been refreshed yet or the last refresh is older
/// than `window`.
pub fn needs_refresh(now: DateTime<Utc>, last_refresh: Option<DateTime<Utc>>, window: Duration) -> bool {
    match last_refresh {
        None => true,
        Some(last) => now - last > window,
    }
}

fn date_or_unknown(item: &FetchedItem) -> &str {
    item.published_date.as_deref().unwrap_or("unknown")
}

/// Answers fantasy-cricket questions from live fetches plus the vector store.
pub struct Advisor<F, G> {
    fetcher: F,
    generator: G,
    store: Arc<VectorStore>,
    settings: AdvisorSettings,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
}

impl<F: Fetcher, G: ResponseGenerator> Advisor<F, G> {
    pub fn new(fetcher: F, generator: G, store: Arc<VectorStore>, settings: AdvisorSettings) -> Self {
        Self {
            fetcher,
            generator,
            store,
            settings,
            last_refresh: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.lock().await
    }

    /// Pull news, injury reports and general player stats into the store.
    pub async fn refresh_static_data(&self) -> Result<RefreshSummary, AdvisorError> {
        let mut last_refresh = self.last_refresh.lock().await;
        let (summary, finished) = self.run_refresh().await?;
        *last_refresh = Some(finished);
        Ok(summary)
    }

    async fn run_refresh(&self) -> Result<(RefreshSummary, DateTime<Utc>), AdvisorError> {
        log::info!("refreshing static data");

        let news = self
            .fetcher
            .fetch_latest_news()
            .await
            .map_err(AdvisorError::Fetch)?;
        for item in &news {
            let text = format!("NEWS: {}\nDate: {}\n{}", item.title, date_or_unknown(item), item.text);
            self.store
                .add_document(&text, SourceType::News, item.published_date.as_deref())
                .await?;
        }

        let injuries = self
            .fetcher
            .fetch_injury_reports()
            .await
            .map_err(AdvisorError::Fetch)?;
        for item in &injuries {
            let text = format!(
                "INJURY REPORT: {}\nDate: {}\n{}",
                item.title,
                date_or_unknown(item),
                item.text
            );
            self.store
                .add_document(&text, SourceType::Injury, item.published_date.as_deref())
                .await?;
        }

        let stats = self
            .fetcher
            .fetch_player_stats(None)
            .await
            .map_err(AdvisorError::Fetch)?;
        for item in &stats {
            let text = format!("PLAYER STATS: {}\n{}", item.title, item.text);
            self.store.add_document(&text, SourceType::Stats, None).await?;
        }

        let finished = Utc::now();
        log::info!(
            "static data refresh complete: {} news, {} injury reports, {} player stats",
            news.len(),
            injuries.len(),
            stats.len()
        );
        let summary = RefreshSummary {
            news_count: news.len(),
            injury_reports_count: injuries.len(),
            player_stats_count: stats.len(),
            refresh_time: finished.to_rfc3339(),
        };
        Ok((summary, finished))
    }

    /// Refresh inline if the static data is stale. Holding the lock across
    /// the refresh keeps concurrent queries from refreshing twice.
    async fn ensure_fresh(&self) -> Result<(), AdvisorError> {
        let mut last_refresh = self.last_refresh.lock().await;
        if needs_refresh(Utc::now(), *last_refresh, self.settings.staleness_window) {
            let (_, finished) = self.run_refresh().await?;
            *last_refresh = Some(finished);
        }
        Ok(())
    }

    async fn fetch_dynamic(&self, request: &DynamicRequest<'_>) -> Result<Vec<String>, AdvisorError> {
        match *request {
            DynamicRequest::PlayerStats { player } => {
                let items = self
                    .fetcher
                    .fetch_player_stats(player)
                    .await
                    .map_err(AdvisorError::Fetch)?;
                log::debug!("player {:?}: {} live stats", player, items.len());
                Ok(items
                    .iter()
                    .map(|i| format!("LIVE PLAYER STATS: {}\n{}", i.title, i.text))
                    .collect())
            }
            DynamicRequest::Matchup { team1, team2 } => {
                let items = self
                    .fetcher
                    .fetch_matchup_analysis(team1, team2)
                    .await
                    .map_err(AdvisorError::Fetch)?;
                log::debug!("matchup {:?} vs {:?}: {} analyses", team1, team2, items.len());
                Ok(items
                    .iter()
                    .map(|i| format!("LIVE MATCHUP ANALYSIS: {}\n{}", i.title, i.text))
                    .collect())
            }
        }
    }

    /// Answer `query` from live context (player, then matchup) followed by
    /// the store's nearest documents.
    pub async fn get_advice(&self, query: &str) -> Result<AdviceResult, AdvisorError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.ensure_fresh().await?;

        let plan = plan_dynamic_context(query);
        let dynamic = try_join_all(plan.iter().map(|request| self.fetch_dynamic(request)));
        let search = async {
            self.store
                .search(query, self.settings.search_limit)
                .await
                .map_err(AdvisorError::from)
        };
        let (dynamic, results) = tokio::try_join!(dynamic, search)?;

        let dynamic_context = dynamic.concat();
        let static_context: Vec<String> = results.into_iter().map(|r| r.text).collect();
        let context = dynamic_context
            .iter()
            .chain(&static_context)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n");

        let generation = self
            .generator
            .generate(query, &context)
            .await
            .map_err(AdvisorError::Generate)?;
        log::debug!(
            "session {session_id}: {:?} confidence, statistics: {}",
            generation.confidence_indicators.overall_confidence,
            generation.confidence_indicators.contains_statistics
        );

        let confidence = confidence_score(
            dynamic_context.len(),
            static_context.len(),
            &generation.response_text,
        );

        Ok(AdviceResult {
            response_text: generation.response_text,
            confidence_score: confidence,
            dynamic_context_count: dynamic_context.len(),
            static_context_count: static_context.len(),
            total_context_length: context.chars().count(),
            query_type: classify_query(query),
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FetchCall, MockEmbedder, MockFetcher, MockGenerator, item};

    fn store() -> Arc<VectorStore> {
        Arc::new(VectorStore::open_in_memory(Arc::new(MockEmbedder::new(16)), 16).unwrap())
    }

    fn stocked_fetcher() -> MockFetcher {
        MockFetcher::new()
            .with_news(vec![
                item("RCB win thriller", "Kohli 82* off 50", Some("2025-04-09")),
                item("Rain threat in Chennai", "Forecast shows showers", None),
            ])
            .with_injuries(vec![item("Bumrah ruled out", "Back spasm", Some("2025-04-08"))])
            .with_player_stats(vec![item("Gill season numbers", "410 runs at 51.2", None)])
            .with_matchups(vec![item("MI vs DC preview", "MI lead 18-15", None)])
    }

    fn advisor(fetcher: MockFetcher, response: &str) -> Advisor<MockFetcher, MockGenerator> {
        Advisor::new(
            fetcher,
            MockGenerator::new(response),
            store(),
            AdvisorSettings::default(),
        )
    }

    // ── Staleness ────────────────────────────────────────────────────────

    #[test]
    fn never_refreshed_is_stale() {
        assert!(needs_refresh(Utc::now(), None, Duration::hours(12)));
    }

    #[test]
    fn staleness_is_strictly_older_than_window() {
        let now = Utc::now();
        let window = Duration::hours(12);
        assert!(!needs_refresh(now, Some(now - Duration::hours(1)), window));
        assert!(!needs_refresh(now, Some(now - window), window));
        assert!(needs_refresh(now, Some(now - Duration::hours(13)), window));
    }

    #[test]
    fn settings_follow_config() {
        let settings = AdvisorSettings::from_config(&AdvisorConfig {
            staleness_hours: 6,
            search_limit: 3,
        });
        assert_eq!(settings.staleness_window, Duration::hours(6));
        assert_eq!(settings.search_limit, 3);
    }

    // ── Refresh ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn refresh_stores_tagged_envelopes() {
        let advisor = advisor(stocked_fetcher(), "ok");
        let summary = advisor.refresh_static_data().await.unwrap();

        assert_eq!(summary.news_count, 2);
        assert_eq!(summary.injury_reports_count, 1);
        assert_eq!(summary.player_stats_count, 1);
        assert!(DateTime::parse_from_rfc3339(&summary.refresh_time).is_ok());
        assert!(advisor.last_refresh().await.is_some());

        let stats = advisor.store().get_stats().await;
        assert_eq!(stats.total_documents, 4);
        assert_eq!(stats.source_type_counts[&SourceType::News], 2);
        assert_eq!(stats.source_type_counts[&SourceType::Injury], 1);
        assert_eq!(stats.source_type_counts[&SourceType::Stats], 1);

        let texts: Vec<String> = advisor
            .store()
            .search("anything", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert!(texts.contains(&"NEWS: RCB win thriller\nDate: 2025-04-09\nKohli 82* off 50".to_string()));
        assert!(texts.contains(&"NEWS: Rain threat in Chennai\nDate: unknown\nForecast shows showers".to_string()));
        assert!(texts.contains(&"INJURY REPORT: Bumrah ruled out\nDate: 2025-04-08\nBack spasm".to_string()));
        assert!(texts.contains(&"PLAYER STATS: Gill season numbers\n410 runs at 51.2".to_string()));
    }

    #[tokio::test]
    async fn refresh_keeps_published_date_as_timestamp() {
        let advisor = advisor(stocked_fetcher(), "ok");
        advisor.refresh_static_data().await.unwrap();
        let results = advisor.store().search("x", 10).await.unwrap();
        let injury = results
            .iter()
            .find(|r| r.source_type == SourceType::Injury)
            .unwrap();
        assert_eq!(injury.timestamp.as_deref(), Some("2025-04-08"));
    }

    #[tokio::test]
    async fn repeated_refresh_deduplicates() {
        let advisor = advisor(stocked_fetcher(), "ok");
        advisor.refresh_static_data().await.unwrap();
        let second = advisor.refresh_static_data().await.unwrap();
        assert_eq!(second.news_count, 2);
        assert_eq!(advisor.store().get_stats().await.total_documents, 4);
    }

    #[tokio::test]
    async fn failed_refresh_does_not_mark_data_fresh() {
        let fetcher = stocked_fetcher();
        fetcher.set_failing(true);
        let advisor = advisor(fetcher, "ok");
        let err = advisor.refresh_static_data().await.unwrap_err();
        assert!(matches!(err, AdvisorError::Fetch(ProviderError::Network(_))));
        assert!(advisor.last_refresh().await.is_none());
    }

    // ── Advice ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_query_refreshes_and_later_ones_do_not() {
        let advisor = advisor(stocked_fetcher(), "ok");
        advisor.get_advice("Any news?").await.unwrap();
        advisor.get_advice("Any other news?").await.unwrap();
        assert_eq!(advisor.fetcher.refresh_count(), 1);
    }

    #[tokio::test]
    async fn stale_data_is_refreshed_before_answering() {
        let advisor = Advisor::new(
            stocked_fetcher(),
            MockGenerator::new("ok"),
            store(),
            AdvisorSettings {
                staleness_window: Duration::hours(-1),
                search_limit: 5,
            },
        );
        advisor.get_advice("Any news?").await.unwrap();
        advisor.get_advice("Any news?").await.unwrap();
        assert_eq!(advisor.fetcher.refresh_count(), 2);
    }

    #[tokio::test]
    async fn dynamic_context_precedes_static_in_fixed_order() {
        let advisor = advisor(stocked_fetcher(), "ok");
        let result = advisor
            .get_advice("Which batsman from Mumbai Indians is playing tonight?")
            .await
            .unwrap();

        assert_eq!(result.dynamic_context_count, 2);
        assert_eq!(result.static_context_count, 4);
        assert_eq!(result.query_type, QueryType::PlayerQuery);

        let context = advisor.generator.last_context().unwrap();
        let blocks: Vec<&str> = context.split("\n\n").collect();
        assert_eq!(blocks[0], "LIVE PLAYER STATS: Gill season numbers\n410 runs at 51.2");
        assert_eq!(blocks[1], "LIVE MATCHUP ANALYSIS: MI vs DC preview\nMI lead 18-15");
        assert_eq!(blocks.len(), 6);
        assert_eq!(result.total_context_length, context.chars().count());

        let calls = advisor.fetcher.calls();
        assert!(calls.contains(&FetchCall::PlayerStats(Some("Mumbai".into()))));
        assert!(calls.contains(&FetchCall::Matchup(Some("Mumbai Indians".into()), None)));
    }

    #[tokio::test]
    async fn untriggered_query_uses_static_context_only() {
        let advisor = advisor(stocked_fetcher(), "ok");
        let result = advisor.get_advice("Any injury news?").await.unwrap();
        assert_eq!(result.dynamic_context_count, 0);
        assert_eq!(result.static_context_count, 4);
        assert_eq!(result.query_type, QueryType::GeneralQuery);
        // Only the refresh touched the fetcher.
        assert_eq!(
            advisor.fetcher.calls(),
            vec![FetchCall::News, FetchCall::Injuries, FetchCall::PlayerStats(None)]
        );
    }

    #[tokio::test]
    async fn empty_sources_give_base_confidence() {
        let advisor = advisor(MockFetcher::new(), "ok");
        let result = advisor.get_advice("Who wins?").await.unwrap();
        assert_eq!(result.static_context_count, 0);
        assert_eq!(result.total_context_length, 0);
        assert!((result.confidence_score - 0.5).abs() < 1e-9);
        assert_eq!(advisor.generator.last_context().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn confidence_reflects_context_and_response() {
        let advisor = advisor(stocked_fetcher(), "Pick the player with the most runs.");
        let result = advisor.get_advice("Best bowler this week?").await.unwrap();
        // base + dynamic + static + two domain terms ("player", "runs")
        assert!((result.confidence_score - 0.89).abs() < 1e-9, "got {}", result.confidence_score);
    }

    #[tokio::test]
    async fn each_query_gets_a_fresh_session() {
        let advisor = advisor(stocked_fetcher(), "ok");
        let a = advisor.get_advice("q1").await.unwrap();
        let b = advisor.get_advice("q2").await.unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert!(uuid::Uuid::parse_str(&a.session_id).is_ok());
    }

    #[tokio::test]
    async fn generator_failure_is_reported() {
        let advisor = advisor(stocked_fetcher(), "ok");
        advisor.generator.set_failing(true);
        let err = advisor.get_advice("Any news?").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Generate(ProviderError::RateLimit(_))));
    }

    #[tokio::test]
    async fn live_fetch_failure_fails_the_query() {
        let advisor = advisor(stocked_fetcher(), "ok");
        advisor.refresh_static_data().await.unwrap();
        advisor.fetcher.set_failing(true);
        let err = advisor.get_advice("Who is the best bowler?").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Fetch(_)));
    }
}
