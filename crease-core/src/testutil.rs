//! Deterministic stand-ins for the network-backed collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::embedding::{EmbedError, EmbedFuture, Embedder};
use crate::fetcher::{FetchedItem, Fetcher};
use crate::generator::{Generation, ResponseGenerator};
use crate::provider::ProviderError;

/// Embedder that hashes characters into buckets, with per-text overrides.
pub struct MockEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
    failing: AtomicBool,
    overrides: Mutex<HashMap<String, Vec<f32>>>,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    /// Number of `embed` calls made so far (failed calls included).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Return exactly `vector` whenever `text` is embedded.
    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        self.overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(text.to_string(), vector);
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self
            .overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(text)
        {
            return v.clone();
        }
        let mut v = vec![0.0; self.dimensions];
        if self.dimensions == 0 {
            return v;
        }
        for (i, c) in text.chars().enumerate() {
            let bucket = (c as usize + i) % self.dimensions;
            v[bucket] += 1.0;
        }
        v
    }
}

impl Embedder for MockEmbedder {
    fn embed<'a>(&'a self, texts: &'a [&'a str]) -> EmbedFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(EmbedError::EncodingFailed("mock embedder failure".into()));
            }
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    fn provider_type(&self) -> &str {
        "mock"
    }
}

/// One recorded fetcher call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCall {
    News,
    Injuries,
    PlayerStats(Option<String>),
    Matchup(Option<String>, Option<String>),
}

/// Fetcher returning canned items per kind and recording every call.
#[derive(Default)]
pub struct MockFetcher {
    news: Vec<FetchedItem>,
    injuries: Vec<FetchedItem>,
    player_stats: Vec<FetchedItem>,
    matchups: Vec<FetchedItem>,
    failing: AtomicBool,
    calls: Mutex<Vec<FetchCall>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_news(mut self, items: Vec<FetchedItem>) -> Self {
        self.news = items;
        self
    }

    pub fn with_injuries(mut self, items: Vec<FetchedItem>) -> Self {
        self.injuries = items;
        self
    }

    pub fn with_player_stats(mut self, items: Vec<FetchedItem>) -> Self {
        self.player_stats = items;
        self
    }

    pub fn with_matchups(mut self, items: Vec<FetchedItem>) -> Self {
        self.matchups = items;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many bulk refreshes have hit this fetcher (counted by news calls).
    pub fn refresh_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == FetchCall::News)
            .count()
    }

    fn respond(&self, call: FetchCall, items: &[FetchedItem]) -> Result<Vec<FetchedItem>, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("mock fetcher failure".into()));
        }
        Ok(items.to_vec())
    }
}

/// Build a fetched item with a fixed URL derived from the title.
pub fn item(title: &str, text: &str, published_date: Option<&str>) -> FetchedItem {
    FetchedItem {
        title: title.to_string(),
        url: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
        text: text.to_string(),
        published_date: published_date.map(str::to_string),
    }
}

impl Fetcher for MockFetcher {
    async fn fetch_latest_news(&self) -> Result<Vec<FetchedItem>, ProviderError> {
        self.respond(FetchCall::News, &self.news)
    }

    async fn fetch_injury_reports(&self) -> Result<Vec<FetchedItem>, ProviderError> {
        self.respond(FetchCall::Injuries, &self.injuries)
    }

    async fn fetch_player_stats(&self, player: Option<&str>) -> Result<Vec<FetchedItem>, ProviderError> {
        self.respond(
            FetchCall::PlayerStats(player.map(str::to_string)),
            &self.player_stats,
        )
    }

    async fn fetch_matchup_analysis(
        &self,
        team1: Option<&str>,
        team2: Option<&str>,
    ) -> Result<Vec<FetchedItem>, ProviderError> {
        self.respond(
            FetchCall::Matchup(team1.map(str::to_string), team2.map(str::to_string)),
            &self.matchups,
        )
    }
}

/// Generator that always answers with the same text and remembers the
/// context it was handed.
pub struct MockGenerator {
    response: String,
    failing: AtomicBool,
    contexts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            failing: AtomicBool::new(false),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn last_context(&self) -> Option<String> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl ResponseGenerator for MockGenerator {
    async fn generate(&self, _query: &str, context: &str) -> Result<Generation, ProviderError> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::RateLimit("mock generator failure".into()));
        }
        Ok(Generation::new("mock", self.response.clone(), None))
    }
}
