//! Poster metadata lookup against The Movie Database search API.

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use std::sync::Arc;

const TMDB_SEARCH_URL: &str = "https://api.themoviedb.org/3/search/movie";

#[async_trait]
pub trait PosterLookup: Send + Sync {
    /// Poster path for the best match of `title`, if any.
    async fn poster_for(&self, title: &str) -> Option<String>;
}

/// Used when no API key is configured: movies are saved without posters.
pub struct NoPosterLookup;

#[async_trait]
impl PosterLookup for NoPosterLookup {
    async fn poster_for(&self, _title: &str) -> Option<String> {
        None
    }
}

pub struct TmdbPosterClient {
    client: Client,
    api_key: String,
    search_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    poster_path: Option<String>,
}

impl TmdbPosterClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            search_url: TMDB_SEARCH_URL.to_string(),
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    async fn search(&self, title: &str) -> Result<SearchResponse, reqwest::Error> {
        self.client
            .get(&self.search_url)
            .query(&[("api_key", self.api_key.as_str()), ("query", title)])
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl PosterLookup for TmdbPosterClient {
    async fn poster_for(&self, title: &str) -> Option<String> {
        match self.search(title).await {
            Ok(response) => first_poster(response),
            Err(err) => {
                tracing::warn!(%title, error = %err, "poster lookup failed");
                None
            }
        }
    }
}

fn first_poster(response: SearchResponse) -> Option<String> {
    response
        .results
        .into_iter()
        .next()
        .and_then(|r| r.poster_path)
        .filter(|p| !p.is_empty())
}

/// TMDB client when a key is configured, otherwise a lookup that never finds anything.
pub fn from_api_key(api_key: Option<String>) -> Arc<dyn PosterLookup> {
    match api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Arc::new(TmdbPosterClient::new(key)),
        None => {
            tracing::warn!("THEMOVIEDB_API_KEY not set, poster lookup disabled");
            Arc::new(NoPosterLookup)
        }
    }
}
