use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::Deserialize;
use tracing::debug;

use crate::{error::AppResult, models::Movie};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
const PLACEHOLDER_POSTER: &str = "https://placehold.co/300x450?text=No+poster";
const MAX_RESULTS: usize = 10;

pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    language: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        language: String,
        rps: u32,
    ) -> Self {
        // Warn once on app load; search fallback is disabled without a key
        if api_key.trim().is_empty() {
            tracing::warn!("no TMDB_API_KEY provided, remote search fallback disabled");
        }

        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { client, api_key, base_url, language, limiter }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Searches TMDB by title and maps the first results into catalog shape.
    pub async fn search_movies(&self, query: &str) -> AppResult<Vec<Movie>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }

        self.limiter.until_ready().await;

        let url = format!("{}/search/movie", self.base_url.trim_end_matches('/'));
        let resp: SearchResponse = self
            .client
            .get(url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query),
                ("language", self.language.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(query = %query, results = resp.results.len(), "tmdb search");

        Ok(resp.results.into_iter().take(MAX_RESULTS).map(SearchMovie::into_movie).collect())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchMovie>,
}

#[derive(Debug, Deserialize)]
struct SearchMovie {
    id: i64,
    title: String,
    release_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    vote_average: f32,
}

impl SearchMovie {
    fn into_movie(self) -> Movie {
        let year = self
            .release_date
            .as_deref()
            .and_then(|d| d.split('-').next())
            .and_then(|y| y.parse().ok());
        let plot = self
            .overview
            .filter(|o| !o.trim().is_empty())
            .unwrap_or_else(|| "No description available.".to_string());
        let poster = match self.poster_path {
            Some(path) if !path.is_empty() => format!("{IMAGE_BASE}{path}"),
            _ => PLACEHOLDER_POSTER.to_string(),
        };

        Movie {
            id: format!("tmdb_{}", self.id),
            translated_title: Some(self.title.clone()),
            title: self.title,
            year,
            director: "Unknown".to_string(),
            genre: "Various".to_string(),
            actors: "Unknown".to_string(),
            plot,
            poster,
            // halved and rounded to one decimal
            rating: (self.vote_average / 2.0 * 10.0).round() / 10.0,
            duration: Some(crate::models::DEFAULT_DURATION),
            country: Some("us".to_string()),
            language: Some("en".to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use axum::{Json, Router, extract::Query, routing::get};
    use serde_json::{Value, json};

    use super::*;

    /// Serves a canned `/search/movie` response and returns its base URL.
    pub(crate) async fn fake_tmdb(results: Value) -> String {
        let app = Router::new().route(
            "/search/movie",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let results = results.clone();
                async move {
                    assert_eq!(params.get("api_key").map(String::as_str), Some("test-key"));
                    let query = params.get("query").cloned().unwrap_or_default();
                    Json(json!({ "query": query, "results": results }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) fn client(base_url: String, api_key: &str) -> TmdbClient {
        TmdbClient::new(
            reqwest::Client::new(),
            api_key.to_string(),
            base_url,
            "en-US".to_string(),
            50,
        )
    }

    #[tokio::test]
    async fn maps_results_into_movies() {
        let base = fake_tmdb(json!([
            {
                "id": 603,
                "title": "The Matrix",
                "release_date": "1999-03-30",
                "overview": "A hacker learns the truth.",
                "poster_path": "/matrix.jpg",
                "vote_average": 8.2
            },
            { "id": 1, "title": "Untitled", "vote_average": 0.0 }
        ]))
        .await;

        let movies = client(base, "test-key").search_movies("matrix").await.unwrap();
        assert_eq!(movies.len(), 2);

        let matrix = &movies[0];
        assert_eq!(matrix.id, "tmdb_603");
        assert_eq!(matrix.year, Some(1999));
        assert_eq!(matrix.rating, 4.1);
        assert_eq!(matrix.poster, "https://image.tmdb.org/t/p/w500/matrix.jpg");
        assert_eq!(matrix.duration, Some(120));

        let untitled = &movies[1];
        assert_eq!(untitled.year, None);
        assert_eq!(untitled.poster, PLACEHOLDER_POSTER);
        assert_eq!(untitled.plot, "No description available.");
    }

    #[tokio::test]
    async fn keeps_at_most_ten_results() {
        let many: Vec<Value> =
            (0..15).map(|i| json!({ "id": i, "title": format!("Movie {i}") })).collect();
        let base = fake_tmdb(Value::Array(many)).await;

        let movies = client(base, "test-key").search_movies("movie").await.unwrap();
        assert_eq!(movies.len(), 10);
    }

    #[tokio::test]
    async fn disabled_without_key() {
        let movies =
            client("http://127.0.0.1:9".to_string(), " ").search_movies("anything").await.unwrap();
        assert!(movies.is_empty());
    }
}
