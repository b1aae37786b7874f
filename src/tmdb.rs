use crate::config::TmdbConfig;
use crate::genres;
use crate::models::{Credits, Genre, MediaKey, MediaType, Title, Video, WatchProviders};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn trending_movies(&self) -> Result<Vec<Title>>;
    async fn trending_shows(&self) -> Result<Vec<Title>>;
    async fn search_multi(&self, query: &str) -> Result<Vec<Title>>;
    async fn movie_genres(&self) -> Result<Vec<Genre>>;
    async fn show_genres(&self) -> Result<Vec<Genre>>;
    async fn details(&self, key: MediaKey) -> Result<Title>;
    async fn videos(&self, key: MediaKey) -> Result<Vec<Video>>;
    async fn credits(&self, key: MediaKey) -> Result<Credits>;
    async fn watch_providers(&self, key: MediaKey, region: &str)
        -> Result<Option<WatchProviders>>;

    /// Both taxonomies fetched together, merged movie-first.
    async fn genres(&self) -> Result<Vec<Genre>> {
        let (movie, show) = tokio::try_join!(self.movie_genres(), self.show_genres())?;
        Ok(genres::reconcile(movie, show))
    }
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("TMDB API key cannot be empty"));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(format!("moviesphere/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&TmdbConfig::from_env()?)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{path}?api_key={}&language={}",
            self.base_url,
            self.api_key,
            urlencoding::encode(&self.language)
        );
        for (key, value) in params {
            url.push_str(&format!("&{key}={}", urlencoding::encode(value)));
        }
        url
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {} {}", redact(url), status, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn trending_movies(&self) -> Result<Vec<Title>> {
        let url = self.url("/trending/movie/week", &[]);
        let page: Page<MovieRecord> = self.get_json(&url).await?;
        Ok(page.results.into_iter().map(Title::from).collect())
    }

    async fn trending_shows(&self) -> Result<Vec<Title>> {
        let url = self.url("/trending/tv/week", &[]);
        let page: Page<ShowRecord> = self.get_json(&url).await?;
        Ok(page.results.into_iter().map(Title::from).collect())
    }

    async fn search_multi(&self, query: &str) -> Result<Vec<Title>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url("/search/multi", &[("query", query)]);
        let page: Page<MultiRecord> = self.get_json(&url).await?;
        let total = page.results.len();
        let titles: Vec<Title> = page
            .results
            .into_iter()
            .filter_map(MultiRecord::into_title)
            .collect();
        debug!(
            query = %query,
            total,
            kept = titles.len(),
            "Multi-search results"
        );
        Ok(titles)
    }

    async fn movie_genres(&self) -> Result<Vec<Genre>> {
        let url = self.url("/genre/movie/list", &[]);
        let list: GenreList = self.get_json(&url).await?;
        Ok(list.genres)
    }

    async fn show_genres(&self) -> Result<Vec<Genre>> {
        let url = self.url("/genre/tv/list", &[]);
        let list: GenreList = self.get_json(&url).await?;
        Ok(list.genres)
    }

    async fn details(&self, key: MediaKey) -> Result<Title> {
        let url = self.url(&format!("/{}/{}", key.media_type.as_path(), key.id), &[]);
        let title = match key.media_type {
            MediaType::Movie => Title::from(self.get_json::<MovieRecord>(&url).await?),
            MediaType::Tv => Title::from(self.get_json::<ShowRecord>(&url).await?),
        };
        Ok(title)
    }

    async fn videos(&self, key: MediaKey) -> Result<Vec<Video>> {
        // The locale alone would hide English trailers.
        let languages = format!("{},en,null", language_tag(&self.language));
        let url = self.url(
            &format!("/{}/{}/videos", key.media_type.as_path(), key.id),
            &[("include_video_language", languages.as_str())],
        );
        let page: Page<Video> = self.get_json(&url).await?;
        Ok(page.results)
    }

    async fn credits(&self, key: MediaKey) -> Result<Credits> {
        let url = self.url(
            &format!("/{}/{}/credits", key.media_type.as_path(), key.id),
            &[],
        );
        self.get_json(&url).await
    }

    async fn watch_providers(
        &self,
        key: MediaKey,
        region: &str,
    ) -> Result<Option<WatchProviders>> {
        #[derive(Deserialize)]
        struct ProvidersResponse {
            #[serde(default)]
            results: HashMap<String, WatchProviders>,
        }

        let url = self.url(
            &format!("/{}/{}/watch/providers", key.media_type.as_path(), key.id),
            &[],
        );
        let mut data: ProvidersResponse = self.get_json(&url).await?;
        Ok(data.results.remove(&region.to_uppercase()))
    }
}

/// Language subtag of a locale (`fr-FR` -> `fr`).
pub fn language_tag(locale: &str) -> &str {
    locale.split(&['-', '_'][..]).next().unwrap_or(locale)
}

pub fn poster_url(path: &str) -> String {
    format!("{IMAGE_BASE}{path}")
}

fn redact(url: &str) -> String {
    match url.find("api_key=") {
        Some(start) => {
            let rest = &url[start..];
            let end = rest.find('&').map(|e| start + e).unwrap_or(url.len());
            format!("{}api_key=***{}", &url[..start], &url[end..])
        }
        None => url.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct GenreList {
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct MovieRecord {
    id: u32,
    title: String,
    #[serde(default)]
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f32>,
    #[serde(default)]
    genre_ids: Vec<u32>,
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct ShowRecord {
    id: u32,
    name: String,
    #[serde(default)]
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    first_air_date: Option<String>,
    vote_average: Option<f32>,
    #[serde(default)]
    genre_ids: Vec<u32>,
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "media_type")]
enum MultiRecord {
    #[serde(rename = "movie")]
    Movie(MovieRecord),
    #[serde(rename = "tv")]
    Tv(ShowRecord),
    #[serde(other)]
    Other,
}

impl MultiRecord {
    fn into_title(self) -> Option<Title> {
        match self {
            MultiRecord::Movie(m) => Some(m.into()),
            MultiRecord::Tv(s) => Some(s.into()),
            MultiRecord::Other => None,
        }
    }
}

impl From<MovieRecord> for Title {
    fn from(m: MovieRecord) -> Self {
        Title {
            id: m.id,
            media_type: MediaType::Movie,
            name: m.title,
            overview: m.overview.unwrap_or_default(),
            poster_path: m.poster_path,
            backdrop_path: m.backdrop_path,
            release_date: non_empty(m.release_date),
            vote_average: m.vote_average.unwrap_or_default(),
            genre_ids: genre_ids(m.genre_ids, &m.genres),
            credits: None,
            trailer: None,
            watch_providers: None,
        }
    }
}

impl From<ShowRecord> for Title {
    fn from(s: ShowRecord) -> Self {
        Title {
            id: s.id,
            media_type: MediaType::Tv,
            name: s.name,
            overview: s.overview.unwrap_or_default(),
            poster_path: s.poster_path,
            backdrop_path: s.backdrop_path,
            release_date: non_empty(s.first_air_date),
            vote_average: s.vote_average.unwrap_or_default(),
            genre_ids: genre_ids(s.genre_ids, &s.genres),
            credits: None,
            trailer: None,
            watch_providers: None,
        }
    }
}

// List endpoints send `genre_ids`, detail endpoints send `genres` objects.
fn genre_ids(ids: Vec<u32>, genres: &[Genre]) -> Vec<u32> {
    if ids.is_empty() {
        genres.iter().map(|g| g.id).collect()
    } else {
        ids
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
