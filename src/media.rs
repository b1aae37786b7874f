use rand::thread_rng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::enrich::{self, EnrichOptions};
use crate::filter::{self, Filters};
use crate::models::{Favorite, Genre, MediaKey, MediaType, Title};
use crate::tmdb::CatalogApi;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TitleSet {
    pub movies: Vec<Title>,
    pub shows: Vec<Title>,
}

impl TitleSet {
    fn filtered(&self, filters: &Filters) -> TitleSet {
        TitleSet {
            movies: filters.apply(self.movies.clone()),
            shows: filters.apply(self.shows.clone()),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Title> {
        self.movies.iter().chain(self.shows.iter())
    }
}

/// Trending and search results are kept apart; a non-empty query selects the
/// search results as the displayed set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaState {
    pub trending: TitleSet,
    pub results: TitleSet,
    pub genres: Vec<Genre>,
    pub filters: Filters,
    pub search_query: String,
    pub is_loading: bool,
    #[serde(skip)]
    trending_pending: bool,
    #[serde(skip)]
    search_pending: bool,
}

impl MediaState {
    pub fn is_searching(&self) -> bool {
        !self.search_query.trim().is_empty()
    }

    pub fn displayed(&self) -> &TitleSet {
        if self.is_searching() {
            &self.results
        } else {
            &self.trending
        }
    }

    fn set_pending(&mut self, trending: Option<bool>, search: Option<bool>) {
        if let Some(pending) = trending {
            self.trending_pending = pending;
        }
        if let Some(pending) = search {
            self.search_pending = pending;
        }
        self.is_loading = self.trending_pending || self.search_pending;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Applied { movies: usize, shows: usize },
    /// A newer search was issued while this one was in flight.
    Superseded,
    Failed,
}

/// Catalog-side state: trending/search results, genres and the filter selection.
pub struct MediaStore {
    catalog: Arc<dyn CatalogApi>,
    trending_options: EnrichOptions,
    search_options: EnrichOptions,
    detail_options: EnrichOptions,
    concurrency: usize,
    state: RwLock<MediaState>,
    trending_seq: AtomicU64,
    search_seq: AtomicU64,
}

impl MediaStore {
    /// `options` drives trending enrichment; search results skip the trailer
    /// language restriction and detail views add credits.
    pub fn new(catalog: Arc<dyn CatalogApi>, options: EnrichOptions, concurrency: usize) -> Self {
        let search_options = EnrichOptions {
            language: None,
            ..options.clone()
        };
        let detail_options = EnrichOptions {
            include_credits: true,
            ..options.clone()
        };
        Self {
            catalog,
            trending_options: options,
            search_options,
            detail_options,
            concurrency: concurrency.max(1),
            state: RwLock::new(MediaState::default()),
            trending_seq: AtomicU64::new(0),
            search_seq: AtomicU64::new(0),
        }
    }

    pub async fn snapshot(&self) -> MediaState {
        self.state.read().await.clone()
    }

    pub async fn genres(&self) -> Vec<Genre> {
        self.state.read().await.genres.clone()
    }

    pub async fn fetch_genres(&self) {
        match self.catalog.genres().await {
            Ok(genres) => {
                info!("Loaded {} genres", genres.len());
                self.state.write().await.genres = genres;
            }
            Err(e) => error!("Error loading genres: {:#}", e),
        }
    }

    /// Loads this week's trending movies and shows, each enriched with details
    /// and a trailer. Only the latest load is applied; any failure leaves the
    /// previous trending set in place. Search results are never touched.
    pub async fn fetch_trending(&self) {
        let token = self.trending_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().await.set_pending(Some(true), None);

        let result = self.load_trending().await;

        let mut state = self.state.write().await;
        if self.trending_seq.load(Ordering::SeqCst) != token {
            debug!(token, "Discarding stale trending response");
            return;
        }
        state.set_pending(Some(false), None);
        match result {
            Ok((movies, shows)) => {
                info!(
                    "Loaded {} trending movies and {} trending shows",
                    movies.len(),
                    shows.len()
                );
                state.trending = TitleSet { movies, shows };
            }
            Err(e) => error!("Error loading content: {:#}", e),
        }
    }

    async fn load_trending(&self) -> anyhow::Result<(Vec<Title>, Vec<Title>)> {
        let api = self.catalog.as_ref();
        let (movies, shows) = tokio::try_join!(api.trending_movies(), api.trending_shows())?;
        tokio::try_join!(
            enrich::enrich_batch(api, movies, &self.trending_options, self.concurrency),
            enrich::enrich_batch(api, shows, &self.trending_options, self.concurrency),
        )
    }

    /// Runs a multi-search and applies its results only if no newer search
    /// started meanwhile. An empty query clears the results without a request,
    /// which brings the trending set back as the displayed one.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let token = self.search_seq.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.search_query = query.to_string();
            if query.trim().is_empty() {
                state.results = TitleSet::default();
                state.set_pending(None, Some(false));
                return SearchOutcome::Applied {
                    movies: 0,
                    shows: 0,
                };
            }
            state.set_pending(None, Some(true));
        }

        let result = self.load_search(query).await;

        let mut state = self.state.write().await;
        if self.search_seq.load(Ordering::SeqCst) != token {
            debug!(query = %query, token, "Discarding stale search response");
            return SearchOutcome::Superseded;
        }
        state.set_pending(None, Some(false));
        match result {
            Ok(titles) => {
                let (movies, shows): (Vec<Title>, Vec<Title>) = titles
                    .into_iter()
                    .partition(|t| t.media_type == MediaType::Movie);
                let outcome = SearchOutcome::Applied {
                    movies: movies.len(),
                    shows: shows.len(),
                };
                state.results = TitleSet { movies, shows };
                outcome
            }
            Err(e) => {
                error!("Error searching content: {:#}", e);
                SearchOutcome::Failed
            }
        }
    }

    async fn load_search(&self, query: &str) -> anyhow::Result<Vec<Title>> {
        let api = self.catalog.as_ref();
        let found: Vec<Title> = api
            .search_multi(query)
            .await?
            .into_iter()
            .filter(|t| t.poster_path.is_some())
            .collect();
        enrich::enrich_batch(api, found, &self.search_options, self.concurrency).await
    }

    /// Full record of one title with credits; `None` when any fetch fails.
    pub async fn details(&self, media_id: u32, media_type: MediaType) -> Option<Title> {
        let key = MediaKey::new(media_id, media_type);
        match enrich::fetch_details(self.catalog.as_ref(), key, &self.detail_options).await {
            Ok(title) => Some(title),
            Err(e) => {
                error!("Error loading media details for {}: {:#}", key, e);
                None
            }
        }
    }

    pub async fn filters(&self) -> Filters {
        self.state.read().await.filters.clone()
    }

    pub async fn set_filters(&self, filters: Filters) {
        self.state.write().await.filters = filters;
    }

    pub async fn toggle_genre(&self, genre_id: u32) -> Filters {
        let mut state = self.state.write().await;
        state.filters.toggle_genre(genre_id);
        state.filters.clone()
    }

    pub async fn set_year(&self, year: Option<i32>) {
        self.state.write().await.filters.year = year;
    }

    /// Displayed set (search results while a query is active, trending
    /// otherwise) narrowed by the filters.
    pub async fn displayed(&self) -> TitleSet {
        let state = self.state.read().await;
        state.displayed().filtered(&state.filters)
    }

    pub async fn filtered_movies(&self) -> Vec<Title> {
        self.displayed().await.movies
    }

    pub async fn filtered_shows(&self) -> Vec<Title> {
        self.displayed().await.shows
    }

    pub async fn trending(&self) -> TitleSet {
        let state = self.state.read().await;
        state.trending.filtered(&state.filters)
    }

    pub async fn favorite_media(&self, favorites: &[Favorite]) -> Vec<Title> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let known: Vec<Title> = state
            .trending
            .iter()
            .chain(state.results.iter())
            .filter(|t| seen.insert(t.key()))
            .cloned()
            .collect();
        filter::favorite_media(&known, favorites)
    }

    /// Random pick across trending movies and shows, then narrowed by the
    /// genre filter.
    pub async fn trending_sample(&self, size: usize) -> Vec<Title> {
        let state = self.state.read().await;
        let all: Vec<Title> = state.trending.iter().cloned().collect();
        let picked = filter::sample(&all, size, &mut thread_rng());
        filter::filter_by_genres(picked, &state.filters.genres)
    }
}
