#![allow(dead_code)]

use async_trait::async_trait;
use moviesphere::models::{
    CastMember, Credits, Favorite, Genre, MediaKey, MediaType, Review, Session, Title, User, Video,
    WatchProviders,
};
use moviesphere::supabase::{AuthApi, BackendApi, NewReview};
use moviesphere::tmdb::CatalogApi;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

pub fn title(id: u32, media_type: MediaType, genre_ids: &[u32], date: &str) -> Title {
    Title {
        id,
        media_type,
        name: format!("{media_type} {id}"),
        overview: String::new(),
        poster_path: Some(format!("/poster-{id}.jpg")),
        backdrop_path: None,
        release_date: Some(date.to_string()),
        vote_average: 7.0,
        genre_ids: genre_ids.to_vec(),
        credits: None,
        trailer: None,
        watch_providers: None,
    }
}

pub fn trending_titles(media_type: MediaType, count: u32) -> Vec<Title> {
    (1..=count)
        .map(|id| title(id, media_type, &[id % 3 + 1], "2024-01-01"))
        .collect()
}

/// In-memory catalog. Detail calls sleep briefly so concurrency can be observed.
#[derive(Default)]
pub struct FakeCatalog {
    pub movies: Vec<Title>,
    pub shows: Vec<Title>,
    pub movie_genres: Vec<Genre>,
    pub show_genres: Vec<Genre>,
    pub search_results: HashMap<String, Vec<Title>>,
    pub search_delays: HashMap<String, Duration>,
    pub failing_details: HashSet<MediaKey>,
    pub fail_trending: AtomicBool,
    pub searches: Mutex<Vec<String>>,
    pub detail_calls: AtomicUsize,
    pub credit_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeCatalog {
    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn trending_movies(&self) -> anyhow::Result<Vec<Title>> {
        if self.fail_trending.load(Ordering::SeqCst) {
            anyhow::bail!("trending unavailable");
        }
        Ok(self.movies.clone())
    }

    async fn trending_shows(&self) -> anyhow::Result<Vec<Title>> {
        if self.fail_trending.load(Ordering::SeqCst) {
            anyhow::bail!("trending unavailable");
        }
        Ok(self.shows.clone())
    }

    async fn search_multi(&self, query: &str) -> anyhow::Result<Vec<Title>> {
        self.searches.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.search_delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        self.search_results
            .get(query)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("search failed for {query}"))
    }

    async fn movie_genres(&self) -> anyhow::Result<Vec<Genre>> {
        Ok(self.movie_genres.clone())
    }

    async fn show_genres(&self) -> anyhow::Result<Vec<Genre>> {
        Ok(self.show_genres.clone())
    }

    async fn details(&self, key: MediaKey) -> anyhow::Result<Title> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_details.contains(&key) {
            anyhow::bail!("details unavailable for {key}");
        }
        // Detail records carry their own genre list and a full overview.
        let mut detail = self
            .movies
            .iter()
            .chain(self.shows.iter())
            .chain(self.search_results.values().flatten())
            .find(|t| t.key() == key)
            .cloned()
            .unwrap_or_else(|| title(key.id, key.media_type, &[], "2024-01-01"));
        detail.genre_ids = vec![99];
        detail.overview = format!("Overview of {key}");
        Ok(detail)
    }

    async fn videos(&self, key: MediaKey) -> anyhow::Result<Vec<Video>> {
        Ok(vec![
            Video {
                key: format!("teaser-{}", key.id),
                site: "YouTube".to_string(),
                name: "Teaser".to_string(),
                video_type: "Teaser".to_string(),
                iso_639_1: Some("en".to_string()),
            },
            Video {
                key: format!("yt-{}", key.id),
                site: "YouTube".to_string(),
                name: "Official Trailer".to_string(),
                video_type: "Trailer".to_string(),
                iso_639_1: Some("en".to_string()),
            },
        ])
    }

    async fn credits(&self, _key: MediaKey) -> anyhow::Result<Credits> {
        self.credit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Credits {
            cast: vec![CastMember {
                id: 1,
                name: "Lead Actor".to_string(),
                character: "Hero".to_string(),
                profile_path: None,
                order: 0,
            }],
            crew: Vec::new(),
        })
    }

    async fn watch_providers(
        &self,
        _key: MediaKey,
        _region: &str,
    ) -> anyhow::Result<Option<WatchProviders>> {
        Ok(None)
    }
}

pub fn session(user_id: &str) -> Session {
    Session {
        user: User {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@example.com")),
        },
        access_token: format!("token-{user_id}"),
    }
}

/// Auth double: sessions are published through the same watch channel the
/// real client uses.
pub struct FakeAuth {
    sessions: watch::Sender<Option<Session>>,
}

impl FakeAuth {
    pub fn signed_out() -> Self {
        let (sessions, _) = watch::channel(None);
        Self { sessions }
    }

    pub fn signed_in(user_id: &str) -> Self {
        let (sessions, _) = watch::channel(Some(session(user_id)));
        Self { sessions }
    }

    pub fn set(&self, session: Option<Session>) {
        self.sessions.send_replace(session);
    }
}

#[async_trait]
impl AuthApi for FakeAuth {
    fn current_session(&self) -> Option<Session> {
        self.sessions.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sessions.subscribe()
    }

    async fn sign_up(&self, email: &str, _password: &str) -> anyhow::Result<Option<Session>> {
        let session = session(email.split('@').next().unwrap_or(email));
        self.set(Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        if password != "secret" {
            anyhow::bail!("invalid login credentials");
        }
        let session = session(email.split('@').next().unwrap_or(email));
        self.set(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        self.set(None);
        Ok(())
    }
}

/// Row store keyed by user; `fail` makes every call error out and
/// `insert_delay_ms` slows down favorite inserts.
#[derive(Default)]
pub struct FakeBackend {
    pub favorites: Mutex<Vec<Favorite>>,
    pub reviews: Mutex<Vec<Review>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub insert_delay_ms: AtomicU64,
    next_id: AtomicUsize,
}

impl FakeBackend {
    fn check(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("backend unavailable");
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn select_favorites(&self, session: &Session) -> anyhow::Result<Vec<Favorite>> {
        self.check()?;
        Ok(self
            .favorites
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.user_id.as_deref() == Some(session.user.id.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_favorite(&self, session: &Session, key: MediaKey) -> anyhow::Result<Favorite> {
        self.check()?;
        let delay = self.insert_delay_ms.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let favorite = Favorite {
            id: Some(self.next_id("fav")),
            user_id: Some(session.user.id.clone()),
            media_id: key.id,
            media_type: key.media_type,
            created_at: chrono::Utc::now(),
        };
        self.favorites.lock().unwrap().insert(0, favorite.clone());
        Ok(favorite)
    }

    async fn delete_favorite(&self, _session: &Session, id: &str) -> anyhow::Result<()> {
        self.check()?;
        self.favorites
            .lock()
            .unwrap()
            .retain(|f| f.id.as_deref() != Some(id));
        Ok(())
    }

    async fn select_reviews(&self, session: &Session) -> anyhow::Result<Vec<Review>> {
        self.check()?;
        Ok(self
            .reviews
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id.as_deref() == Some(session.user.id.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_review(&self, session: &Session, review: NewReview) -> anyhow::Result<Review> {
        self.check()?;
        let created = Review {
            id: self.next_id("rev"),
            user_id: Some(session.user.id.clone()),
            media_id: review.key.id,
            media_type: review.key.media_type,
            rating: review.rating,
            comment: review.comment,
            created_at: chrono::Utc::now(),
        };
        self.reviews.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }

    async fn update_review(
        &self,
        _session: &Session,
        id: &str,
        rating: u8,
        comment: &str,
    ) -> anyhow::Result<Review> {
        self.check()?;
        let mut reviews = self.reviews.lock().unwrap();
        let review = reviews
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("no review {id}"))?;
        review.rating = rating;
        review.comment = comment.to_string();
        Ok(review.clone())
    }

    async fn delete_review(&self, _session: &Session, id: &str) -> anyhow::Result<()> {
        self.check()?;
        self.reviews.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }
}
