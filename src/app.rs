use crate::config::{AppConfig, PersistenceConfig};
use crate::enrich::EnrichOptions;
use crate::filter::{Filters, TRENDING_SAMPLE_SIZE};
use crate::media::{MediaState, MediaStore, SearchOutcome, TitleSet};
use crate::models::{validate_rating, Favorite, Genre, MediaType, Review, Title, User};
use crate::search::SearchDebouncer;
use crate::storage::FileStorage;
use crate::supabase::{AuthApi, SupabaseAuth, SupabaseClient};
use crate::tmdb::{self, TmdbClient};
use crate::user_data::UserDataStore;
use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub media: Arc<MediaStore>,
    pub user_data: Arc<UserDataStore>,
    pub auth: Option<Arc<dyn AuthApi>>,
    pub search: Arc<SearchDebouncer>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let catalog = Arc::new(TmdbClient::new(&config.tmdb)?);
        let options = EnrichOptions {
            language: Some(tmdb::language_tag(&config.tmdb.language).to_string()),
            include_credits: false,
            watch_region: config.watch_region.clone(),
        };
        let media = Arc::new(MediaStore::new(catalog, options, config.enrich_concurrency));
        let search = Arc::new(SearchDebouncer::new(media.clone(), config.search_debounce));

        let (user_data, auth) = match &config.persistence {
            PersistenceConfig::Local { dir, quota_bytes } => {
                info!("Persisting favorites and reviews under {:?}", dir);
                let storage = Arc::new(FileStorage::open(dir, *quota_bytes)?);
                (UserDataStore::local(storage), None)
            }
            PersistenceConfig::Remote(supabase) => {
                info!("Persisting favorites and reviews to {}", supabase.url);
                let backend = Arc::new(SupabaseClient::new(supabase)?);
                let auth: Arc<dyn AuthApi> = Arc::new(SupabaseAuth::new(supabase)?);
                (UserDataStore::remote(backend, auth.clone()), Some(auth))
            }
        };

        Ok(Self {
            media,
            user_data: Arc::new(user_data),
            auth,
            search,
        })
    }
}

pub async fn run_server(config: AppConfig) -> Result<()> {
    let state = AppState::from_config(&config)?;
    state.user_data.spawn_session_listener();

    let warmup = state.clone();
    tokio::spawn(async move {
        tokio::join!(warmup.media.fetch_trending(), warmup.media.fetch_genres());
    });

    let app = build_router(state);
    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(media_state))
        .route("/api/genres", get(genres))
        .route("/api/trending", get(trending))
        .route("/api/trending/refresh", post(refresh_trending))
        .route("/api/trending/sample", get(trending_sample))
        .route("/api/search", get(search))
        .route("/api/filters", put(set_filters))
        .route("/api/filters/genres/:genre_id", post(toggle_genre))
        .route("/api/titles/:media_type/:id", get(title_details))
        .route("/api/favorites", get(favorites))
        .route("/api/favorites/:media_type/:id", post(toggle_favorite))
        .route("/api/reviews", post(add_review))
        .route("/api/reviews/:media_type/:id", get(media_reviews))
        .route(
            "/api/reviews/:review_id",
            patch(update_review).delete(delete_review),
        )
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-out", post(sign_out))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct TitlesResponse {
    search_query: String,
    movies: Vec<Title>,
    shows: Vec<Title>,
    is_loading: bool,
}

impl TitlesResponse {
    fn new(titles: TitleSet, state: &MediaState) -> Self {
        Self {
            search_query: state.search_query.clone(),
            movies: titles.movies,
            shows: titles.shows,
            is_loading: state.is_loading,
        }
    }
}

async fn trending_titles(state: &AppState) -> TitlesResponse {
    let titles = state.media.trending().await;
    TitlesResponse::new(titles, &state.media.snapshot().await)
}

async fn displayed_titles(state: &AppState) -> TitlesResponse {
    let titles = state.media.displayed().await;
    TitlesResponse::new(titles, &state.media.snapshot().await)
}

async fn media_state(State(state): State<AppState>) -> Json<MediaState> {
    Json(state.media.snapshot().await)
}

async fn genres(State(state): State<AppState>) -> Json<Vec<Genre>> {
    Json(state.media.genres().await)
}

async fn trending(State(state): State<AppState>) -> Json<TitlesResponse> {
    Json(trending_titles(&state).await)
}

async fn refresh_trending(State(state): State<AppState>) -> Json<TitlesResponse> {
    state.media.fetch_trending().await;
    Json(trending_titles(&state).await)
}

#[derive(Debug, Deserialize)]
struct SampleQuery {
    size: Option<usize>,
}

async fn trending_sample(
    State(state): State<AppState>,
    Query(query): Query<SampleQuery>,
) -> Json<Vec<Title>> {
    let size = query.size.unwrap_or(TRENDING_SAMPLE_SIZE);
    Json(state.media.trending_sample(size).await)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Response {
    match state.search.submit(&query.q).await {
        SearchOutcome::Superseded => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "superseded by a newer search" })),
        )
            .into_response(),
        // A failed search keeps the previous results.
        SearchOutcome::Applied { .. } | SearchOutcome::Failed => {
            Json(displayed_titles(&state).await).into_response()
        }
    }
}

async fn set_filters(
    State(state): State<AppState>,
    Json(filters): Json<Filters>,
) -> Json<Filters> {
    state.media.set_filters(filters).await;
    Json(state.media.filters().await)
}

async fn toggle_genre(State(state): State<AppState>, Path(genre_id): Path<u32>) -> Json<Filters> {
    Json(state.media.toggle_genre(genre_id).await)
}

async fn title_details(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(MediaType, u32)>,
) -> Response {
    match state.media.details(id, media_type).await {
        Some(title) => Json(title).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct FavoritesResponse {
    favorites: Vec<Favorite>,
    media: Vec<Title>,
}

async fn favorites(State(state): State<AppState>) -> Json<FavoritesResponse> {
    let favorites = state.user_data.favorites().await;
    let media = state.media.favorite_media(&favorites).await;
    Json(FavoritesResponse { favorites, media })
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(MediaType, u32)>,
) -> Response {
    match state.user_data.toggle_favorite(id, media_type).await {
        Ok(favorite) => Json(json!({ "favorite": favorite })).into_response(),
        Err(e) => backend_error(e),
    }
}

async fn media_reviews(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(MediaType, u32)>,
) -> Json<Vec<Review>> {
    Json(state.user_data.media_reviews(id, media_type).await)
}

#[derive(Debug, Deserialize)]
struct NewReviewBody {
    media_id: u32,
    media_type: MediaType,
    rating: u8,
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
struct ReviewUpdateBody {
    rating: u8,
    #[serde(default)]
    comment: String,
}

async fn add_review(State(state): State<AppState>, Json(body): Json<NewReviewBody>) -> Response {
    if let Err(e) = validate_rating(body.rating) {
        return bad_request(e);
    }
    match state
        .user_data
        .add_review(body.media_id, body.media_type, body.rating, &body.comment)
        .await
    {
        Ok(Some(review)) => (StatusCode::CREATED, Json(review)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => backend_error(e),
    }
}

async fn update_review(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
    Json(body): Json<ReviewUpdateBody>,
) -> Response {
    if let Err(e) = validate_rating(body.rating) {
        return bad_request(e);
    }
    match state
        .user_data
        .update_review(&review_id, body.rating, &body.comment)
        .await
    {
        Ok(Some(review)) => Json(review).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => backend_error(e),
    }
}

async fn delete_review(State(state): State<AppState>, Path(review_id): Path<String>) -> Response {
    match state.user_data.delete_review(&review_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => backend_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    user: Option<User>,
}

async fn sign_up(State(state): State<AppState>, Json(creds): Json<Credentials>) -> Response {
    let Some(auth) = state.auth.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match auth.sign_up(&creds.email, &creds.password).await {
        Ok(Some(session)) => Json(SessionResponse {
            user: Some(session.user),
        })
        .into_response(),
        Ok(None) => (StatusCode::ACCEPTED, Json(SessionResponse { user: None })).into_response(),
        Err(e) => auth_error(e),
    }
}

async fn sign_in(State(state): State<AppState>, Json(creds): Json<Credentials>) -> Response {
    let Some(auth) = state.auth.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match auth.sign_in(&creds.email, &creds.password).await {
        Ok(session) => Json(SessionResponse {
            user: Some(session.user),
        })
        .into_response(),
        Err(e) => auth_error(e),
    }
}

async fn sign_out(State(state): State<AppState>) -> Response {
    let Some(auth) = state.auth.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match auth.sign_out().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => backend_error(e),
    }
}

fn bad_request(e: anyhow::Error) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
}

fn backend_error(e: anyhow::Error) -> Response {
    warn!("Remote store rejected the change: {:#}", e);
    (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
}

fn auth_error(e: anyhow::Error) -> Response {
    warn!("Authentication failed: {:#}", e);
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": e.to_string() }))).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
