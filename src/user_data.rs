//! Favorites and reviews of the current user.
//!
//! Two persistence variants share one store: `Local` keeps everything in the
//! client-side key/value storage and rewrites the whole collection on every
//! mutation; `Remote` goes through the backend and only mutates memory once
//! the backend has accepted the change.
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{validate_rating, Favorite, MediaKey, MediaType, Review, Session};
use crate::storage::{KeyValueStorage, StorageError};
use crate::supabase::{AuthApi, BackendApi, NewReview};

pub const FAVORITES_KEY: &str = "favorites";
pub const REVIEWS_KEY: &str = "reviews";

pub enum Persistence {
    Local(Arc<dyn KeyValueStorage>),
    Remote {
        backend: Arc<dyn BackendApi>,
        auth: Arc<dyn AuthApi>,
    },
}

/// Local favorites layout:
/// `[{"id": 42, "type": "movie", "added_at": "2024-05-01T08:00:00Z"}]`.
/// Entries written before `added_at` existed are still accepted.
#[derive(Debug, Serialize, Deserialize)]
struct StoredFavorite {
    id: u32,
    #[serde(rename = "type")]
    media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    added_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct UserData {
    favorites: Vec<Favorite>,
    reviews: Vec<Review>,
}

pub struct UserDataStore {
    persistence: Persistence,
    data: RwLock<UserData>,
    /// Held across a remote mutation from the state check to the applied result.
    mutations: Mutex<()>,
    loading: AtomicBool,
}

impl UserDataStore {
    /// Reads both collections from storage once; unreadable entries start empty.
    pub fn local(storage: Arc<dyn KeyValueStorage>) -> Self {
        let loaded_at = Utc::now();
        let favorites = read_local::<Vec<StoredFavorite>>(storage.as_ref(), FAVORITES_KEY)
            .into_iter()
            .map(|f| Favorite {
                id: None,
                user_id: None,
                media_id: f.id,
                media_type: f.media_type,
                created_at: f.added_at.unwrap_or(loaded_at),
            })
            .collect::<Vec<_>>();
        let reviews = read_local::<Vec<Review>>(storage.as_ref(), REVIEWS_KEY);
        info!(
            "Loaded {} favorites and {} reviews from local storage",
            favorites.len(),
            reviews.len()
        );
        Self {
            persistence: Persistence::Local(storage),
            data: RwLock::new(UserData { favorites, reviews }),
            mutations: Mutex::new(()),
            loading: AtomicBool::new(false),
        }
    }

    /// Starts empty; call [`UserDataStore::load`] once a session exists.
    pub fn remote(backend: Arc<dyn BackendApi>, auth: Arc<dyn AuthApi>) -> Self {
        Self {
            persistence: Persistence::Remote { backend, auth },
            data: RwLock::new(UserData::default()),
            mutations: Mutex::new(()),
            loading: AtomicBool::new(false),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.persistence, Persistence::Remote { .. })
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Replaces both collections with the signed-in user's rows, newest first.
    /// Failures are logged and leave the current collections in place.
    pub async fn load(&self) {
        let Persistence::Remote { backend, auth } = &self.persistence else {
            return;
        };
        let Some(session) = auth.current_session() else {
            return;
        };

        let _guard = self.mutations.lock().await;
        self.loading.store(true, Ordering::SeqCst);
        match tokio::try_join!(
            backend.select_favorites(&session),
            backend.select_reviews(&session)
        ) {
            Ok((favorites, reviews)) => {
                info!(
                    "Loaded {} favorites and {} reviews for user {}",
                    favorites.len(),
                    reviews.len(),
                    session.user.id
                );
                let mut data = self.data.write().await;
                data.favorites = favorites;
                data.reviews = reviews;
            }
            Err(e) => error!("Error loading user data: {:#}", e),
        }
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Drops the in-memory collections (sign-out). Local storage is untouched.
    pub async fn clear(&self) {
        let mut data = self.data.write().await;
        data.favorites.clear();
        data.reviews.clear();
    }

    pub async fn favorites(&self) -> Vec<Favorite> {
        self.data.read().await.favorites.clone()
    }

    pub async fn favorite_ids(&self, media_type: MediaType) -> Vec<u32> {
        self.data
            .read()
            .await
            .favorites
            .iter()
            .filter(|f| f.media_type == media_type)
            .map(|f| f.media_id)
            .collect()
    }

    pub async fn is_favorite(&self, media_id: u32, media_type: MediaType) -> bool {
        let key = MediaKey::new(media_id, media_type);
        self.data
            .read()
            .await
            .favorites
            .iter()
            .any(|f| f.key() == key)
    }

    /// Flips the favorite state of a title and returns the resulting state.
    ///
    /// Without a signed-in user (remote variant) nothing happens. A storage
    /// failure (local variant) is logged and the previous state is returned.
    pub async fn toggle_favorite(&self, media_id: u32, media_type: MediaType) -> Result<bool> {
        let key = MediaKey::new(media_id, media_type);
        match &self.persistence {
            Persistence::Local(storage) => {
                let mut data = self.data.write().await;
                let mut next = data.favorites.clone();
                let now_favorite = match next.iter().position(|f| f.key() == key) {
                    Some(pos) => {
                        next.remove(pos);
                        false
                    }
                    None => {
                        next.insert(
                            0,
                            Favorite {
                                id: None,
                                user_id: None,
                                media_id,
                                media_type,
                                created_at: Utc::now(),
                            },
                        );
                        true
                    }
                };
                if let Err(e) = persist_favorites(storage.as_ref(), &next) {
                    warn!(key = %key, "Favorite not saved, keeping previous state: {}", e);
                    return Ok(!now_favorite);
                }
                data.favorites = next;
                Ok(now_favorite)
            }
            Persistence::Remote { backend, auth } => {
                let Some(session) = auth.current_session() else {
                    debug!(key = %key, "Ignoring favorite toggle without a signed-in user");
                    return Ok(self.is_favorite(media_id, media_type).await);
                };
                let _guard = self.mutations.lock().await;
                let existing = self
                    .data
                    .read()
                    .await
                    .favorites
                    .iter()
                    .find(|f| f.key() == key)
                    .cloned();
                match existing {
                    Some(favorite) => {
                        let id = favorite
                            .id
                            .as_deref()
                            .ok_or_else(|| anyhow!("favorite {} has no server id", key))?;
                        backend.delete_favorite(&session, id).await?;
                        self.data.write().await.favorites.retain(|f| f.key() != key);
                        Ok(false)
                    }
                    None => {
                        let created = backend.insert_favorite(&session, key).await?;
                        self.data.write().await.favorites.insert(0, created);
                        Ok(true)
                    }
                }
            }
        }
    }

    pub async fn reviews(&self) -> Vec<Review> {
        self.data.read().await.reviews.clone()
    }

    /// Reviews of one title, newest first.
    pub async fn media_reviews(&self, media_id: u32, media_type: MediaType) -> Vec<Review> {
        let key = MediaKey::new(media_id, media_type);
        self.data
            .read()
            .await
            .reviews
            .iter()
            .filter(|r| r.key() == key)
            .cloned()
            .collect()
    }

    /// Prepends a review. `None` when nothing was stored (no user, or storage failure).
    pub async fn add_review(
        &self,
        media_id: u32,
        media_type: MediaType,
        rating: u8,
        comment: &str,
    ) -> Result<Option<Review>> {
        let rating = validate_rating(rating)?;
        let key = MediaKey::new(media_id, media_type);
        match &self.persistence {
            Persistence::Local(storage) => {
                let review = Review {
                    id: Uuid::new_v4().to_string(),
                    user_id: None,
                    media_id,
                    media_type,
                    rating,
                    comment: comment.to_string(),
                    created_at: Utc::now(),
                };
                let mut data = self.data.write().await;
                let mut next = data.reviews.clone();
                next.insert(0, review.clone());
                if !commit(storage.as_ref(), REVIEWS_KEY, &next) {
                    return Ok(None);
                }
                data.reviews = next;
                Ok(Some(review))
            }
            Persistence::Remote { backend, auth } => {
                let Some(session) = auth.current_session() else {
                    return Ok(None);
                };
                let _guard = self.mutations.lock().await;
                let created = backend
                    .insert_review(
                        &session,
                        NewReview {
                            key,
                            rating,
                            comment: comment.to_string(),
                        },
                    )
                    .await?;
                self.data.write().await.reviews.insert(0, created.clone());
                Ok(Some(created))
            }
        }
    }

    /// Replaces rating and comment in place. `None` when nothing was updated.
    pub async fn update_review(
        &self,
        review_id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<Option<Review>> {
        let rating = validate_rating(rating)?;
        match &self.persistence {
            Persistence::Local(storage) => {
                let mut data = self.data.write().await;
                let Some(pos) = data.reviews.iter().position(|r| r.id == review_id) else {
                    return Ok(None);
                };
                let mut next = data.reviews.clone();
                next[pos].rating = rating;
                next[pos].comment = comment.to_string();
                let updated = next[pos].clone();
                if !commit(storage.as_ref(), REVIEWS_KEY, &next) {
                    return Ok(None);
                }
                data.reviews = next;
                Ok(Some(updated))
            }
            Persistence::Remote { backend, auth } => {
                let Some(session) = auth.current_session() else {
                    return Ok(None);
                };
                let _guard = self.mutations.lock().await;
                let updated = backend
                    .update_review(&session, review_id, rating, comment)
                    .await?;
                let mut data = self.data.write().await;
                if let Some(pos) = data.reviews.iter().position(|r| r.id == review_id) {
                    data.reviews[pos] = updated.clone();
                }
                Ok(Some(updated))
            }
        }
    }

    /// Returns whether a review was removed.
    pub async fn delete_review(&self, review_id: &str) -> Result<bool> {
        match &self.persistence {
            Persistence::Local(storage) => {
                let mut data = self.data.write().await;
                if !data.reviews.iter().any(|r| r.id == review_id) {
                    return Ok(false);
                }
                let next: Vec<Review> = data
                    .reviews
                    .iter()
                    .filter(|r| r.id != review_id)
                    .cloned()
                    .collect();
                if !commit(storage.as_ref(), REVIEWS_KEY, &next) {
                    return Ok(false);
                }
                data.reviews = next;
                Ok(true)
            }
            Persistence::Remote { backend, auth } => {
                let Some(session) = auth.current_session() else {
                    return Ok(false);
                };
                let _guard = self.mutations.lock().await;
                backend.delete_review(&session, review_id).await?;
                self.data.write().await.reviews.retain(|r| r.id != review_id);
                Ok(true)
            }
        }
    }

    /// Sign-in/sign-out transitions of the remote variant reload/clear the store.
    pub fn spawn_session_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let Persistence::Remote { auth, .. } = &self.persistence else {
            return None;
        };
        let mut sessions = auth.subscribe();
        let store = Arc::clone(self);
        Some(tokio::spawn(async move {
            while sessions.changed().await.is_ok() {
                let signed_in = sessions.borrow_and_update().is_some();
                if signed_in {
                    store.load().await;
                } else {
                    store.clear().await;
                }
            }
        }))
    }

    pub fn current_session(&self) -> Option<Session> {
        match &self.persistence {
            Persistence::Local(_) => None,
            Persistence::Remote { auth, .. } => auth.current_session(),
        }
    }
}

fn read_local<T: DeserializeOwned + Default>(storage: &dyn KeyValueStorage, key: &str) -> T {
    match storage.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring unreadable '{}' entry in local storage: {}", key, e);
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            warn!("Failed to read '{}' from local storage: {}", key, e);
            T::default()
        }
    }
}

fn persist<T: Serialize + ?Sized>(
    storage: &dyn KeyValueStorage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw)
}

fn persist_favorites(
    storage: &dyn KeyValueStorage,
    favorites: &[Favorite],
) -> Result<(), StorageError> {
    let stored: Vec<StoredFavorite> = favorites
        .iter()
        .map(|f| StoredFavorite {
            id: f.media_id,
            media_type: f.media_type,
            added_at: Some(f.created_at),
        })
        .collect();
    persist(storage, FAVORITES_KEY, &stored)
}

fn commit<T: Serialize + ?Sized>(storage: &dyn KeyValueStorage, key: &str, value: &T) -> bool {
    match persist(storage, key, value) {
        Ok(()) => true,
        Err(e) => {
            warn!("'{}' not saved, keeping previous state: {}", key, e);
            false
        }
    }
}
