use crate::models::{Favorite, MediaKey, Review, Session};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

mod auth;
mod tables;

pub use auth::SupabaseAuth;
pub use tables::SupabaseClient;

pub const FAVORITES_TABLE: &str = "favorites";
pub const REVIEWS_TABLE: &str = "reviews";

/// Row storage for favorites and reviews, scoped to the session's user.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn select_favorites(&self, session: &Session) -> Result<Vec<Favorite>>;
    async fn insert_favorite(&self, session: &Session, key: MediaKey) -> Result<Favorite>;
    async fn delete_favorite(&self, session: &Session, id: &str) -> Result<()>;
    async fn select_reviews(&self, session: &Session) -> Result<Vec<Review>>;
    async fn insert_review(&self, session: &Session, review: NewReview) -> Result<Review>;
    async fn update_review(
        &self,
        session: &Session,
        id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<Review>;
    async fn delete_review(&self, session: &Session, id: &str) -> Result<()>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    fn current_session(&self) -> Option<Session>;
    /// Receives every sign-in/sign-out transition.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
    /// `None` when the backend requires email confirmation before a session exists.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_out(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub key: MediaKey,
    pub rating: u8,
    pub comment: String,
}
