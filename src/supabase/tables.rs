use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{BackendApi, NewReview, FAVORITES_TABLE, REVIEWS_TABLE};
use crate::config::SupabaseConfig;
use crate::models::{Favorite, MediaKey, Review, Session};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// PostgREST access to the `favorites` and `reviews` tables.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    client: Client,
    rest_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Supabase HTTP client")?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            anon_key: config.anon_key.clone(),
        })
    }

    fn request(&self, method: Method, url: &str, session: &Session) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
    }

    fn table_url(&self, table: &str, filter: &str) -> String {
        format!("{}/{table}?{filter}", self.rest_url)
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        req: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let res = req
            .send()
            .await
            .with_context(|| format!("Supabase {what} request failed"))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("reading Supabase {what} body failed"))?;
        if !status.is_success() {
            return Err(anyhow!("Supabase {what} failed ({status}): {text}"));
        }
        serde_json::from_str(&text).with_context(|| format!("Supabase {what} JSON parse failed"))
    }

    async fn send_empty(&self, req: RequestBuilder, what: &str) -> Result<()> {
        let res = req
            .send()
            .await
            .with_context(|| format!("Supabase {what} request failed"))?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("Supabase {what} failed ({status}): {text}"));
        }
        Ok(())
    }

    async fn select_for_user<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        session: &Session,
    ) -> Result<Vec<T>> {
        let filter = format!(
            "select=*&user_id=eq.{}&order=created_at.desc",
            urlencoding::encode(&session.user.id)
        );
        let url = self.table_url(table, &filter);
        let rows: Vec<T> = self
            .send_json(self.request(Method::GET, &url, session), "select")
            .await?;
        debug!(table, rows = rows.len(), "Loaded user rows");
        Ok(rows)
    }

    async fn insert_row<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        session: &Session,
        row: Value,
    ) -> Result<T> {
        let url = format!("{}/{table}", self.rest_url);
        let req = self
            .request(Method::POST, &url, session)
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(&row);
        self.send_json(req, "insert").await
    }

    async fn delete_by_id(&self, table: &str, session: &Session, id: &str) -> Result<()> {
        let url = self.table_url(table, &format!("id=eq.{}", urlencoding::encode(id)));
        self.send_empty(self.request(Method::DELETE, &url, session), "delete")
            .await
    }
}

#[async_trait]
impl BackendApi for SupabaseClient {
    async fn select_favorites(&self, session: &Session) -> Result<Vec<Favorite>> {
        self.select_for_user(FAVORITES_TABLE, session).await
    }

    async fn insert_favorite(&self, session: &Session, key: MediaKey) -> Result<Favorite> {
        let row = json!({
            "user_id": session.user.id,
            "media_id": key.id,
            "media_type": key.media_type,
        });
        self.insert_row(FAVORITES_TABLE, session, row).await
    }

    async fn delete_favorite(&self, session: &Session, id: &str) -> Result<()> {
        self.delete_by_id(FAVORITES_TABLE, session, id).await
    }

    async fn select_reviews(&self, session: &Session) -> Result<Vec<Review>> {
        self.select_for_user(REVIEWS_TABLE, session).await
    }

    async fn insert_review(&self, session: &Session, review: NewReview) -> Result<Review> {
        let row = json!({
            "user_id": session.user.id,
            "media_id": review.key.id,
            "media_type": review.key.media_type,
            "rating": review.rating,
            "comment": review.comment,
        });
        self.insert_row(REVIEWS_TABLE, session, row).await
    }

    async fn update_review(
        &self,
        session: &Session,
        id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<Review> {
        let url = self.table_url(REVIEWS_TABLE, &format!("id=eq.{}", urlencoding::encode(id)));
        let req = self
            .request(Method::PATCH, &url, session)
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(&json!({ "rating": rating, "comment": comment }));
        self.send_json(req, "update").await
    }

    async fn delete_review(&self, session: &Session, id: &str) -> Result<()> {
        self.delete_by_id(REVIEWS_TABLE, session, id).await
    }
}
