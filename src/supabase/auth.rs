use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use super::AuthApi;
use crate::config::SupabaseConfig;
use crate::models::{Session, User};

/// Email/password sessions against the Supabase auth endpoints.
#[derive(Debug)]
pub struct SupabaseAuth {
    client: Client,
    auth_url: String,
    anon_key: String,
    session: watch::Sender<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    Pending(AuthUser),
}

impl From<AuthUser> for User {
    fn from(u: AuthUser) -> Self {
        User {
            id: u.id,
            email: u.email,
        }
    }
}

impl From<TokenResponse> for Session {
    fn from(t: TokenResponse) -> Self {
        Session {
            user: t.user.into(),
            access_token: t.access_token,
        }
    }
}

impl SupabaseAuth {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Supabase auth HTTP client")?;
        let (session, _) = watch::channel(None);
        Ok(Self {
            client,
            auth_url: format!("{}/auth/v1", config.url.trim_end_matches('/')),
            anon_key: config.anon_key.clone(),
            session,
        })
    }

    async fn post_credentials<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        email: &str,
        password: &str,
    ) -> Result<T> {
        let res = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .context("auth request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading auth body failed")?;
        if !status.is_success() {
            return Err(anyhow!("auth request rejected ({status}): {text}"));
        }
        serde_json::from_str(&text).context("auth JSON parse failed")
    }

    fn publish(&self, session: Option<Session>) {
        self.session.send_replace(session);
    }
}

#[async_trait]
impl AuthApi for SupabaseAuth {
    fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let url = format!("{}/signup", self.auth_url);
        let response: SignUpResponse = self.post_credentials(&url, email, password).await?;
        match response {
            SignUpResponse::Session(token) => {
                let session = Session::from(token);
                info!("Signed up and signed in user {}", session.user.id);
                self.publish(Some(session.clone()));
                Ok(Some(session))
            }
            SignUpResponse::Pending(user) => {
                info!("Signed up user {}, awaiting email confirmation", user.id);
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/token?grant_type=password", self.auth_url);
        let token: TokenResponse = self.post_credentials(&url, email, password).await?;
        let session = Session::from(token);
        info!("Signed in user {}", session.user.id);
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.current_session() else {
            return Ok(());
        };
        let url = format!("{}/logout", self.auth_url);
        let result = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;
        // The local session is dropped even when the server call fails.
        self.publish(None);
        match result {
            Ok(res) if res.status().is_success() => {
                info!("Signed out user {}", session.user.id);
                Ok(())
            }
            Ok(res) => {
                let status = res.status();
                warn!("Sign-out rejected by backend ({})", status);
                Err(anyhow!("sign-out rejected ({status})"))
            }
            Err(e) => Err(anyhow::Error::new(e).context("sign-out request failed")),
        }
    }
}
