use crate::tmdb::TMDB_BASE;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LANGUAGE: &str = "fr-FR";
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 8;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_STORAGE_DIR: &str = ".moviesphere";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3146";

pub const REQUIRED_VARS: [&str; 1] = ["TMDB_API_KEY"];

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceConfig {
    Local {
        dir: PathBuf,
        quota_bytes: Option<usize>,
    },
    Remote(SupabaseConfig),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tmdb: TmdbConfig,
    pub watch_region: Option<String>,
    pub enrich_concurrency: usize,
    pub search_debounce: Duration,
    pub persistence: PersistenceConfig,
    pub bind_addr: SocketAddr,
}

impl TmdbConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = non_empty(lookup("TMDB_API_KEY")).context("TMDB_API_KEY not set")?;
        Ok(Self {
            api_key,
            base_url: non_empty(lookup("TMDB_BASE_URL")).unwrap_or_else(|| TMDB_BASE.to_string()),
            language: non_empty(lookup("TMDB_LANGUAGE"))
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let tmdb = TmdbConfig::from_lookup(lookup)?;

        let enrich_concurrency =
            parse_or(lookup, "ENRICH_CONCURRENCY", DEFAULT_ENRICH_CONCURRENCY)?;
        if enrich_concurrency == 0 {
            return Err(anyhow!("ENRICH_CONCURRENCY must be at least 1"));
        }
        let debounce_ms = parse_or(lookup, "SEARCH_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?;

        let persistence = match (
            non_empty(lookup("SUPABASE_URL")),
            non_empty(lookup("SUPABASE_ANON_KEY")),
        ) {
            (Some(url), Some(anon_key)) => PersistenceConfig::Remote(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            }),
            (Some(_), None) | (None, Some(_)) => {
                return Err(anyhow!(
                    "SUPABASE_URL and SUPABASE_ANON_KEY must be set together"
                ))
            }
            (None, None) => PersistenceConfig::Local {
                dir: non_empty(lookup("STORAGE_DIR"))
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
                quota_bytes: non_empty(lookup("STORAGE_QUOTA_BYTES"))
                    .map(|v| v.parse::<usize>())
                    .transpose()
                    .context("STORAGE_QUOTA_BYTES must be a number")?,
            },
        };

        let bind_addr = non_empty(lookup("BIND_ADDR"))
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address")?;

        Ok(Self {
            tmdb,
            watch_region: non_empty(lookup("TMDB_WATCH_REGION")).map(|r| r.to_uppercase()),
            enrich_concurrency,
            search_debounce: Duration::from_millis(debounce_ms),
            persistence,
            bind_addr,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(&|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_to_local_persistence() {
        let config = config_from(&[("TMDB_API_KEY", "k")]).unwrap();
        assert_eq!(config.tmdb.language, "fr-FR");
        assert_eq!(config.tmdb.base_url, TMDB_BASE);
        assert_eq!(config.enrich_concurrency, 8);
        assert_eq!(config.search_debounce, Duration::from_millis(500));
        assert_eq!(
            config.persistence,
            PersistenceConfig::Local {
                dir: PathBuf::from(".moviesphere"),
                quota_bytes: None
            }
        );
    }

    #[test]
    fn supabase_vars_select_remote_persistence() {
        let config = config_from(&[
            ("TMDB_API_KEY", "k"),
            ("SUPABASE_URL", "https://abc.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
        .unwrap();
        assert_eq!(
            config.persistence,
            PersistenceConfig::Remote(SupabaseConfig {
                url: "https://abc.supabase.co".to_string(),
                anon_key: "anon".to_string()
            })
        );
    }

    #[test]
    fn rejects_missing_key_and_half_configured_backend() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("TMDB_API_KEY", "k"), ("SUPABASE_URL", "https://x")]).is_err());
        assert!(config_from(&[("TMDB_API_KEY", "k"), ("ENRICH_CONCURRENCY", "0")]).is_err());
        assert!(config_from(&[("TMDB_API_KEY", "k"), ("SEARCH_DEBOUNCE_MS", "soon")]).is_err());
    }
}
