//! Fetch catalog data through the same client and enrichment the server uses.
//! Usage:
//!   cargo run --bin catalog_props -- trending
//!   cargo run --bin catalog_props -- search <query>
//!   cargo run --bin catalog_props -- movie <tmdb_id>
//!   cargo run --bin catalog_props -- tv <tmdb_id>
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use moviesphere::config::{AppConfig, DEFAULT_ENRICH_CONCURRENCY};
use moviesphere::enrich::{self, EnrichOptions};
use moviesphere::genres;
use moviesphere::models::{MediaKey, MediaType, Title};
use moviesphere::tmdb::{self, CatalogApi, TmdbClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else {
        usage();
    };

    let config = AppConfig::from_env()?;
    let client = TmdbClient::new(&config.tmdb)?;
    let options = EnrichOptions {
        language: Some(tmdb::language_tag(client.language()).to_string()),
        include_credits: false,
        watch_region: config.watch_region.clone(),
    };

    let genre_names = genres::names_by_id(&client.genres().await?);

    let output = match command.as_str() {
        "trending" => {
            let (movies, shows) =
                tokio::try_join!(client.trending_movies(), client.trending_shows())?;
            let (movies, shows) = tokio::try_join!(
                enrich::enrich_batch(&client, movies, &options, DEFAULT_ENRICH_CONCURRENCY),
                enrich::enrich_batch(&client, shows, &options, DEFAULT_ENRICH_CONCURRENCY),
            )?;
            json!({
                "movies": movies.iter().map(|t| summary(t, &genre_names)).collect::<Vec<_>>(),
                "shows": shows.iter().map(|t| summary(t, &genre_names)).collect::<Vec<_>>(),
            })
        }
        "search" => {
            let query = args[2..].join(" ");
            let found = client.search_multi(&query).await?;
            json!(found
                .iter()
                .map(|t| summary(t, &genre_names))
                .collect::<Vec<_>>())
        }
        kind => {
            let media_type = MediaType::from_str(kind).unwrap_or_else(|_| usage());
            let id: u32 = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("missing tmdb_id"))?
                .parse()
                .context("tmdb_id must be an integer")?;
            let detail_options = EnrichOptions {
                include_credits: true,
                ..options
            };
            let title =
                enrich::fetch_details(&client, MediaKey::new(id, media_type), &detail_options)
                    .await?;
            serde_json::to_value(&title)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn summary(title: &Title, genre_names: &HashMap<u32, String>) -> Value {
    let genres: Vec<&str> = title
        .genre_ids
        .iter()
        .filter_map(|id| genre_names.get(id).map(String::as_str))
        .collect();
    json!({
        "id": title.id,
        "media_type": title.media_type,
        "name": title.name,
        "year": title.release_year(),
        "vote_average": title.vote_average,
        "genres": genres,
        "poster": title.poster_path.as_deref().map(tmdb::poster_url),
        "trailer": title.trailer.as_ref().map(|v| format!("{} {}", v.site, v.key)),
    })
}

fn usage() -> ! {
    eprintln!("Usage: cargo run --bin catalog_props -- trending");
    eprintln!("       cargo run --bin catalog_props -- search <query>");
    eprintln!("       cargo run --bin catalog_props -- movie|tv <tmdb_id>");
    std::process::exit(1);
}
