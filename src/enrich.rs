use crate::models::{MediaKey, Title, Video};
use crate::tmdb::CatalogApi;
use anyhow::Result;
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

pub const TRAILER_TYPE: &str = "Trailer";
pub const TRAILER_SITES: [&str; 2] = ["YouTube", "Vimeo"];
pub const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    /// Language subtag a trailer must match (besides English). `None` accepts any.
    pub language: Option<String>,
    pub include_credits: bool,
    pub watch_region: Option<String>,
}

/// First trailer hosted on a supported site, optionally restricted to the
/// requested language or English.
pub fn select_trailer(videos: &[Video], language: Option<&str>) -> Option<Video> {
    videos
        .iter()
        .find(|v| {
            v.video_type == TRAILER_TYPE
                && TRAILER_SITES.contains(&v.site.as_str())
                && language.map_or(true, |lang| {
                    matches!(
                        v.iso_639_1.as_deref(),
                        Some(tag) if tag == lang || tag == FALLBACK_LANGUAGE
                    )
                })
        })
        .cloned()
}

/// Fetches details, videos and the optional sub-resources of one title together.
/// Any failing call fails the whole title.
pub async fn fetch_details(
    api: &dyn CatalogApi,
    key: MediaKey,
    opts: &EnrichOptions,
) -> Result<Title> {
    let credits = async {
        if opts.include_credits {
            api.credits(key).await.map(Some)
        } else {
            Ok(None)
        }
    };
    let providers = async {
        match opts.watch_region.as_deref() {
            Some(region) => api.watch_providers(key, region).await,
            None => Ok(None),
        }
    };
    let (mut detail, videos, credits, watch_providers) =
        tokio::try_join!(api.details(key), api.videos(key), credits, providers)?;

    detail.trailer = select_trailer(&videos, opts.language.as_deref());
    detail.credits = credits;
    detail.watch_providers = watch_providers;
    debug!(
        key = %key,
        videos = videos.len(),
        has_trailer = detail.trailer.is_some(),
        "Enriched title"
    );
    Ok(detail)
}

/// Enriches a list entry, keeping its genre ids over the detail record's.
pub async fn enrich_title(
    api: &dyn CatalogApi,
    base: &Title,
    opts: &EnrichOptions,
) -> Result<Title> {
    let mut enriched = fetch_details(api, base.key(), opts).await?;
    if !base.genre_ids.is_empty() {
        enriched.genre_ids = base.genre_ids.clone();
    }
    Ok(enriched)
}

/// Enriches a batch with at most `limit` titles in flight, preserving order.
/// The first failure aborts the batch.
pub async fn enrich_batch(
    api: &dyn CatalogApi,
    titles: Vec<Title>,
    opts: &EnrichOptions,
    limit: usize,
) -> Result<Vec<Title>> {
    futures::stream::iter(titles)
        .map(|title| async move { enrich_title(api, &title, opts).await })
        .buffered(limit.max(1))
        .try_collect()
        .await
}
