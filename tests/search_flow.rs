mod common;

use common::{title, trending_titles, FakeCatalog};
use moviesphere::enrich::EnrichOptions;
use moviesphere::media::{MediaStore, SearchOutcome};
use moviesphere::models::MediaType;
use moviesphere::search::SearchDebouncer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn media(catalog: Arc<FakeCatalog>) -> Arc<MediaStore> {
    Arc::new(MediaStore::new(catalog, EnrichOptions::default(), 8))
}

#[tokio::test(start_paused = true)]
async fn debounce_only_searches_settled_query() {
    let mut results = HashMap::new();
    results.insert(
        "abc".to_string(),
        vec![title(1, MediaType::Movie, &[28], "2024-01-01")],
    );
    let catalog = Arc::new(FakeCatalog {
        search_results: results,
        ..Default::default()
    });
    let debouncer = Arc::new(SearchDebouncer::new(
        media(catalog.clone()),
        Duration::from_millis(500),
    ));

    let mut handles = Vec::new();
    for query in ["a", "ab", "abc"] {
        let debouncer = debouncer.clone();
        handles.push(tokio::spawn(async move { debouncer.submit(query).await }));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(outcomes[0], SearchOutcome::Superseded);
    assert_eq!(outcomes[1], SearchOutcome::Superseded);
    assert_eq!(outcomes[2], SearchOutcome::Applied { movies: 1, shows: 0 });
    assert_eq!(catalog.searches(), vec!["abc".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn stale_response_is_discarded() {
    let mut results = HashMap::new();
    results.insert(
        "slow".to_string(),
        vec![title(1, MediaType::Movie, &[28], "2024-01-01")],
    );
    results.insert(
        "fast".to_string(),
        vec![
            title(2, MediaType::Tv, &[18], "2024-01-01"),
            title(3, MediaType::Movie, &[18], "2024-01-01"),
        ],
    );
    let mut delays = HashMap::new();
    delays.insert("slow".to_string(), Duration::from_millis(300));
    let catalog = Arc::new(FakeCatalog {
        search_results: results,
        search_delays: delays,
        ..Default::default()
    });
    let media = media(catalog);

    let (slow, fast) = tokio::join!(media.search("slow"), media.search("fast"));
    assert_eq!(slow, SearchOutcome::Superseded);
    assert_eq!(fast, SearchOutcome::Applied { movies: 1, shows: 1 });

    let state = media.snapshot().await;
    assert_eq!(state.search_query, "fast");
    assert!(!state.is_loading);
    assert_eq!(state.results.movies[0].id, 3);
    assert_eq!(state.results.shows[0].id, 2);
}

#[tokio::test(start_paused = true)]
async fn empty_query_clears_without_request() {
    let catalog = Arc::new(FakeCatalog {
        movies: trending_titles(MediaType::Movie, 4),
        ..Default::default()
    });
    let media = media(catalog.clone());
    media.fetch_trending().await;
    assert_eq!(media.snapshot().await.trending.movies.len(), 4);

    let outcome = media.search("   ").await;
    assert_eq!(outcome, SearchOutcome::Applied { movies: 0, shows: 0 });
    assert!(catalog.searches().is_empty());
    let state = media.snapshot().await;
    assert!(state.results.movies.is_empty());
    assert!(!state.is_searching());
    assert_eq!(state.displayed().movies.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn results_without_poster_are_dropped() {
    let mut posterless = title(2, MediaType::Movie, &[28], "2024-01-01");
    posterless.poster_path = None;
    let mut results = HashMap::new();
    results.insert(
        "dune".to_string(),
        vec![title(1, MediaType::Movie, &[28], "2021-09-15"), posterless],
    );
    let catalog = Arc::new(FakeCatalog {
        search_results: results,
        ..Default::default()
    });
    let media = media(catalog);

    let outcome = media.search("dune").await;
    assert_eq!(outcome, SearchOutcome::Applied { movies: 1, shows: 0 });
    let movies = media.snapshot().await.results.movies;
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].id, 1);
    // Search enrichment accepts trailers in any language.
    assert!(movies[0].trailer.is_some());
}

#[tokio::test(start_paused = true)]
async fn failed_search_keeps_previous_results() {
    let mut results = HashMap::new();
    results.insert(
        "dune".to_string(),
        vec![title(9, MediaType::Movie, &[878], "2021-09-15")],
    );
    let catalog = Arc::new(FakeCatalog {
        movies: trending_titles(MediaType::Movie, 2),
        search_results: results,
        ..Default::default()
    });
    let media = media(catalog);
    media.fetch_trending().await;
    media.search("dune").await;

    let outcome = media.search("unknown").await;
    assert_eq!(outcome, SearchOutcome::Failed);
    let state = media.snapshot().await;
    assert_eq!(state.search_query, "unknown");
    assert_eq!(state.results.movies[0].id, 9);
    assert_eq!(state.trending.movies.len(), 2);
    assert!(!state.is_loading);
}
