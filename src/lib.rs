pub mod app;
pub mod config;
pub mod enrich;
pub mod filter;
pub mod genres;
pub mod media;
pub mod models;
pub mod search;
pub mod storage;
pub mod supabase;
pub mod tmdb;
pub mod user_data;
