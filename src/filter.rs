use crate::models::{Favorite, Title};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const TRENDING_SAMPLE_SIZE: usize = 12;

/// Active filter selection. Genres are OR-ed, dimensions are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub genres: Vec<u32>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl Filters {
    pub fn apply(&self, items: Vec<Title>) -> Vec<Title> {
        filter_by_year(filter_by_genres(items, &self.genres), self.year)
    }

    /// Adds the genre if absent, removes it otherwise.
    pub fn toggle_genre(&mut self, genre_id: u32) {
        if let Some(pos) = self.genres.iter().position(|g| *g == genre_id) {
            self.genres.remove(pos);
        } else {
            self.genres.push(genre_id);
        }
    }
}

pub fn filter_by_genres(items: Vec<Title>, selected: &[u32]) -> Vec<Title> {
    if selected.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|t| t.genre_ids.iter().any(|id| selected.contains(id)))
        .collect()
}

pub fn filter_by_year(items: Vec<Title>, year: Option<i32>) -> Vec<Title> {
    let Some(year) = year else {
        return items;
    };
    items
        .into_iter()
        .filter(|t| t.release_year() == Some(year))
        .collect()
}

pub fn favorite_media(titles: &[Title], favorites: &[Favorite]) -> Vec<Title> {
    titles
        .iter()
        .filter(|t| favorites.iter().any(|f| f.key() == t.key()))
        .cloned()
        .collect()
}

/// Random subset of `min(n, len)` distinct items.
pub fn sample<R: Rng + ?Sized>(items: &[Title], n: usize, rng: &mut R) -> Vec<Title> {
    items.choose_multiple(rng, n).cloned().collect()
}
