use crate::models::Genre;
use std::collections::HashMap;

/// Merges the movie and show taxonomies into one list keyed by id.
///
/// Movie genres are inserted first, then show genres. A duplicate id keeps the
/// slot of its first insertion but takes the later entry's name.
pub fn reconcile(movie: Vec<Genre>, show: Vec<Genre>) -> Vec<Genre> {
    let mut positions: HashMap<u32, usize> = HashMap::with_capacity(movie.len() + show.len());
    let mut merged: Vec<Genre> = Vec::with_capacity(movie.len() + show.len());
    for genre in movie.into_iter().chain(show) {
        match positions.get(&genre.id) {
            Some(&pos) => merged[pos] = genre,
            None => {
                positions.insert(genre.id, merged.len());
                merged.push(genre);
            }
        }
    }
    merged
}

pub fn names_by_id(genres: &[Genre]) -> HashMap<u32, String> {
    genres.iter().map(|g| (g.id, g.name.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genre(id: u32, name: &str) -> Genre {
        Genre {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn reconciling_with_empty_show_list_is_identity() {
        let movie = vec![genre(28, "Action"), genre(18, "Drame")];
        assert_eq!(reconcile(movie.clone(), vec![]), movie);
    }

    #[test]
    fn show_name_wins_on_shared_id() {
        let merged = reconcile(
            vec![genre(18, "Drama"), genre(28, "Action")],
            vec![genre(10759, "Action & Adventure"), genre(18, "Drame")],
        );
        assert_eq!(
            merged,
            vec![
                genre(18, "Drame"),
                genre(28, "Action"),
                genre(10759, "Action & Adventure"),
            ]
        );
    }

    #[test]
    fn builds_name_lookup() {
        let names = names_by_id(&[genre(35, "Comédie")]);
        assert_eq!(names.get(&35).map(String::as_str), Some("Comédie"));
    }
}
