//! The deduplicated aggregate of all films of a crawl run

use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use uuid::Uuid;

use crate::model::{Film, FilmKey, Source};

/// Deduplicated, mergeable set of films
///
/// Films are keyed by their natural key. Adding a film whose key is already
/// present keeps the earlier entry, which makes merging commutative with
/// respect to the key set and idempotent.
#[derive(Debug, Clone)]
pub struct Catalogue {
    list_id: Uuid,
    created_at: DateTime<Utc>,
    films: HashMap<FilmKey, Film>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self {
            list_id: Uuid::new_v4(),
            created_at: Utc::now(),
            films: HashMap::new(),
        }
    }

    /// Rebuilds a catalogue with known metadata, e.g. after loading it
    pub fn with_metadata(list_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            list_id,
            created_at,
            films: HashMap::new(),
        }
    }

    pub fn list_id(&self) -> Uuid {
        self.list_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.films.len()
    }

    pub fn is_empty(&self) -> bool {
        self.films.is_empty()
    }

    pub fn contains(&self, film: &Film) -> bool {
        self.films.contains_key(&film.key())
    }

    /// Adds a film unless one with the same natural key is present
    ///
    /// Returns whether the film was added.
    pub fn add(&mut self, film: Film) -> bool {
        match self.films.entry(film.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(film);
                true
            }
        }
    }

    /// Adds every film not already present; returns how many were added
    pub fn add_all<I: IntoIterator<Item = Film>>(&mut self, films: I) -> usize {
        films.into_iter().filter(|film| self.add(film.clone())).count()
    }

    /// Merges another catalogue (a crawl result or an imported list) into this one
    ///
    /// Returns how many films were new.
    pub fn merge(&mut self, other: &Catalogue) -> usize {
        other
            .films
            .values()
            .filter(|film| self.add((*film).clone()))
            .count()
    }

    /// Read-only traversal for serialization
    pub fn iter(&self) -> impl Iterator<Item = &Film> {
        self.films.values()
    }

    /// Films of one source
    pub fn films_of(&self, source: Source) -> impl Iterator<Item = &Film> {
        self.films.values().filter(move |film| film.source == source)
    }

    /// Number of films per source, ordered by source
    pub fn count_by_source(&self) -> Vec<(Source, usize)> {
        let mut counts: HashMap<Source, usize> = HashMap::new();
        for film in self.films.values() {
            *counts.entry(film.source).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort();
        counts
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::new()
    }
}

/// Two catalogues are equal when they hold the same films
impl PartialEq for Catalogue {
    fn eq(&self, other: &Self) -> bool {
        self.films.len() == other.films.len()
            && self.films.keys().all(|key| other.films.contains_key(key))
    }
}

impl Eq for Catalogue {}

impl FromIterator<Film> for Catalogue {
    fn from_iter<I: IntoIterator<Item = Film>>(iter: I) -> Self {
        let mut catalogue = Catalogue::new();
        catalogue.add_all(iter);
        catalogue
    }
}

impl Extend<Film> for Catalogue {
    fn extend<I: IntoIterator<Item = Film>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn film(source: Source, title: &str) -> Film {
        let published = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Film::new(source, "Topic", title, published, Duration::from_secs(600))
    }

    #[test]
    fn test_merge_with_itself_is_identity() {
        let a: Catalogue = vec![film(Source::Ard, "a"), film(Source::Zdf, "b")]
            .into_iter()
            .collect();
        let before = a.clone();

        let mut merged = a.clone();
        assert_eq!(merged.merge(&a), 0);
        assert_eq!(merged, before);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut target: Catalogue = vec![film(Source::Ard, "a")].into_iter().collect();
        let imported: Catalogue = vec![film(Source::Ard, "a"), film(Source::Br, "c")]
            .into_iter()
            .collect();

        assert_eq!(target.merge(&imported), 1);
        let once = target.clone();
        assert_eq!(target.merge(&imported), 0);
        assert_eq!(target, once);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a: Catalogue = vec![film(Source::Ard, "a"), film(Source::Ard, "shared")]
            .into_iter()
            .collect();
        let b: Catalogue = vec![film(Source::Ard, "shared"), film(Source::Hr, "b")]
            .into_iter()
            .collect();

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.len(), 3);
    }

    #[test]
    fn test_earlier_entry_wins() {
        let first = film(Source::Ard, "a").with_description("first");
        let second = film(Source::Ard, "a").with_description("second");

        let mut catalogue = Catalogue::new();
        assert!(catalogue.add(first));
        assert!(!catalogue.add(second));

        let kept = catalogue.iter().next().unwrap();
        assert_eq!(kept.description, "first");
    }

    #[test]
    fn test_count_by_source() {
        let catalogue: Catalogue = vec![
            film(Source::Zdf, "x"),
            film(Source::Ard, "a"),
            film(Source::Ard, "b"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            catalogue.count_by_source(),
            vec![(Source::Ard, 2), (Source::Zdf, 1)]
        );
        assert_eq!(catalogue.films_of(Source::Ard).count(), 2);
    }
}
