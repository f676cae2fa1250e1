//! Cross-crate integration test helpers.
//!
//! Provides a harness that persists articles through an entity manager and
//! verifies every tracked article against what the store returns.

use crate::fixtures::{Article, TestUnit};
use std::collections::BTreeMap;
use wideorm_codec::Value;
use wideorm_core::{Entity, EntityManager, EntityProxy};

/// Properties compared by [`ArticleHarness::verify`].
pub const VERIFIED_PROPERTIES: [&str; 4] = ["title", "body", "published", "keywords"];

/// A test harness tracking persisted articles.
pub struct ArticleHarness {
    /// The persistence unit.
    pub unit: TestUnit,
    manager: EntityManager,
    expected: BTreeMap<i64, Article>,
}

impl ArticleHarness {
    /// Creates a harness over a fresh in-memory store.
    pub fn new() -> Self {
        let unit = TestUnit::new();
        let manager = unit.manager();
        Self {
            unit,
            manager,
            expected: BTreeMap::new(),
        }
    }

    /// Returns the entity manager.
    pub fn manager(&self) -> &EntityManager {
        &self.manager
    }

    /// Persists an article and tracks it.
    pub fn put(&mut self, article: Article) -> EntityProxy {
        let proxy = self
            .manager
            .persist(Box::new(article.clone()))
            .expect("Failed to persist article");
        self.expected.insert(article.id, article);
        proxy
    }

    /// Changes the title of a tracked article through a found proxy.
    pub fn retitle(&mut self, id: i64, title: &str) {
        let proxy = self
            .manager
            .find("Article", id)
            .expect("Failed to find article")
            .expect("Article should exist");
        proxy
            .set("title", Value::text(title))
            .expect("Failed to set title");
        self.manager.merge(&proxy).expect("Failed to merge article");
        if let Some(article) = self.expected.get_mut(&id) {
            article.title = Some(title.to_string());
        }
    }

    /// Removes an article and stops tracking it.
    pub fn remove(&mut self, id: i64) {
        let proxy = self
            .manager
            .get_reference("Article", id)
            .expect("Failed to reference article");
        self.manager.remove(&proxy).expect("Failed to remove article");
        self.expected.remove(&id);
    }

    /// Loads an article and asserts it matches the tracked copy.
    pub fn verify(&self, id: i64) -> Option<EntityProxy> {
        let found = self.manager.find("Article", id).expect("Failed to find article");
        match (self.expected.get(&id), &found) {
            (Some(expected), Some(proxy)) => {
                for property in VERIFIED_PROPERTIES {
                    let want = expected.get(property).and_then(|v| v.as_value().cloned());
                    let got = proxy.get_value(property).expect("Failed to read property");
                    assert_eq!(got, want, "Article {id} mismatch on {property}");
                }
            }
            (None, Some(_)) => panic!("Article {id} was removed but is still stored"),
            (Some(_), None) => panic!("Article {id} is tracked but not stored"),
            (None, None) => {}
        }
        found
    }

    /// Verifies every tracked article.
    pub fn verify_all(&self) {
        for id in self.expected.keys() {
            self.verify(*id);
        }
    }

    /// Returns the count of tracked articles.
    pub fn tracked_count(&self) -> usize {
        self.expected.len()
    }
}

impl Default for ArticleHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_tracks_writes() {
        let mut harness = ArticleHarness::new();
        let mut article = Article::new(1, "First");
        article.keywords = vec!["rust".into(), "orm".into()];
        harness.put(article);
        harness.put(Article::new(2, "Second"));
        harness.verify_all();
        assert_eq!(harness.tracked_count(), 2);

        harness.retitle(1, "First, revised");
        harness.remove(2);
        harness.verify_all();
        assert!(harness.verify(2).is_none());
        assert_eq!(harness.unit.article_rows(), 1);
    }
}
