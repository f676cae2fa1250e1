//! Property-based test generators using proptest.
//!
//! Provides strategies for generating blog entities, per-call options and
//! wide map contents.

use crate::fixtures::{Article, Author};
use proptest::prelude::*;
use std::collections::BTreeMap;
use uuid::Uuid;
use wideorm_core::{Options, OptionsBuilder};
use wideorm_storage::ConsistencyLevel;

/// Strategy for generating consistency levels valid for reads and writes.
///
/// `Any` is write-only and is never produced.
pub fn consistency_level_strategy() -> impl Strategy<Value = ConsistencyLevel> {
    prop_oneof![
        Just(ConsistencyLevel::One),
        Just(ConsistencyLevel::Two),
        Just(ConsistencyLevel::Three),
        Just(ConsistencyLevel::Quorum),
        Just(ConsistencyLevel::LocalQuorum),
        Just(ConsistencyLevel::EachQuorum),
        Just(ConsistencyLevel::All),
    ]
}

/// Strategy for generating per-call options.
pub fn options_strategy() -> impl Strategy<Value = Options> {
    (
        prop::option::of(consistency_level_strategy()),
        prop::option::of(1u32..=86_400),
        prop::option::of(0i64..=i64::MAX / 2),
    )
        .prop_map(|(level, ttl, timestamp)| {
            let mut options = OptionsBuilder::no_options();
            if let Some(level) = level {
                options = options.with_consistency(level);
            }
            if let Some(ttl) = ttl {
                options = options.with_ttl(ttl);
            }
            if let Some(timestamp) = timestamp {
                options = options.with_timestamp(timestamp);
            }
            options
        })
}

/// Strategy for generating article titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Za-z0-9 ,.!?'\"-]{0,47}").expect("Invalid regex")
}

/// Strategy for generating keyword lists; duplicates are kept.
pub fn keywords_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::string::string_regex("[a-z]{1,12}").expect("Invalid regex"),
        0..6,
    )
}

/// Strategy for generating articles without joins or counters.
pub fn article_strategy() -> impl Strategy<Value = Article> {
    (
        1i64..100_000,
        title_strategy(),
        prop::option::of(any::<String>()),
        prop::option::of(any::<bool>()),
        keywords_strategy(),
    )
        .prop_map(|(id, title, body, published, keywords)| Article {
            id,
            title: Some(title),
            body,
            published,
            keywords,
            ..Article::default()
        })
}

/// Strategy for generating authors without articles.
pub fn author_strategy() -> impl Strategy<Value = Author> {
    (
        any::<u128>(),
        prop::string::string_regex("[A-Z][a-z]{1,15}").expect("Invalid regex"),
        prop::option::of(prop::string::string_regex("[a-z]{1,10}@[a-z]{1,10}\\.org").expect("Invalid regex")),
        prop::collection::btree_set(prop::string::string_regex("[a-z]{2,8}").expect("Invalid regex"), 0..4),
    )
        .prop_map(|(id, name, email, tags)| Author {
            id: Uuid::from_u128(id),
            name: Some(name),
            email,
            tags,
            articles: Vec::new(),
        })
}

/// Strategy for generating wide map contents: comment text by timestamp.
pub fn comments_strategy() -> impl Strategy<Value = BTreeMap<i64, String>> {
    prop::collection::btree_map(
        any::<i64>(),
        prop::string::string_regex("[ -~]{0,64}").expect("Invalid regex"),
        0..32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::test_runner::Config as ProptestConfig;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn consistency_level_is_readable(level in consistency_level_strategy()) {
            prop_assert_ne!(level, ConsistencyLevel::Any);
        }

        #[test]
        fn ttl_is_positive(options in options_strategy()) {
            prop_assert!(options.ttl().map_or(true, |ttl| ttl > 0));
        }

        #[test]
        fn article_has_a_title(article in article_strategy()) {
            prop_assert!(article.title.as_deref().map_or(false, |t| !t.is_empty()));
            prop_assert!(article.author.is_none());
        }

        #[test]
        fn author_has_no_articles(author in author_strategy()) {
            prop_assert!(author.articles.is_empty());
            prop_assert!(author.name.is_some());
        }
    }
}
