//! Sample entities and in-memory persistence units.
//!
//! The blog domain covers every property type: simple values, a list and a
//! set, a cascading join list, a plain join, a counter and a wide map.

use std::any::Any;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;
use wideorm_codec::{Value, ValueKind};
use wideorm_core::{
    CascadeType, Config, CoreError, CoreResult, Entity, EntityManager, EntityManagerFactory, EntityMeta,
    EntityProxy, PropertyMeta, PropertyMetaBuilder, PropertyType, PropertyValue,
};
use wideorm_storage::{ColumnStore, InMemoryColumnStore};

/// Column family of `Author` rows.
pub const AUTHORS: &str = "authors";
/// Column family of `Article` rows.
pub const ARTICLES: &str = "articles";
/// Column family of the `Article.comments` wide map.
pub const ARTICLE_COMMENTS: &str = "article_comments";

/// A blog author, keyed by UUID.
#[derive(Debug, Clone, Default)]
pub struct Author {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: Option<String>,
    /// Contact address.
    pub email: Option<String>,
    /// Topics, lazily loaded.
    pub tags: BTreeSet<String>,
    /// Written articles; persisting or merging an author cascades to them.
    pub articles: Vec<EntityProxy>,
}

impl Author {
    /// Creates an author with a name.
    pub fn new(id: Uuid, name: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()),
            ..Self::default()
        }
    }
}

/// A blog article, keyed by a long.
#[derive(Debug, Clone, Default)]
pub struct Article {
    /// Primary key.
    pub id: i64,
    /// Title.
    pub title: Option<String>,
    /// Body text.
    pub body: Option<String>,
    /// Publication flag.
    pub published: Option<bool>,
    /// Keywords in order, lazily loaded.
    pub keywords: Vec<String>,
    /// The author; only the key is written.
    pub author: Option<EntityProxy>,
    /// Read count.
    pub views: Option<i64>,
}

impl Article {
    /// Creates an article with a title.
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: Some(title.to_string()),
            ..Self::default()
        }
    }
}

fn wrong_shape(class_name: &str, property: &str, value: &Value) -> CoreError {
    CoreError::validation(format!(
        "{class_name}.{property} cannot hold a {}",
        value.type_name()
    ))
}

fn optional_text(class_name: &str, property: &str, value: PropertyValue) -> CoreResult<Option<String>> {
    match value.try_into_value(property)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(wrong_shape(class_name, property, &other)),
    }
}

fn texts<'a, C: FromIterator<String>>(items: impl IntoIterator<Item = &'a Value>) -> C {
    items
        .into_iter()
        .filter_map(|v| v.as_text().map(str::to_string))
        .collect()
}

impl Entity for Author {
    fn class_name(&self) -> &'static str {
        "Author"
    }

    fn get(&self, property: &str) -> Option<PropertyValue> {
        match property {
            "id" => Some(Value::Uuid(self.id).into()),
            "name" => self.name.clone().map(|s| Value::text(s).into()),
            "email" => self.email.clone().map(|s| Value::text(s).into()),
            "tags" if !self.tags.is_empty() => {
                Some(Value::Set(self.tags.iter().map(Value::text).collect()).into())
            }
            "articles" if !self.articles.is_empty() => Some(PropertyValue::JoinList(self.articles.clone())),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: PropertyValue) -> CoreResult<()> {
        match property {
            "id" => match value.try_into_value(property)? {
                Value::Uuid(id) => self.id = id,
                other => return Err(wrong_shape("Author", property, &other)),
            },
            "name" => self.name = optional_text("Author", property, value)?,
            "email" => self.email = optional_text("Author", property, value)?,
            "tags" => match value.try_into_value(property)? {
                Value::Null => self.tags.clear(),
                Value::Set(items) => self.tags = texts(&items),
                other => return Err(wrong_shape("Author", property, &other)),
            },
            "articles" => self.articles = value.try_into_join_list(property)?,
            _ => return Err(CoreError::unknown_property("Author", property)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Entity for Article {
    fn class_name(&self) -> &'static str {
        "Article"
    }

    fn get(&self, property: &str) -> Option<PropertyValue> {
        match property {
            "id" => Some(Value::Long(self.id).into()),
            "title" => self.title.clone().map(|s| Value::text(s).into()),
            "body" => self.body.clone().map(|s| Value::text(s).into()),
            "published" => self.published.map(|b| Value::Bool(b).into()),
            "keywords" if !self.keywords.is_empty() => {
                Some(Value::List(self.keywords.iter().map(Value::text).collect()).into())
            }
            "author" => self.author.clone().map(PropertyValue::Join),
            "views" => self.views.map(|n| Value::Long(n).into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: PropertyValue) -> CoreResult<()> {
        match property {
            "id" => match value.try_into_value(property)? {
                Value::Long(id) => self.id = id,
                other => return Err(wrong_shape("Article", property, &other)),
            },
            "title" => self.title = optional_text("Article", property, value)?,
            "body" => self.body = optional_text("Article", property, value)?,
            "published" => match value.try_into_value(property)? {
                Value::Null => self.published = None,
                Value::Bool(b) => self.published = Some(b),
                other => return Err(wrong_shape("Article", property, &other)),
            },
            "keywords" => match value.try_into_value(property)? {
                Value::Null => self.keywords.clear(),
                Value::List(items) => self.keywords = texts(&items),
                other => return Err(wrong_shape("Article", property, &other)),
            },
            "author" => self.author = value.try_into_join(property)?,
            "views" => self.views = value.try_into_value(property)?.as_long(),
            // Wide maps are handles, never held by the entity.
            "comments" => {}
            _ => return Err(CoreError::unknown_property("Article", property)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Creates an empty `Author`.
pub fn new_author() -> Box<dyn Entity> {
    Box::new(Author::default())
}

/// Creates an empty `Article`.
pub fn new_article() -> Box<dyn Entity> {
    Box::new(Article::default())
}

fn build(property: PropertyMetaBuilder) -> PropertyMeta {
    property.build().expect("Invalid fixture property")
}

/// `Author` in `authors`; `articles` cascades persist and merge.
pub fn author_meta() -> EntityMeta {
    EntityMeta::builder("Author", AUTHORS, new_author)
        .id(build(PropertyMeta::builder("id", PropertyType::Id).value_kind(ValueKind::Uuid)))
        .property(build(PropertyMeta::builder("name", PropertyType::Simple).value_kind(ValueKind::Text)))
        .property(build(PropertyMeta::builder("email", PropertyType::Simple).value_kind(ValueKind::Text)))
        .property(build(PropertyMeta::builder("tags", PropertyType::Set).value_kind(ValueKind::Text)))
        .property(build(
            PropertyMeta::builder("articles", PropertyType::JoinList).join("Article", CascadeType::All),
        ))
        .build()
        .expect("Invalid author metadata")
}

/// `Article` in `articles`, with a `views` counter and a `comments` wide
/// map of `Long` to `Text`.
pub fn article_meta() -> EntityMeta {
    EntityMeta::builder("Article", ARTICLES, new_article)
        .id(build(PropertyMeta::builder("id", PropertyType::Id).value_kind(ValueKind::Long)))
        .property(build(PropertyMeta::builder("title", PropertyType::Simple).value_kind(ValueKind::Text)))
        .property(build(PropertyMeta::builder("body", PropertyType::Simple).value_kind(ValueKind::Text)))
        .property(build(PropertyMeta::builder("published", PropertyType::Simple).value_kind(ValueKind::Bool)))
        .property(build(PropertyMeta::builder("keywords", PropertyType::List).value_kind(ValueKind::Text)))
        .property(build(
            PropertyMeta::builder("author", PropertyType::JoinSimple).join("Author", CascadeType::None),
        ))
        .property(build(PropertyMeta::builder("views", PropertyType::Counter)))
        .property(build(
            PropertyMeta::builder("comments", PropertyType::WideMap)
                .key_kind(ValueKind::Long)
                .value_kind(ValueKind::Text)
                .external_column_family(ARTICLE_COMMENTS),
        ))
        .build()
        .expect("Invalid article metadata")
}

/// Metadata of the whole blog domain.
pub fn blog_metas() -> [EntityMeta; 2] {
    [author_meta(), article_meta()]
}

/// A persistence unit over a fresh in-memory store.
pub struct TestUnit {
    /// The store, for inspecting what was written.
    pub store: Arc<InMemoryColumnStore>,
    /// The factory managers are created from.
    pub factory: EntityManagerFactory,
}

impl TestUnit {
    /// Creates a unit with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::new())
    }

    /// Creates a unit with a given configuration.
    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryColumnStore::new());
        let factory = EntityManagerFactory::new(
            config,
            Arc::clone(&store) as Arc<dyn ColumnStore>,
            blog_metas(),
        )
        .expect("Failed to build entity manager factory");
        Self { store, factory }
    }

    /// Creates an entity manager.
    pub fn manager(&self) -> EntityManager {
        self.factory.create_entity_manager()
    }

    /// Returns the number of stored article rows.
    pub fn article_rows(&self) -> usize {
        self.store.row_count(ARTICLES)
    }
}

impl Default for TestUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestUnit {
    type Target = EntityManagerFactory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

/// Runs a test with a manager over a fresh in-memory store.
///
/// # Example
///
/// ```rust
/// use wideorm_testkit::{with_manager, Article};
///
/// with_manager(|manager, _| {
///     manager.persist(Box::new(Article::new(7, "Seven"))).unwrap();
///     assert!(manager.find("Article", 7_i64).unwrap().is_some());
/// });
/// ```
pub fn with_manager<F, R>(f: F) -> R
where
    F: FnOnce(&EntityManager, &InMemoryColumnStore) -> R,
{
    let unit = TestUnit::new();
    let manager = unit.manager();
    f(&manager, &unit.store)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A unit holding `count` published articles with ids `1..=count`.
    pub fn published_articles(count: i64) -> TestUnit {
        let unit = TestUnit::new();
        let manager = unit.manager();
        manager.start_batch().expect("Failed to start batch");
        for id in 1..=count {
            let mut article = Article::new(id, &format!("Article {id}"));
            article.published = Some(true);
            article.keywords = vec![format!("k{id}")];
            manager.persist(Box::new(article)).expect("Failed to persist article");
        }
        manager.end_batch().expect("Failed to commit articles");
        unit
    }

    /// A unit holding one author whose articles `1..=count` were persisted
    /// by cascade.
    pub fn author_with_articles(author_id: Uuid, count: i64) -> TestUnit {
        let unit = TestUnit::new();
        let manager = unit.manager();
        let mut author = Author::new(author_id, "Ada");
        author.articles = (1..=count)
            .map(|id| {
                manager
                    .manage(Box::new(Article::new(id, &format!("Chapter {id}"))))
                    .expect("Failed to manage article")
            })
            .collect();
        manager.persist(Box::new(author)).expect("Failed to persist author");
        unit
    }
}
