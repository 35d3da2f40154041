//! # Core Traits (Ports)
//!
//! The document store and the user store are opaque collaborators; any
//! adapter must implement these traits to be wired into the repository
//! layer. Filters, pipelines, and index specs are the port vocabulary
//! the adapters interpret.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::NewUser;

/// A stored document. Models round-trip through `serde_json`.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Store-native filter predicate.
///
/// `Eq` follows document-store semantics: it matches when the field
/// equals the value, or when the field is an array containing it.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Match every document.
    All,
    Eq(String, serde_json::Value),
    /// Case-insensitive substring match on a string field.
    Contains { field: String, needle: String },
    /// Logical OR of sub-filters.
    Or(Vec<Filter>),
}

impl Filter {
    /// Equality filter on the store-generated id.
    pub fn by_id(id: Uuid) -> Self {
        Filter::Eq("_id".to_string(), serde_json::Value::String(id.to_string()))
    }
}

/// Cursor modifiers for a `find`: optional sort, then skip, then limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<(String, SortOrder)>,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Replace each document by one copy per element of the named array
    /// field, with the field set to that element. Documents without the
    /// field are dropped.
    Unwind(String),
    /// Group by the named field's value; emits `{"_id": value, "count": n}`.
    GroupCount(String),
    Sort(String, SortOrder),
    Limit(u64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

/// Index specification. `ensure_index` with an equal spec is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    pub keys: Vec<(String, SortOrder)>,
}

impl IndexSpec {
    pub fn new<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, SortOrder)>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|(field, order)| (field.to_string(), order))
                .collect(),
        }
    }
}

/// Document persistence contract for one collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Collection: Send + Sync {
    async fn find(&self, filter: Filter, options: FindOptions) -> anyhow::Result<Vec<Document>>;
    async fn find_one(&self, filter: Filter) -> anyhow::Result<Option<Document>>;
    /// Inserts the document and returns the store-generated id.
    async fn insert(&self, doc: Document) -> anyhow::Result<Uuid>;
    /// Merges `patch` into every matching document; returns the number
    /// of documents touched. With `upsert` disabled, no match means no
    /// write and a count of zero.
    async fn update(&self, filter: Filter, patch: Document, upsert: bool) -> anyhow::Result<u64>;
    /// Removes matching documents; returns how many were removed.
    async fn remove(&self, filter: Filter) -> anyhow::Result<u64>;
    async fn count(&self, filter: Filter) -> anyhow::Result<u64>;
    async fn aggregate(&self, pipeline: Pipeline) -> anyhow::Result<Vec<Document>>;
    async fn ensure_index(&self, index: IndexSpec) -> anyhow::Result<()>;
    /// Drops all documents and indexes of the collection.
    async fn drop(&self) -> anyhow::Result<()>;
}

/// Identity persistence contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persists the user and returns its id.
    async fn save(&self, user: NewUser) -> anyhow::Result<Uuid>;
}
