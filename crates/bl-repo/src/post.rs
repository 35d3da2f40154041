//! # PostRepository
//!
//! CRUD, pagination, and tag aggregation over the posts collection.
//! Filter construction is delegated to [`crate::query`], input
//! normalization to [`crate::sanitize`].
//!
//! Callers get a generic, human-readable message on every fault; the
//! underlying diagnostics only go out on the tracing debug channel.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use bl_core::error::{AppError, Result};
use bl_core::models::{Post, PostForm, SanitizedPost, RawPostPatch, TagCount};
use bl_core::traits::{Collection, Filter, FindOptions, Pipeline, SortOrder, Stage};

use crate::{query, sanitize};

pub const DEFAULT_TAG_LIMIT: u64 = 10;

pub struct PostRepository {
    posts: Arc<dyn Collection>,
}

impl PostRepository {
    /// Collection handles are injected; the repository never reaches
    /// for ambient store state.
    pub fn new(posts: Arc<dyn Collection>) -> Self {
        Self { posts }
    }

    /// Lists posts in descending creation order, skip/limit paginated.
    /// Tag and search are mutually exclusive; the tag wins.
    pub async fn list(
        &self,
        limit: u64,
        skip: u64,
        tag: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Post>> {
        let filter = query::build(tag, search);
        let options = FindOptions {
            sort: Some(("date".to_string(), SortOrder::Desc)),
            skip,
            limit: Some(limit),
        };

        let docs = self
            .posts
            .find(filter, options)
            .await
            .map_err(|e| fault("list", e, || AppError::NotFound("Posts not found..".to_string())))?;

        docs.into_iter()
            .map(|doc| {
                serde_json::from_value(Value::Object(doc)).map_err(|e| {
                    fault("list", e, || AppError::NotFound("Posts not found..".to_string()))
                })
            })
            .collect()
    }

    pub async fn get_by_permalink(&self, permalink: &str) -> Result<Option<Post>> {
        let filter = Filter::Eq("permalink".to_string(), Value::String(permalink.to_string()));
        let doc = self
            .posts
            .find_one(filter)
            .await
            .map_err(|e| fault("get_by_permalink", e, post_not_found))?;

        doc.map(|doc| {
            serde_json::from_value(Value::Object(doc))
                .map_err(|e| fault("get_by_permalink", e, post_not_found))
        })
        .transpose()
    }

    /// Lookup for the edit form: tags come back comma-joined.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<PostForm>> {
        let doc = self
            .posts
            .find_one(Filter::by_id(id))
            .await
            .map_err(|e| fault("get_by_id", e, post_not_found))?;

        doc.map(|doc| {
            serde_json::from_value::<Post>(Value::Object(doc))
                .map(PostForm::from)
                .map_err(|e| fault("get_by_id", e, post_not_found))
        })
        .transpose()
    }

    /// Total count under the same filter precedence as [`list`].
    ///
    /// [`list`]: Self::list
    pub async fn count(&self, tag: Option<&str>, search: Option<&str>) -> Result<u64> {
        self.posts
            .count(query::build(tag, search))
            .await
            .map_err(|e| fault("count", e, || AppError::NotFound("Posts not found..".to_string())))
    }

    /// Most frequent tags, descending by occurrence. Each post's tag
    /// set is flattened into individual occurrences before grouping.
    /// Count ties keep the adapter's stable aggregation order.
    pub async fn top_tags(&self, limit: u64) -> Result<Vec<TagCount>> {
        let pipeline = Pipeline::new(vec![
            Stage::Unwind("tags".to_string()),
            Stage::GroupCount("tags".to_string()),
            Stage::Sort("count".to_string(), SortOrder::Desc),
            Stage::Limit(limit),
        ]);

        let rows = self
            .posts
            .aggregate(pipeline)
            .await
            .map_err(|e| fault("top_tags", e, || AppError::NotFound("Get tags error..".to_string())))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let tag = row.get("_id")?.as_str()?.to_string();
                let count = row.get("count")?.as_u64()?;
                Some(TagCount { tag, count })
            })
            .collect())
    }

    /// Persists a sanitized post and returns the generated id.
    pub async fn create(&self, post: SanitizedPost) -> Result<Uuid> {
        let doc = match serde_json::to_value(&post) {
            Ok(Value::Object(doc)) => doc,
            Ok(_) | Err(_) => {
                return Err(AppError::Write("Adding post error..".to_string()));
            }
        };

        self.posts
            .insert(doc)
            .await
            .map_err(|e| fault("create", e, || AppError::Write("Adding post error..".to_string())))
    }

    /// Partial update of the editable fields. `date` and `permalink`
    /// cannot be touched (the patch type has no slot for them), upsert
    /// stays disabled, and editing a missing id is a no-op success per
    /// the underlying merge semantics.
    pub async fn edit(&self, id: Uuid, patch: RawPostPatch) -> Result<bool> {
        let doc = sanitize::sanitize_patch(patch);

        self.posts
            .update(Filter::by_id(id), doc, false)
            .await
            .map_err(|e| fault("edit", e, || AppError::Update("Post update error..".to_string())))?;
        Ok(true)
    }

    /// Existence check, then remove. Not atomic against concurrent
    /// deletes; acceptable for single-admin usage.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        match self.get_by_id(id).await {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return Ok(false),
        }

        let removed = self
            .posts
            .remove(Filter::by_id(id))
            .await
            .map_err(|e| fault("delete", e, || AppError::Write("Deleting post error..".to_string())))?;
        Ok(removed > 0)
    }
}

fn post_not_found() -> AppError {
    AppError::NotFound("Post not found..".to_string())
}

/// Logs the real cause on the debug channel and returns the generic
/// user-facing error.
fn fault<E: std::fmt::Display>(op: &'static str, err: E, to: impl FnOnce() -> AppError) -> AppError {
    tracing::debug!(operation = op, error = %err, "post repository fault");
    to()
}
