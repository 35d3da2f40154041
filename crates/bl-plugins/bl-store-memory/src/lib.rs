//! # bl-store-memory Implementation
//!
//! In-process implementation of the `Collection` port. Documents live
//! in a concurrent map keyed by their generated id; filters, sorting,
//! and aggregation stages are interpreted over the JSON values with
//! document-store semantics (equality also matches array membership,
//! substring filters are case-insensitive).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use uuid::Uuid;

use bl_core::traits::{Collection, Document, Filter, FindOptions, IndexSpec, Pipeline, SortOrder, Stage};

#[derive(Default)]
pub struct MemoryCollection {
    docs: DashMap<Uuid, Document>,
    indexes: DashSet<IndexSpec>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index specs currently registered. Exposed for assertions.
    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }
}

/// Filter evaluation over one document.
fn matches(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq(field, value) => match doc.get(field) {
            Some(Value::Array(items)) => items.contains(value),
            Some(v) => v == value,
            None => false,
        },
        Filter::Contains { field, needle } => doc
            .get(field)
            .and_then(Value::as_str)
            .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
        Filter::Or(subs) => subs.iter().any(|sub| matches(doc, sub)),
    }
}

/// Total order over JSON values for sorting: null < bool < number <
/// string < everything else (by serialized form).
fn value_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_docs(docs: &mut [Document], field: &str, order: SortOrder) {
    docs.sort_by(|a, b| {
        let va = a.get(field).unwrap_or(&Value::Null);
        let vb = b.get(field).unwrap_or(&Value::Null);
        let ord = value_cmp(va, vb);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn find(&self, filter: Filter, options: FindOptions) -> anyhow::Result<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .docs
            .iter()
            .filter(|entry| matches(entry.value(), &filter))
            .map(|entry| entry.value().clone())
            .collect();

        if let Some((field, order)) = &options.sort {
            sort_docs(&mut docs, field, *order);
        }

        let skipped = docs.into_iter().skip(options.skip as usize);
        let docs = match options.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        };
        Ok(docs)
    }

    async fn find_one(&self, filter: Filter) -> anyhow::Result<Option<Document>> {
        Ok(self
            .docs
            .iter()
            .find(|entry| matches(entry.value(), &filter))
            .map(|entry| entry.value().clone()))
    }

    async fn insert(&self, mut doc: Document) -> anyhow::Result<Uuid> {
        let id = Uuid::now_v7();
        doc.insert("_id".to_string(), Value::String(id.to_string()));
        self.docs.insert(id, doc);
        Ok(id)
    }

    async fn update(&self, filter: Filter, patch: Document, upsert: bool) -> anyhow::Result<u64> {
        let mut touched = 0;
        for mut entry in self.docs.iter_mut() {
            if matches(entry.value(), &filter) {
                for (key, value) in &patch {
                    entry.value_mut().insert(key.clone(), value.clone());
                }
                touched += 1;
            }
        }
        if touched == 0 && upsert {
            self.insert(patch).await?;
            touched = 1;
        }
        Ok(touched)
    }

    async fn remove(&self, filter: Filter) -> anyhow::Result<u64> {
        let before = self.docs.len();
        self.docs.retain(|_, doc| !matches(doc, &filter));
        Ok((before - self.docs.len()) as u64)
    }

    async fn count(&self, filter: Filter) -> anyhow::Result<u64> {
        Ok(self
            .docs
            .iter()
            .filter(|entry| matches(entry.value(), &filter))
            .count() as u64)
    }

    async fn aggregate(&self, pipeline: Pipeline) -> anyhow::Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.docs.iter().map(|entry| entry.value().clone()).collect();

        for stage in &pipeline.stages {
            docs = match stage {
                Stage::Unwind(field) => docs
                    .into_iter()
                    .flat_map(|doc| unwind(doc, field))
                    .collect(),
                Stage::GroupCount(field) => group_count(docs, field),
                Stage::Sort(field, order) => {
                    sort_docs(&mut docs, field, *order);
                    docs
                }
                Stage::Limit(n) => {
                    docs.truncate(*n as usize);
                    docs
                }
            };
        }
        Ok(docs)
    }

    async fn ensure_index(&self, index: IndexSpec) -> anyhow::Result<()> {
        // Insert is a no-op for an already-registered spec.
        self.indexes.insert(index);
        Ok(())
    }

    async fn drop(&self) -> anyhow::Result<()> {
        tracing::debug!(documents = self.docs.len(), "dropping collection");
        self.docs.clear();
        self.indexes.clear();
        Ok(())
    }
}

/// One document in, one document per array element out. Documents with
/// a missing, null, or empty field produce nothing; a scalar field
/// passes through unchanged.
fn unwind(doc: Document, field: &str) -> Vec<Document> {
    match doc.get(field).cloned() {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                let mut copy = doc.clone();
                copy.insert(field.to_string(), item);
                copy
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => vec![doc],
    }
}

/// Groups by the field value and counts occurrences. A `BTreeMap` keyed
/// by the serialized value keeps the output order deterministic, so
/// count ties downstream resolve lexically by grouped value.
fn group_count(docs: Vec<Document>, field: &str) -> Vec<Document> {
    let mut groups: BTreeMap<String, (Value, u64)> = BTreeMap::new();
    for doc in docs {
        let value = doc.get(field).cloned().unwrap_or(Value::Null);
        let key = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        groups.entry(key).or_insert_with(|| (value, 0)).1 += 1;
    }
    groups
        .into_values()
        .map(|(value, count)| {
            let mut doc = Document::new();
            doc.insert("_id".to_string(), value);
            doc.insert("count".to_string(), Value::from(count));
            doc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    async fn seeded() -> MemoryCollection {
        let coll = MemoryCollection::new();
        coll.insert(doc(json!({"title": "Bridge Hack", "description": "validator keys stolen", "tags": ["bridge", "keys"], "date": "2024-03-01T00:00:00Z"})))
            .await
            .unwrap();
        coll.insert(doc(json!({"title": "Phishing Wave", "description": "wallet drainer", "tags": ["phishing"], "date": "2024-04-01T00:00:00Z"})))
            .await
            .unwrap();
        coll.insert(doc(json!({"title": "Old Report", "description": "no tags here", "date": "2024-01-01T00:00:00Z"})))
            .await
            .unwrap();
        coll
    }

    #[tokio::test]
    async fn test_eq_matches_array_membership() {
        let coll = seeded().await;
        let found = coll
            .find(
                Filter::Eq("tags".into(), json!("bridge")),
                FindOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], json!("Bridge Hack"));
    }

    #[tokio::test]
    async fn test_contains_is_case_insensitive() {
        let coll = seeded().await;
        let filter = Filter::Or(vec![
            Filter::Contains { field: "title".into(), needle: "WAVE".into() },
            Filter::Contains { field: "description".into(), needle: "WAVE".into() },
        ]);
        let found = coll.find(filter, FindOptions::default()).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_sort_skip_limit() {
        let coll = seeded().await;
        let options = FindOptions {
            sort: Some(("date".into(), SortOrder::Desc)),
            skip: 1,
            limit: Some(1),
        };
        let found = coll.find(Filter::All, options).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], json!("Bridge Hack"));
    }

    #[tokio::test]
    async fn test_update_without_upsert_is_noop_on_missing() {
        let coll = seeded().await;
        let touched = coll
            .update(
                Filter::Eq("title".into(), json!("Nope")),
                doc(json!({"title": "Changed"})),
                false,
            )
            .await
            .unwrap();
        assert_eq!(touched, 0);
        assert_eq!(coll.count(Filter::All).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_tag_pipeline_counts_and_order() {
        let coll = MemoryCollection::new();
        for tags in [json!(["a", "b"]), json!(["a"]), json!(["b", "b"])] {
            coll.insert(doc(json!({"tags": tags}))).await.unwrap();
        }
        let pipeline = Pipeline::new(vec![
            Stage::Unwind("tags".into()),
            Stage::GroupCount("tags".into()),
            Stage::Sort("count".into(), SortOrder::Desc),
            Stage::Limit(10),
        ]);
        let rows = coll.aggregate(pipeline).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["_id"], json!("b"));
        assert_eq!(rows[0]["count"], json!(3));
        assert_eq!(rows[1]["_id"], json!("a"));
        assert_eq!(rows[1]["count"], json!(2));
    }

    #[tokio::test]
    async fn test_group_count_ties_resolve_lexically() {
        let coll = MemoryCollection::new();
        for tags in [json!(["zeta", "alpha"]), json!(["alpha", "zeta"])] {
            coll.insert(doc(json!({"tags": tags}))).await.unwrap();
        }
        let pipeline = Pipeline::new(vec![
            Stage::Unwind("tags".into()),
            Stage::GroupCount("tags".into()),
            Stage::Sort("count".into(), SortOrder::Desc),
        ]);
        let rows = coll.aggregate(pipeline).await.unwrap();
        // Equal counts keep the grouping stage's lexical order: the
        // sort is stable, so "alpha" stays ahead of "zeta".
        assert_eq!(rows[0]["_id"], json!("alpha"));
        assert_eq!(rows[1]["_id"], json!("zeta"));
    }

    #[tokio::test]
    async fn test_ensure_index_idempotent() {
        let coll = MemoryCollection::new();
        let spec = IndexSpec::new([("date", SortOrder::Desc)]);
        coll.ensure_index(spec.clone()).await.unwrap();
        coll.ensure_index(spec).await.unwrap();
        assert_eq!(coll.index_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_clears_everything() {
        let coll = seeded().await;
        coll.ensure_index(IndexSpec::new([("date", SortOrder::Desc)]))
            .await
            .unwrap();
        coll.drop().await.unwrap();
        assert_eq!(coll.count(Filter::All).await.unwrap(), 0);
        assert_eq!(coll.index_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_through_shared_trait_object() {
        // Rollback code holds collections as `Arc<dyn Collection>`,
        // where method syntax would resolve `drop` to `Drop::drop`.
        let coll: std::sync::Arc<dyn Collection> = std::sync::Arc::new(seeded().await);
        Collection::drop(coll.as_ref()).await.unwrap();
        assert_eq!(coll.count(Filter::All).await.unwrap(), 0);
    }
}
