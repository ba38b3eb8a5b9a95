//! In-memory document store
//!
//! Backs tests and dev-mode runs without MongoDB. Implements the subset of
//! the MongoDB query and update language the services use:
//!
//! - filters: equality on dotted paths (any-element semantics through
//!   arrays), `null` matching a missing field, `$eq`, `$ne`, `$exists`, `$in`
//! - updates: `$set` (including positional `arr.$.field`), `$push`, `$pull`
//!
//! Each collection lives behind one mutex, so every update is atomic with
//! respect to the whole document like its MongoDB counterpart.

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::store::{DocumentStore, UpdateCounts};
use crate::types::{AgroError, Result};

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert_one(&self, collection: &str, doc: Document) -> Result<ObjectId> {
        let id = match doc.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(AgroError::Database(format!(
                    "Unsupported _id type in '{}': {}",
                    collection, other
                )))
            }
            None => ObjectId::new(),
        };

        let mut stored = Document::new();
        stored.insert("_id", id);
        for (key, value) in doc {
            if key != "_id" {
                stored.insert(key, value);
            }
        }

        let mut collections = self.collections.lock().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.get("_id") == Some(&Bson::ObjectId(id))) {
            return Err(AgroError::Database(format!(
                "Duplicate _id {} in '{}'",
                id, collection
            )));
        }
        docs.push(stored);
        Ok(id)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches_filter(d, &filter)))
            .cloned())
    }

    async fn find_many(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches_filter(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateCounts> {
        let mut collections = self.collections.lock().await;
        let Some(target) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matches_filter(d, &filter)))
        else {
            return Ok(UpdateCounts::default());
        };

        // Work on a copy so a failing operator leaves the stored document intact
        let mut updated = target.clone();
        apply_update(&mut updated, &filter, &update)?;

        let modified = if updated != *target {
            *target = updated;
            1
        } else {
            0
        };

        Ok(UpdateCounts {
            matched: 1,
            modified,
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| matches_filter(d, &filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

// =============================================================================
// Filter evaluation
// =============================================================================

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(path, condition)| matches_condition(doc, path, condition))
}

fn matches_condition(doc: &Document, path: &str, condition: &Bson) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    let mut values = Vec::new();
    collect_values(doc, &segments, &mut values);

    match condition {
        Bson::Document(ops) if is_operator_document(ops) => ops
            .iter()
            .all(|(op, operand)| apply_operator(&values, op, operand)),
        expected => equals_any(&values, expected),
    }
}

fn is_operator_document(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn apply_operator(values: &[&Bson], op: &str, operand: &Bson) -> bool {
    match op {
        "$eq" => equals_any(values, operand),
        "$ne" => !equals_any(values, operand),
        "$exists" => {
            let present = !values.is_empty();
            match operand {
                Bson::Boolean(wanted) => present == *wanted,
                _ => present,
            }
        }
        "$in" => match operand {
            Bson::Array(options) => options.iter().any(|o| equals_any(values, o)),
            _ => false,
        },
        // Unknown operators never match rather than silently matching everything
        _ => false,
    }
}

/// Collect every value reachable through `segments`, descending into arrays
/// element by element unless the segment is a numeric index.
fn collect_values<'a>(doc: &'a Document, segments: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if let Some(value) = doc.get(*head) {
        collect_from_value(value, rest, out);
    }
}

fn collect_from_value<'a>(value: &'a Bson, segments: &[&str], out: &mut Vec<&'a Bson>) {
    if segments.is_empty() {
        out.push(value);
        return;
    }
    match value {
        Bson::Document(inner) => collect_values(inner, segments, out),
        Bson::Array(items) => {
            if let Ok(index) = segments[0].parse::<usize>() {
                if let Some(item) = items.get(index) {
                    collect_from_value(item, &segments[1..], out);
                }
            } else {
                for item in items {
                    collect_from_value(item, segments, out);
                }
            }
        }
        _ => {}
    }
}

fn equals_any(values: &[&Bson], expected: &Bson) -> bool {
    if matches!(expected, Bson::Null) && values.is_empty() {
        return true;
    }
    values.iter().any(|value| match value {
        Bson::Array(items) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_eq(item, expected))
        }
        other => bson_eq(other, expected),
    })
}

/// Equality with numeric widening, so `Int32(5)` equals `Double(5.0)`
fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

// =============================================================================
// Update application
// =============================================================================

fn apply_update(doc: &mut Document, filter: &Document, update: &Document) -> Result<()> {
    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(AgroError::Database(format!(
                "Update operator {} expects a document",
                op
            )));
        };
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    let segments = resolve_positional(doc, filter, path)?;
                    set_path(doc, &segments, value.clone())?;
                }
            }
            "$push" => {
                for (path, value) in fields {
                    let segments = resolve_positional(doc, filter, path)?;
                    push_path(doc, &segments, value.clone())?;
                }
            }
            "$pull" => {
                for (path, criteria) in fields {
                    let segments = resolve_positional(doc, filter, path)?;
                    let lookup: Vec<&str> = segments.iter().map(String::as_str).collect();
                    let mut existing = Vec::new();
                    collect_values(doc, &lookup, &mut existing);
                    // Pulling from a missing field is a no-op
                    if !existing.is_empty() {
                        pull_path(doc, &segments, criteria)?;
                    }
                }
            }
            other => {
                return Err(AgroError::Database(format!(
                    "Unsupported update operator {}",
                    other
                )))
            }
        }
    }
    Ok(())
}

/// Split an update path into segments, replacing a `$` segment with the
/// index of the first array element that satisfies the filter's
/// conditions on that array.
fn resolve_positional(doc: &Document, filter: &Document, path: &str) -> Result<Vec<String>> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some(position) = segments.iter().position(|s| *s == "$") else {
        return Ok(segments.into_iter().map(str::to_string).collect());
    };

    let array_path = segments[..position].join(".");
    let prefix = format!("{}.", array_path);

    let mut element_filter = Document::new();
    for (key, condition) in filter {
        if let Some(sub_path) = key.strip_prefix(&prefix) {
            element_filter.insert(sub_path, condition.clone());
        }
    }

    let mut found = Vec::new();
    collect_values(doc, &segments[..position], &mut found);
    let index = match (found.first(), element_filter.is_empty()) {
        (Some(Bson::Array(items)), false) => items.iter().position(|item| match item {
            Bson::Document(element) => matches_filter(element, &element_filter),
            _ => false,
        }),
        _ => None,
    }
    .ok_or_else(|| {
        AgroError::Database(format!(
            "The positional operator did not find the match needed from the query ({})",
            path
        ))
    })?;

    let mut resolved: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
    resolved[position] = index.to_string();
    Ok(resolved)
}

fn set_path(doc: &mut Document, segments: &[String], value: Bson) -> Result<()> {
    let slot = slot_mut(doc, segments)?;
    *slot = value;
    Ok(())
}

fn push_path(doc: &mut Document, segments: &[String], value: Bson) -> Result<()> {
    let slot = slot_mut(doc, segments)?;
    if matches!(slot, Bson::Null) {
        *slot = Bson::Array(Vec::new());
    }
    match slot {
        Bson::Array(items) => {
            items.push(value);
            Ok(())
        }
        _ => Err(AgroError::Database(format!(
            "The field '{}' must be an array",
            segments.join(".")
        ))),
    }
}

fn pull_path(doc: &mut Document, segments: &[String], criteria: &Bson) -> Result<()> {
    let slot = slot_mut(doc, segments)?;
    if let Bson::Array(items) = slot {
        items.retain(|item| match (item, criteria) {
            (Bson::Document(element), Bson::Document(c)) => !matches_filter(element, c),
            (other, c) => !bson_eq(other, c),
        });
    }
    Ok(())
}

/// Walk to the value at `segments`, creating intermediate documents (and
/// a trailing `Null`) where the path does not exist yet.
fn slot_mut<'a>(doc: &'a mut Document, segments: &[String]) -> Result<&'a mut Bson> {
    let (head, rest) = segments
        .split_first()
        .ok_or_else(|| AgroError::Database("Empty update path".into()))?;

    if !doc.contains_key(head.as_str()) {
        let placeholder = if rest.is_empty() {
            Bson::Null
        } else {
            Bson::Document(Document::new())
        };
        doc.insert(head.clone(), placeholder);
    }
    let value = doc
        .get_mut(head.as_str())
        .ok_or_else(|| AgroError::Database(format!("Cannot address field '{}'", head)))?;
    slot_in_value(value, rest)
}

fn slot_in_value<'a>(value: &'a mut Bson, segments: &[String]) -> Result<&'a mut Bson> {
    if segments.is_empty() {
        return Ok(value);
    }
    if matches!(value, Bson::Null) {
        *value = Bson::Document(Document::new());
    }
    match value {
        Bson::Document(inner) => slot_mut(inner, segments),
        Bson::Array(items) => {
            let index: usize = segments[0].parse().map_err(|_| {
                AgroError::Database(format!("Cannot create field '{}' in an array", segments[0]))
            })?;
            let item = items
                .get_mut(index)
                .ok_or_else(|| AgroError::Database(format!("Array index {} out of range", index)))?;
            slot_in_value(item, &segments[1..])
        }
        _ => Err(AgroError::Database(format!(
            "Cannot create field '{}' in a scalar value",
            segments[0]
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn test_null_filter_matches_missing_and_null() {
        let store = MemoryStore::new();
        store.insert_one("c", doc! { "n": 1, "loc": Bson::Null }).await.unwrap();
        store.insert_one("c", doc! { "n": 2 }).await.unwrap();
        store.insert_one("c", doc! { "n": 3, "loc": { "x": 1 } }).await.unwrap();

        let found = store.find_many("c", doc! { "loc": Bson::Null }).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_positional_set_targets_matching_element() {
        let store = MemoryStore::new();
        let a = ObjectId::new();
        let b = ObjectId::new();
        let id = store
            .insert_one(
                "c",
                doc! { "items": [ { "_id": a, "q": 1 }, { "_id": b, "q": 2 } ] },
            )
            .await
            .unwrap();

        let counts = store
            .update_one(
                "c",
                doc! { "_id": id, "items._id": b },
                doc! { "$set": { "items.$.q": 20 } },
            )
            .await
            .unwrap();
        assert_eq!(counts, UpdateCounts { matched: 1, modified: 1 });

        let stored = store.find_one("c", doc! { "_id": id }).await.unwrap().unwrap();
        let items = stored.get_array("items").unwrap();
        assert_eq!(items[0].as_document().unwrap().get_i32("q").unwrap(), 1);
        assert_eq!(items[1].as_document().unwrap().get_i32("q").unwrap(), 20);
    }

    #[tokio::test]
    async fn test_identical_set_reports_not_modified() {
        let store = MemoryStore::new();
        let id = store.insert_one("c", doc! { "name": "maiz" }).await.unwrap();
        let counts = store
            .update_one("c", doc! { "_id": id }, doc! { "$set": { "name": "maiz" } })
            .await
            .unwrap();
        assert_eq!(counts, UpdateCounts { matched: 1, modified: 0 });
    }

    #[tokio::test]
    async fn test_push_and_pull_by_criteria() {
        let store = MemoryStore::new();
        let id = store.insert_one("c", doc! { "items": [] }).await.unwrap();
        let keep = ObjectId::new();
        let drop = ObjectId::new();
        for sub in [keep, drop] {
            store
                .update_one("c", doc! { "_id": id }, doc! { "$push": { "items": { "_id": sub } } })
                .await
                .unwrap();
        }

        let counts = store
            .update_one("c", doc! { "_id": id }, doc! { "$pull": { "items": { "_id": drop } } })
            .await
            .unwrap();
        assert_eq!(counts.modified, 1);

        let stored = store.find_one("c", doc! { "_id": id }).await.unwrap().unwrap();
        let items = stored.get_array("items").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_document().unwrap().get_object_id("_id").unwrap(), keep);
    }

    #[tokio::test]
    async fn test_ne_and_numeric_widening() {
        let store = MemoryStore::new();
        store.insert_one("c", doc! { "v": 5_i32, "on": true }).await.unwrap();
        store.insert_one("c", doc! { "v": 6.0, "on": false }).await.unwrap();

        assert_eq!(store.find_many("c", doc! { "v": 5.0 }).await.unwrap().len(), 1);
        assert_eq!(
            store.find_many("c", doc! { "on": { "$ne": true } }).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_one_removes_single_match() {
        let store = MemoryStore::new();
        store.insert_one("c", doc! { "k": 1 }).await.unwrap();
        store.insert_one("c", doc! { "k": 1 }).await.unwrap();
        assert_eq!(store.delete_one("c", doc! { "k": 1 }).await.unwrap(), 1);
        assert_eq!(store.find_many("c", doc! {}).await.unwrap().len(), 1);
        assert_eq!(store.delete_one("missing", doc! {}).await.unwrap(), 0);
    }
}
