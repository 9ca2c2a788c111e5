use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::store::{BackendResult, DocumentStore, FindOptions};
use super::USERS;
use crate::utils::BackendError;

#[derive(Default)]
struct MemoryCollection {
    docs: Vec<Document>,
    unique_fields: Vec<String>,
}

/// Process-local document store speaking the same filter, sort and
/// aggregation dialect as MongoDB (a subset of it). Used for tests and for
/// running the service without a database.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the same unique indexes the MongoDB backend creates.
    pub async fn with_default_indexes() -> Self {
        let store = Self::new();
        store.create_unique_index(USERS, "username").await;
        store
    }

    pub async fn create_unique_index(&self, collection: &str, field: &str) {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        if !entry.unique_fields.iter().any(|f| f == field) {
            entry.unique_fields.push(field.to_string());
        }
    }
}

impl MemoryCollection {
    /// Fails if `doc` collides with another document (other than the one at
    /// `skip_index`) on `_id` or on any unique field.
    fn check_unique(&self, doc: &Document, skip_index: Option<usize>) -> BackendResult<()> {
        let fields = std::iter::once("_id").chain(self.unique_fields.iter().map(String::as_str));
        for field in fields {
            let Some(value) = lookup(doc, field) else {
                continue;
            };
            let collides = self
                .docs
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip_index)
                .any(|(_, other)| lookup(other, field).is_some_and(|v| bson_eq(v, value)));
            if collides {
                return Err(BackendError::DuplicateKey(format!("{} = {}", field, value)));
            }
        }
        Ok(())
    }

    fn matching_indexes(&self, filter: &Document) -> BackendResult<Vec<usize>> {
        let mut found = Vec::new();
        for (i, doc) in self.docs.iter().enumerate() {
            if matches(doc, filter)? {
                found.push(i);
            }
        }
        Ok(found)
    }

    fn insert(&mut self, mut doc: Document) -> BackendResult<Bson> {
        if !doc.contains_key("_id") {
            let mut with_id = Document::new();
            with_id.insert("_id", ObjectId::new());
            for (key, value) in doc {
                with_id.insert(key, value);
            }
            doc = with_id;
        }
        self.check_unique(&doc, None)?;
        let id = doc.get("_id").cloned().unwrap_or(Bson::Null);
        self.docs.push(doc);
        Ok(id)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, doc: Document) -> BackendResult<Bson> {
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().insert(doc)
    }

    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> BackendResult<Vec<Bson>> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        // Ordered insert: documents before a failing one stay inserted.
        docs.into_iter().map(|doc| entry.insert(doc)).collect()
    }

    async fn find_one(&self, collection: &str, filter: Document) -> BackendResult<Option<Document>> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(None);
        };
        for doc in &entry.docs {
            if matches(doc, &filter)? {
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> BackendResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut docs = Vec::new();
        for doc in &entry.docs {
            if matches(doc, &filter)? {
                docs.push(doc.clone());
            }
        }
        sort_docs(&mut docs, &options.sort)?;
        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(n) => n.unsigned_abs() as usize,
        };
        Ok(docs
            .into_iter()
            .skip(options.skip as usize)
            .take(limit)
            .collect())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        set: Document,
        on_insert: Document,
        upsert: bool,
    ) -> BackendResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();

        let mut position = None;
        for (i, doc) in entry.docs.iter().enumerate() {
            if matches(doc, &filter)? {
                position = Some(i);
                break;
            }
        }

        match position {
            Some(i) => {
                let mut updated = entry.docs[i].clone();
                apply_set(&mut updated, &set);
                entry.check_unique(&updated, Some(i))?;
                entry.docs[i] = updated.clone();
                Ok(Some(updated))
            }
            None if upsert => {
                let mut created = equality_fields(&filter);
                apply_set(&mut created, &on_insert);
                apply_set(&mut created, &set);
                let id = entry.insert(created)?;
                Ok(entry
                    .docs
                    .iter()
                    .rev()
                    .find(|doc| doc.get("_id") == Some(&id))
                    .cloned())
            }
            None => Ok(None),
        }
    }

    async fn update_many(&self, collection: &str, filter: Document, set: Document) -> BackendResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let targets = entry.matching_indexes(&filter)?;

        let mut staged = entry.docs.clone();
        for &i in &targets {
            apply_set(&mut staged[i], &set);
        }
        let original = std::mem::replace(&mut entry.docs, staged);
        for &i in &targets {
            let doc = entry.docs[i].clone();
            if let Err(e) = entry.check_unique(&doc, Some(i)) {
                entry.docs = original;
                return Err(e);
            }
        }
        Ok(targets.len() as u64)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> BackendResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match entry.matching_indexes(&filter)?.first() {
            Some(&i) => {
                entry.docs.remove(i);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> BackendResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let targets = entry.matching_indexes(&filter)?;
        for &i in targets.iter().rev() {
            entry.docs.remove(i);
        }
        Ok(targets.len() as u64)
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> BackendResult<u64> {
        let collections = self.collections.read().await;
        match collections.get(collection) {
            Some(entry) => Ok(entry.matching_indexes(&filter)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> BackendResult<Vec<Document>> {
        let mut docs = {
            let collections = self.collections.read().await;
            collections
                .get(collection)
                .map(|entry| entry.docs.clone())
                .unwrap_or_default()
        };
        for stage in &pipeline {
            docs = run_stage(docs, stage)?;
        }
        Ok(docs)
    }

    async fn ping(&self) -> BackendResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filters

fn matches(doc: &Document, filter: &Document) -> BackendResult<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for sub in sub_filters(key, condition)? {
                    if !matches(doc, sub)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for sub in sub_filters(key, condition)? {
                    if matches(doc, sub)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => {
                return Err(BackendError::Unsupported(op.to_string()));
            }
            field => field_matches(lookup(doc, field), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(op: &str, condition: &'a Bson) -> BackendResult<Vec<&'a Document>> {
    let Bson::Array(items) = condition else {
        return Err(BackendError::Unsupported(format!("{} expects an array", op)));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(BackendError::Unsupported(format!("{} expects documents", op))),
        })
        .collect()
}

fn is_operator_doc(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(doc) if doc.keys().next().is_some_and(|k| k.starts_with('$')) => Some(doc),
        _ => None,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> BackendResult<bool> {
    let Some(ops) = is_operator_doc(condition) else {
        return Ok(value_eq(value, condition));
    };

    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => value_eq(value, arg),
            "$ne" => !value_eq(value, arg),
            "$gt" => value_cmp(value, arg) == Some(Ordering::Greater),
            "$gte" => matches!(value_cmp(value, arg), Some(Ordering::Greater | Ordering::Equal)),
            "$lt" => value_cmp(value, arg) == Some(Ordering::Less),
            "$lte" => matches!(value_cmp(value, arg), Some(Ordering::Less | Ordering::Equal)),
            "$in" => in_list(value, op, arg)?,
            "$nin" => !in_list(value, op, arg)?,
            "$exists" => value.is_some() == truthy(arg),
            other => return Err(BackendError::Unsupported(other.to_string())),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_list(value: Option<&Bson>, op: &str, arg: &Bson) -> BackendResult<bool> {
    let Bson::Array(candidates) = arg else {
        return Err(BackendError::Unsupported(format!("{} expects an array", op)));
    };
    Ok(candidates.iter().any(|c| value_eq(value, c)))
}

/// Mongo equality: a missing field equals null, an array equals any of its
/// elements.
fn value_eq(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => {
            items.iter().any(|item| bson_eq(item, target))
        }
        Some(v) => bson_eq(v, target),
    }
}

fn value_cmp(value: Option<&Bson>, target: &Bson) -> Option<Ordering> {
    value.and_then(|v| compare_same_type(v, target))
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_f64(other).map(|n| n != 0.0).unwrap_or(true),
    }
}

fn compare_same_type(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Resolves a dotted path through embedded documents.
fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        match current {
            Bson::Document(inner) => current = inner.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

fn equality_fields(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(key, value)| !key.starts_with('$') && is_operator_doc(value).is_none())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn apply_set(doc: &mut Document, set: &Document) {
    for (key, value) in set {
        if key != "_id" {
            doc.insert(key.clone(), value.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Sorting

/// Cross-type ordering follows MongoDB's BSON comparison order.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
        Some(Bson::String(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::ObjectId(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

fn sort_docs(docs: &mut [Document], sort: &Document) -> BackendResult<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort {
        let descending = match as_f64(direction) {
            Some(d) if d < 0.0 => true,
            Some(_) => false,
            None => {
                return Err(BackendError::Unsupported(format!(
                    "sort direction for '{}'",
                    field
                )))
            }
        };
        keys.push((field.as_str(), descending));
    }
    if keys.is_empty() {
        return Ok(());
    }
    // Ties on a descending sort come out newest-inserted first.
    if keys[0].1 {
        docs.reverse();
    }

    docs.sort_by(|a, b| {
        for (field, descending) in &keys {
            let (x, y) = (lookup(a, field), lookup(b, field));
            let ordering = type_rank(x).cmp(&type_rank(y)).then_with(|| match (x, y) {
                (Some(x), Some(y)) => compare_same_type(x, y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            });
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Aggregation

fn run_stage(docs: Vec<Document>, stage: &Document) -> BackendResult<Vec<Document>> {
    let Some((name, spec)) = stage.iter().next() else {
        return Err(BackendError::Unsupported("empty pipeline stage".into()));
    };

    match (name.as_str(), spec) {
        ("$match", Bson::Document(filter)) => {
            let mut kept = Vec::new();
            for doc in docs {
                if matches(&doc, filter)? {
                    kept.push(doc);
                }
            }
            Ok(kept)
        }
        ("$sort", Bson::Document(sort)) => {
            let mut docs = docs;
            sort_docs(&mut docs, sort)?;
            Ok(docs)
        }
        ("$skip", n) => Ok(docs.into_iter().skip(stage_count(name, n)?).collect()),
        ("$limit", n) => Ok(docs.into_iter().take(stage_count(name, n)?).collect()),
        ("$project", Bson::Document(projection)) => {
            docs.iter().map(|doc| project(doc, projection)).collect()
        }
        ("$group", Bson::Document(group)) => group_docs(&docs, group),
        ("$count", Bson::String(field)) => {
            if docs.is_empty() {
                return Ok(Vec::new());
            }
            let mut out = Document::new();
            out.insert(field.clone(), count_bson(docs.len() as i64));
            Ok(vec![out])
        }
        (other, _) => Err(BackendError::Unsupported(format!("aggregation stage {}", other))),
    }
}

fn stage_count(name: &str, value: &Bson) -> BackendResult<usize> {
    match as_f64(value) {
        Some(n) if n >= 0.0 => Ok(n as usize),
        _ => Err(BackendError::Unsupported(format!("{} expects a non-negative number", name))),
    }
}

fn count_bson(n: i64) -> Bson {
    i32::try_from(n).map(Bson::Int32).unwrap_or(Bson::Int64(n))
}

/// `"$field"` reads a field, an embedded document evaluates each entry,
/// anything else is a literal.
fn eval_expr(doc: &Document, expr: &Bson) -> Bson {
    match expr {
        Bson::String(s) if s.starts_with('$') => lookup(doc, &s[1..]).cloned().unwrap_or(Bson::Null),
        Bson::Document(fields) if is_operator_doc(expr).is_none() => Bson::Document(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), eval_expr(doc, value)))
                .collect(),
        ),
        literal => literal.clone(),
    }
}

fn project(doc: &Document, projection: &Document) -> BackendResult<Document> {
    let include_id = projection.get("_id").map(truthy).unwrap_or(true);
    let inclusive = projection
        .iter()
        .filter(|(key, _)| key.as_str() != "_id")
        .any(|(_, value)| !matches!(value, Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0)));

    let mut out = Document::new();
    if include_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }

    if inclusive {
        for (key, value) in projection {
            if key == "_id" {
                continue;
            }
            match value {
                Bson::String(_) | Bson::Document(_) => {
                    out.insert(key.clone(), eval_expr(doc, value));
                }
                flag if truthy(flag) => {
                    if let Some(v) = lookup(doc, key) {
                        out.insert(key.clone(), v.clone());
                    }
                }
                _ => {
                    return Err(BackendError::Unsupported(
                        "mixing inclusion and exclusion in $project".into(),
                    ))
                }
            }
        }
    } else {
        for (key, value) in doc {
            if key == "_id" {
                continue;
            }
            if !projection.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(out)
}

enum Accumulator {
    Sum { ints: i64, floats: f64, all_ints: bool },
    First(Option<Bson>),
    Push(Vec<Bson>),
}

impl Accumulator {
    fn new(op: &str) -> BackendResult<Self> {
        match op {
            "$sum" => Ok(Accumulator::Sum { ints: 0, floats: 0.0, all_ints: true }),
            "$first" => Ok(Accumulator::First(None)),
            "$push" => Ok(Accumulator::Push(Vec::new())),
            other => Err(BackendError::Unsupported(format!("accumulator {}", other))),
        }
    }

    fn add(&mut self, value: Bson) {
        match self {
            Accumulator::Sum { ints, floats, all_ints } => match value {
                Bson::Int32(n) => *ints += i64::from(n),
                Bson::Int64(n) => *ints += n,
                Bson::Double(n) => {
                    *floats += n;
                    *all_ints = false;
                }
                _ => {}
            },
            Accumulator::First(slot) => {
                if slot.is_none() {
                    *slot = Some(value);
                }
            }
            Accumulator::Push(items) => items.push(value),
        }
    }

    fn finish(self) -> Bson {
        match self {
            Accumulator::Sum { ints, floats, all_ints } => {
                if all_ints {
                    count_bson(ints)
                } else {
                    Bson::Double(ints as f64 + floats)
                }
            }
            Accumulator::First(slot) => slot.unwrap_or(Bson::Null),
            Accumulator::Push(items) => Bson::Array(items),
        }
    }
}

fn group_docs(docs: &[Document], group: &Document) -> BackendResult<Vec<Document>> {
    let key_expr = group
        .get("_id")
        .ok_or_else(|| BackendError::Unsupported("$group requires _id".into()))?;

    let mut fields: Vec<(&str, &str, &Bson)> = Vec::new();
    for (name, spec) in group {
        if name == "_id" {
            continue;
        }
        let Some((op, expr)) = spec.as_document().and_then(|d| d.iter().next()) else {
            return Err(BackendError::Unsupported(format!("$group field '{}'", name)));
        };
        fields.push((name.as_str(), op.as_str(), expr));
    }

    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();
    for doc in docs {
        let key = eval_expr(doc, key_expr);
        let slot = match groups.iter().position(|(k, _)| bson_eq(k, &key)) {
            Some(i) => i,
            None => {
                let accumulators = fields
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<BackendResult<Vec<_>>>()?;
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };
        for ((_, _, expr), acc) in fields.iter().zip(groups[slot].1.iter_mut()) {
            acc.add(eval_expr(doc, expr));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for ((name, _, _), acc) in fields.iter().zip(accumulators) {
                out.insert(name.to_string(), acc.finish());
            }
            out
        })
        .collect())
}
