use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::document::{get_path, set_path, Document, ID_FIELD};
use crate::middleware::error::AppResult;

/// Predicate over documents. Field names are dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq { field: String, value: Value },
    /// Case-insensitive substring match on a string field.
    ContainsText { field: String, needle: String },
    In { field: String, values: Vec<Value> },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains_text(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::ContainsText {
            field: field.into(),
            needle: needle.into(),
        }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In {
            field: field.into(),
            values,
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => get_path(document, field) == Some(value),
            Filter::ContainsText { field, needle } => match get_path(document, field) {
                Some(Value::String(text)) => text.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
            Filter::In { field, values } => get_path(document, field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(document)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QryOrder {
    DESC,
    ASC,
}

impl fmt::Display for QryOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QryOrder::DESC => write!(f, "DESC"),
            QryOrder::ASC => write!(f, "ASC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: QryOrder,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            order: QryOrder::ASC,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortKey {
            field: field.into(),
            order: QryOrder::DESC,
        }
    }
}

/// Attaches the record(s) referenced by `local_field` from `from` under
/// `as_field`. A single id attaches one document (or null when missing), an
/// array of ids attaches the documents found, in the order of the ids.
/// Records are never dropped by a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub as_field: String,
    /// Fields kept from the joined documents; empty keeps everything. `id` is always kept.
    pub fields: Vec<String>,
}

impl Lookup {
    pub fn new(from: &str, local_field: &str, as_field: &str, fields: &[&str]) -> Self {
        Lookup {
            from: from.to_string(),
            local_field: local_field.to_string(),
            as_field: as_field.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Sort(Vec<SortKey>),
    Skip(u64),
    Limit(u64),
    Lookup(Lookup),
    /// Keeps only the listed (dotted) paths plus `id`.
    Project(Vec<String>),
}

/// Resolves documents of another collection for `Stage::Lookup`.
#[async_trait]
pub trait LookupSource: Send + Sync {
    async fn fetch_by_ids(&self, collection: &str, ids: &[String]) -> AppResult<Vec<Document>>;
}

pub async fn run_stages(
    source: &dyn LookupSource,
    mut documents: Vec<Document>,
    stages: &[Stage],
) -> AppResult<Vec<Document>> {
    for stage in stages {
        documents = match stage {
            Stage::Match(filter) => documents.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Sort(keys) => {
                sort_documents(&mut documents, keys);
                documents
            }
            Stage::Skip(n) => documents.into_iter().skip(*n as usize).collect(),
            Stage::Limit(n) => documents.into_iter().take(*n as usize).collect(),
            Stage::Lookup(lookup) => apply_lookup(source, documents, lookup).await?,
            Stage::Project(fields) => documents.iter().map(|d| project(d, fields)).collect(),
        };
    }
    Ok(documents)
}

/// Stable sort, so equal keys keep their incoming order.
pub fn sort_documents(documents: &mut [Document], keys: &[SortKey]) {
    documents.sort_by(|a, b| {
        for key in keys {
            let ord = compare_values(get_path(a, &key.field), get_path(b, &key.field));
            let ord = match key.order {
                QryOrder::ASC => ord,
                QryOrder::DESC => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

pub fn project(document: &Document, fields: &[String]) -> Document {
    let mut out = Map::new();
    if let Some(id) = document.get(ID_FIELD) {
        out.insert(ID_FIELD.to_string(), id.clone());
    }
    for field in fields {
        if let Some(value) = get_path(document, field) {
            set_path(&mut out, field, value.clone());
        }
    }
    out
}

fn referenced_ids(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(id)) => vec![id.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => vec![],
    }
}

async fn apply_lookup(
    source: &dyn LookupSource,
    documents: Vec<Document>,
    lookup: &Lookup,
) -> AppResult<Vec<Document>> {
    let mut ids: Vec<String> = documents
        .iter()
        .flat_map(|d| referenced_ids(get_path(d, &lookup.local_field)))
        .collect();
    ids.sort();
    ids.dedup();

    let related: HashMap<String, Document> = if ids.is_empty() {
        HashMap::new()
    } else {
        source
            .fetch_by_ids(&lookup.from, &ids)
            .await?
            .into_iter()
            .filter_map(|d| {
                let id = d.get(ID_FIELD)?.as_str()?.to_string();
                let d = if lookup.fields.is_empty() {
                    d
                } else {
                    project(&d, &lookup.fields)
                };
                Some((id, d))
            })
            .collect()
    };

    Ok(documents
        .into_iter()
        .map(|mut d| {
            let attached = match get_path(&d, &lookup.local_field) {
                Some(Value::Array(items)) => Value::Array(
                    items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .filter_map(|id| related.get(id).cloned().map(Value::Object))
                        .collect(),
                ),
                Some(Value::String(id)) => related
                    .get(id)
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            };
            set_path(&mut d, &lookup.as_field, attached);
            d
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Users(Vec<Document>);

    #[async_trait]
    impl LookupSource for Users {
        async fn fetch_by_ids(&self, _collection: &str, ids: &[String]) -> AppResult<Vec<Document>> {
            Ok(self
                .0
                .iter()
                .filter(|d| ids.iter().any(|id| d.get("id") == Some(&json!(id))))
                .cloned()
                .collect())
        }
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn nested_or_inside_and_keeps_equality_filter() {
        let filter = Filter::And(vec![
            Filter::Or(vec![
                Filter::contains_text("title", "VIDEO"),
                Filter::contains_text("description", "video"),
            ]),
            Filter::eq("owner", "user:b"),
        ]);
        let cat = doc(json!({"id": "video:1", "title": "cat video", "owner": "user:a"}));
        let dog = doc(json!({"id": "video:2", "title": "dog video", "owner": "user:b"}));
        assert!(!filter.matches(&cat));
        assert!(filter.matches(&dog));
    }

    #[test]
    fn sort_is_stable_and_directional() {
        let mut docs = vec![
            doc(json!({"id": "a", "views": 2})),
            doc(json!({"id": "b", "views": 1})),
            doc(json!({"id": "c", "views": 2})),
            doc(json!({"id": "d"})),
        ];
        sort_documents(&mut docs, &[SortKey::desc("views")]);
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "c", "b", "d"]);
    }

    #[tokio::test]
    async fn lookup_attaches_single_and_many() {
        let users = Users(vec![
            doc(json!({"id": "user:1", "username": "anna", "password": "x"})),
            doc(json!({"id": "user:2", "username": "bob"})),
        ]);
        let docs = vec![
            doc(json!({"id": "video:1", "owner": "user:1", "fans": ["user:2", "user:9", "user:1"]})),
            doc(json!({"id": "video:2", "owner": "user:7"})),
        ];
        let stages = vec![
            Stage::Lookup(Lookup::new("user", "owner", "owner", &["username"])),
            Stage::Lookup(Lookup::new("user", "fans", "fans", &[])),
        ];
        let out = run_stages(&users, docs, &stages).await.unwrap();
        assert_eq!(out[0]["owner"], json!({"id": "user:1", "username": "anna"}));
        assert_eq!(out[0]["fans"].as_array().unwrap().len(), 2);
        assert_eq!(out[0]["fans"][0]["id"], json!("user:2"));
        assert_eq!(out[1]["owner"], Value::Null);
        assert_eq!(out[1]["fans"], Value::Null);
    }

    #[tokio::test]
    async fn skip_limit_and_project() {
        let docs: Vec<Document> = (0..5)
            .map(|i| doc(json!({"id": format!("t:{i}"), "n": i, "secret": true, "meta": {"a": i, "b": 1}})))
            .collect();
        let stages = vec![
            Stage::Sort(vec![SortKey::asc("n")]),
            Stage::Skip(1),
            Stage::Limit(2),
            Stage::Project(vec!["n".to_string(), "meta.a".to_string()]),
        ];
        let out = run_stages(&Users(vec![]), docs, &stages).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(Value::Object(out[0].clone()), json!({"id": "t:1", "n": 1, "meta": {"a": 1}}));
    }
}
