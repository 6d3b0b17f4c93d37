use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::database::document::{from_document, Document, ID_FIELD};
use crate::database::pipeline::{Filter, Lookup, QryOrder, SortKey, Stage};
use crate::database::transaction::with_timeout;
use crate::interfaces::document_store::DocumentStore;
use crate::middleware::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Raw listing parameters as they arrive in the query string.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListingParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub query: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortType")]
    pub sort_type: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub page: u64,
    pub limit: u64,
    pub text: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<QryOrder>,
    pub filters: Vec<(String, Value)>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            text: None,
            sort_by: None,
            order: None,
            filters: vec![],
        }
    }
}

fn parse_number(name: &str, value: Option<&str>, default: u64) -> AppResult<u64> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse::<u64>().map_err(|_| AppError::InvalidQuery {
            description: format!("{name} must be a non-negative integer, got '{raw}'"),
        }),
    }
}

impl ListingQuery {
    /// Parses the textual parameters. Range checks happen in `ListingService::list`
    /// where the configured maximum page size is known.
    pub fn parse(params: &ListingParams) -> AppResult<Self> {
        let page = parse_number("page", params.page.as_deref(), 1)?;
        let limit = parse_number("limit", params.limit.as_deref(), DEFAULT_PAGE_SIZE)?;
        let order = match params.sort_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("asc") => Some(QryOrder::ASC),
            Some(raw) if raw.eq_ignore_ascii_case("desc") => Some(QryOrder::DESC),
            Some(raw) => {
                return Err(AppError::InvalidQuery {
                    description: format!("sortType must be asc or desc, got '{raw}'"),
                })
            }
        };
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Ok(Self {
            page,
            limit,
            text: non_blank(&params.query),
            sort_by: non_blank(&params.sort_by),
            order,
            filters: vec![],
        })
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }
}

/// What a listing reads and how: collection, searchable fields, sortable
/// fields, joins and projection.
#[derive(Debug, Clone)]
pub struct ListingSpec {
    pub collection: &'static str,
    pub text_fields: &'static [&'static str],
    pub sort_keys: &'static [&'static str],
    pub default_sort: SortKey,
    pub lookups: Vec<Lookup>,
    /// Kept paths; empty keeps whole documents.
    pub projection: Vec<String>,
    /// Message of the `NoResults` error for an empty result.
    pub empty_message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn map<U, F>(self, f: F) -> AppResult<Page<U>>
    where
        F: FnMut(T) -> AppResult<U>,
    {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<AppResult<Vec<_>>>()?,
            total: self.total,
            total_pages: self.total_pages,
            current_page: self.current_page,
            page_size: self.page_size,
        })
    }
}

impl Page<Document> {
    pub fn typed<U: serde::de::DeserializeOwned>(self) -> AppResult<Page<U>> {
        self.map(from_document)
    }
}

pub struct ListingService<'a> {
    store: &'a dyn DocumentStore,
    max_page_size: u64,
    timeout: Duration,
}

impl<'a> ListingService<'a> {
    pub fn new(store: &'a dyn DocumentStore, max_page_size: u64, timeout: Duration) -> Self {
        Self {
            store,
            max_page_size,
            timeout,
        }
    }

    pub async fn list(&self, query: &ListingQuery, spec: &ListingSpec) -> AppResult<Page<Document>> {
        if query.page < 1 {
            return Err(AppError::InvalidQuery {
                description: "page must be at least 1".to_string(),
            });
        }
        if query.limit < 1 || query.limit > self.max_page_size {
            return Err(AppError::InvalidQuery {
                description: format!("limit must be between 1 and {}", self.max_page_size),
            });
        }
        let sort = match &query.sort_by {
            None => spec.default_sort.clone(),
            Some(key) if spec.sort_keys.contains(&key.as_str()) => SortKey {
                field: key.clone(),
                order: query.order.unwrap_or(QryOrder::ASC),
            },
            Some(key) => return Err(AppError::InvalidSortKey { key: key.clone() }),
        };
        let filter = build_filter(query, spec);

        with_timeout(self.timeout, self.run(query, spec, filter, sort)).await
    }

    async fn run(
        &self,
        query: &ListingQuery,
        spec: &ListingSpec,
        filter: Filter,
        sort: SortKey,
    ) -> AppResult<Page<Document>> {
        let total = self.store.count(spec.collection, &filter).await?;
        if total == 0 {
            return Err(AppError::NoResults {
                description: spec.empty_message.to_string(),
            });
        }
        let total_pages = total.div_ceil(query.limit);
        let page = |items: Vec<Document>| Page {
            items,
            total,
            total_pages,
            current_page: query.page,
            page_size: query.limit,
        };

        // pages past the end are empty, however far past
        let skip = match (query.page - 1).checked_mul(query.limit) {
            Some(skip) if skip < total => skip,
            _ => return Ok(page(vec![])),
        };

        let mut stages = vec![
            Stage::Match(filter),
            Stage::Sort(vec![sort, SortKey::asc(ID_FIELD)]),
            Stage::Skip(skip),
            Stage::Limit(query.limit),
        ];
        stages.extend(spec.lookups.iter().cloned().map(Stage::Lookup));
        if !spec.projection.is_empty() {
            stages.push(Stage::Project(spec.projection.clone()));
        }

        let items = self.store.aggregate(spec.collection, &stages).await?;
        debug!(
            collection = spec.collection,
            total,
            page = query.page,
            returned = items.len(),
            "listing page"
        );
        Ok(page(items))
    }
}

/// AND of the equality filters and one OR group over the text fields.
fn build_filter(query: &ListingQuery, spec: &ListingSpec) -> Filter {
    let mut parts: Vec<Filter> = vec![];
    if let Some(text) = &query.text {
        if !spec.text_fields.is_empty() {
            parts.push(Filter::Or(
                spec.text_fields
                    .iter()
                    .map(|f| Filter::contains_text(*f, text.clone()))
                    .collect(),
            ));
        }
    }
    parts.extend(
        query
            .filters
            .iter()
            .map(|(field, value)| Filter::eq(field.clone(), value.clone())),
    );
    match parts.len() {
        0 => Filter::All,
        _ => Filter::And(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::MemoryStore;
    use serde_json::json;
    use std::collections::HashSet;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn spec() -> ListingSpec {
        ListingSpec {
            collection: "video",
            text_fields: &["title", "description"],
            sort_keys: &["title", "views"],
            default_sort: SortKey::desc("views"),
            lookups: vec![Lookup::new("user", "owner", "owner", &["username"])],
            projection: vec!["title".to_string(), "owner".to_string()],
            empty_message: "No videos found",
        }
    }

    async fn insert(store: &MemoryStore, collection: &str, value: Value) {
        store
            .insert(collection, value.as_object().cloned().unwrap())
            .await
            .unwrap();
    }

    fn params(pairs: &[(&str, &str)]) -> ListingParams {
        let mut p = ListingParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "page" => p.page = v,
                "limit" => p.limit = v,
                "query" => p.query = v,
                "sortBy" => p.sort_by = v,
                "sortType" => p.sort_type = v,
                _ => p.user_id = v,
            }
        }
        p
    }

    #[test]
    fn parse_rejects_garbage_instead_of_clamping() {
        assert!(matches!(
            ListingQuery::parse(&params(&[("page", "two")])),
            Err(AppError::InvalidQuery { .. })
        ));
        assert!(matches!(
            ListingQuery::parse(&params(&[("limit", "-1")])),
            Err(AppError::InvalidQuery { .. })
        ));
        assert!(matches!(
            ListingQuery::parse(&params(&[("sortType", "sideways")])),
            Err(AppError::InvalidQuery { .. })
        ));
        let q = ListingQuery::parse(&params(&[("sortType", "DESC"), ("query", "  ")])).unwrap();
        assert_eq!(q.order, Some(QryOrder::DESC));
        assert_eq!(q.text, None);
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn filter_text_and_owner() {
        let store = MemoryStore::new();
        insert(&store, "video", json!({"title": "cat video", "owner": "user:a", "views": 1})).await;
        insert(&store, "video", json!({"title": "dog video", "owner": "user:b", "views": 2})).await;
        let service = ListingService::new(&store, 100, TIMEOUT);

        let q = ListingQuery::parse(&params(&[("query", "cat")])).unwrap();
        let page = service.list(&q, &spec()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0]["title"], json!("cat video"));

        let q = ListingQuery::parse(&params(&[("query", "VIDEO")]))
            .unwrap()
            .with_filter("owner", "user:b");
        let page = service.list(&q, &spec()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0]["title"], json!("dog video"));
    }

    #[tokio::test]
    async fn pages_cover_every_record_once() {
        let store = MemoryStore::new();
        insert(&store, "user", json!({"id": "user:a", "username": "anna", "email": "a@x.io"})).await;
        for i in 0..23 {
            // repeated view counts make the id tie-break matter
            insert(&store, "video", json!({"title": format!("v{i}"), "views": i % 4, "owner": "user:a"})).await;
        }
        let service = ListingService::new(&store, 100, TIMEOUT);

        let mut seen = HashSet::new();
        let mut pages = 0;
        for page_no in 1..=5u64 {
            let q = ListingQuery {
                page: page_no,
                limit: 5,
                ..Default::default()
            };
            let page = service.list(&q, &spec()).await.unwrap();
            assert_eq!(page.total, 23);
            assert_eq!(page.total_pages, 5);
            assert!(page.items.len() <= 5);
            for item in &page.items {
                assert_eq!(item["owner"], json!({"id": "user:a", "username": "anna"}));
                assert!(item.get("views").is_none());
                assert!(seen.insert(item["id"].as_str().unwrap().to_string()));
            }
            pages += 1;
        }
        assert_eq!(pages, 5);
        assert_eq!(seen.len(), 23);

        let beyond = ListingQuery {
            page: 6,
            limit: 5,
            ..Default::default()
        };
        assert!(service.list(&beyond, &spec()).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn far_pages_are_empty_not_a_crash() {
        let store = MemoryStore::new();
        insert(&store, "video", json!({"title": "only", "views": 1})).await;
        let service = ListingService::new(&store, 100, TIMEOUT);

        for (page, limit) in [("2", "10"), ("18446744073709551615", "10"), ("18446744073709551615", "100")] {
            let q = ListingQuery::parse(&params(&[("page", page), ("limit", limit)])).unwrap();
            let res = service.list(&q, &spec()).await.unwrap();
            assert!(res.items.is_empty());
            assert_eq!(res.total, 1);
            assert_eq!(res.total_pages, 1);
            assert_eq!(res.current_page, q.page);
        }

        assert!(matches!(
            ListingQuery::parse(&params(&[("page", "18446744073709551616")])),
            Err(AppError::InvalidQuery { .. })
        ));
    }

    #[tokio::test]
    async fn empty_versus_invalid() {
        let store = MemoryStore::new();
        let service = ListingService::new(&store, 50, TIMEOUT);

        let res = service.list(&ListingQuery::default(), &spec()).await;
        assert_eq!(
            res,
            Err(AppError::NoResults {
                description: "No videos found".to_string()
            })
        );

        let zero = ListingQuery {
            page: 0,
            ..Default::default()
        };
        assert!(matches!(service.list(&zero, &spec()).await, Err(AppError::InvalidQuery { .. })));

        let huge = ListingQuery {
            limit: 51,
            ..Default::default()
        };
        assert!(matches!(service.list(&huge, &spec()).await, Err(AppError::InvalidQuery { .. })));
    }

    #[tokio::test]
    async fn sort_keys_are_allow_listed() {
        let store = MemoryStore::new();
        insert(&store, "video", json!({"title": "b", "views": 1})).await;
        insert(&store, "video", json!({"title": "a", "views": 2})).await;
        let service = ListingService::new(&store, 100, TIMEOUT);

        let q = ListingQuery::parse(&params(&[("sortBy", "password")])).unwrap();
        assert_eq!(
            service.list(&q, &spec()).await,
            Err(AppError::InvalidSortKey {
                key: "password".to_string()
            })
        );

        let q = ListingQuery::parse(&params(&[("sortBy", "title")])).unwrap();
        let page = service.list(&q, &spec()).await.unwrap();
        assert_eq!(page.items[0]["title"], json!("a"));

        let page = service.list(&ListingQuery::default(), &spec()).await.unwrap();
        assert_eq!(page.items[0]["title"], json!("a"));
    }
}
