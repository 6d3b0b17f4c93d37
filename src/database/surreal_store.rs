use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::database::client::Db;
use crate::database::document::{apply_patch, new_record_id, Document, ID_FIELD};
use crate::database::pipeline::{run_stages, Filter, LookupSource, SortKey, Stage};
use crate::database::query_builder::SurrealQueryBuilder;
use crate::database::table_names::{ALL_TABLE_NAMES, LIKE_TABLE_NAME, SUBSCRIPTION_TABLE_NAME};
use crate::interfaces::document_store::{ArrayOp, DocumentStore, StoreTransaction, UpdateOptions};
use crate::middleware::error::{AppError, AppResult};

static FIELD_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field regex"));

/// Every record is stored as `{ doc: <document> }` under `<collection>:<key>`.
#[derive(Debug, Deserialize)]
struct StoredRow {
    doc: Document,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

fn field_path(path: &str) -> AppResult<String> {
    if path.split('.').all(|s| FIELD_SEGMENT.is_match(s)) {
        Ok(format!("doc.{path}"))
    } else {
        Err(AppError::Store {
            source: format!("invalid field path '{path}'"),
        })
    }
}

fn record_key<'a>(collection: &str, id: &'a str) -> Option<&'a str> {
    id.strip_prefix(collection)
        .and_then(|rest| rest.strip_prefix(':'))
        .filter(|key| !key.is_empty())
}

fn compile_filter(filter: &Filter, qb: &mut SurrealQueryBuilder) -> AppResult<String> {
    Ok(match filter {
        Filter::All => "true".to_string(),
        Filter::Eq { field, value } => {
            let path = field_path(field)?;
            format!("{path} = {}", qb.next_param(value.clone()))
        }
        Filter::ContainsText { field, needle } => {
            let path = field_path(field)?;
            let p = qb.next_param(needle.to_lowercase());
            format!("(type::is::string({path}) AND string::contains(string::lowercase({path}), {p}))")
        }
        Filter::In { field, values } => {
            let path = field_path(field)?;
            format!("{path} IN {}", qb.next_param(Value::Array(values.clone())))
        }
        Filter::And(filters) if filters.is_empty() => "true".to_string(),
        Filter::Or(filters) if filters.is_empty() => "false".to_string(),
        Filter::And(filters) => join_filters(filters, " AND ", qb)?,
        Filter::Or(filters) => join_filters(filters, " OR ", qb)?,
    })
}

fn join_filters(filters: &[Filter], op: &str, qb: &mut SurrealQueryBuilder) -> AppResult<String> {
    let parts = filters
        .iter()
        .map(|f| compile_filter(f, qb))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(format!("({})", parts.join(op)))
}

/// Leading stages that translate directly to a single SELECT.
#[derive(Debug, Default)]
struct Pushdown {
    filters: Vec<Filter>,
    sort: Option<Vec<SortKey>>,
    skip: Option<u64>,
    limit: Option<u64>,
}

fn plan_pushdown(stages: &[Stage]) -> (Pushdown, &[Stage]) {
    let mut plan = Pushdown::default();
    let mut consumed = 0;
    for stage in stages {
        match stage {
            Stage::Match(f) if plan.sort.is_none() && plan.skip.is_none() && plan.limit.is_none() => {
                plan.filters.push(f.clone())
            }
            Stage::Sort(keys) if plan.sort.is_none() && plan.skip.is_none() && plan.limit.is_none() => {
                plan.sort = Some(keys.clone())
            }
            Stage::Skip(n) if plan.skip.is_none() && plan.limit.is_none() => plan.skip = Some(*n),
            Stage::Limit(n) if plan.limit.is_none() => plan.limit = Some(*n),
            _ => break,
        }
        consumed += 1;
    }
    (plan, &stages[consumed..])
}

fn select_sql(collection: &str, plan: &Pushdown) -> AppResult<SurrealQueryBuilder> {
    let mut qb = SurrealQueryBuilder::new("SELECT * FROM type::table($tb)").bind_var("tb", collection);
    if !plan.filters.is_empty() {
        let cond = compile_filter(&Filter::And(plan.filters.clone()), &mut qb)?;
        qb.sql.push_str(&format!(" WHERE {cond}"));
    }
    if let Some(keys) = plan.sort.as_ref().filter(|k| !k.is_empty()) {
        let order = keys
            .iter()
            .map(|k| field_path(&k.field).map(|p| format!("{p} {}", k.order)))
            .collect::<AppResult<Vec<_>>>()?;
        qb.sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    if let Some(limit) = plan.limit {
        qb.sql.push_str(&format!(" LIMIT {}", limit.min(i64::MAX as u64)));
    }
    if let Some(skip) = plan.skip {
        if plan.limit.is_none() {
            // START needs a LIMIT in SurrealQL
            qb.sql.push_str(&format!(" LIMIT {}", i64::MAX));
        }
        qb.sql.push_str(&format!(" START {}", skip.min(i64::MAX as u64)));
    }
    Ok(qb)
}

#[derive(Debug, Clone)]
pub struct SurrealStore {
    client: Db,
}

impl SurrealStore {
    pub fn new(client: Db) -> Self {
        Self { client }
    }

    pub async fn mutate_db(&self) -> AppResult<()> {
        let mut sql = String::new();
        for table in ALL_TABLE_NAMES {
            sql.push_str(&format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS PERMISSIONS NONE;\n"));
        }
        for table in [LIKE_TABLE_NAME, SUBSCRIPTION_TABLE_NAME] {
            sql.push_str(&format!(
                "DEFINE INDEX IF NOT EXISTS {table}_actor_subject_idx ON TABLE {table} FIELDS doc.actor, doc.subject UNIQUE;\n"
            ));
        }
        self.client.query(sql).await?.check()?;
        Ok(())
    }

    async fn select(&self, qb: SurrealQueryBuilder) -> AppResult<Vec<Document>> {
        debug!(sql = %qb.sql, "surreal select");
        let mut res = qb.into_db_query(&self.client).await?;
        let rows: Vec<StoredRow> = res.take(0)?;
        Ok(rows.into_iter().map(|r| r.doc).collect())
    }

    async fn select_matching(&self, collection: &str, filter: &Filter) -> AppResult<Vec<Document>> {
        let plan = Pushdown {
            filters: vec![filter.clone()],
            ..Default::default()
        };
        self.select(select_sql(collection, &plan)?).await
    }
}

#[async_trait]
impl LookupSource for SurrealStore {
    async fn fetch_by_ids(&self, collection: &str, ids: &[String]) -> AppResult<Vec<Document>> {
        let values = ids.iter().cloned().map(Value::String).collect();
        self.select_matching(collection, &Filter::is_in(ID_FIELD, values))
            .await
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> AppResult<Option<Document>> {
        let plan = Pushdown {
            filters: vec![filter.clone()],
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.select(select_sql(collection, &plan)?).await?.into_iter().next())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        let Some(key) = record_key(collection, id) else {
            return Ok(None);
        };
        let qb = SurrealQueryBuilder::new("SELECT * FROM type::thing($tb, $key)")
            .bind_var("tb", collection)
            .bind_var("key", key);
        Ok(self.select(qb).await?.into_iter().next())
    }

    async fn insert(&self, collection: &str, mut document: Document) -> AppResult<Document> {
        let id = match document.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => new_record_id(collection),
        };
        let key = record_key(collection, &id)
            .ok_or_else(|| AppError::InvalidIdentifier { value: id.clone() })?
            .to_string();
        document.insert(ID_FIELD.to_string(), Value::String(id));
        SurrealQueryBuilder::new("CREATE type::thing($tb, $key) CONTENT { doc: $doc } RETURN NONE;")
            .bind_var("tb", collection)
            .bind_var("key", key)
            .bind_var("doc", Value::Object(document.clone()))
            .into_db_query(&self.client)
            .await?
            .check()?;
        Ok(document)
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> AppResult<bool> {
        let Some(key) = record_key(collection, id) else {
            return Ok(false);
        };
        let qb = SurrealQueryBuilder::new("DELETE type::thing($tb, $key) RETURN BEFORE;")
            .bind_var("tb", collection)
            .bind_var("key", key);
        Ok(!self.select(qb).await?.is_empty())
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
        options: UpdateOptions,
    ) -> AppResult<Option<Document>> {
        let Some(before) = self.find_by_id(collection, id).await? else {
            return Ok(None);
        };
        let Some(key) = record_key(collection, id) else {
            return Ok(None);
        };
        let after = apply_patch(before.clone(), patch, options.validate)?;
        SurrealQueryBuilder::new("UPDATE type::thing($tb, $key) SET doc = $doc RETURN NONE;")
            .bind_var("tb", collection)
            .bind_var("key", key)
            .bind_var("doc", Value::Object(after.clone()))
            .into_db_query(&self.client)
            .await?
            .check()?;
        Ok(Some(if options.return_updated { after } else { before }))
    }

    async fn update_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        op: ArrayOp,
        patch: Document,
    ) -> AppResult<Option<Document>> {
        let Some(key) = record_key(collection, id) else {
            return Ok(None);
        };
        let mut qb = SurrealQueryBuilder::new("");
        let tb = qb.next_param(collection);
        let key = qb.next_param(key);
        let path = field_path(field)?;
        let mut sets = vec![];
        for (name, value) in patch {
            if name == ID_FIELD {
                continue;
            }
            let value = qb.next_param(value);
            sets.push(format!("{} = {value}", field_path(&name)?));
        }
        let (func, value) = match op {
            ArrayOp::AddToSet(value) => ("array::union", value),
            ArrayOp::Pull(value) => ("array::complement", value),
        };
        let value = qb.next_param(value);
        sets.push(format!("{path} = {func}({path} ?? [], [{value}])"));
        qb.push(&format!(
            "UPDATE type::thing({tb}, {key}) SET {} RETURN AFTER;",
            sets.join(", ")
        ));
        Ok(self.select(qb).await?.into_iter().next())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> AppResult<u64> {
        let mut qb = SurrealQueryBuilder::new("SELECT count() AS count FROM type::table($tb)")
            .bind_var("tb", collection);
        let cond = compile_filter(filter, &mut qb)?;
        qb.sql.push_str(&format!(" WHERE {cond} GROUP ALL"));
        let mut res = qb.into_db_query(&self.client).await?;
        let rows: Vec<CountRow> = res.take(0)?;
        Ok(rows.first().map(|r| r.count).unwrap_or(0))
    }

    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> AppResult<Vec<Document>> {
        let (plan, rest) = plan_pushdown(stages);
        let documents = self.select(select_sql(collection, &plan)?).await?;
        run_stages(self, documents, rest).await
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(SurrealTransaction {
            store: self.clone(),
            reads: vec![],
            writes: vec![],
        }))
    }
}

#[derive(Debug)]
struct ReadGuard {
    collection: String,
    filter: Filter,
    ids: Vec<String>,
}

#[derive(Debug)]
enum PendingWrite {
    Insert { collection: String, document: Document },
    Delete { collection: String, id: String },
}

/// Optimistic transaction. Reads hit committed state and are re-checked at
/// commit time; writes are buffered and sent in one `BEGIN`/`COMMIT` block.
pub struct SurrealTransaction {
    store: SurrealStore,
    reads: Vec<ReadGuard>,
    writes: Vec<PendingWrite>,
}

impl SurrealTransaction {
    fn deleted(&self, collection: &str, id: &str) -> bool {
        self.writes.iter().any(|w| {
            matches!(w, PendingWrite::Delete { collection: c, id: i } if c == collection && i == id)
        })
    }

    fn commit_sql(&self) -> AppResult<SurrealQueryBuilder> {
        let mut qb = SurrealQueryBuilder::new("BEGIN TRANSACTION;");
        for guard in &self.reads {
            let tb = qb.next_param(guard.collection.clone());
            let cond = compile_filter(&guard.filter, &mut qb)?;
            let ids = qb.next_param(Value::Array(
                guard.ids.iter().cloned().map(Value::String).collect(),
            ));
            qb.push(&format!(
                "IF array::sort((SELECT VALUE doc.id FROM type::table({tb}) WHERE {cond})) != {ids} {{ THROW \"write conflict\" }};"
            ));
        }
        for write in &self.writes {
            match write {
                PendingWrite::Insert {
                    collection,
                    document,
                } => {
                    let id = document.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
                    let key = record_key(collection, id)
                        .ok_or_else(|| AppError::InvalidIdentifier { value: id.to_string() })?;
                    let tb = qb.next_param(collection.clone());
                    let key = qb.next_param(key);
                    let doc = qb.next_param(Value::Object(document.clone()));
                    qb.push(&format!("CREATE type::thing({tb}, {key}) CONTENT {{ doc: {doc} }} RETURN NONE;"));
                }
                PendingWrite::Delete { collection, id } => {
                    let Some(key) = record_key(collection, id) else {
                        continue;
                    };
                    let tb = qb.next_param(collection.clone());
                    let key = qb.next_param(key);
                    qb.push(&format!("DELETE type::thing({tb}, {key}) RETURN NONE;"));
                }
            }
        }
        qb.push("COMMIT TRANSACTION;");
        Ok(qb)
    }
}

#[async_trait]
impl StoreTransaction for SurrealTransaction {
    async fn find_one(&mut self, collection: &str, filter: &Filter) -> AppResult<Option<Document>> {
        let mut found = self.store.select_matching(collection, filter).await?;
        let mut ids: Vec<String> = found
            .iter()
            .filter_map(|d| d.get(ID_FIELD).and_then(Value::as_str).map(str::to_string))
            .collect();
        ids.sort();
        self.reads.push(ReadGuard {
            collection: collection.to_string(),
            filter: filter.clone(),
            ids,
        });

        found.retain(|d| {
            let id = d.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
            !self.deleted(collection, id)
        });
        if let Some(first) = found.into_iter().next() {
            return Ok(Some(first));
        }
        Ok(self.writes.iter().find_map(|w| match w {
            PendingWrite::Insert {
                collection: c,
                document,
            } if c == collection && filter.matches(document) => Some(document.clone()),
            _ => None,
        }))
    }

    async fn insert(&mut self, collection: &str, mut document: Document) -> AppResult<Document> {
        let id = match document.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => new_record_id(collection),
        };
        if record_key(collection, &id).is_none() {
            return Err(AppError::InvalidIdentifier { value: id });
        }
        document.insert(ID_FIELD.to_string(), Value::String(id));
        self.writes.push(PendingWrite::Insert {
            collection: collection.to_string(),
            document: document.clone(),
        });
        Ok(document)
    }

    async fn delete_by_id(&mut self, collection: &str, id: &str) -> AppResult<bool> {
        let pending = self.writes.iter().position(|w| {
            matches!(w, PendingWrite::Insert { collection: c, document }
                if c == collection && document.get(ID_FIELD).and_then(Value::as_str) == Some(id))
        });
        if let Some(index) = pending {
            self.writes.remove(index);
            return Ok(true);
        }
        if self.deleted(collection, id) {
            return Ok(false);
        }
        let exists = self.store.find_by_id(collection, id).await?.is_some();
        if exists {
            self.writes.push(PendingWrite::Delete {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(exists)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let qb = self.commit_sql()?;
        debug!(sql = %qb.sql, "surreal commit");
        qb.into_db_query(&self.store.client).await?.check()?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> AppResult<()> {
        debug!(writes = self.writes.len(), "surreal transaction discarded");
        Ok(())
    }
}
