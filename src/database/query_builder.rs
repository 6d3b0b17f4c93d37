use serde_json::{Map, Value};
use surrealdb::engine::any::Any;
use surrealdb::method::Query;

use crate::database::client::Db;

/// Accumulates SurrealQL statements together with their bound parameters.
pub struct SurrealQueryBuilder {
    pub sql: String,
    pub variables: Map<String, Value>,
    counter: usize,
}

impl SurrealQueryBuilder {
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            sql: initial_sql.into(),
            variables: Map::new(),
            counter: 0,
        }
    }

    pub fn push(&mut self, sql: &str) {
        if !self.sql.is_empty() {
            self.sql.push('\n');
        }
        self.sql.push_str(sql);
    }

    pub fn bind_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Binds `value` under a fresh name and returns the `$name` placeholder.
    pub fn next_param(&mut self, value: impl Into<Value>) -> String {
        self.counter += 1;
        let name = format!("p{}", self.counter);
        self.variables.insert(name.clone(), value.into());
        format!("${name}")
    }

    pub fn into_db_query(self, db: &Db) -> Query<'_, Any> {
        db.query(self.sql).bind(self.variables)
    }
}
