use surrealdb::engine::any::{connect, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tracing::info;

use crate::middleware::error::AppResult;

pub type Db = Surreal<Any>;

#[derive(Debug)]
pub struct DbConfig<'a> {
    pub url: &'a str,
    pub database: &'a str,
    pub namespace: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub client: Db,
}

impl Database {
    pub async fn connect(config: DbConfig<'_>) -> AppResult<Self> {
        info!(url = config.url, namespace = config.namespace, database = config.database, "connecting to SurrealDB");
        let conn = connect(config.url).await?;

        if let (Some(username), Some(password)) = (config.username, config.password) {
            conn.signin(Root { username, password }).await?;
        }

        conn.use_ns(config.namespace)
            .use_db(config.database)
            .await?;

        let version = conn.version().await?;
        info!(%version, "connected to SurrealDB");
        Ok(Self { client: conn })
    }
}
