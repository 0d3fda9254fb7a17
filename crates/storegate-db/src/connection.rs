//! Datastore handle shared by every repository.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::{debug, info};

const EMBEDDED_SCHEME: &str = "mem://";

/// Where and as whom to reach SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint; the scheme picks the engine (`ws://host:8000`, `mem://`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root username. An empty value skips sign-in.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "storegate".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// An embedded in-process store with no credentials.
    pub fn in_memory() -> Self {
        Self {
            url: EMBEDDED_SCHEME.into(),
            username: String::new(),
            password: String::new(),
            ..Self::default()
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.url.starts_with(EMBEDDED_SCHEME)
    }

    fn root_credentials(&self) -> Option<Root> {
        if self.username.is_empty() || self.is_embedded() {
            return None;
        }
        Some(Root {
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

/// Long-lived datastore client. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Open the engine named by `config.url`, sign in when credentials
    /// apply, and select the namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "opening datastore"
        );

        let db = any::connect(config.url.as_str()).await?;

        match config.root_credentials() {
            Some(root) => db.signin(root).await.map(|_| ())?,
            None => debug!("datastore sign-in skipped"),
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!(embedded = config.is_embedded(), "datastore ready");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Round-trip a trivial query to confirm the datastore answers.
    pub async fn ping(&self) -> Result<(), surrealdb::Error> {
        self.db.query("RETURN true").await?.check()?;
        Ok(())
    }
}
