//! Credential store adapter
//!
//! Holds the access/refresh credential pair. Each credential is a single
//! secret addressed by a realm and an owner identity, with at most one live
//! secret per (realm, identity). Nothing here caches a token: callers go
//! through [`Credentials`], which re-reads the store on every access so a
//! rotation is visible to every holder as soon as it commits.

use crate::error::{IngestError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Realm holding the bearer token for the log API
pub const ACCESS_TOKEN_REALM: &str = "audit_access_token";

/// Realm holding the refresh credential for the token exchange
pub const REFRESH_TOKEN_REALM: &str = "audit_refresh_token";

/// Wildcard owner identity the pair is stored under
pub const WILDCARD_IDENTITY: &str = "-";

/// Secret storage contract
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the secret for (realm, identity)
    async fn lookup(&self, realm: &str, identity: &str) -> Result<Option<String>>;

    /// Create a secret; fails if (realm, identity) is already occupied
    async fn create(&self, secret: &str, identity: &str, realm: &str) -> Result<()>;

    /// Delete the secret for (realm, identity); fails if none exists
    async fn delete(&self, identity: &str, realm: &str) -> Result<()>;

    /// Swap the secret for (realm, identity), creating it if absent
    ///
    /// Stores that can do better than delete-then-create should override
    /// this so readers never see an empty realm.
    async fn replace(&self, secret: &str, identity: &str, realm: &str) -> Result<()> {
        if self.lookup(realm, identity).await?.is_some() {
            self.delete(identity, realm).await?;
        }
        self.create(secret, identity, realm).await
    }
}

/// Always-fresh view of the stored credential pair
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn CredentialStore>,
}

impl Credentials {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Current access token, read from the store
    pub async fn access_token(&self) -> Result<Option<String>> {
        self.store.lookup(ACCESS_TOKEN_REALM, WILDCARD_IDENTITY).await
    }

    /// Current refresh token, read from the store
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        self.store.lookup(REFRESH_TOKEN_REALM, WILDCARD_IDENTITY).await
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }
}

/// SQLite-backed credential store
pub struct SqliteCredentialStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Open (or create) the store at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            IngestError::credential_store(format!(
                "Failed to open credential database {}: {}",
                db_path.display(),
                e
            ))
        })?;

        Self::with_connection(conn)
    }

    /// Create an in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            IngestError::credential_store(format!("Failed to create in-memory database: {}", e))
        })?;

        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                realm TEXT NOT NULL,
                identity TEXT NOT NULL,
                secret TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (realm, identity)
            )
            "#,
            [],
        )?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| IngestError::credential_store(format!("Failed to acquire lock: {}", e)))
    }
}

fn insert_secret(conn: &Connection, secret: &str, identity: &str, realm: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO credentials (realm, identity, secret, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![realm, identity, secret, chrono::Utc::now().to_rfc3339()],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref code, _)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            IngestError::credential_store(format!(
                "A secret already exists for realm '{}' and identity '{}'",
                realm, identity
            ))
        },
        other => IngestError::from(other),
    })?;

    Ok(())
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn lookup(&self, realm: &str, identity: &str) -> Result<Option<String>> {
        let conn = self.lock()?;

        let secret = conn
            .query_row(
                "SELECT secret FROM credentials WHERE realm = ?1 AND identity = ?2",
                params![realm, identity],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(secret)
    }

    async fn create(&self, secret: &str, identity: &str, realm: &str) -> Result<()> {
        let conn = self.lock()?;
        insert_secret(&conn, secret, identity, realm)
    }

    async fn delete(&self, identity: &str, realm: &str) -> Result<()> {
        let conn = self.lock()?;

        let deleted = conn.execute(
            "DELETE FROM credentials WHERE realm = ?1 AND identity = ?2",
            params![realm, identity],
        )?;

        if deleted == 0 {
            return Err(IngestError::credential_store(format!(
                "No secret stored for realm '{}' and identity '{}'",
                realm, identity
            )));
        }

        Ok(())
    }

    async fn replace(&self, secret: &str, identity: &str, realm: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM credentials WHERE realm = ?1 AND identity = ?2",
            params![realm, identity],
        )?;
        insert_secret(&tx, secret, identity, realm)?;

        tx.commit()?;
        Ok(())
    }
}
