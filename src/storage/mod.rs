pub mod reader;
pub mod repository;
pub mod snapshot;

use std::path::{Path, PathBuf};

use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

/// Applied to every connection the warehouse opens.
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode=WAL;\
     PRAGMA foreign_keys=ON;\
     PRAGMA busy_timeout=5000;";

/// The SQLite warehouse: a writer connection for snapshot loads and config,
/// and a reader connection the report engines query through. Under WAL the
/// reader never waits on the writer.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

/// `~/.minutesdw/minutesdw.db`, creating the directory if needed.
fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("cannot determine home directory".into()))?;
    let dir = home.join(".minutesdw");
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::Config(format!("{}: {e}", dir.display())))?;
    Ok(dir.join("minutesdw.db"))
}

impl Database {
    pub async fn open() -> Result<Self> {
        Self::open_at(default_path()?).await
    }

    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("opening warehouse at {}", path.display());

        let writer = tokio_rusqlite::Connection::open(path).await?;
        migrate(&writer).await?;
        let reader = tokio_rusqlite::Connection::open(path).await?;
        reader
            .call(|conn| conn.execute_batch(CONNECTION_PRAGMAS))
            .await?;

        Ok(Self { writer, reader })
    }

    /// Fresh in-memory warehouse. Memory databases are private to one
    /// connection, so reads and writes share it.
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        migrate(&conn).await?;
        Ok(Self {
            reader: conn.clone(),
            writer: conn,
        })
    }

    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }

    /// Value of an `app_config` key.
    pub async fn get_config(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .reader
            .call(move |conn| repository::get_config(conn, &key))
            .await?;
        Ok(value)
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.writer
            .call(move |conn| repository::set_config(conn, &key, &value))
            .await?;
        Ok(())
    }

    pub async fn list_config(&self) -> Result<Vec<(String, String)>> {
        let entries = self
            .reader
            .call(|conn| repository::list_config(conn))
            .await?;
        Ok(entries)
    }
}

async fn migrate(conn: &tokio_rusqlite::Connection) -> Result<()> {
    conn.call(|conn| {
        conn.execute_batch(CONNECTION_PRAGMAS)
            .map_err(|e| e.to_string())?;
        migrations().to_latest(conn).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| Error::Migration(e.to_string()))
}

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))])
}
