//! SQLite-backed key-value store.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{next_origin, KeyValueStore, StorageEvent, StorageSubscription, EXTERNAL_ORIGIN};

const EVENT_CAPACITY: usize = 64;

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Key-value store on a SQLite database file.
///
/// Each open handle is one execution context. Commits made by other
/// connections, including other processes, are picked up by
/// [`poll_external_changes`](SqliteStore::poll_external_changes).
pub struct SqliteStore {
  conn: Mutex<Connection>,
  events: broadcast::Sender<StorageEvent>,
  origin: u64,
  /// Last seen `PRAGMA data_version`.
  data_version: Mutex<i64>,
}

impl SqliteStore {
  /// Open or create the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Private store that lives as long as this handle.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .busy_timeout(Duration::from_secs(2))
      .map_err(|e| eyre!("Failed to configure store: {}", e))?;
    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;

    let data_version = read_data_version(&conn)?;
    let (events, _) = broadcast::channel(EVENT_CAPACITY);

    Ok(Self {
      conn: Mutex::new(conn),
      events,
      origin: next_origin(),
      data_version: Mutex::new(data_version),
    })
  }

  /// Default location of the persistent store.
  pub fn default_path(data_dir: Option<&Path>) -> Result<PathBuf> {
    Ok(self::data_dir(data_dir)?.join("libris.db"))
  }

  /// Location of the session store for `session_id`.
  pub fn session_path(data_dir: Option<&Path>, session_id: &str) -> Result<PathBuf> {
    let safe: String = session_id
      .chars()
      .map(|c| {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
          c
        } else {
          '_'
        }
      })
      .collect();
    if safe.is_empty() {
      return Err(eyre!("Session id must not be empty"));
    }
    Ok(self::data_dir(data_dir)?.join("sessions").join(format!("{}.db", safe)))
  }

  /// Check whether another connection committed since the last check.
  ///
  /// Announces a catch-all change to subscribers when it did.
  pub fn poll_external_changes(&self) -> bool {
    let current = {
      let Ok(conn) = self.conn.lock() else {
        return false;
      };
      match read_data_version(&conn) {
        Ok(v) => v,
        Err(e) => {
          debug!("{}", e);
          return false;
        }
      }
    };

    let Ok(mut seen) = self.data_version.lock() else {
      return false;
    };
    if *seen == current {
      return false;
    }
    *seen = current;
    drop(seen);

    debug!("External storage change detected");
    let _ = self.events.send(StorageEvent::everything(EXTERNAL_ORIGIN));
    true
  }

  /// Poll for external changes every `every` until the store is dropped.
  pub fn spawn_watcher(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
    let weak: Weak<Self> = Arc::downgrade(self);
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      loop {
        ticker.tick().await;
        match weak.upgrade() {
          Some(store) => {
            store.poll_external_changes();
          }
          None => break,
        }
      }
    })
  }

  fn announce(&self, key: &str) {
    let _ = self.events.send(StorageEvent::key(key, self.origin));
  }
}

/// Directory holding the databases and logs: `dir` when given, otherwise
/// `libris` under the platform data directory.
pub fn data_dir(dir: Option<&Path>) -> Result<PathBuf> {
  if let Some(dir) = dir {
    return Ok(dir.to_path_buf());
  }
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;
  Ok(data_dir.join("libris"))
}

fn read_data_version(conn: &Connection) -> Result<i64> {
  conn
    .query_row("PRAGMA data_version", [], |row| row.get(0))
    .map_err(|e| eyre!("Failed to read data version: {}", e))
}

impl KeyValueStore for SqliteStore {
  fn get(&self, key: &str) -> Option<String> {
    let conn = self.conn.lock().ok()?;
    conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()
      .unwrap_or_else(|e| {
        warn!("Failed to read {}: {}", key, e);
        None
      })
  }

  fn set(&self, key: &str, value: &str) {
    let written = match self.conn.lock() {
      Ok(conn) => conn.execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      ),
      Err(_) => {
        warn!("Store lock poisoned, dropping write to {}", key);
        return;
      }
    };

    match written {
      Ok(_) => self.announce(key),
      Err(e) => warn!("Failed to write {}: {}", key, e),
    }
  }

  fn remove(&self, key: &str) {
    let removed = match self.conn.lock() {
      Ok(conn) => conn.execute("DELETE FROM kv WHERE key = ?", params![key]),
      Err(_) => return,
    };

    match removed {
      Ok(0) => {}
      Ok(_) => self.announce(key),
      Err(e) => warn!("Failed to remove {}: {}", key, e),
    }
  }

  fn subscribe(&self) -> StorageSubscription {
    StorageSubscription::new(self.events.subscribe(), self.origin)
  }
}
