use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{DEFAULT_SEARCH_MAX_ENTRIES, DEFAULT_SEARCH_TTL_MINUTES, DEFAULT_SUBJECT_TTL_HOURS};
use crate::suggest::SuggestConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub catalog: CatalogConfig,
  pub cache: CacheConfig,
  pub suggest: SuggestSection,
  pub storage: StorageConfig,
  /// Subjects shown on the home screen, in order
  pub categories: Categories,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
  pub base_url: String,
  pub covers_url: String,
  pub user_agent: String,
  pub timeout_secs: u64,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      base_url: "https://openlibrary.org".to_string(),
      covers_url: "https://covers.openlibrary.org".to_string(),
      user_agent: format!("libris/{}", env!("CARGO_PKG_VERSION")),
      timeout_secs: 30,
    }
  }
}

impl CatalogConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub search_ttl_minutes: i64,
  pub search_max_entries: usize,
  pub subject_ttl_hours: i64,
  /// Works fetched per category
  pub subject_limit: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      search_ttl_minutes: DEFAULT_SEARCH_TTL_MINUTES,
      search_max_entries: DEFAULT_SEARCH_MAX_ENTRIES,
      subject_ttl_hours: DEFAULT_SUBJECT_TTL_HOURS,
      subject_limit: 18,
    }
  }
}

impl CacheConfig {
  pub fn search_ttl(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.search_ttl_minutes.max(0))
  }

  pub fn subject_ttl(&self) -> chrono::Duration {
    chrono::Duration::hours(self.subject_ttl_hours.max(0))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuggestSection {
  pub min_chars: usize,
  pub debounce_ms: u64,
  pub max_results: usize,
}

impl Default for SuggestSection {
  fn default() -> Self {
    Self {
      min_chars: 3,
      debounce_ms: 300,
      max_results: 6,
    }
  }
}

impl From<&SuggestSection> for SuggestConfig {
  fn from(section: &SuggestSection) -> Self {
    Self {
      min_chars: section.min_chars,
      debounce: Duration::from_millis(section.debounce_ms),
      max_results: section.max_results,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Overrides $XDG_DATA_HOME/libris
  pub data_dir: Option<PathBuf>,
  /// Session store name; without one the session lives in memory
  pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
  pub title: String,
  pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Categories(pub Vec<Category>);

impl Default for Categories {
  fn default() -> Self {
    let defaults = [
      ("Thriller", "thriller"),
      ("History", "history"),
      ("Fantasy", "fantasy"),
      ("Romance", "romance"),
      ("Science fiction", "science_fiction"),
    ];
    Self(
      defaults
        .iter()
        .map(|(title, subject)| Category {
          title: title.to_string(),
          subject: subject.to_string(),
        })
        .collect(),
    )
  }
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./libris.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/libris/config.yaml
  ///
  /// Without a file the defaults apply. Environment overrides are applied
  /// last.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.apply_overrides(|name| std::env::var(name).ok());
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("libris.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("libris").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file parses as null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Apply LIBRIS_SESSION and LIBRIS_BASE_URL.
  fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
    if let Some(session) = var("LIBRIS_SESSION").filter(|s| !s.trim().is_empty()) {
      self.storage.session_id = Some(session);
    }
    if let Some(url) = var("LIBRIS_BASE_URL").filter(|s| !s.trim().is_empty()) {
      self.catalog.base_url = url;
    }
  }

  /// Directory holding the databases and logs.
  pub fn data_dir(&self) -> Result<PathBuf> {
    crate::storage::data_dir(self.storage.data_dir.as_deref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.catalog.base_url, "https://openlibrary.org");
    assert_eq!(config.cache.search_ttl(), chrono::Duration::minutes(30));
    assert_eq!(config.cache.subject_ttl(), chrono::Duration::hours(6));
    assert_eq!(config.categories.0.len(), 5);
    assert_eq!(config.categories.0[4].subject, "science_fiction");
    assert_eq!(SuggestConfig::from(&config.suggest), SuggestConfig::default());
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      r#"
cache:
  search_ttl_minutes: 5
categories:
  - title: Poetry
    subject: poetry
"#,
    )
    .unwrap();
    assert_eq!(config.cache.search_ttl_minutes, 5);
    assert_eq!(config.cache.search_max_entries, 50);
    assert_eq!(config.catalog.timeout_secs, 30);
    assert_eq!(
      config.categories.0,
      vec![Category {
        title: "Poetry".into(),
        subject: "poetry".into()
      }]
    );
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::parse("  \n").unwrap();
    assert_eq!(config.suggest.max_results, 6);
  }

  #[test]
  fn test_env_overrides() {
    let env = HashMap::from([
      ("LIBRIS_SESSION", "tab-1"),
      ("LIBRIS_BASE_URL", "http://localhost:8080"),
    ]);
    let mut config = Config::default();
    config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));
    assert_eq!(config.storage.session_id.as_deref(), Some("tab-1"));
    assert_eq!(config.catalog.base_url, "http://localhost:8080");
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/nonexistent/libris.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_data_dir_matches_storage_paths() {
    let mut config = Config::default();
    assert_eq!(config.data_dir().unwrap(), crate::storage::data_dir(None).unwrap());

    config.storage.data_dir = Some(PathBuf::from("/srv/libris"));
    assert_eq!(config.data_dir().unwrap(), PathBuf::from("/srv/libris"));
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libris.yaml");
    std::fs::write(&path, "suggest:\n  min_chars: 2\n").unwrap();
    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.suggest.min_chars, 2);
  }
}
