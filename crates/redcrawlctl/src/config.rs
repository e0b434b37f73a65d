use anyhow::{Context as AnyhowContext, Result};
use redcrawl_client::{TokenPair, TokenStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Context {
    pub server_url: String,
    /// Bearer credential for API calls, written by `redcrawl auth login`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Longer-lived credential used to obtain a new access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Context {
    pub fn new(server_url: String) -> Self {
        Self {
            server_url,
            access_token: None,
            refresh_token: None,
        }
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.tokens().is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub current_context: Option<String>,
    #[serde(default)]
    pub contexts: BTreeMap<String, Context>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".redcrawl").join("config.yaml"))
    }

    pub fn get_current_context(&self) -> Option<(&String, &Context)> {
        self.current_context
            .as_ref()
            .and_then(|name| self.contexts.get(name).map(|ctx| (name, ctx)))
    }
}

/// Token store backed by the current context of the config file.
///
/// Tokens are held in memory and written through to the file on every
/// change. Without a current context they only live for the process.
pub struct ContextTokenStore {
    path: PathBuf,
    context: Option<String>,
    pair: Mutex<Option<TokenPair>>,
}

impl ContextTokenStore {
    pub fn new(path: PathBuf, config: &Config) -> Self {
        let current = config.get_current_context();
        Self {
            path,
            context: current.map(|(name, _)| name.clone()),
            pair: Mutex::new(current.and_then(|(_, ctx)| ctx.tokens())),
        }
    }

    pub fn context_name(&self) -> Option<&str> {
        self.context.as_deref()
    }

    fn current(&self) -> Option<TokenPair> {
        self.pair
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store(&self, pair: Option<TokenPair>) {
        *self.pair.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = pair.clone();

        let Some(name) = &self.context else {
            tracing::debug!("No current context, credentials kept in memory only");
            return;
        };
        if let Err(e) = self.persist(name, pair) {
            tracing::warn!(context = %name, error = %e, "Failed to save credentials");
        }
    }

    fn persist(&self, name: &str, pair: Option<TokenPair>) -> Result<()> {
        // Re-read so edits made since startup are not overwritten.
        let mut config = Config::load_from(&self.path)?;
        let ctx = config
            .contexts
            .get_mut(name)
            .with_context(|| format!("Context '{}' no longer exists", name))?;
        ctx.access_token = pair.as_ref().map(|p| p.access_token.clone());
        ctx.refresh_token = pair.map(|p| p.refresh_token);
        config.save_to(&self.path)
    }
}

impl TokenStore for ContextTokenStore {
    fn access_token(&self) -> String {
        self.current().map(|p| p.access_token).unwrap_or_default()
    }

    fn refresh_token(&self) -> String {
        self.current().map(|p| p.refresh_token).unwrap_or_default()
    }

    fn set_tokens(&self, access: &str, refresh: &str) {
        self.store(Some(TokenPair::new(access, refresh)));
    }

    fn clear_tokens(&self) {
        self.store(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(name: &str, ctx: Context) -> Config {
        let mut config = Config::default();
        config.contexts.insert(name.to_string(), ctx);
        config.current_context = Some(name.to_string());
        config
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.yaml")).unwrap();
        assert!(config.contexts.is_empty());
        assert!(config.get_current_context().is_none());
    }

    #[test]
    fn test_round_trip_omits_absent_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        config_with("local", Context::new("http://localhost/api".to_string()))
            .save_to(&path)
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("access_token"));

        let loaded = Config::load_from(&path).unwrap();
        let (name, ctx) = loaded.get_current_context().unwrap();
        assert_eq!(name, "local");
        assert!(!ctx.is_logged_in());
    }

    #[test]
    fn test_store_persists_and_clears_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = config_with("prod", Context::new("https://redcrawl.example/api".to_string()));
        config.save_to(&path).unwrap();

        let store = ContextTokenStore::new(path.clone(), &config);
        assert_eq!(store.access_token(), "");

        store.set_tokens("acc", "ref");
        let saved = Config::load_from(&path).unwrap();
        assert_eq!(
            saved.contexts["prod"].tokens(),
            Some(TokenPair::new("acc", "ref"))
        );

        // A fresh store picks the pair up from the file.
        let reopened = ContextTokenStore::new(path.clone(), &saved);
        assert_eq!(reopened.refresh_token(), "ref");

        reopened.clear_tokens();
        let cleared = Config::load_from(&path).unwrap();
        assert_eq!(cleared.contexts["prod"].access_token, None);
        assert_eq!(cleared.contexts["prod"].refresh_token, None);
        assert_eq!(cleared.contexts["prod"].server_url, "https://redcrawl.example/api");
    }

    #[test]
    fn test_store_without_context_is_memory_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let store = ContextTokenStore::new(path.clone(), &Config::default());

        store.set_tokens("acc", "ref");
        assert_eq!(store.access_token(), "acc");
        assert!(store.context_name().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_half_pair_is_not_logged_in() {
        let ctx = Context {
            access_token: Some("acc".to_string()),
            ..Context::new("http://localhost/api".to_string())
        };
        assert!(!ctx.is_logged_in());
    }
}
