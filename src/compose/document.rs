// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compose document model
//!
//! The document is held as a generic YAML tree so sections this tool does
//! not understand survive a rewrite untouched. Only `services.<name>.environment`
//! is interpreted.

use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::{Result, SetupError};

/// Ordered view of a service's environment entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap {
    vars: IndexMap<String, String>,
}

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `KEY=VALUE` entries; entries without `=` are skipped
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vars = entries
            .into_iter()
            .filter_map(|entry| {
                let (key, value) = entry.as_ref().split_once('=')?;
                Some((key.to_string(), value.to_string()))
            })
            .collect();
        Self { vars }
    }

    /// Build from an `environment:` node in list or mapping form
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::new()),
            Value::Sequence(items) => Some(Self::from_entries(items.iter().filter_map(scalar_to_string))),
            Value::Mapping(map) => {
                let vars = map
                    .iter()
                    .filter_map(|(key, value)| Some((scalar_to_string(key)?, scalar_to_string(value)?)))
                    .collect();
                Some(Self { vars })
            }
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set a variable; an existing key keeps its position
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Serialize back to `KEY=VALUE` entries, dropping empty values
    pub fn to_entries(&self) -> Vec<String> {
        self.vars
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }

    /// Same map with empty-valued entries removed
    pub fn without_empty(&self) -> Self {
        Self {
            vars: self
                .vars
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// A parsed compose file
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeDocument {
    root: Value,
    origin: String,
}

impl ComposeDocument {
    /// Parse compose YAML; `origin` names the source in errors
    pub fn parse(text: &str, origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let root: Value = serde_yaml::from_str(text).map_err(|e| SetupError::InvalidDocument {
            path: origin.clone(),
            message: e.to_string(),
        })?;

        let document = Self { root, origin };
        document.services()?;
        Ok(document)
    }

    /// Load and parse a compose file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SetupError::InvalidDocument {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), bytes = text.len(), "Loaded compose document");
        Self::parse(&text, path.display().to_string())
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn invalid(&self, message: impl Into<String>) -> SetupError {
        SetupError::InvalidDocument {
            path: self.origin.clone(),
            message: message.into(),
        }
    }

    fn services(&self) -> Result<&Mapping> {
        self.root
            .get("services")
            .and_then(Value::as_mapping)
            .ok_or_else(|| self.invalid("missing 'services' mapping"))
    }

    fn service(&self, name: &str) -> Result<&Mapping> {
        self.services()?
            .get(name)
            .and_then(Value::as_mapping)
            .ok_or_else(|| self.invalid(format!("missing service '{}'", name)))
    }

    /// Names of all services, in document order
    pub fn service_names(&self) -> Vec<String> {
        self.services()
            .map(|services| services.keys().filter_map(|k| k.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// Environment of one service
    pub fn service_env(&self, name: &str) -> Result<EnvMap> {
        let service = self.service(name)?;
        match service.get("environment") {
            None => Ok(EnvMap::new()),
            Some(value) => EnvMap::from_value(value)
                .ok_or_else(|| self.invalid(format!("service '{}' has a malformed environment", name))),
        }
    }

    /// Replace one service's environment with `env` in list form
    pub fn set_service_env(&mut self, name: &str, env: &EnvMap) -> Result<()> {
        let entries = Value::Sequence(env.to_entries().into_iter().map(Value::String).collect());

        let origin = self.origin.clone();
        let service = self
            .root
            .get_mut("services")
            .and_then(|services| services.get_mut(name))
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| SetupError::InvalidDocument {
                path: origin,
                message: format!("missing service '{}'", name),
            })?;

        service.insert(Value::String("environment".to_string()), entries);
        Ok(())
    }

    /// Render the document as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root).map_err(|e| self.invalid(e.to_string()))
    }

    /// Write the whole document to `path` atomically
    ///
    /// The YAML goes to a temporary file in the same directory, is synced,
    /// then renamed over the target, so readers see either the old or the
    /// new document. Concurrent writers to the same path are not supported.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(yaml.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        std::fs::File::open(dir)?.sync_all()?;
        info!(path = %path.display(), "Compose document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
version: "3.9"
services:
  db:
    image: mariadb:10.11
    restart: unless-stopped
    environment:
      - MYSQL_RANDOM_ROOT_PASSWORD=true
      - MYSQL_DATABASE=passbolt
      - MYSQL_USER=passbolt
      - MYSQL_PASSWORD=P4ssb0lt
      - MYSQL_EMPTY=
    volumes:
      - database_volume:/var/lib/mysql
  passbolt:
    image: passbolt/passbolt:latest-ce
    depends_on:
      - db
    environment:
      - APP_FULL_BASE_URL=https://passbolt.local
      - DATASOURCES_DEFAULT_HOST=db
      - DATASOURCES_DEFAULT_USERNAME=passbolt
      - DATASOURCES_DEFAULT_PASSWORD=P4ssb0lt
      - DATASOURCES_DEFAULT_DATABASE=passbolt
      - CACHE_URL=redis://cache:6379?x=1
      - NOT_AN_ASSIGNMENT
    ports:
      - 80:80
      - 443:443
volumes:
  database_volume:
"#;

    #[test]
    fn test_env_map_from_entries_splits_on_first_equals() {
        let env = EnvMap::from_entries(["A=1", "B=x=y", "C", "D="]);
        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(env.get("B"), Some("x=y"));
        assert_eq!(env.get("C"), None);
        assert_eq!(env.get("D"), Some(""));
        assert_eq!(env.to_entries(), vec!["A=1", "B=x=y"]);
    }

    #[test]
    fn test_env_map_set_preserves_position() {
        let mut env = EnvMap::from_entries(["A=1", "B=2"]);
        env.set("A", "9");
        env.set("C", "3");
        assert_eq!(env.to_entries(), vec!["A=9", "B=2", "C=3"]);
    }

    #[test]
    fn test_service_env() {
        let doc = ComposeDocument::parse(SAMPLE, "sample").unwrap();
        let env = doc.service_env("passbolt").unwrap();
        assert_eq!(env.get("DATASOURCES_DEFAULT_HOST"), Some("db"));
        assert_eq!(env.get("CACHE_URL"), Some("redis://cache:6379?x=1"));
        assert_eq!(env.len(), 6);
        assert_eq!(doc.service_names(), vec!["db", "passbolt"]);
    }

    #[test]
    fn test_mapping_form_environment() {
        let yaml = "services:\n  db:\n    environment:\n      MYSQL_PORT: 3307\n      MYSQL_HOST: mariadb\n      FLAG: true\n";
        let doc = ComposeDocument::parse(yaml, "mapping").unwrap();
        let env = doc.service_env("db").unwrap();
        assert_eq!(env.get("MYSQL_PORT"), Some("3307"));
        assert_eq!(env.get("MYSQL_HOST"), Some("mariadb"));
        assert_eq!(env.get("FLAG"), Some("true"));
    }

    #[test]
    fn test_service_without_environment() {
        let doc = ComposeDocument::parse("services:\n  db:\n    image: mariadb\n", "x").unwrap();
        assert!(doc.service_env("db").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            ComposeDocument::parse("services: [unclosed", "broken"),
            Err(SetupError::InvalidDocument { .. })
        ));
        assert!(matches!(
            ComposeDocument::parse("version: 3\n", "noservices"),
            Err(SetupError::InvalidDocument { .. })
        ));

        let doc = ComposeDocument::parse(SAMPLE, "sample").unwrap();
        assert!(matches!(
            doc.service_env("redis"),
            Err(SetupError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_zero_edit_round_trip_preserves_env_maps() {
        let doc = ComposeDocument::parse(SAMPLE, "sample").unwrap();
        let mut rewritten = doc.clone();
        for name in doc.service_names() {
            let env = doc.service_env(&name).unwrap();
            rewritten.set_service_env(&name, &env).unwrap();
        }

        let reparsed = ComposeDocument::parse(&rewritten.to_yaml().unwrap(), "reparsed").unwrap();
        for name in doc.service_names() {
            let original = doc.service_env(&name).unwrap();
            let after = reparsed.service_env(&name).unwrap();
            assert_eq!(after, original.without_empty(), "service {name}");
        }
        assert!(reparsed.service_env("db").unwrap().get("MYSQL_EMPTY").is_none());
    }

    #[test]
    fn test_set_service_env_keeps_other_keys() {
        let mut doc = ComposeDocument::parse(SAMPLE, "sample").unwrap();
        let mut env = doc.service_env("db").unwrap();
        env.set("MYSQL_ROOT_PASSWORD", "root");
        doc.set_service_env("db", &env).unwrap();

        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("MYSQL_ROOT_PASSWORD=root"));
        assert!(yaml.contains("mariadb:10.11"));
        assert!(yaml.contains("database_volume"));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("docker-compose-ce.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut doc = ComposeDocument::load(&path).unwrap();
        let mut env = doc.service_env("passbolt").unwrap();
        env.set("APP_FULL_BASE_URL", "https://vault.example.com");
        doc.set_service_env("passbolt", &env).unwrap();
        doc.save(&path).unwrap();

        let reloaded = ComposeDocument::load(&path).unwrap();
        assert_eq!(
            reloaded.service_env("passbolt").unwrap().get("APP_FULL_BASE_URL"),
            Some("https://vault.example.com")
        );

        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ComposeDocument::load("/nonexistent/docker-compose-ce.yaml"),
            Err(SetupError::InvalidDocument { .. })
        ));
    }
}
