//! Language catalog for script execution

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::ScriptEngine;

/// Catalog shipped with the binary
const EMBEDDED_LANGUAGES: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));

/// A language the engine can evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageEntry {
    /// Canonical id handed to the engine
    pub id: String,
    pub aliases: Vec<String>,
    /// Whether the synchronous timer polyfill is injected
    pub timer_shim: bool,
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    engine: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    timer_shim: bool,
}

/// Languages configured and actually offered by the engine
#[derive(Debug, Default)]
pub struct LanguageCatalog {
    entries: BTreeMap<String, LanguageEntry>,
    /// Lowercased id or alias -> canonical id
    lookup: HashMap<String, String>,
}

impl LanguageCatalog {
    /// Parse a catalog, keeping only languages `engine` evaluates
    pub fn from_toml(content: &str, engine: &dyn ScriptEngine) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> =
            toml::from_str(content).context("Invalid languages configuration")?;
        let offered = engine.languages();

        let mut catalog = Self::default();
        for (name, raw) in raw_configs {
            let id = name.to_lowercase();
            if raw.engine != engine.name() || !offered.contains(&id) {
                warn!(
                    "Skipping language {}: not provided by engine {}",
                    id,
                    engine.name()
                );
                continue;
            }

            let aliases: Vec<String> = raw.aliases.iter().map(|a| a.to_lowercase()).collect();
            catalog.lookup.insert(id.clone(), id.clone());
            for alias in &aliases {
                if let Some(existing) = catalog.lookup.get(alias) {
                    anyhow::bail!(
                        "Alias {} of {} is already claimed by {}",
                        alias,
                        id,
                        existing
                    );
                }
                catalog.lookup.insert(alias.clone(), id.clone());
            }

            catalog.entries.insert(
                id.clone(),
                LanguageEntry {
                    id,
                    aliases,
                    timer_shim: raw.timer_shim,
                },
            );
        }

        Ok(catalog)
    }

    /// Load from `path`, or from the embedded catalog when `None`
    pub fn load(path: Option<&Path>, engine: &dyn ScriptEngine) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).with_context(|| {
                    format!("Failed to read languages config: {}", path.display())
                })?;
                Self::from_toml(&content, engine)
            }
            None => Self::from_toml(EMBEDDED_LANGUAGES, engine),
        }
    }

    /// Entry for a canonical id or alias, case-insensitive
    pub fn resolve(&self, language: &str) -> Option<&LanguageEntry> {
        let id = self.lookup.get(&language.to_lowercase())?;
        self.entries.get(id)
    }

    pub fn is_available(&self, language: &str) -> bool {
        self.resolve(language).is_some()
    }

    /// Canonical ids, sorted
    pub fn languages(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<LanguageEntry> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BoaEngine;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[js]
engine = "boa"
aliases = ["JavaScript", "ecmascript"]
timer_shim = true

[python]
engine = "boa"
aliases = ["py"]
"#
        )
        .unwrap();
        file
    }

    #[test]
    fn test_load_from_file_intersects_with_engine() {
        let config_file = create_test_config();
        let catalog = LanguageCatalog::load(Some(config_file.path()), &BoaEngine::new()).unwrap();

        assert_eq!(catalog.languages(), vec!["js".to_string()]);
        assert!(!catalog.is_available("python"));
        assert!(!catalog.is_available("py"));
    }

    #[test]
    fn test_resolve_aliases_case_insensitive() {
        let config_file = create_test_config();
        let catalog = LanguageCatalog::load(Some(config_file.path()), &BoaEngine::new()).unwrap();

        let entry = catalog.resolve("javascript").unwrap();
        assert_eq!(entry.id, "js");
        assert!(entry.timer_shim);
        assert_eq!(catalog.resolve("JS").unwrap().id, "js");
        assert!(catalog.resolve("cobol").is_none());
    }

    #[test]
    fn test_embedded_catalog() {
        let catalog = LanguageCatalog::load(None, &BoaEngine::new()).unwrap();
        assert!(catalog.is_available("js"));
        assert!(catalog.is_available("ecmascript"));
        assert_eq!(catalog.entries().len(), 1);
    }

    #[test]
    fn test_other_engine_entries_skipped() {
        let catalog =
            LanguageCatalog::from_toml("[js]\nengine = \"graal\"\n", &BoaEngine::new()).unwrap();
        assert!(catalog.languages().is_empty());
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let content = r#"
[js]
engine = "boa"
aliases = ["js"]
"#;
        assert!(LanguageCatalog::from_toml(content, &BoaEngine::new()).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(LanguageCatalog::from_toml("[js\nengine=", &BoaEngine::new()).is_err());
        assert!(LanguageCatalog::from_toml("[js]\naliases = []\n", &BoaEngine::new()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = LanguageCatalog::load(Some(Path::new("/nonexistent/languages.toml")), &BoaEngine::new())
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read languages config"));
    }
}
