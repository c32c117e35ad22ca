//! Tool Catalog
//!
//! Scraping tools are data: name, target page, link origin and extraction
//! rule. Adding a destination means adding a `[[tool]]` table, not code.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::ScrapeDefaults;
use crate::extract::{CalendarRule, ExtractionRule};

/// Catalog compiled into the binary
pub const BUILTIN_CATALOG: &str = include_str!("../tools.toml");

/// Extraction flavour of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Records,
    Calendar,
}

/// One `[[tool]]` table as written in TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub url: String,
    pub origin: String,
    #[serde(default)]
    pub kind: ToolKind,
    /// JSON key holding the records (`news_items`, `tour_items`)
    #[serde(default)]
    pub result_key: Option<String>,
    #[serde(default)]
    pub selectors: Vec<String>,
    /// Calendar root container selector
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub wait_timeout_secs: Option<f64>,
    #[serde(default)]
    pub scroll_pause_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "tool")]
    tools: Vec<ToolEntry>,
}

/// Compiled extraction step of a tool
#[derive(Debug, Clone)]
pub enum Extractor {
    Records {
        result_key: String,
        rule: ExtractionRule,
    },
    Calendar(CalendarRule),
}

/// A validated, ready-to-register scraping tool
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub url: String,
    pub wait_timeout: Duration,
    pub scroll_pause: Duration,
    pub extractor: Extractor,
}

fn entry_secs(value: Option<f64>, fallback: Duration, field: &str, tool: &str) -> Result<Duration> {
    match value {
        None => Ok(fallback),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .with_context(|| format!("tool '{}': invalid {} {}", tool, field, secs)),
    }
}

impl ToolSpec {
    pub fn compile(entry: &ToolEntry, defaults: &ScrapeDefaults) -> Result<Self> {
        let name = entry.name.trim();
        if name.is_empty() {
            bail!("tool with empty name (url {})", entry.url);
        }
        url::Url::parse(&entry.url)
            .with_context(|| format!("tool '{}': invalid url {}", name, entry.url))?;

        let extractor = match entry.kind {
            ToolKind::Records => {
                let result_key = entry
                    .result_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .with_context(|| format!("tool '{}': records tools need result_key", name))?;
                let rule = ExtractionRule::new(&entry.selectors, &entry.origin)
                    .with_context(|| format!("tool '{}'", name))?;
                Extractor::Records { result_key, rule }
            }
            ToolKind::Calendar => {
                let container = entry.container.as_deref().unwrap_or("div#content");
                let rule = CalendarRule::new(container, &entry.origin)
                    .with_context(|| format!("tool '{}'", name))?;
                Extractor::Calendar(rule)
            }
        };

        Ok(Self {
            name: name.to_string(),
            description: entry.description.clone(),
            url: entry.url.clone(),
            wait_timeout: entry_secs(
                entry.wait_timeout_secs,
                defaults.wait_timeout,
                "wait_timeout_secs",
                name,
            )?,
            scroll_pause: entry_secs(
                entry.scroll_pause_secs,
                defaults.scroll_pause,
                "scroll_pause_secs",
                name,
            )?,
            extractor,
        })
    }
}

/// Ordered set of tools, read-only after startup
#[derive(Debug, Clone)]
pub struct Catalog {
    tools: Vec<ToolSpec>,
}

impl Catalog {
    pub fn from_toml_str(content: &str, defaults: &ScrapeDefaults) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content).context("Failed to parse tool catalog")?;
        if file.tools.is_empty() {
            bail!("tool catalog defines no [[tool]] entries");
        }

        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(file.tools.len());
        for entry in &file.tools {
            let spec = ToolSpec::compile(entry, defaults)?;
            if !seen.insert(spec.name.clone()) {
                bail!("duplicate tool name '{}'", spec.name);
            }
            tools.push(spec);
        }

        Ok(Self { tools })
    }

    pub fn builtin(defaults: &ScrapeDefaults) -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG, defaults)
    }

    pub fn from_file(path: &Path, defaults: &ScrapeDefaults) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tool catalog {}", path.display()))?;
        let catalog = Self::from_toml_str(&content, defaults)?;
        info!("Loaded {} tools from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// File catalog when configured, else the built-in one
    pub fn load(path: Option<&Path>, defaults: &ScrapeDefaults) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path, defaults),
            None => Self::builtin(defaults),
        }
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_catalog() {
        let catalog = Catalog::builtin(&ScrapeDefaults::default()).unwrap();
        assert_eq!(catalog.len(), 7);

        let news = catalog.get("latest_news_details").unwrap();
        assert!(matches!(
            &news.extractor,
            Extractor::Records { result_key, .. } if result_key == "news_items"
        ));
        assert_eq!(news.wait_timeout, Duration::from_secs(10));

        let calendar = catalog.get("get_tour_calendar").unwrap();
        assert!(matches!(calendar.extractor, Extractor::Calendar(_)));
    }

    #[test]
    fn test_builtin_tour_tools_share_rule() {
        let catalog = Catalog::builtin(&ScrapeDefaults::default()).unwrap();
        for name in [
            "get_hot_tours_vietnam",
            "get_hot_tours_tyrkey",
            "get_hot_tours_thailand",
            "get_hot_tours_maldives",
        ] {
            let spec = catalog.get(name).unwrap();
            let Extractor::Records { rule, result_key } = &spec.extractor else {
                panic!("{} should be a records tool", name);
            };
            assert_eq!(result_key, "tour_items");
            assert_eq!(rule.selectors.len(), 4);
            assert_eq!(rule.origin.as_str(), "https://ht.kz/");
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let toml = r#"
            [[tool]]
            name = "a"
            description = "x"
            url = "https://a.kz"
            origin = "https://a.kz"
            result_key = "items"
            selectors = [".x"]

            [[tool]]
            name = "a"
            description = "y"
            url = "https://a.kz/2"
            origin = "https://a.kz"
            result_key = "items"
            selectors = [".y"]
        "#;
        let err = Catalog::from_toml_str(toml, &ScrapeDefaults::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_records_tool_requires_result_key() {
        let toml = r#"
            [[tool]]
            name = "a"
            description = "x"
            url = "https://a.kz"
            origin = "https://a.kz"
            selectors = [".x"]
        "#;
        assert!(Catalog::from_toml_str(toml, &ScrapeDefaults::default()).is_err());
    }

    #[test]
    fn test_per_tool_timing_override() {
        let toml = r#"
            [[tool]]
            name = "fast"
            description = "x"
            url = "https://a.kz"
            origin = "https://a.kz"
            result_key = "items"
            selectors = [".x"]
            wait_timeout_secs = 4
            scroll_pause_secs = 0.5
        "#;
        let catalog = Catalog::from_toml_str(toml, &ScrapeDefaults::default()).unwrap();
        let spec = catalog.get("fast").unwrap();
        assert_eq!(spec.wait_timeout, Duration::from_secs(4));
        assert_eq!(spec.scroll_pause, Duration::from_millis(500));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
            [[tool]]
            name = "calendar"
            description = "c"
            url = "https://okeanturov.ru/advices/travel-calendar/"
            origin = "https://okeanturov.ru"
            kind = "calendar"
        "#,
        )
        .unwrap();

        let catalog = Catalog::load(Some(file.path()), &ScrapeDefaults::default()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(matches!(
            catalog.get("calendar").unwrap().extractor,
            Extractor::Calendar(_)
        ));
    }
}
