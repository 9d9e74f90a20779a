//! Template model.
//!
//! A template is an entrypoint plus a data map of named values and option
//! lists. It can be written as a JSON object or as a hybrid document (free
//! text with a fenced JSON block), see [`document`].

pub mod document;
pub mod entrypoint;
pub mod loader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{scanner, PromptError, PromptResult};

pub use entrypoint::{EntryMap, Entrypoint};
pub use loader::TemplateLoader;

/// Data key prefixes the engine writes itself.
pub const RESERVED_DATA_PREFIXES: [&str; 2] = ["meta_", "track_"];

/// A data map value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Text(String),
    List(Vec<String>),
    /// Any other JSON shape. Accepted on load, rejected when selected.
    Other(serde_json::Value),
}

impl From<&str> for DataValue {
    fn from(text: &str) -> Self {
        DataValue::Text(text.to_string())
    }
}

impl From<String> for DataValue {
    fn from(text: String) -> Self {
        DataValue::Text(text)
    }
}

impl From<Vec<String>> for DataValue {
    fn from(list: Vec<String>) -> Self {
        DataValue::List(list)
    }
}

impl From<Vec<&str>> for DataValue {
    fn from(list: Vec<&str>) -> Self {
        DataValue::List(list.into_iter().map(str::to_string).collect())
    }
}

/// Ordered regex rewrite. `replacement` may reference groups as `{n}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexRule {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

impl RegexRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateData {
    #[serde(default)]
    pub data: BTreeMap<String, DataValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preprocess: Vec<RegexRule>,
    /// field name -> pattern matched against the `text` argument
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regex: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Entrypoint>,
    #[serde(default)]
    pub templates: TemplateData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postprocess: Vec<RegexRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    /// Directory relative include paths are resolved against.
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

impl Template {
    /// A template whose entrypoint is a single string.
    pub fn new(entrypoint: impl Into<String>) -> Self {
        Self {
            entrypoint: Some(Entrypoint::Text(entrypoint.into())),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.templates.data.insert(key.into(), value.into());
        self
    }

    pub fn with_postprocess(mut self, rule: RegexRule) -> Self {
        self.postprocess.push(rule);
        self
    }

    pub fn with_preprocess(mut self, rule: RegexRule) -> Self {
        self.templates.preprocess.push(rule);
        self
    }

    pub fn from_json(json: &str) -> PromptResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses either form. Text starting with `{` is tried as JSON first.
    pub fn parse(text: &str) -> PromptResult<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            match serde_json::from_str::<Template>(trimmed) {
                Ok(template) => return Ok(template),
                Err(e) => debug!("Not a JSON template, trying document form: {}", e),
            }
        }
        document::parse_document(trimmed)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PromptResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PromptError::template(format!(
                "Failed to read template file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut template = Self::parse(&text)?;
        template.source_dir = path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf));
        Ok(template)
    }

    /// Rejects data keys using a prefix the engine reserves for itself.
    pub fn check_reserved_keys(&self) -> PromptResult<()> {
        for key in self.templates.data.keys() {
            if RESERVED_DATA_PREFIXES.iter().any(|p| key.starts_with(p)) {
                return Err(PromptError::ReservedKey(format!(
                    "Template data key '{}' cannot start with 'meta_' or 'track_'. These prefixes are reserved.",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Bracket balance check over every string in the data map.
    pub fn validate_data(&self) -> PromptResult<()> {
        for value in self.templates.data.values() {
            match value {
                DataValue::Text(text) => scanner::validate(text)?,
                DataValue::List(items) => {
                    for item in items {
                        scanner::validate(item)?;
                    }
                }
                DataValue::Other(_) => {}
            }
        }
        Ok(())
    }
}
