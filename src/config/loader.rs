// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Typed loading of resolved template documents.
//!
//! Loading is two-step so that the two failure classes stay distinct: the
//! text is first parsed as plain YAML ([`ConfigError::MalformedSource`] if that
//! fails), then deserialized into the schema-closed record type
//! ([`ConfigError::SchemaViolation`] naming the offending field).

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

use super::context::{ContextError, ContextMap};
use super::invocation::InterpolationError;
use super::template::{resolve, ResolvedText, TemplateDocument, TemplateError};
use super::validation::ValidationError;

lazy_static! {
    static ref FIELD_ERROR_PATTERN: Regex =
        Regex::new(r"(?:unknown|missing|duplicate) field `([^`]+)`").expect("Invalid regex pattern");
    static ref PATH_PREFIX_PATTERN: Regex =
        Regex::new(r"^([A-Za-z0-9_\-\[\]]+(?:\.[A-Za-z0-9_\-\[\]]+)*): ").expect("Invalid regex pattern");
}

/// Unified error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read document '{name}': {source}")]
    IoError {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Document '{name}' not found")]
    DocumentNotFound { name: String },

    #[error("Invalid document name '{name}': must be a relative path inside the document root")]
    InvalidDocumentName { name: String },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Schema violation in '{document}' at field '{field}': {message}")]
    SchemaViolation {
        document: String,
        field: String,
        message: String,
    },

    #[error("Malformed source '{document}': {message}")]
    MalformedSource { document: String, message: String },

    #[error("Environment variable interpolation failed: {0}")]
    InterpolationError(#[from] InterpolationError),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[source] serde_yaml::Error),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

/// Deserialize resolved text into the record type `T`.
///
/// An empty document is treated as an empty mapping, so a record whose fields
/// are all optional loads with every field absent.
///
/// # Examples
///
/// ```
/// use druid_eks::config::loader::load;
/// use druid_eks::config::template::ResolvedText;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, Debug, PartialEq)]
/// #[serde(deny_unknown_fields)]
/// struct Chart {
///     release: String,
///     asset: String,
/// }
///
/// let text = ResolvedText::new("chart.yaml", "release: r1\nasset: chart.tgz");
/// let chart: Chart = load(&text).unwrap();
/// assert_eq!(chart.release, "r1");
/// ```
pub fn load<T: DeserializeOwned>(text: &ResolvedText) -> Result<T, ConfigError> {
    let document = text.document();

    let value: serde_yaml::Value =
        serde_yaml::from_str(text.as_str()).map_err(|e| ConfigError::MalformedSource {
            document: document.to_string(),
            message: e.to_string(),
        })?;

    let typed = if value.is_null() {
        serde_yaml::from_value(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()))
    } else {
        // Parse from text again so errors carry the field path and position.
        serde_yaml::from_str(text.as_str())
    };

    typed.map_err(|e| schema_violation(document, &e))
}

/// Resolve `document` against `context` and load it as `T`.
pub fn resolve_and_load<T: DeserializeOwned>(
    document: &TemplateDocument,
    context: &ContextMap,
) -> Result<T, ConfigError> {
    let resolved = resolve(document, context)?;
    debug!("Loading document '{}'", document.name());
    load(&resolved)
}

/// Serialize a record back to YAML.
pub fn to_yaml<T: Serialize>(value: &T) -> Result<String, ConfigError> {
    serde_yaml::to_string(value).map_err(ConfigError::SerializeError)
}

fn schema_violation(document: &str, err: &serde_yaml::Error) -> ConfigError {
    let message = err.to_string();
    let field = FIELD_ERROR_PATTERN
        .captures(&message)
        .and_then(|caps| caps.get(1))
        .or_else(|| {
            PATH_PREFIX_PATTERN
                .captures(&message)
                .and_then(|caps| caps.get(1))
        })
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| ".".to_string());

    ConfigError::SchemaViolation {
        document: document.to_string(),
        field,
        message,
    }
}

/// Where template documents come from.
pub trait DocumentSource {
    fn read(&self, name: &str) -> Result<TemplateDocument, ConfigError>;
}

/// Documents stored under a root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentSource for FsDocumentSource {
    fn read(&self, name: &str) -> Result<TemplateDocument, ConfigError> {
        let relative = Path::new(name);
        if name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ConfigError::InvalidDocumentName {
                name: name.to_string(),
            });
        }

        let path = self.root.join(relative);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(TemplateDocument::new(name, text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::DocumentNotFound {
                    name: name.to_string(),
                })
            }
            Err(source) => Err(ConfigError::IoError {
                name: name.to_string(),
                source,
            }),
        }
    }
}

/// Documents held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentSource {
    documents: IndexMap<String, String>,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(name.into(), text.into());
    }
}

impl DocumentSource for InMemoryDocumentSource {
    fn read(&self, name: &str) -> Result<TemplateDocument, ConfigError> {
        self.documents
            .get(name)
            .map(|text| TemplateDocument::new(name, text.clone()))
            .ok_or_else(|| ConfigError::DocumentNotFound {
                name: name.to_string(),
            })
    }
}
