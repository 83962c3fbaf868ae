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

//! Runtime substitution context for template documents.
//!
//! A [`ContextMap`] is assembled once per synthesis run by a [`ContextBuilder`]
//! from operator-supplied parameters and tag sources. Merging inside the
//! builder is last-write-wins in the order sources are added. Once built, the
//! map is append-only: outputs of realized units may add new keys but can
//! never replace an existing value.
//!
//! # Examples
//!
//! ```
//! use druid_eks::config::context::{ContextBuilder, TagSource};
//!
//! let tags = TagSource::parse("deployment:tags", ["team=data", "env=dev"]).unwrap();
//! let context = ContextBuilder::new()
//!     .parameter("deployment:eks:druid:release", "r1")
//!     .tags(tags)
//!     .require("deployment:eks:druid:release")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(context.get_str("deployment:eks:druid:release"), Some("r1"));
//! assert_eq!(context.get_str("deployment:tags:team"), Some("data"));
//! ```

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use super::template::{placeholders, TemplateDocument};

/// Operator-supplied release identifier shared by every Druid document.
pub const RELEASE_KEY: &str = "deployment:eks:druid:release";

/// Category under which operator tags are published.
pub const TAGS_KEY: &str = "deployment:tags";

/// Image reference produced by the image unit and consumed by the chart values.
pub const IMAGE_URI_KEY: &str = "image:uri";

/// Errors raised while assembling or extending a context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Required parameter '{key}' is missing or empty")]
    MissingRequiredParameter { key: String },

    #[error("Malformed tag specification '{entry}' in '{category}': expected exactly one key=value pair")]
    MalformedTagSpecification { category: String, entry: String },

    #[error("Malformed context parameter '{entry}': expected key=value")]
    MalformedParameter { entry: String },

    #[error("Context key '{key}' is already set to a different value")]
    ConflictingValue { key: String },
}

/// A value stored in the context: a scalar string or a nested structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    String(String),
    Sequence(Vec<ContextValue>),
    Mapping(IndexMap<String, ContextValue>),
}

impl ContextValue {
    /// The text substituted for a placeholder bound to this value.
    ///
    /// Nested values render as JSON flow collections, which are valid YAML.
    pub fn render(&self) -> String {
        match self {
            ContextValue::String(s) => s.clone(),
            nested => serde_json::to_string(nested).unwrap_or_default(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            ContextValue::String(s) => s.trim().is_empty(),
            ContextValue::Sequence(_) | ContextValue::Mapping(_) => false,
        }
    }

    /// Convert a YAML value from an invocation file. Scalars are stringified.
    pub fn from_yaml(value: &serde_yaml::Value) -> Option<Self> {
        match value {
            serde_yaml::Value::Null => None,
            serde_yaml::Value::Bool(b) => Some(ContextValue::String(b.to_string())),
            serde_yaml::Value::Number(n) => Some(ContextValue::String(n.to_string())),
            serde_yaml::Value::String(s) => Some(ContextValue::String(s.clone())),
            serde_yaml::Value::Sequence(items) => Some(ContextValue::Sequence(
                items.iter().filter_map(ContextValue::from_yaml).collect(),
            )),
            serde_yaml::Value::Mapping(map) => Some(ContextValue::Mapping(
                map.iter()
                    .filter_map(|(k, v)| {
                        let key = match k {
                            serde_yaml::Value::String(s) => s.clone(),
                            serde_yaml::Value::Number(n) => n.to_string(),
                            serde_yaml::Value::Bool(b) => b.to_string(),
                            _ => return None,
                        };
                        ContextValue::from_yaml(v).map(|v| (key, v))
                    })
                    .collect(),
            )),
            serde_yaml::Value::Tagged(tagged) => ContextValue::from_yaml(&tagged.value),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::String(value)
    }
}

/// Namespaced key/value store used for placeholder resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextMap {
    entries: IndexMap<String, ContextValue>,
}

impl ContextMap {
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(ContextValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a single output of a realized unit.
    ///
    /// Re-publishing an identical value is accepted; a different value for an
    /// existing key is rejected.
    pub fn insert_output(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Result<(), ContextError> {
        let key = key.into();
        let value = value.into();
        match self.entries.get(&key) {
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(ContextError::ConflictingValue { key }),
            None => {
                self.entries.insert(key, value);
                Ok(())
            }
        }
    }

    /// Add every output of a realized unit, or none of them.
    pub fn extend_outputs<K, V, I>(&mut self, outputs: I) -> Result<(), ContextError>
    where
        K: Into<String>,
        V: Into<ContextValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let outputs: Vec<(String, ContextValue)> = outputs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for (key, value) in &outputs {
            if let Some(existing) = self.entries.get(key) {
                if existing != value {
                    return Err(ContextError::ConflictingValue { key: key.clone() });
                }
            }
        }

        for (key, value) in outputs {
            self.entries.entry(key).or_insert(value);
        }
        Ok(())
    }
}

/// A parsed group of `key=value` tags published under one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSource {
    category: String,
    entries: Vec<(String, String)>,
}

impl TagSource {
    /// Parse raw `key=value` entries.
    pub fn parse<I, S>(category: impl Into<String>, entries: I) -> Result<Self, ContextError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let category = category.into();
        let entries = entries
            .into_iter()
            .map(|entry| parse_tag(&category, entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { category, entries })
    }

    /// Build from entries that are already split.
    pub fn from_pairs<I, K, V>(category: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            category: category.into(),
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

/// Split one `key=value` tag entry.
///
/// The entry must contain exactly one `=` and a non-empty key. Empty values
/// are allowed.
pub fn parse_tag(category: &str, entry: &str) -> Result<(String, String), ContextError> {
    let malformed = || ContextError::MalformedTagSpecification {
        category: category.to_string(),
        entry: entry.to_string(),
    };

    let (key, value) = entry.split_once('=').ok_or_else(malformed)?;
    let key = key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) || value.contains('=') {
        return Err(malformed());
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Split one `key=value` invocation parameter.
pub fn parse_parameter(entry: &str) -> Result<(String, String), ContextError> {
    match entry.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ContextError::MalformedParameter {
            entry: entry.to_string(),
        }),
    }
}

/// Assembles a [`ContextMap`] from ordered sources.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    entries: IndexMap<String, ContextValue>,
    required: Vec<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing context, e.g. to derive the context of a nested
    /// document. The parent map is not modified.
    pub fn from_context(context: &ContextMap) -> Self {
        Self {
            entries: context.entries.clone(),
            required: Vec::new(),
        }
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ContextValue>,
    {
        for (key, value) in parameters {
            self.entries.insert(key.into(), value.into());
        }
        self
    }

    /// Publish a tag source as `<category>:<key>` entries plus a mapping under
    /// `<category>` holding the merged tag set.
    pub fn tags(mut self, source: TagSource) -> Self {
        let mut merged = match self.entries.get(&source.category) {
            Some(ContextValue::Mapping(existing)) => existing.clone(),
            _ => IndexMap::new(),
        };

        for (key, value) in &source.entries {
            self.entries.insert(
                format!("{}:{}", source.category, key),
                ContextValue::String(value.clone()),
            );
            merged.insert(key.clone(), ContextValue::String(value.clone()));
        }

        self.entries
            .insert(source.category, ContextValue::Mapping(merged));
        self
    }

    pub fn require(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.required.contains(&key) {
            self.required.push(key);
        }
        self
    }

    /// Require every placeholder referenced by `document`.
    pub fn require_placeholders(mut self, document: &TemplateDocument) -> Self {
        for key in placeholders(document) {
            self = self.require(key);
        }
        self
    }

    pub fn build(self) -> Result<ContextMap, ContextError> {
        for key in &self.required {
            match self.entries.get(key) {
                Some(value) if !value.is_blank() => {}
                _ => {
                    return Err(ContextError::MissingRequiredParameter { key: key.clone() });
                }
            }
        }

        debug!("Built context with {} entries", self.entries.len());

        Ok(ContextMap {
            entries: self.entries,
        })
    }
}
