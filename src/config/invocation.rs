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

//! Invocation settings: the operator-supplied half of the context.
//!
//! The invocation file is YAML with POSIX-style environment interpolation
//! applied before parsing:
//! - `${VAR_NAME}` - Simple variable substitution
//! - `${VAR_NAME:-default}` - Variable with default value if unset/empty
//!
//! ```yaml
//! context:
//!   deployment:eks:druid:release: ${DRUID_RELEASE:-analytics}
//! tags:
//!   deployment:tags:
//!     team: data
//! release: conf.yaml
//! logLevel: info
//! ```

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::context::{
    parse_parameter, ContextBuilder, ContextError, ContextMap, ContextValue, TagSource,
    RELEASE_KEY, TAGS_KEY,
};
use super::loader::ConfigError;
use super::template::{segments, Segment};

lazy_static! {
    /// `${NAME}` or `${NAME:-default}`. Group 1 is the name, group 2 the default.
    static ref ENV_REFERENCE: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex pattern");
}

/// Errors raised while expanding environment references in the invocation file.
#[derive(Debug, thiserror::Error)]
pub enum InterpolationError {
    #[error("Environment variable '{name}' is unset or empty and has no default")]
    UnsetVariable { name: String },
}

/// Expand `${NAME}` and `${NAME:-default}` references from the process
/// environment. An empty or non-Unicode variable counts as unset. Expanded
/// values are not scanned again, and `{{...}}` placeholders are left for the
/// template resolver.
pub fn interpolate_env(input: &str) -> Result<String, InterpolationError> {
    let mut result = String::with_capacity(input.len());
    let mut names = Vec::new();

    for segment in segments(&ENV_REFERENCE, input) {
        match segment {
            Segment::Literal { text, .. } => result.push_str(text),
            Segment::Token(caps) => {
                let name = caps.get(1).map_or("", |m| m.as_str());
                let value = env::var(name)
                    .ok()
                    .filter(|value| !value.is_empty())
                    .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                    .ok_or_else(|| InterpolationError::UnsetVariable {
                        name: name.to_string(),
                    })?;
                result.push_str(&value);
                names.push(name);
            }
        }
    }

    if !names.is_empty() {
        debug!("Expanded environment references: {}", names.join(", "));
    }
    Ok(result)
}

/// Tags for one category, as a mapping or a list of `key=value` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagSpec {
    Mapping(IndexMap<String, String>),
    Entries(Vec<String>),
}

/// Contents of the invocation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvocationSettings {
    #[serde(default)]
    pub context: IndexMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub tags: IndexMap<String, TagSpec>,
    /// Root template document, relative to the document root.
    #[serde(default = "default_release")]
    pub release: String,
    /// Document root; defaults to the invocation file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<PathBuf>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for InvocationSettings {
    fn default() -> Self {
        Self {
            context: IndexMap::new(),
            tags: IndexMap::new(),
            release: default_release(),
            documents: None,
            output: default_output(),
            log_level: default_log_level(),
        }
    }
}

fn default_release() -> String {
    "conf.yaml".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("synth.out")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl InvocationSettings {
    /// Parse settings from YAML, interpolating environment variables first.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env(s)?;
        if interpolated.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&interpolated).map_err(|e| {
            let message = e.to_string();
            ConfigError::SchemaViolation {
                document: "invocation".to_string(),
                field: unknown_field(&message).unwrap_or_else(|| ".".to_string()),
                message,
            }
        })
    }

    /// Load settings from a file. Relative `documents` and `output` paths are
    /// resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::IoError {
            name: path_ref.display().to_string(),
            source,
        })?;

        let mut settings = Self::from_yaml_str(&content)?;
        let base = path_ref.parent().unwrap_or_else(|| Path::new(""));

        settings.documents = Some(match settings.documents.take() {
            Some(dir) if dir.is_relative() => base.join(dir),
            Some(dir) => dir,
            None => base.to_path_buf(),
        });
        if settings.output.is_relative() {
            settings.output = base.join(&settings.output);
        }

        Ok(settings)
    }

    /// Document root, falling back to the working directory.
    pub fn document_root(&self) -> PathBuf {
        self.documents.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Build the base context: file parameters, then file tags, then CLI
    /// parameters, then CLI tags. Later sources win.
    pub fn context_builder(
        &self,
        cli_context: &[String],
        cli_tags: &[String],
    ) -> Result<ContextBuilder, ContextError> {
        let mut builder = ContextBuilder::new().parameters(
            self.context
                .iter()
                .filter_map(|(k, v)| ContextValue::from_yaml(v).map(|v| (k.clone(), v))),
        );

        for (category, spec) in &self.tags {
            let source = match spec {
                TagSpec::Mapping(map) => TagSource::from_pairs(category.clone(), map.clone()),
                TagSpec::Entries(entries) => TagSource::parse(category.clone(), entries)?,
            };
            builder = builder.tags(source);
        }

        for entry in cli_context {
            let (key, value) = parse_parameter(entry)?;
            builder = builder.parameter(key, value);
        }

        if !cli_tags.is_empty() || !self.tags.contains_key(TAGS_KEY) {
            builder = builder.tags(TagSource::parse(TAGS_KEY, cli_tags)?);
        }

        Ok(builder)
    }

    /// The base context for a run. The release identifier is required.
    pub fn base_context(
        &self,
        cli_context: &[String],
        cli_tags: &[String],
    ) -> Result<ContextMap, ContextError> {
        self.context_builder(cli_context, cli_tags)?
            .require(RELEASE_KEY)
            .require(TAGS_KEY)
            .build()
    }
}

fn unknown_field(message: &str) -> Option<String> {
    let start = message.find("field `")? + "field `".len();
    let end = message[start..].find('`')? + start;
    Some(message[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_simple_interpolation() {
        env::set_var("DRUID_EKS_TEST_VAR1", "value1");
        env::set_var("DRUID_EKS_TEST_VAR2", "value2");

        let input = "key1: ${DRUID_EKS_TEST_VAR1}\nkey2: ${DRUID_EKS_TEST_VAR2}";
        let result = interpolate_env(input).unwrap();

        assert_eq!(result, "key1: value1\nkey2: value2");
    }

    #[test]
    fn test_default_value_when_var_not_set_or_empty() {
        env::remove_var("DRUID_EKS_TEST_NONEXISTENT");
        env::set_var("DRUID_EKS_TEST_EMPTY", "");

        let result =
            interpolate_env("a: ${DRUID_EKS_TEST_NONEXISTENT:-x}\nb: ${DRUID_EKS_TEST_EMPTY:-y}")
                .unwrap();

        assert_eq!(result, "a: x\nb: y");
    }

    #[test]
    fn test_missing_variable_without_default() {
        env::remove_var("DRUID_EKS_TEST_MISSING");

        assert_matches!(
            interpolate_env("value: ${DRUID_EKS_TEST_MISSING}"),
            Err(InterpolationError::UnsetVariable { name }) if name == "DRUID_EKS_TEST_MISSING"
        );
    }

    #[test]
    fn test_expanded_values_are_not_rescanned() {
        env::set_var("DRUID_EKS_TEST_NESTED", "${DRUID_EKS_TEST_VAR1}");

        assert_eq!(
            interpolate_env("a: ${DRUID_EKS_TEST_NESTED}").unwrap(),
            "a: ${DRUID_EKS_TEST_VAR1}"
        );
    }

    #[test]
    fn test_template_placeholders_pass_through() {
        let input = "release: {{deployment:eks:druid:release}}";
        assert_eq!(interpolate_env(input).unwrap(), input);
    }

    #[test]
    fn test_defaults_applied() {
        let settings = InvocationSettings::from_yaml_str("context: {}").unwrap();

        assert_eq!(settings.release, "conf.yaml");
        assert_eq!(settings.output, PathBuf::from("synth.out"));
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.documents, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = InvocationSettings::from_yaml_str("log_level: debug");

        assert_matches!(
            result,
            Err(ConfigError::SchemaViolation { field, .. }) if field == "log_level"
        );
    }

    #[test]
    fn test_context_builder_merge_order() {
        env::set_var("DRUID_EKS_TEST_RELEASE", "from-env");
        let yaml = r#"
context:
  deployment:eks:druid:release: ${DRUID_EKS_TEST_RELEASE}
  replicas: 3
tags:
  deployment:tags:
    team: data
    owner: alice
"#;
        let settings = InvocationSettings::from_yaml_str(yaml).unwrap();

        let context = settings
            .context_builder(&[format!("{RELEASE_KEY}=from-cli")], &["team=platform".to_string()])
            .unwrap()
            .require(RELEASE_KEY)
            .build()
            .unwrap();

        assert_eq!(context.get_str(RELEASE_KEY), Some("from-cli"));
        assert_eq!(context.get_str("replicas"), Some("3"));
        assert_eq!(context.get_str("deployment:tags:team"), Some("platform"));
        assert_eq!(context.get_str("deployment:tags:owner"), Some("alice"));
    }

    #[test]
    fn test_tag_entries_in_file_are_validated() {
        let yaml = r#"
tags:
  deployment:tags:
    - team=data
    - broken
"#;
        let settings = InvocationSettings::from_yaml_str(yaml).unwrap();

        assert_matches!(
            settings.context_builder(&[], &[]),
            Err(ContextError::MalformedTagSpecification { entry, .. }) if entry == "broken"
        );
    }

    #[test]
    fn test_empty_tag_set_is_published() {
        let settings = InvocationSettings::default();
        let context = settings
            .context_builder(&[], &[])
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            context.get(TAGS_KEY),
            Some(&ContextValue::Mapping(IndexMap::new()))
        );
    }

    #[test]
    fn test_base_context_requires_release() {
        let settings = InvocationSettings::default();

        assert_matches!(
            settings.base_context(&[], &[]),
            Err(ContextError::MissingRequiredParameter { key }) if key == RELEASE_KEY
        );
        assert_matches!(
            settings.base_context(&[format!("{RELEASE_KEY}=   ")], &[]),
            Err(ContextError::MissingRequiredParameter { .. })
        );
        assert!(settings
            .base_context(&[format!("{RELEASE_KEY}=r1")], &[])
            .is_ok());
    }

    #[test]
    fn test_load_resolves_paths_against_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("deployment.yaml");
        fs::write(&path, "documents: conf\noutput: out").unwrap();

        let settings = InvocationSettings::load(&path).unwrap();

        assert_eq!(settings.document_root(), temp_dir.path().join("conf"));
        assert_eq!(settings.output, temp_dir.path().join("out"));
    }
}
