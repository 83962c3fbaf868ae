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

//! Synthesis: handing the realized graph to the deployment layer.
//!
//! The dependency edges are communicated as an explicit ordered pair list.
//! Partial graphs are synthesized too; failed and aborted units are listed
//! with their causes so the deployment layer can skip them.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::composer::{RealizedGraph, UnitState};
use crate::config::UnitKind;
use crate::units::UnitConfig;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestUnit {
    pub id: String,
    pub kind: UnitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub dependencies: Vec<String>,
    pub config: UnitConfig,
    pub outputs: IndexMap<String, String>,
}

/// "Do not start `unit` until `depends_on` has completed."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyPair {
    pub unit: String,
    pub depends_on: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFailure {
    pub unit: String,
    pub state: UnitState,
    pub kind: String,
    pub subject: String,
    pub message: String,
}

/// Serializable view of a realized graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackManifest {
    pub stack: String,
    pub description: String,
    pub tags: IndexMap<String, String>,
    /// Registered units in realization order.
    pub units: Vec<ManifestUnit>,
    pub dependencies: Vec<DependencyPair>,
    pub waves: Vec<Vec<String>>,
    pub failures: Vec<ManifestFailure>,
}

impl StackManifest {
    pub fn from_graph(realized: &RealizedGraph) -> Self {
        let stack = realized.stack();

        let units = realized
            .realization_order()
            .into_iter()
            .filter_map(|id| {
                let unit = realized.unit(id)?;
                Some(ManifestUnit {
                    id: id.to_string(),
                    kind: unit.kind,
                    description: unit.description.clone(),
                    dependencies: realized
                        .graph()
                        .dependencies_of(id)
                        .map(<[String]>::to_vec)
                        .unwrap_or_default(),
                    config: unit.config.clone(),
                    outputs: unit.outputs.clone(),
                })
            })
            .collect();

        let dependencies = realized
            .edges()
            .into_iter()
            .map(|(unit, depends_on)| DependencyPair {
                unit: unit.to_string(),
                depends_on: depends_on.to_string(),
            })
            .collect();

        let waves = realized
            .waves()
            .into_iter()
            .map(|wave| wave.into_iter().map(str::to_string).collect())
            .collect();

        let failures = realized
            .failures()
            .into_iter()
            .map(|(unit, error)| ManifestFailure {
                unit: unit.to_string(),
                state: realized.state(unit).unwrap_or(UnitState::Failed),
                kind: error.kind().to_string(),
                subject: error.subject(),
                message: error.to_string(),
            })
            .collect();

        Self {
            stack: stack.name.clone(),
            description: stack.description.clone(),
            tags: stack.tags.clone(),
            units,
            dependencies,
            waves,
            failures,
        }
    }
}

/// Receives the realized graph once composition is done.
pub trait Synthesizer {
    /// Returns where the artifact was written.
    fn synthesize(&self, realized: &RealizedGraph) -> Result<PathBuf>;
}

/// Writes `manifest.json` into an output directory.
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    output: PathBuf,
}

impl ManifestWriter {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

impl Synthesizer for ManifestWriter {
    fn synthesize(&self, realized: &RealizedGraph) -> Result<PathBuf> {
        let manifest = StackManifest::from_graph(realized);
        let json = serde_json::to_string_pretty(&manifest)?;

        fs::create_dir_all(&self.output).with_context(|| {
            format!(
                "Failed to create output directory '{}'",
                self.output.display()
            )
        })?;

        let path = self.output.join(MANIFEST_FILE);
        fs::write(&path, json)
            .with_context(|| format!("Failed to write manifest '{}'", path.display()))?;

        info!(
            "Synthesized stack '{}' with {} units to {}",
            manifest.stack,
            manifest.units.len(),
            path.display()
        );
        Ok(path)
    }
}
