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

//! Composition root.
//!
//! The composer walks the unit plan in declaration order. For every unit it
//! builds the typed configuration, asks the provisioner for the unit's
//! outputs, folds those into the context and registers the unit in the
//! dependency graph. A unit whose configuration or provisioning fails is
//! recorded as failed; units depending on it (transitively) are recorded as
//! aborted and never built. Independent branches carry on.

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::context::{ContextError, ContextMap};
use crate::config::invocation::InterpolationError;
use crate::config::loader::{resolve_and_load, ConfigError, DocumentSource};
use crate::config::template::TemplateError;
use crate::config::types::ReleaseDocument;
use crate::config::validation::{validate_release, ValidationError};
use crate::config::UnitKind;
use crate::graph::{DependencyGraph, GraphError};
use crate::provision::{ProvisionRequest, Provisioner};
use crate::units::{create_unit, DeployableUnit, UnitConfig, UnitContext, UnitPlan};

/// Errors raised during composition.
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Provisioning of unit '{unit}' failed: {source}")]
    Provisioning {
        unit: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Composition of unit '{unit}' aborted: dependency '{cause}' failed")]
    CompositionAborted { unit: String, cause: String },
}

impl CompositionError {
    /// The error kind reported to operators.
    pub fn kind(&self) -> &'static str {
        match self {
            CompositionError::Context(e) => context_kind(e),
            CompositionError::Config(e) => config_kind(e),
            CompositionError::Graph(GraphError::UnknownDependency { .. }) => "UnknownDependency",
            CompositionError::Graph(GraphError::DuplicateUnit { .. }) => "DuplicateUnit",
            CompositionError::Provisioning { .. } => "ProvisioningFailed",
            CompositionError::CompositionAborted { .. } => "CompositionAborted",
        }
    }

    /// The offending identifier: a parameter key, placeholder key, field name,
    /// document name or unit id.
    pub fn subject(&self) -> String {
        match self {
            CompositionError::Context(e) => context_subject(e),
            CompositionError::Config(e) => config_subject(e),
            CompositionError::Graph(GraphError::UnknownDependency { dependency, .. }) => {
                dependency.clone()
            }
            CompositionError::Graph(GraphError::DuplicateUnit { unit }) => unit.clone(),
            CompositionError::Provisioning { unit, .. } => unit.clone(),
            CompositionError::CompositionAborted { unit, .. } => unit.clone(),
        }
    }
}

fn context_kind(error: &ContextError) -> &'static str {
    match error {
        ContextError::MissingRequiredParameter { .. } => "MissingRequiredParameter",
        ContextError::MalformedTagSpecification { .. } => "MalformedTagSpecification",
        ContextError::MalformedParameter { .. } => "MalformedParameter",
        ContextError::ConflictingValue { .. } => "ConflictingValue",
    }
}

fn context_subject(error: &ContextError) -> String {
    match error {
        ContextError::MissingRequiredParameter { key } => key.clone(),
        ContextError::MalformedTagSpecification { entry, .. } => entry.clone(),
        ContextError::MalformedParameter { entry } => entry.clone(),
        ContextError::ConflictingValue { key } => key.clone(),
    }
}

fn config_kind(error: &ConfigError) -> &'static str {
    match error {
        ConfigError::Template(TemplateError::UnresolvedPlaceholder { .. }) => {
            "UnresolvedPlaceholder"
        }
        ConfigError::Template(_) => "MalformedSource",
        ConfigError::Context(e) => context_kind(e),
        ConfigError::SchemaViolation { .. } => "SchemaViolation",
        ConfigError::ValidationError(_) => "SchemaViolation",
        ConfigError::MalformedSource { .. } | ConfigError::SerializeError(_) => "MalformedSource",
        ConfigError::DocumentNotFound { .. }
        | ConfigError::InvalidDocumentName { .. }
        | ConfigError::IoError { .. } => "DocumentNotFound",
        ConfigError::InterpolationError(_) => "MissingRequiredParameter",
    }
}

fn config_subject(error: &ConfigError) -> String {
    match error {
        ConfigError::Template(TemplateError::UnresolvedPlaceholder { key, .. }) => key.clone(),
        ConfigError::Template(TemplateError::MalformedPlaceholder { document, .. })
        | ConfigError::Template(TemplateError::ResultTooLarge { document }) => document.clone(),
        ConfigError::Context(e) => context_subject(e),
        ConfigError::SchemaViolation { field, .. } => field.clone(),
        ConfigError::ValidationError(e) => validation_subject(e),
        ConfigError::MalformedSource { document, .. } => document.clone(),
        ConfigError::DocumentNotFound { name }
        | ConfigError::InvalidDocumentName { name }
        | ConfigError::IoError { name, .. } => name.clone(),
        ConfigError::InterpolationError(InterpolationError::UnsetVariable { name }) => {
            name.clone()
        }
        ConfigError::SerializeError(_) => String::new(),
    }
}

fn validation_subject(error: &ValidationError) -> String {
    error.field().to_string()
}

/// Name, description and tags of the synthesized stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackIdentity {
    pub name: String,
    pub description: String,
    pub tags: IndexMap<String, String>,
}

impl StackIdentity {
    /// Platform tags merged with release tags; the release wins.
    pub fn from_release(document: &ReleaseDocument) -> Self {
        let common = &document.release.common;
        let mut tags = document.platform.tags.clone().unwrap_or_default();
        if let Some(release_tags) = &common.tags {
            tags.extend(release_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        Self {
            name: format!("druid-{}", common.id),
            description: format!(
                "Druid cluster release [{}/{}] - Apache Druid on EKS",
                common.name, common.alias
            ),
            tags,
        }
    }
}

/// A unit that reached the graph.
#[derive(Debug, Clone)]
pub struct RealizedUnit {
    pub kind: UnitKind,
    pub config: UnitConfig,
    pub outputs: IndexMap<String, String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitState {
    Registered,
    Failed,
    Aborted,
}

/// How composition ended for one planned unit.
#[derive(Debug)]
pub struct UnitOutcome {
    pub kind: UnitKind,
    pub dependencies: Vec<String>,
    pub state: UnitState,
    pub error: Option<CompositionError>,
}

impl UnitOutcome {
    fn root_cause<'a>(&'a self, id: &'a str) -> &'a str {
        match &self.error {
            Some(CompositionError::CompositionAborted { cause, .. }) => cause,
            _ => id,
        }
    }
}

/// The result of a composition run: the registered units and their edges,
/// plus the outcome of every planned unit.
#[derive(Debug)]
pub struct RealizedGraph {
    stack: StackIdentity,
    graph: DependencyGraph<RealizedUnit>,
    outcomes: IndexMap<String, UnitOutcome>,
    context: ContextMap,
}

impl RealizedGraph {
    pub fn stack(&self) -> &StackIdentity {
        &self.stack
    }

    pub fn graph(&self) -> &DependencyGraph<RealizedUnit> {
        &self.graph
    }

    /// Final context, including every folded output.
    pub fn context(&self) -> &ContextMap {
        &self.context
    }

    pub fn realization_order(&self) -> Vec<&str> {
        self.graph.realization_order()
    }

    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.graph.edges()
    }

    pub fn waves(&self) -> Vec<Vec<&str>> {
        self.graph.waves()
    }

    pub fn unit(&self, id: &str) -> Option<&RealizedUnit> {
        self.graph.get(id)
    }

    pub fn state(&self, id: &str) -> Option<UnitState> {
        self.outcomes.get(id).map(|o| o.state)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &UnitOutcome)> {
        self.outcomes.iter().map(|(id, o)| (id.as_str(), o))
    }

    /// Failed and aborted units with their errors, in plan order.
    pub fn failures(&self) -> Vec<(&str, &CompositionError)> {
        self.outcomes
            .iter()
            .filter_map(|(id, o)| o.error.as_ref().map(|e| (id.as_str(), e)))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes
            .values()
            .all(|o| o.state == UnitState::Registered)
    }
}

/// Drives construction of every deployable unit.
pub struct Composer {
    documents: Box<dyn DocumentSource>,
    provisioner: Box<dyn Provisioner>,
    overrides: IndexMap<UnitKind, Box<dyn DeployableUnit>>,
}

impl Composer {
    pub fn new(
        documents: impl DocumentSource + 'static,
        provisioner: impl Provisioner + 'static,
    ) -> Self {
        Self {
            documents: Box::new(documents),
            provisioner: Box::new(provisioner),
            overrides: IndexMap::new(),
        }
    }

    /// Replace the built-in implementation of a unit kind.
    pub fn with_unit(mut self, unit: Box<dyn DeployableUnit>) -> Self {
        self.overrides.insert(unit.kind(), unit);
        self
    }

    /// Resolve, load and validate the root document.
    pub fn load_release(
        &self,
        name: &str,
        context: &ContextMap,
    ) -> Result<ReleaseDocument, CompositionError> {
        let document = self.documents.read(name)?;
        let release: ReleaseDocument = resolve_and_load(&document, context)?;
        validate_release(&release).map_err(ConfigError::from)?;
        info!(
            "Loaded release '{}' from '{name}'",
            release.release.common.id
        );
        Ok(release)
    }

    /// Compose every planned unit.
    ///
    /// Only wiring errors (a dependency on an undeclared or later-declared
    /// unit, or a duplicate id) fail the whole run. Unit failures are recorded
    /// in the returned graph.
    pub fn compose(
        &self,
        release_document: &str,
        release: &ReleaseDocument,
        mut context: ContextMap,
    ) -> Result<RealizedGraph, CompositionError> {
        let plan = UnitPlan::from_release(&release.release);

        let mut wiring = DependencyGraph::new();
        for planned in plan.units() {
            wiring.register_unit(planned.id.clone(), (), &planned.depends_on)?;
        }

        let mut graph = DependencyGraph::new();
        let mut outcomes: IndexMap<String, UnitOutcome> = IndexMap::new();

        for planned in plan.units() {
            let blocked = planned.depends_on.iter().find_map(|dep| {
                outcomes
                    .get(dep)
                    .filter(|o| o.state != UnitState::Registered)
                    .map(|o| o.root_cause(dep).to_string())
            });

            if let Some(cause) = blocked {
                warn!(
                    "Aborting unit '{}': dependency chain failed at '{cause}'",
                    planned.id
                );
                outcomes.insert(
                    planned.id.clone(),
                    UnitOutcome {
                        kind: planned.kind,
                        dependencies: planned.depends_on.clone(),
                        state: UnitState::Aborted,
                        error: Some(CompositionError::CompositionAborted {
                            unit: planned.id.clone(),
                            cause,
                        }),
                    },
                );
                continue;
            }

            debug!("Constructing unit '{}' ({})", planned.id, planned.kind);
            match self.realize(
                &planned.id,
                planned.kind,
                &planned.depends_on,
                release_document,
                release,
                &mut context,
            ) {
                Ok((config, outputs)) => {
                    graph.register_unit(
                        planned.id.clone(),
                        RealizedUnit {
                            kind: planned.kind,
                            config,
                            outputs,
                            description: planned.description.clone(),
                        },
                        &planned.depends_on,
                    )?;
                    info!("Registered unit '{}'", planned.id);
                    outcomes.insert(
                        planned.id.clone(),
                        UnitOutcome {
                            kind: planned.kind,
                            dependencies: planned.depends_on.clone(),
                            state: UnitState::Registered,
                            error: None,
                        },
                    );
                }
                Err(e) => {
                    warn!("Unit '{}' failed: {} ({})", planned.id, e.kind(), e.subject());
                    outcomes.insert(
                        planned.id.clone(),
                        UnitOutcome {
                            kind: planned.kind,
                            dependencies: planned.depends_on.clone(),
                            state: UnitState::Failed,
                            error: Some(e),
                        },
                    );
                }
            }
        }

        Ok(RealizedGraph {
            stack: StackIdentity::from_release(release),
            graph,
            outcomes,
            context,
        })
    }

    fn unit(&self, kind: UnitKind) -> Box<dyn DeployableUnit> {
        create_unit(kind)
    }

    fn realize(
        &self,
        id: &str,
        kind: UnitKind,
        dependencies: &[String],
        release_document: &str,
        release: &ReleaseDocument,
        context: &mut ContextMap,
    ) -> Result<(UnitConfig, IndexMap<String, String>), CompositionError> {
        let builtin;
        let unit: &dyn DeployableUnit = match self.overrides.get(&kind) {
            Some(unit) => unit.as_ref(),
            None => {
                builtin = self.unit(kind);
                builtin.as_ref()
            }
        };

        let config = unit.build(&UnitContext {
            context: &*context,
            documents: self.documents.as_ref(),
            release: &release.release,
            release_document,
        })?;

        let request = ProvisionRequest {
            unit: id,
            kind,
            config: &config,
            dependencies,
            outputs: unit.outputs(),
        };
        let outputs = self
            .provisioner
            .provision(&request)
            .map_err(|source| CompositionError::Provisioning {
                unit: id.to_string(),
                source,
            })?;

        if let Some(missing) = unit.outputs().iter().find(|k| !outputs.contains_key(**k)) {
            return Err(CompositionError::Provisioning {
                unit: id.to_string(),
                source: anyhow::anyhow!("provisioner did not report output '{missing}'"),
            });
        }

        context.extend_outputs(outputs.iter().map(|(k, v)| (k.clone(), v.clone())))?;
        Ok((config, outputs))
    }
}
