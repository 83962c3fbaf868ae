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

//! Configuration resolution and deployable-unit composition for Apache Druid
//! on EKS.

pub mod composer;
pub mod config;
pub mod graph;
pub mod provision;
pub mod synth;
pub mod units;

// Main exports for library users
pub use composer::{
    Composer, CompositionError, RealizedGraph, RealizedUnit, StackIdentity, UnitOutcome,
    UnitState,
};
pub use config::{
    ConfigError, ContextBuilder, ContextError, ContextMap, ContextValue, DocumentSource,
    FsDocumentSource, InMemoryDocumentSource, InvocationSettings, ReleaseDocument,
    TemplateDocument, UnitKind,
};
pub use graph::{DependencyGraph, GraphError, UnitHandle};
pub use provision::{ProvisionRequest, Provisioner, TokenProvisioner};
pub use synth::{ManifestWriter, StackManifest, Synthesizer};
pub use units::{create_unit, DeployableUnit, UnitConfig, UnitContext, UnitPlan};
