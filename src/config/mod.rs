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

//! Configuration management for druid-eks.
//!
//! This module provides:
//! - The runtime substitution context and its builder
//! - `{{namespaced:key}}` template resolution
//! - Schema-closed typed loading of resolved YAML
//! - Invocation settings with environment variable interpolation
//! - Semantic validation of release documents
//!
//! # Configuration File Example
//!
//! ```yaml
//! platform:
//!   id: platform
//!   account: "{{deployment:account}}"
//!   region: us-west-2
//!   name: analytics
//!   alias: plat
//!   version: v1
//! release:
//!   common:
//!     id: "{{deployment:eks:druid:release}}"
//!     ...
//!   druid:
//!     access: druid/access.yaml
//!     chart:
//!       release: "{{deployment:eks:druid:release}}"
//!       values: druid/values.yaml
//! ```

pub mod context;
pub mod invocation;
pub mod loader;
pub mod template;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use context::{ContextBuilder, ContextError, ContextMap, ContextValue, TagSource};
pub use invocation::InvocationSettings;
pub use loader::{
    load, resolve_and_load, ConfigError, DocumentSource, FsDocumentSource, InMemoryDocumentSource,
};
pub use template::{resolve, ResolvedText, TemplateDocument, TemplateError};
pub use types::{ReleaseDocument, UnitKind};
pub use validation::{validate_chart, validate_release, ValidationError};
