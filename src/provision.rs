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

//! Boundary to the resource-provisioning collaborator.
//!
//! The composer hands each unit's typed configuration and dependency set to a
//! [`Provisioner`] and folds the returned outputs into the context for the
//! units that follow.

use anyhow::Result;
use indexmap::IndexMap;
use log::debug;

use crate::config::UnitKind;
use crate::units::UnitConfig;

/// What the provisioner is asked to build for one unit.
#[derive(Debug)]
pub struct ProvisionRequest<'a> {
    pub unit: &'a str,
    pub kind: UnitKind,
    pub config: &'a UnitConfig,
    pub dependencies: &'a [String],
    /// Output keys the unit is expected to report.
    pub outputs: &'a [&'static str],
}

pub trait Provisioner: Send + Sync {
    /// Build the unit's resources and return its outputs by context key.
    fn provision(&self, request: &ProvisionRequest<'_>) -> Result<IndexMap<String, String>>;
}

/// Reports a deferred token for every declared output.
///
/// Concrete values only exist once the external deployment runs, so each
/// output is a `${Token[<unit>.<key>]}` reference that the deployment layer
/// substitutes.
#[derive(Debug, Clone, Default)]
pub struct TokenProvisioner;

impl TokenProvisioner {
    pub fn new() -> Self {
        Self
    }

    pub fn token(unit: &str, key: &str) -> String {
        format!("${{Token[{unit}.{key}]}}")
    }
}

impl Provisioner for TokenProvisioner {
    fn provision(&self, request: &ProvisionRequest<'_>) -> Result<IndexMap<String, String>> {
        debug!(
            "Provisioning unit '{}' ({}) with {} outputs",
            request.unit,
            request.kind,
            request.outputs.len()
        );
        Ok(request
            .outputs
            .iter()
            .map(|key| (key.to_string(), Self::token(request.unit, key)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_fixtures::release;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_provisioner_reports_declared_outputs() {
        let release = release();
        let config = UnitConfig::Network(release.release.vpc.clone());
        let request = ProvisionRequest {
            unit: "network",
            kind: UnitKind::Network,
            config: &config,
            dependencies: &[],
            outputs: &["network:vpc:id"],
        };

        let outputs = TokenProvisioner::new().provision(&request).unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs["network:vpc:id"], "${Token[network.network:vpc:id]}");
    }
}
