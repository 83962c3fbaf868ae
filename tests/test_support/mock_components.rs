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

//! Mock provisioners and units for exercising the composer.

use anyhow::{anyhow, Result};
use druid_eks::config::ConfigError;
use druid_eks::{
    DeployableUnit, ProvisionRequest, Provisioner, TokenProvisioner, UnitConfig, UnitContext,
    UnitKind,
};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// A provision call as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionCall {
    pub unit: String,
    pub kind: UnitKind,
    pub dependencies: Vec<String>,
}

/// Records every call and fails for selected unit ids. Outputs are tokens.
#[derive(Clone, Default)]
pub struct RecordingProvisioner {
    calls: Arc<Mutex<Vec<ProvisionCall>>>,
    failing: HashSet<String>,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(ids: &[&str]) -> Self {
        Self {
            calls: Arc::default(),
            failing: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn provisioned(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.unit).collect()
    }
}

impl Provisioner for RecordingProvisioner {
    fn provision(&self, request: &ProvisionRequest<'_>) -> Result<IndexMap<String, String>> {
        self.calls.lock().unwrap().push(ProvisionCall {
            unit: request.unit.to_string(),
            kind: request.kind,
            dependencies: request.dependencies.to_vec(),
        });

        if self.failing.contains(request.unit) {
            return Err(anyhow!("quota exceeded while creating '{}'", request.unit));
        }
        TokenProvisioner::new().provision(request)
    }
}

/// Reports no outputs at all.
pub struct SilentProvisioner;

impl Provisioner for SilentProvisioner {
    fn provision(&self, _request: &ProvisionRequest<'_>) -> Result<IndexMap<String, String>> {
        Ok(IndexMap::new())
    }
}

/// A unit whose configuration can never be built.
pub struct BrokenUnit {
    pub kind: UnitKind,
}

impl DeployableUnit for BrokenUnit {
    fn kind(&self) -> UnitKind {
        self.kind
    }

    fn build(&self, _ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        Err(ConfigError::SchemaViolation {
            document: "broken.yaml".to_string(),
            field: "broken".to_string(),
            message: "unit cannot be built".to_string(),
        })
    }
}
