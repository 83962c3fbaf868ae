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

//! Which units a release deploys, and in what declared order.

use crate::config::types::{DruidReleaseConf, UnitDecl};
use crate::config::UnitKind;

/// A unit as declared by the plan, before it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUnit {
    pub id: String,
    pub kind: UnitKind,
    pub depends_on: Vec<String>,
    pub description: Option<String>,
}

impl PlannedUnit {
    fn new(id: &str, kind: UnitKind, depends_on: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            kind,
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            description: None,
        }
    }
}

impl From<&UnitDecl> for PlannedUnit {
    fn from(decl: &UnitDecl) -> Self {
        Self {
            id: decl.id.clone(),
            kind: decl.kind,
            depends_on: decl.depends_on.clone().unwrap_or_default(),
            description: decl.description.clone(),
        }
    }
}

/// Ordered unit declarations. Declaration order is construction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPlan {
    units: Vec<PlannedUnit>,
}

impl UnitPlan {
    pub fn new(units: Vec<PlannedUnit>) -> Self {
        Self { units }
    }

    /// The release's explicit `units` list, or the canonical plan.
    pub fn from_release(release: &DruidReleaseConf) -> Self {
        match &release.units {
            Some(units) => Self::new(units.iter().map(PlannedUnit::from).collect()),
            None => Self::canonical(),
        }
    }

    /// Network, cluster, addons, the Druid setup units, the chart and
    /// observability.
    pub fn canonical() -> Self {
        use UnitKind::*;

        Self::new(vec![
            PlannedUnit::new("network", Network, &[]),
            PlannedUnit::new("cluster", Cluster, &["network"]),
            PlannedUnit::new("core-addons", CoreAddons, &["cluster"]),
            PlannedUnit::new("observability-addons", ObservabilityAddons, &["core-addons"]),
            PlannedUnit::new("druid-access", DruidAccess, &["observability-addons"]),
            PlannedUnit::new("druid-secrets", DruidSecrets, &["observability-addons"]),
            PlannedUnit::new("druid-storage", DruidStorage, &["druid-access"]),
            PlannedUnit::new("druid-ingestion", DruidIngestion, &["observability-addons"]),
            PlannedUnit::new("druid-image", DruidImage, &["observability-addons"]),
            PlannedUnit::new(
                "druid",
                Druid,
                &[
                    "druid-access",
                    "druid-secrets",
                    "druid-storage",
                    "druid-ingestion",
                    "druid-image",
                ],
            ),
            PlannedUnit::new("observability", Observability, &["observability-addons"]),
        ])
    }

    pub fn units(&self) -> &[PlannedUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
