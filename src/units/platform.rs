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

//! Network, cluster, addon and observability units.

use log::debug;
use serde::{Deserialize, Serialize};

use super::{DeployableUnit, ResolvedChart, UnitConfig, UnitContext};
use crate::config::loader::ConfigError;
use crate::config::types::{AddonsConf, KubernetesConf, NodeGroupConf, NodeGroupsConf};
use crate::config::UnitKind;

pub struct NetworkUnit;

impl DeployableUnit for NetworkUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Network
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["network:vpc:id"]
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        Ok(UnitConfig::Network(ctx.release.vpc.clone()))
    }
}

/// Cluster settings with the node groups document loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub cluster: KubernetesConf,
    #[serde(default)]
    pub node_groups: Vec<NodeGroupConf>,
}

pub struct ClusterUnit;

impl DeployableUnit for ClusterUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Cluster
    }

    fn outputs(&self) -> &'static [&'static str] {
        &[
            "eks:cluster:name",
            "eks:cluster:oidc:provider",
            "eks:cluster:security-group",
        ]
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let cluster = ctx.release.eks.clone();
        let node_groups = match &cluster.node_groups {
            Some(name) => ctx.load::<NodeGroupsConf>(name)?.node_groups,
            None => Vec::new(),
        };

        Ok(UnitConfig::Cluster(ClusterSpec {
            cluster,
            node_groups,
        }))
    }
}

/// A set of Helm charts installed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonSet {
    pub charts: Vec<ResolvedChart>,
}

impl AddonSet {
    fn load(ctx: &UnitContext<'_>, name: &str) -> Result<Self, ConfigError> {
        let conf: AddonsConf = ctx.load(name)?;
        let charts = conf
            .charts
            .iter()
            .map(|chart| ResolvedChart::load(ctx, chart, None, ctx.context))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Loaded {} addon charts from '{name}'", charts.len());
        Ok(Self { charts })
    }
}

pub struct CoreAddonsUnit;

impl DeployableUnit for CoreAddonsUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::CoreAddons
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let addons = ctx
            .release
            .eks
            .addons
            .as_ref()
            .ok_or_else(|| ctx.missing_section("addons", self.kind()))?;
        Ok(UnitConfig::CoreAddons(AddonSet::load(ctx, &addons.core)?))
    }
}

pub struct ObservabilityAddonsUnit;

impl DeployableUnit for ObservabilityAddonsUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::ObservabilityAddons
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let addons = ctx
            .release
            .eks
            .addons
            .as_ref()
            .ok_or_else(|| ctx.missing_section("addons", self.kind()))?;
        Ok(UnitConfig::ObservabilityAddons(AddonSet::load(
            ctx,
            &addons.observability,
        )?))
    }
}

pub struct ObservabilityUnit;

impl DeployableUnit for ObservabilityUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Observability
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let observability = ctx
            .release
            .eks
            .observability
            .clone()
            .ok_or_else(|| ctx.missing_section("observability", self.kind()))?;
        Ok(UnitConfig::Observability(observability))
    }
}
