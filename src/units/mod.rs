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

//! Deployable units.
//!
//! A unit turns the release configuration plus the current context into a
//! typed [`UnitConfig`], loading any nested template documents it owns. Units
//! are stateless and interchangeable behind [`DeployableUnit`]; the composer
//! decides when each one runs.

mod druid;
mod plan;
mod platform;

pub use druid::{
    ChartUnit, DruidAccessUnit, DruidImageUnit, DruidIngestionUnit, DruidSecretsUnit,
    DruidStorageUnit, IngestionSpec, OrderingPair,
};
pub use plan::{PlannedUnit, UnitPlan};
pub use platform::{
    AddonSet, ClusterSpec, ClusterUnit, CoreAddonsUnit, NetworkUnit, ObservabilityAddonsUnit,
    ObservabilityUnit,
};

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::context::{ContextBuilder, ContextMap, RELEASE_KEY};
use crate::config::loader::{resolve_and_load, ConfigError, DocumentSource};
use crate::config::types::{
    Access, DockerImageConf, DruidReleaseConf, HelmChartConf, NetworkConf, ObservabilityConf,
    Secrets, Storage,
};
use crate::config::UnitKind;

/// Everything a unit may read while building its configuration.
pub struct UnitContext<'a> {
    /// Context as of this unit: base parameters plus upstream outputs.
    pub context: &'a ContextMap,
    pub documents: &'a dyn DocumentSource,
    pub release: &'a DruidReleaseConf,
    /// Name of the root document, used when a required section is absent.
    pub release_document: &'a str,
}

impl<'a> UnitContext<'a> {
    /// Resolve and load a nested document against the unit's context.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, ConfigError> {
        self.load_with(name, self.context)
    }

    pub fn load_with<T: DeserializeOwned>(
        &self,
        name: &str,
        context: &ContextMap,
    ) -> Result<T, ConfigError> {
        let document = self.documents.read(name)?;
        resolve_and_load(&document, context)
    }

    /// Context for Druid documents: the unit context with the release
    /// identifier bound to the chart release.
    pub fn release_context(&self) -> Result<ContextMap, ConfigError> {
        let release = self.release.druid.chart.release.as_str();
        debug!("Binding '{RELEASE_KEY}' for release documents");
        Ok(ContextBuilder::from_context(self.context)
            .parameter(RELEASE_KEY, release)
            .build()?)
    }

    /// A section of the root document this unit cannot do without.
    pub fn missing_section(&self, field: &str, kind: UnitKind) -> ConfigError {
        ConfigError::SchemaViolation {
            document: self.release_document.to_string(),
            field: field.to_string(),
            message: format!("'{field}' is required by unit kind '{kind}'"),
        }
    }
}

/// A chart with its values document resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedChart {
    pub chart: HelmChartConf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Helm values are open-schema.
    #[serde(default)]
    pub values: serde_json::Map<String, serde_json::Value>,
}

impl ResolvedChart {
    pub(crate) fn load(
        ctx: &UnitContext<'_>,
        chart: &HelmChartConf,
        asset: Option<&str>,
        context: &ContextMap,
    ) -> Result<Self, ConfigError> {
        let values = match &chart.values {
            Some(name) => ctx.load_with(name, context)?,
            None => serde_json::Map::new(),
        };
        Ok(Self {
            chart: chart.clone(),
            asset: asset.map(str::to_string),
            values,
        })
    }
}

/// Typed configuration produced by a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "kebab-case")]
pub enum UnitConfig {
    Network(NetworkConf),
    Cluster(ClusterSpec),
    CoreAddons(AddonSet),
    ObservabilityAddons(AddonSet),
    DruidAccess(Access),
    DruidSecrets(Secrets),
    DruidStorage(Storage),
    DruidIngestion(IngestionSpec),
    DruidImage(DockerImageConf),
    Druid(ResolvedChart),
    Observability(ObservabilityConf),
}

impl UnitConfig {
    pub fn kind(&self) -> UnitKind {
        match self {
            UnitConfig::Network(_) => UnitKind::Network,
            UnitConfig::Cluster(_) => UnitKind::Cluster,
            UnitConfig::CoreAddons(_) => UnitKind::CoreAddons,
            UnitConfig::ObservabilityAddons(_) => UnitKind::ObservabilityAddons,
            UnitConfig::DruidAccess(_) => UnitKind::DruidAccess,
            UnitConfig::DruidSecrets(_) => UnitKind::DruidSecrets,
            UnitConfig::DruidStorage(_) => UnitKind::DruidStorage,
            UnitConfig::DruidIngestion(_) => UnitKind::DruidIngestion,
            UnitConfig::DruidImage(_) => UnitKind::DruidImage,
            UnitConfig::Druid(_) => UnitKind::Druid,
            UnitConfig::Observability(_) => UnitKind::Observability,
        }
    }
}

/// One independently provisionable group of resources.
pub trait DeployableUnit: Send + Sync {
    fn kind(&self) -> UnitKind;

    /// Context keys this unit publishes once provisioned.
    fn outputs(&self) -> &'static [&'static str] {
        &[]
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError>;
}

/// Create the unit implementation for a kind.
pub fn create_unit(kind: UnitKind) -> Box<dyn DeployableUnit> {
    match kind {
        UnitKind::Network => Box::new(NetworkUnit),
        UnitKind::Cluster => Box::new(ClusterUnit),
        UnitKind::CoreAddons => Box::new(CoreAddonsUnit),
        UnitKind::ObservabilityAddons => Box::new(ObservabilityAddonsUnit),
        UnitKind::DruidAccess => Box::new(DruidAccessUnit),
        UnitKind::DruidSecrets => Box::new(DruidSecretsUnit),
        UnitKind::DruidStorage => Box::new(DruidStorageUnit),
        UnitKind::DruidIngestion => Box::new(DruidIngestionUnit),
        UnitKind::DruidImage => Box::new(DruidImageUnit),
        UnitKind::Druid => Box::new(ChartUnit),
        UnitKind::Observability => Box::new(ObservabilityUnit),
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use crate::config::loader::{load, InMemoryDocumentSource};
    use crate::config::template::ResolvedText;
    use crate::config::types::ReleaseDocument;

    pub const RELEASE_YAML: &str = r#"
platform:
  id: platform
  account: "000000000000"
  region: us-west-2
  name: analytics
  alias: plat
  version: v1
release:
  common:
    id: druid
    account: "000000000000"
    region: us-west-2
    name: analytics
    alias: druid
    version: v1
  vpc:
    name: druid-vpc
    cidr: 10.0.0.0/16
  eks:
    name: druid-eks
    version: "1.31"
    nodeGroups: eks/node-groups.yaml
    addons:
      core: eks/addons-core.yaml
      observability: eks/addons-observability.yaml
  druid:
    access: druid/access.yaml
    secrets: druid/secrets.yaml
    storage: druid/storage.yaml
    ingestion: druid/ingestion.yaml
    asset: druid/chart.tgz
    dockerImage:
      name: druid
      directory: docker/druid
    chart:
      name: druid
      namespace: druid
      release: druid-r1
      values: druid/values.yaml
"#;

    pub fn release() -> ReleaseDocument {
        load(&ResolvedText::new("conf.yaml", RELEASE_YAML)).unwrap()
    }

    pub fn documents() -> InMemoryDocumentSource {
        InMemoryDocumentSource::new()
            .with(
                "eks/node-groups.yaml",
                "nodeGroups:\n  - name: core\n    instanceTypes: [m5.large]\n    minSize: 1\n    maxSize: 3\n    desiredSize: 2\n",
            )
            .with(
                "eks/addons-core.yaml",
                "charts:\n  - name: aws-load-balancer-controller\n    namespace: kube-system\n    release: alb\n    values: eks/alb-values.yaml\n",
            )
            .with("eks/alb-values.yaml", "clusterName: {{eks:cluster:name}}\n")
            .with("eks/addons-observability.yaml", "charts: []\n")
            .with(
                "druid/access.yaml",
                "serviceAccount:\n  metadata:\n    name: {{deployment:eks:druid:release}}-sa\n    namespace: druid\n",
            )
            .with(
                "druid/ingestion.yaml",
                "kafka:\n  name: {{deployment:eks:druid:release}}-msk\n  clients:\n    - serviceAccount:\n        metadata:\n          name: producer\n          namespace: apps\n    - serviceAccount:\n        metadata:\n          name: consumer\n          namespace: druid\n",
            )
            .with(
                "druid/values.yaml",
                "image: {{image:uri}}\nrelease: {{deployment:eks:druid:release}}\n",
            )
    }
}
