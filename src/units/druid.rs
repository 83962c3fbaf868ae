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

//! Druid setup units and the Druid chart itself.
//!
//! All Druid documents are resolved with the release identifier bound to the
//! chart release, so the access, secrets, storage and ingestion documents and
//! the chart values agree on resource names without referencing each other.

use serde::{Deserialize, Serialize};

use super::{DeployableUnit, ResolvedChart, UnitConfig, UnitContext};
use crate::config::loader::ConfigError;
use crate::config::types::{Access, Ingestion, Secrets, Storage};
use crate::config::validation::validate_chart;
use crate::config::UnitKind;

pub struct DruidAccessUnit;

impl DeployableUnit for DruidAccessUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::DruidAccess
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["druid:access:role:arn"]
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let context = ctx.release_context()?;
        let access: Access = ctx.load_with(&ctx.release.druid.access, &context)?;
        Ok(UnitConfig::DruidAccess(access))
    }
}

pub struct DruidSecretsUnit;

impl DeployableUnit for DruidSecretsUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::DruidSecrets
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["druid:secrets:admin:arn", "druid:secrets:system:arn"]
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let context = ctx.release_context()?;
        let secrets: Secrets = ctx.load_with(&ctx.release.druid.secrets, &context)?;
        Ok(UnitConfig::DruidSecrets(secrets))
    }
}

pub struct DruidStorageUnit;

impl DeployableUnit for DruidStorageUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::DruidStorage
    }

    fn outputs(&self) -> &'static [&'static str] {
        &[
            "druid:storage:metadata:endpoint",
            "druid:storage:deep-storage:bucket",
        ]
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let context = ctx.release_context()?;
        let storage: Storage = ctx.load_with(&ctx.release.druid.storage, &context)?;
        Ok(UnitConfig::DruidStorage(storage))
    }
}

/// "Create `resource` only after `depends_on`" inside a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderingPair {
    pub resource: String,
    pub depends_on: String,
}

/// Ingestion settings plus the order in which client service accounts and
/// their namespaces must be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSpec {
    pub ingestion: Ingestion,
    pub ordering: Vec<OrderingPair>,
}

impl IngestionSpec {
    fn new(ingestion: Ingestion) -> Self {
        let ordering = ingestion
            .kafka
            .clients
            .iter()
            .map(|client| {
                let metadata = &client.service_account.metadata;
                OrderingPair {
                    resource: format!("serviceaccount/{}/{}", metadata.namespace, metadata.name),
                    depends_on: format!("namespace/{}", metadata.namespace),
                }
            })
            .collect();
        Self {
            ingestion,
            ordering,
        }
    }
}

pub struct DruidIngestionUnit;

impl DeployableUnit for DruidIngestionUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::DruidIngestion
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["druid:ingestion:kafka:arn"]
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let context = ctx.release_context()?;
        let ingestion: Ingestion = ctx.load_with(&ctx.release.druid.ingestion, &context)?;
        Ok(UnitConfig::DruidIngestion(IngestionSpec::new(ingestion)))
    }
}

pub struct DruidImageUnit;

impl DeployableUnit for DruidImageUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::DruidImage
    }

    fn outputs(&self) -> &'static [&'static str] {
        &["image:uri"]
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        Ok(UnitConfig::DruidImage(ctx.release.druid.docker_image.clone()))
    }
}

/// The Druid Helm chart.
pub struct ChartUnit;

impl DeployableUnit for ChartUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Druid
    }

    fn build(&self, ctx: &UnitContext<'_>) -> Result<UnitConfig, ConfigError> {
        let druid = &ctx.release.druid;
        if druid.chart.values.is_none() {
            return Err(ctx.missing_section("values", self.kind()));
        }
        validate_chart(&druid.chart, "release.druid.chart")?;

        let context = ctx.release_context()?;
        let chart = ResolvedChart::load(ctx, &druid.chart, Some(&druid.asset), &context)?;
        Ok(UnitConfig::Druid(chart))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::context::{ContextMap, RELEASE_KEY};
    use crate::config::loader::InMemoryDocumentSource;
    use crate::units::test_fixtures::{documents, release};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_access_document_sees_chart_release() {
        let release = release();
        let documents = documents();
        let context = ContextMap::default();
        let ctx = UnitContext {
            context: &context,
            documents: &documents,
            release: &release.release,
            release_document: "conf.yaml",
        };

        let UnitConfig::DruidAccess(access) = DruidAccessUnit.build(&ctx).unwrap() else {
            panic!("expected access config");
        };

        assert_eq!(access.service_account.metadata.name, "druid-r1-sa");
        assert!(!context.contains_key(RELEASE_KEY));
    }

    #[test]
    fn test_ingestion_orders_service_accounts_after_namespaces() {
        let release = release();
        let documents = documents();
        let context = ContextMap::default();
        let ctx = UnitContext {
            context: &context,
            documents: &documents,
            release: &release.release,
            release_document: "conf.yaml",
        };

        let UnitConfig::DruidIngestion(spec) = DruidIngestionUnit.build(&ctx).unwrap() else {
            panic!("expected ingestion config");
        };

        assert_eq!(spec.ingestion.kafka.name, "druid-r1-msk");
        assert_eq!(
            spec.ordering,
            vec![
                OrderingPair {
                    resource: "serviceaccount/apps/producer".to_string(),
                    depends_on: "namespace/apps".to_string(),
                },
                OrderingPair {
                    resource: "serviceaccount/druid/consumer".to_string(),
                    depends_on: "namespace/druid".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_storage_document_missing() {
        let release = release();
        let documents = InMemoryDocumentSource::new();
        let context = ContextMap::default();
        let ctx = UnitContext {
            context: &context,
            documents: &documents,
            release: &release.release,
            release_document: "conf.yaml",
        };

        assert_matches!(
            DruidStorageUnit.build(&ctx),
            Err(ConfigError::DocumentNotFound { name }) if name == "druid/storage.yaml"
        );
    }

    #[test]
    fn test_chart_without_values_document_rejected() {
        let mut release = release();
        release.release.druid.chart.values = None;
        let documents = documents();
        let context = ContextMap::default();
        let ctx = UnitContext {
            context: &context,
            documents: &documents,
            release: &release.release,
            release_document: "conf.yaml",
        };

        assert_matches!(
            ChartUnit.build(&ctx),
            Err(ConfigError::SchemaViolation { field, .. }) if field == "values"
        );
    }

    #[test]
    fn test_chart_with_invalid_namespace_rejected() {
        let mut release = release();
        release.release.druid.chart.namespace = "Druid_NS".to_string();
        let documents = documents();
        let context = ContextMap::default();
        let ctx = UnitContext {
            context: &context,
            documents: &documents,
            release: &release.release,
            release_document: "conf.yaml",
        };

        let err = ChartUnit.build(&ctx).unwrap_err();
        assert_matches!(&err, ConfigError::ValidationError(e) if e.field() == "release.druid.chart.namespace");
    }
}
