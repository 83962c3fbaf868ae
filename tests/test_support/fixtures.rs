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

//! A complete release document tree for tests.

use druid_eks::config::context::{ContextBuilder, TagSource, RELEASE_KEY, TAGS_KEY};
use druid_eks::{ContextMap, InMemoryDocumentSource};
use std::fs;
use std::path::Path;

pub const RELEASE: &str = "analytics";

pub const CONF: &str = r#"
platform:
  id: platform
  account: "{{deployment:account}}"
  region: us-west-2
  name: analytics
  alias: plat
  version: v1
  tags:
    team: "{{deployment:tags:team}}"
release:
  common:
    id: "{{deployment:eks:druid:release}}"
    account: "{{deployment:account}}"
    region: us-west-2
    name: analytics
    alias: "{{deployment:eks:druid:release}}"
    version: v1
    tags:
      release: "{{deployment:eks:druid:release}}"
  vpc:
    name: "{{deployment:eks:druid:release}}-vpc"
    cidr: 10.0.0.0/16
    natGateways: 1
    subnets:
      - name: public
        cidrMask: 24
        subnetType: public
      - name: private
        cidrMask: 20
        subnetType: privateWithEgress
  eks:
    name: "{{deployment:eks:druid:release}}-eks"
    version: "1.31"
    endpointAccess: publicAndPrivate
    nodeGroups: eks/node-groups.yaml
    addons:
      core: eks/addons-core.yaml
      observability: eks/addons-observability.yaml
    observability:
      logGroup: "/druid/{{deployment:eks:druid:release}}"
      logRetentionDays: 30
  druid:
    access: druid/access.yaml
    secrets: druid/secrets.yaml
    storage: druid/storage.yaml
    ingestion: druid/ingestion.yaml
    asset: druid/druid-chart.tgz
    dockerImage:
      name: druid
      directory: docker/druid
      tag: "31.0.0"
    chart:
      name: druid
      namespace: druid
      release: "{{deployment:eks:druid:release}}"
      values: druid/values.yaml
"#;

pub const NODE_GROUPS: &str = r#"
nodeGroups:
  - name: core
    instanceTypes: [m6i.xlarge]
    minSize: 2
    maxSize: 6
    desiredSize: 3
"#;

pub const ADDONS_CORE: &str = r#"
charts:
  - name: aws-load-balancer-controller
    namespace: kube-system
    release: alb
    repository: https://aws.github.io/eks-charts
    values: eks/alb-values.yaml
"#;

pub const ALB_VALUES: &str = r#"
clusterName: "{{eks:cluster:name}}"
vpcId: "{{network:vpc:id}}"
"#;

pub const ADDONS_OBSERVABILITY: &str = r#"
charts:
  - name: aws-for-fluent-bit
    namespace: amazon-cloudwatch
    release: fluent-bit
"#;

pub const ACCESS: &str = r#"
serviceAccount:
  metadata:
    name: "{{deployment:eks:druid:release}}-druid"
    namespace: druid
  role:
    name: "{{deployment:eks:druid:release}}-druid-role"
    managedPolicyNames: [AmazonS3ReadOnlyAccess]
"#;

pub const SECRETS: &str = r#"
admin:
  name: "{{deployment:eks:druid:release}}-admin"
  username: admin
  password:
    length: 32
    excludePunctuation: true
system:
  name: "{{deployment:eks:druid:release}}-system"
  username: druid_system
"#;

pub const STORAGE: &str = r#"
metadata:
  name: "{{deployment:eks:druid:release}}-metadata"
  engine: postgres
  version: "16.3"
  instanceClass: db.t4g.medium
  databaseName: druid
  username: druid
  allocatedStorage: 20
deepStorage:
  name: "{{deployment:eks:druid:release}}-deep-storage"
  versioned: true
indexLogs:
  name: "{{deployment:eks:druid:release}}-index-logs"
  lifecycleRules:
    - id: expire
      expirationDays: 30
multiStageQuery:
  name: "{{deployment:eks:druid:release}}-msq"
"#;

pub const INGESTION: &str = r#"
kafka:
  name: "{{deployment:eks:druid:release}}-msk"
  port: 9098
  clients:
    - serviceAccount:
        metadata:
          name: ingest
          namespace: druid
"#;

pub const VALUES: &str = r#"
release: "{{deployment:eks:druid:release}}"
image:
  repository: "{{image:uri}}"
serviceAccount:
  roleArn: "{{druid:access:role:arn}}"
metadataStorage:
  endpoint: "{{druid:storage:metadata:endpoint}}"
  secretArn: "{{druid:secrets:system:arn}}"
deepStorage:
  bucket: "{{druid:storage:deep-storage:bucket}}"
kafka:
  arn: "{{druid:ingestion:kafka:arn}}"
"#;

/// Every document of the release, by name.
pub fn documents() -> Vec<(&'static str, &'static str)> {
    vec![
        ("conf.yaml", CONF),
        ("eks/node-groups.yaml", NODE_GROUPS),
        ("eks/addons-core.yaml", ADDONS_CORE),
        ("eks/alb-values.yaml", ALB_VALUES),
        ("eks/addons-observability.yaml", ADDONS_OBSERVABILITY),
        ("druid/access.yaml", ACCESS),
        ("druid/secrets.yaml", SECRETS),
        ("druid/storage.yaml", STORAGE),
        ("druid/ingestion.yaml", INGESTION),
        ("druid/values.yaml", VALUES),
    ]
}

/// The document tree in memory, with `overrides` replacing or adding
/// documents.
pub fn in_memory(overrides: &[(&str, &str)]) -> InMemoryDocumentSource {
    let mut source = InMemoryDocumentSource::new();
    for (name, text) in documents().into_iter().chain(overrides.iter().copied()) {
        source.insert(name, text);
    }
    source
}

/// Write the document tree under `root`.
pub fn write_documents(root: &Path) {
    for (name, text) in documents() {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }
}

/// The context an operator would supply.
pub fn base_context() -> ContextMap {
    ContextBuilder::new()
        .parameter(RELEASE_KEY, RELEASE)
        .parameter("deployment:account", "000000000000")
        .tags(TagSource::parse(TAGS_KEY, ["team=data"]).unwrap())
        .require(RELEASE_KEY)
        .build()
        .unwrap()
}
