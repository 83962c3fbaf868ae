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

//! Semantic validation of a loaded release document.
//!
//! Structural problems (unknown fields, wrong types) are already rejected by
//! the typed loader. This module checks values that deserialize fine but
//! cannot be deployed.
//!
//! [`validate_release`] covers what every unit relies on: identity fields,
//! subnet masks and the explicit unit plan. Workload settings such as Helm
//! release names are checked by [`validate_chart`] when the owning unit is
//! built, so a bad chart fails that unit alone.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use super::types::{HelmChartConf, ReleaseDocument};

/// Helm limits release names to 53 characters.
const MAX_RELEASE_NAME_LENGTH: usize = 53;

lazy_static! {
    static ref DNS_LABEL_PATTERN: Regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("Invalid regex pattern");
}

/// Validation error for release configuration.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Multiple validation errors:\n{}", .0.join("\n"))]
    Multiple(Vec<String>),
}

impl ValidationError {
    /// The first offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::InvalidField { field, .. } => field,
            ValidationError::Multiple(errors) => errors
                .first()
                .and_then(|e| e.split('\'').nth(1))
                .unwrap_or(""),
        }
    }
}

/// Validate a release document and return every problem found.
pub fn validate_release(document: &ReleaseDocument) -> Result<(), ValidationError> {
    let mut errors: Vec<(String, String)> = Vec::new();
    let release = &document.release;

    for (field, value) in [
        ("platform.id", &document.platform.id),
        ("platform.account", &document.platform.account),
        ("platform.region", &document.platform.region),
        ("release.common.id", &release.common.id),
        ("release.common.account", &release.common.account),
        ("release.common.region", &release.common.region),
        ("release.vpc.name", &release.vpc.name),
        ("release.eks.name", &release.eks.name),
    ] {
        if value.trim().is_empty() {
            errors.push((field.to_string(), "must not be empty".to_string()));
        }
    }

    if let Some(subnets) = &release.vpc.subnets {
        for (i, subnet) in subnets.iter().enumerate() {
            if !(16..=28).contains(&subnet.cidr_mask) {
                errors.push((
                    format!("release.vpc.subnets[{i}].cidrMask"),
                    format!("{} is outside 16..=28", subnet.cidr_mask),
                ));
            }
        }
    }

    if let Some(units) = &release.units {
        let mut seen = HashSet::new();
        let mut kinds = HashSet::new();
        for (i, unit) in units.iter().enumerate() {
            if unit.id.trim().is_empty() {
                errors.push((format!("release.units[{i}].id"), "must not be empty".to_string()));
            } else if !seen.insert(unit.id.as_str()) {
                errors.push((
                    format!("release.units[{i}].id"),
                    format!("duplicate unit id '{}'", unit.id),
                ));
            }
            // Output keys are fixed per kind
            if !kinds.insert(unit.kind) {
                errors.push((
                    format!("release.units[{i}].kind"),
                    format!(
                        "unit kind '{}' is already declared; each kind publishes fixed output keys and may appear once",
                        unit.kind
                    ),
                ));
            }
        }
    }

    into_result(errors)
}

/// Validate a Helm chart's release name and namespace. `prefix` is the path of
/// the chart section, used to name the offending field.
pub fn validate_chart(chart: &HelmChartConf, prefix: &str) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    if chart.release.len() > MAX_RELEASE_NAME_LENGTH {
        errors.push((
            format!("{prefix}.release"),
            format!("longer than {MAX_RELEASE_NAME_LENGTH} characters"),
        ));
    } else if !DNS_LABEL_PATTERN.is_match(&chart.release) {
        errors.push((
            format!("{prefix}.release"),
            format!("'{}' is not a valid release name", chart.release),
        ));
    }

    if !DNS_LABEL_PATTERN.is_match(&chart.namespace) {
        errors.push((
            format!("{prefix}.namespace"),
            format!("'{}' is not a valid namespace", chart.namespace),
        ));
    }

    into_result(errors)
}

fn into_result(mut errors: Vec<(String, String)>) -> Result<(), ValidationError> {
    match errors.len() {
        0 => Ok(()),
        1 => {
            let (field, reason) = errors.remove(0);
            Err(ValidationError::InvalidField { field, reason })
        }
        _ => Err(ValidationError::Multiple(
            errors
                .into_iter()
                .map(|(field, reason)| format!("Invalid value for '{field}': {reason}"))
                .collect(),
        )),
    }
}
