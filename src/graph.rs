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

//! Dependency graph over deployable units.
//!
//! A unit may only depend on units that are already registered, so the graph
//! is acyclic by construction. Edges run from a dependency to its dependent.
//!
//! # Example
//!
//! ```
//! use druid_eks::graph::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.register_unit("network", (), &[] as &[&str]).unwrap();
//! graph.register_unit("cluster", (), &["network"]).unwrap();
//! assert!(graph.register_unit("druid", (), &["addons"]).is_err());
//!
//! assert_eq!(graph.realization_order(), vec!["network", "cluster"]);
//! ```

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Errors raised while wiring units into the graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: String, dependency: String },

    #[error("Unit '{unit}' is already registered")]
    DuplicateUnit { unit: String },
}

/// Handle to a registered unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHandle {
    id: String,
    index: NodeIndex,
}

impl UnitHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Position in registration order.
    pub fn position(&self) -> usize {
        self.index.index()
    }
}

#[derive(Debug)]
struct Entry<N> {
    id: String,
    dependencies: Vec<String>,
    node: N,
}

/// Registered units and their "must succeed before" edges.
#[derive(Debug)]
pub struct DependencyGraph<N = ()> {
    graph: DiGraph<Entry<N>, ()>,
    index: IndexMap<String, NodeIndex>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            graph: DiGraph::new(),
            index: IndexMap::new(),
        }
    }
}

impl<N> DependencyGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit after all of its dependencies.
    ///
    /// Nothing is registered if any dependency is unknown.
    pub fn register_unit<S: AsRef<str>>(
        &mut self,
        id: impl Into<String>,
        node: N,
        dependencies: &[S],
    ) -> Result<UnitHandle, GraphError> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateUnit { unit: id });
        }

        let mut resolved: Vec<(String, NodeIndex)> = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let dependency = dependency.as_ref();
            let Some(&dep_idx) = self.index.get(dependency) else {
                return Err(GraphError::UnknownDependency {
                    unit: id,
                    dependency: dependency.to_string(),
                });
            };
            if !resolved.iter().any(|(d, _)| d == dependency) {
                resolved.push((dependency.to_string(), dep_idx));
            }
        }

        let idx = self.graph.add_node(Entry {
            id: id.clone(),
            dependencies: resolved.iter().map(|(d, _)| d.clone()).collect(),
            node,
        });
        for (_, dep_idx) in &resolved {
            self.graph.add_edge(*dep_idx, idx, ());
        }
        self.index.insert(id.clone(), idx);

        Ok(UnitHandle { id, index: idx })
    }

    /// A topological order; ties are broken by registration order.
    pub fn realization_order(&self) -> Vec<&str> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(i)) = ready.pop() {
            let idx = NodeIndex::new(i);
            order.push(self.graph[idx].id.as_str());
            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let degree = &mut in_degree[dependent.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(dependent.index()));
                }
            }
        }
        order
    }

    /// Groups of units that may be realized concurrently. Every unit appears in
    /// the wave after the latest of its dependencies.
    pub fn waves(&self) -> Vec<Vec<&str>> {
        let mut level: Vec<usize> = Vec::with_capacity(self.graph.node_count());
        let mut waves: Vec<Vec<&str>> = Vec::new();

        // Registration order is already topological.
        for idx in self.graph.node_indices() {
            let l = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .map(|dep| level[dep.index()] + 1)
                .max()
                .unwrap_or(0);
            level.push(l);
            if waves.len() <= l {
                waves.resize_with(l + 1, Vec::new);
            }
            waves[l].push(self.graph[idx].id.as_str());
        }
        waves
    }

    /// Every edge as `(dependent, dependency)`, in registration order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.graph
            .node_indices()
            .flat_map(|idx| {
                let entry = &self.graph[idx];
                entry
                    .dependencies
                    .iter()
                    .map(move |dep| (entry.id.as_str(), dep.as_str()))
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&N> {
        self.index.get(id).map(|&idx| &self.graph[idx].node)
    }

    pub fn dependencies_of(&self, id: &str) -> Option<&[String]> {
        self.index
            .get(id)
            .map(|&idx| self.graph[idx].dependencies.as_slice())
    }

    /// Direct dependents, in registration order.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut dependents: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        dependents.sort();
        dependents
            .into_iter()
            .map(|d| self.graph[d].id.as_str())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Registered units in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &N)> {
        self.graph
            .node_indices()
            .map(|idx| (self.graph[idx].id.as_str(), &self.graph[idx].node))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}
