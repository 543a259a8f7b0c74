// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Activation ordering over the live service graph.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::service::ServiceNode;

#[cfg(test)]
#[path = "./graph_test.rs"]
mod graph_test;

/// Result of ordering the services reachable from a root.
pub enum ActivationOrder {
    /// Every dependency precedes all of its dependents.
    Ordered(Vec<Arc<ServiceNode>>),
    /// The graph contains a cycle, so no service can be ordered.
    ///
    /// `cycle` is the offending path, first and last element equal.
    Cyclic { cycle: Vec<String> },
}

impl ActivationOrder {
    /// Ordered services; empty when the graph is cyclic.
    pub fn services(&self) -> &[Arc<ServiceNode>] {
        match self {
            ActivationOrder::Ordered(services) => services,
            ActivationOrder::Cyclic { .. } => &[],
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.services().iter().map(|s| s.name()).collect()
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self, ActivationOrder::Cyclic { .. })
    }

    pub fn into_services(self) -> Vec<Arc<ServiceNode>> {
        match self {
            ActivationOrder::Ordered(services) => services,
            ActivationOrder::Cyclic { .. } => Vec::new(),
        }
    }
}

impl fmt::Debug for ActivationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationOrder::Ordered(_) => f.debug_tuple("Ordered").field(&self.names()).finish(),
            ActivationOrder::Cyclic { cycle } => {
                f.debug_struct("Cyclic").field("cycle", cycle).finish()
            }
        }
    }
}

/// Order `root` and everything it transitively depends on so that each
/// dependency comes before its dependents.
///
/// The walk is depth-first over each node's dependency snapshot and is
/// repeated from scratch on every call. Any cycle reachable from `root`
/// invalidates the whole ordering.
pub fn ordered_dependencies(root: &Arc<ServiceNode>) -> ActivationOrder {
    let mut walk = Walk::default();
    match walk.visit(root) {
        Ok(()) => ActivationOrder::Ordered(walk.order),
        Err(cycle) => {
            tracing::warn!(?cycle, "service dependency graph contains a cycle");
            ActivationOrder::Cyclic { cycle }
        }
    }
}

#[derive(Default)]
struct Walk {
    /// Names on the current DFS path, in visit order.
    path: Vec<String>,
    on_path: HashSet<String>,
    done: HashSet<String>,
    order: Vec<Arc<ServiceNode>>,
}

impl Walk {
    fn visit(&mut self, node: &Arc<ServiceNode>) -> std::result::Result<(), Vec<String>> {
        let name = node.name();
        if self.done.contains(name) {
            return Ok(());
        }
        if self.on_path.contains(name) {
            let start = self.path.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle = self.path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(cycle);
        }

        self.on_path.insert(name.to_string());
        self.path.push(name.to_string());

        let dependencies = node.dependencies();
        for edge in dependencies.values() {
            self.visit(&edge.service)?;
        }

        self.path.pop();
        self.on_path.remove(name);
        self.done.insert(name.to_string());
        self.order.push(Arc::clone(node));
        Ok(())
    }
}
