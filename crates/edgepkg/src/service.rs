// Copyright (c) Contributors to the edgepkg project.
// SPDX-License-Identifier: Apache-2.0

//! Live service nodes and the registry that locates them.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use indexmap::IndexMap;
use semver::Version;

use crate::graph::{ordered_dependencies, ActivationOrder};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./service_test.rs"]
mod service_test;

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum State {
    #[default]
    New,
    Installed,
    Starting,
    Running,
    Stopping,
    Finished,
    Errored,
    Broken,
}

/// Edge from a dependent to one of its dependencies.
#[derive(Clone)]
pub struct DependencyEdge {
    pub service: Arc<ServiceNode>,
    /// State the dependency must reach before the dependent starts.
    pub start_when: State,
    pub hard: bool,
}

impl fmt::Debug for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyEdge")
            .field("service", &self.service.name())
            .field("start_when", &self.start_when)
            .field("hard", &self.hard)
            .finish()
    }
}

type Dependencies = IndexMap<String, DependencyEdge>;

/// A running or runnable service and its dependency edges.
///
/// The dependency set is replaced wholesale on every mutation, so a
/// reader holding a snapshot from [`ServiceNode::dependencies`] never
/// observes a partially applied change.
pub struct ServiceNode {
    name: String,
    version: Option<Version>,
    builtin: bool,
    state: ArcSwap<State>,
    dependencies: ArcSwap<Dependencies>,
}

impl fmt::Debug for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deps = self.dependencies();
        f.debug_struct("ServiceNode")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("builtin", &self.builtin)
            .field("state", &self.state())
            .field("dependencies", &deps.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceNode {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            version: None,
            builtin: false,
            state: ArcSwap::from_pointee(State::New),
            dependencies: ArcSwap::from_pointee(Dependencies::new()),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Mark this service as built into the orchestrator (no on-disk recipe).
    pub fn with_builtin(mut self, builtin: bool) -> Self {
        self.builtin = builtin;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn state(&self) -> State {
        **self.state.load()
    }

    pub fn set_state(&self, state: State) {
        self.state.store(Arc::new(state));
    }

    /// Snapshot of the current dependency edges, in insertion order.
    pub fn dependencies(&self) -> Arc<Dependencies> {
        self.dependencies.load_full()
    }

    /// Add a dependency on `service`, or update the edge if one exists.
    pub fn add_or_update_dependency(&self, service: Arc<ServiceNode>, start_when: State, hard: bool) {
        let name = service.name().to_string();
        let edge = DependencyEdge {
            service,
            start_when,
            hard,
        };
        self.dependencies.rcu(|current| {
            let mut next = Dependencies::clone(current);
            next.insert(name.clone(), edge.clone());
            next
        });
    }

    /// Remove the dependency on `name`, returning whether it existed.
    pub fn remove_dependency(&self, name: &str) -> bool {
        let previous = self.dependencies.rcu(|current| {
            let mut next = Dependencies::clone(current);
            next.shift_remove(name);
            next
        });
        previous.contains_key(name)
    }

    pub fn clear_dependencies(&self) {
        self.dependencies.store(Arc::new(Dependencies::new()));
    }
}

/// A dependency declared in a [`ServiceDefinition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub name: String,
    pub start_when: State,
    pub hard: bool,
}

/// Declaration of a service in the system model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Constructor to build the service with; a generic node when unset.
    pub type_tag: Option<String>,
    pub version: Option<Version>,
    pub builtin: bool,
    pub dependencies: Vec<DeclaredDependency>,
}

impl ServiceDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type<S: Into<String>>(mut self, type_tag: S) -> Self {
        self.type_tag = Some(type_tag.into());
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_builtin(mut self, builtin: bool) -> Self {
        self.builtin = builtin;
        self
    }

    /// Declare a hard dependency that must be running first.
    pub fn with_dependency<S: Into<String>>(mut self, name: S) -> Self {
        self.dependencies.push(DeclaredDependency {
            name: name.into(),
            start_when: State::Running,
            hard: true,
        });
        self
    }

    fn generic_node(&self, name: &str) -> ServiceNode {
        let node = ServiceNode::new(name).with_builtin(self.builtin);
        match &self.version {
            Some(version) => node.with_version(version.clone()),
            None => node,
        }
    }
}

/// Builds a service node for a registered type tag.
pub type ServiceConstructor = Arc<dyn Fn(&str, &ServiceDefinition) -> ServiceNode + Send + Sync>;

/// Registry of live services, their definitions and constructors.
///
/// The registry owns the service graph: dropping it (or calling
/// [`ServiceRegistry::shutdown`]) releases every node and edge.
#[derive(Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<ServiceNode>>,
    definitions: DashMap<String, ServiceDefinition>,
    constructors: DashMap<String, ServiceConstructor>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        services.sort();
        f.debug_struct("ServiceRegistry")
            .field("services", &services)
            .finish_non_exhaustive()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` in the system model.
    pub fn define<S: Into<String>>(&self, name: S, definition: ServiceDefinition) {
        self.definitions.insert(name.into(), definition);
    }

    /// Register a constructor under `type_tag`.
    ///
    /// A tag doubles as a service name: locating an undeclared service
    /// whose name matches a tag builds it with an empty definition.
    pub fn register_type<S, F>(&self, type_tag: S, constructor: F)
    where
        S: Into<String>,
        F: Fn(&str, &ServiceDefinition) -> ServiceNode + Send + Sync + 'static,
    {
        self.constructors
            .insert(type_tag.into(), Arc::new(constructor));
    }

    /// Register an already constructed node, returning the registered
    /// instance (an existing node of the same name wins).
    pub fn insert(&self, node: ServiceNode) -> Arc<ServiceNode> {
        let name = node.name().to_string();
        Arc::clone(self.services.entry(name).or_insert_with(|| Arc::new(node)).value())
    }

    /// Look up a live service without constructing it.
    pub fn get(&self, name: &str) -> Option<Arc<ServiceNode>> {
        self.services.get(name).map(|node| Arc::clone(node.value()))
    }

    /// Find or construct the service `name`, wiring its declared
    /// dependencies.
    pub fn locate(&self, name: &str) -> Result<Arc<ServiceNode>> {
        if let Some(node) = self.get(name) {
            return Ok(node);
        }

        let definition = self.definitions.get(name).map(|d| d.value().clone());
        let (definition, node) = match definition {
            Some(definition) => {
                let node = match &definition.type_tag {
                    Some(type_tag) => {
                        let constructor = self.constructor(type_tag).ok_or_else(|| {
                            Error::UnknownServiceType {
                                name: name.to_string(),
                                type_tag: type_tag.clone(),
                            }
                        })?;
                        constructor(name, &definition)
                    }
                    None => definition.generic_node(name),
                };
                (definition, node)
            }
            None => {
                let constructor = self
                    .constructor(name)
                    .ok_or_else(|| Error::NoDefinition(name.to_string()))?;
                let definition = ServiceDefinition::default();
                let node = constructor(name, &definition);
                (definition, node)
            }
        };

        // Register before wiring so that cyclic declarations terminate.
        let node = match self.services.entry(name.to_string()) {
            Entry::Occupied(existing) => return Ok(Arc::clone(existing.get())),
            Entry::Vacant(slot) => Arc::clone(slot.insert(Arc::new(node)).value()),
        };
        tracing::debug!(service = %name, "located service");

        for dependency in &definition.dependencies {
            match self.locate(&dependency.name) {
                Ok(service) => {
                    node.add_or_update_dependency(service, dependency.start_when, dependency.hard)
                }
                Err(err) => {
                    self.services.remove(name);
                    node.clear_dependencies();
                    return Err(err);
                }
            }
        }
        Ok(node)
    }

    /// Version of the active service `name`, if it is known and has one.
    pub fn find_active(&self, name: &str) -> Option<Version> {
        if !self.services.contains_key(name) && !self.definitions.contains_key(name) {
            return None;
        }
        match self.locate(name) {
            Ok(node) => node.version().cloned(),
            Err(err) => {
                tracing::debug!(service = %name, %err, "no active service for component");
                None
            }
        }
    }

    /// Activation order of everything reachable from `root`.
    pub fn ordered_dependencies(&self, root: &str) -> Result<ActivationOrder> {
        let root = self.locate(root)?;
        Ok(ordered_dependencies(&root))
    }

    /// Release every service and dependency edge.
    pub fn shutdown(&self) {
        for entry in self.services.iter() {
            entry.value().clear_dependencies();
        }
        self.services.clear();
    }

    fn constructor(&self, type_tag: &str) -> Option<ServiceConstructor> {
        self.constructors
            .get(type_tag)
            .map(|constructor| Arc::clone(constructor.value()))
    }
}

impl Drop for ServiceRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
