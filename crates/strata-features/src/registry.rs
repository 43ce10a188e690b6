//! Feature Registry
//!
//! Versioned catalogue of feature definitions. The registry is built at
//! startup and shared read-only with the engine afterwards; new versions are
//! added as new definitions and existing ones are never mutated.

use crate::definition::{FeatureDefinition, FeatureKey};
use crate::error::{FeatureError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Registry of feature definitions keyed by name and version.
#[derive(Debug, Clone, Default)]
pub struct FeatureRegistry {
    features: BTreeMap<String, BTreeMap<u32, Arc<FeatureDefinition>>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first walk state for topological sorting.
struct Walk<'a> {
    registry: &'a FeatureRegistry,
    candidate: Option<&'a Arc<FeatureDefinition>>,
    strict: bool,
    marks: HashMap<FeatureKey, Mark>,
    path: Vec<FeatureKey>,
    order: Vec<Arc<FeatureDefinition>>,
}

impl Walk<'_> {
    fn lookup(&self, name: &str, version: Option<u32>) -> Option<Arc<FeatureDefinition>> {
        if let Some(candidate) = self.candidate.filter(|c| c.name() == name) {
            let shadows = match version {
                Some(v) => v == candidate.version(),
                None => self
                    .registry
                    .latest_version(name)
                    .is_none_or(|latest| candidate.version() > latest),
            };
            if shadows {
                return Some(Arc::clone(candidate));
            }
        }
        self.registry.get(name, version)
    }

    fn visit(&mut self, def: Arc<FeatureDefinition>) -> Result<()> {
        let key = def.key();
        match self.marks.get(&key) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.path.iter().position(|k| *k == key).unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.path[start..].iter().map(ToString::to_string).collect();
                cycle.push(key.to_string());
                return Err(FeatureError::CyclicDependency { cycle });
            }
            None => {}
        }

        self.marks.insert(key.clone(), Mark::Visiting);
        self.path.push(key.clone());

        for (name, version) in def.feature_dependencies() {
            match self.lookup(name, version) {
                Some(dep) => self.visit(dep)?,
                None if self.strict => {
                    return Err(FeatureError::UnknownFeature {
                        name: name.to_string(),
                        version,
                    });
                }
                None => {}
            }
        }

        self.path.pop();
        self.marks.insert(key, Mark::Done);
        self.order.push(def);
        Ok(())
    }
}

impl FeatureRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition.
    ///
    /// Dependencies that are not registered yet are accepted; they are
    /// checked when the dependency graph is resolved.
    ///
    /// # Errors
    ///
    /// - [`FeatureError::DuplicateFeatureVersion`] if `(name, version)` exists
    /// - [`FeatureError::CyclicDependency`] if the definition closes a cycle
    /// - [`FeatureError::InvalidDefinition`] / [`FeatureError::Arity`] for
    ///   malformed definitions
    pub fn register(&mut self, definition: FeatureDefinition) -> Result<Arc<FeatureDefinition>> {
        let name = definition.name().to_string();
        let version = definition.version();

        if name.trim().is_empty() {
            return Err(FeatureError::InvalidDefinition {
                name,
                reason: "name must not be empty".to_string(),
            });
        }
        if version == 0 {
            return Err(FeatureError::InvalidDefinition {
                name,
                reason: "versions start at 1".to_string(),
            });
        }
        definition
            .transformation()
            .check_arity(definition.dependencies().len())?;
        definition
            .transformation()
            .check_parameters()
            .map_err(|reason| FeatureError::InvalidDefinition {
                name: name.clone(),
                reason,
            })?;
        if self.get(&name, Some(version)).is_some() {
            return Err(FeatureError::DuplicateFeatureVersion { name, version });
        }

        let definition = Arc::new(definition);
        let mut walk = Walk {
            registry: self,
            candidate: Some(&definition),
            strict: false,
            marks: HashMap::new(),
            path: Vec::new(),
            order: Vec::new(),
        };
        walk.visit(Arc::clone(&definition))?;

        debug!(feature = %definition.key(), "registered feature");
        self.features
            .entry(name)
            .or_default()
            .insert(version, Arc::clone(&definition));
        Ok(definition)
    }

    fn get(&self, name: &str, version: Option<u32>) -> Option<Arc<FeatureDefinition>> {
        let versions = self.features.get(name)?;
        match version {
            Some(v) => versions.get(&v).cloned(),
            None => versions.values().next_back().cloned(),
        }
    }

    /// Resolve a definition; `None` resolves the latest version.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::UnknownFeature`] if absent.
    pub fn resolve(&self, name: &str, version: Option<u32>) -> Result<Arc<FeatureDefinition>> {
        self.get(name, version)
            .ok_or_else(|| FeatureError::UnknownFeature {
                name: name.to_string(),
                version,
            })
    }

    /// Transitive feature dependencies of `name`, leaf-first.
    ///
    /// Every dependency appears before its dependents and the requested
    /// definition is last.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::UnknownFeature`] if the feature or any
    /// dependency is absent, and [`FeatureError::CyclicDependency`] if the
    /// dependencies do not form a DAG.
    pub fn dependency_graph(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> Result<Vec<Arc<FeatureDefinition>>> {
        let root = self.resolve(name, version)?;
        let mut walk = Walk {
            registry: self,
            candidate: None,
            strict: true,
            marks: HashMap::new(),
            path: Vec::new(),
            order: Vec::new(),
        };
        walk.visit(root)?;
        Ok(walk.order)
    }

    /// Whether any version of `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    /// Latest registered version of `name`.
    pub fn latest_version(&self, name: &str) -> Option<u32> {
        self.features
            .get(name)
            .and_then(|versions| versions.keys().next_back().copied())
    }

    /// Registered versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> Vec<u32> {
        self.features
            .get(name)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every registered definition, ordered by name then version.
    pub fn list(&self) -> Vec<Arc<FeatureDefinition>> {
        self.features
            .values()
            .flat_map(|versions| versions.values().cloned())
            .collect()
    }

    /// Feature names.
    pub fn names(&self) -> Vec<&str> {
        self.features.keys().map(String::as_str).collect()
    }

    /// Number of registered definitions (all versions).
    pub fn len(&self) -> usize {
        self.features.values().map(BTreeMap::len).sum()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
