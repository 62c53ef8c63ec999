//! Components and the registry describing how they relate.

use super::property::Property;
use crate::aliasing::AliasingSystem;
use crate::errors::{EndynError, EndynResult};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Tag identifying a component (a named role in the model schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(&'static str);

impl ComponentId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for ComponentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Static description of a component: its relations to other components
/// and the properties it exposes.
pub struct ComponentSpec<V> {
    pub id: ComponentId,
    pub requires: Vec<ComponentId>,
    pub conflicts: Vec<(ComponentId, String)>,
    pub properties: Vec<Property<V>>,
}

impl<V> ComponentSpec<V> {
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            requires: vec![],
            conflicts: vec![],
            properties: vec![],
        }
    }

    pub fn requires(mut self, component: ComponentId) -> Self {
        self.requires.push(component);
        self
    }

    /// Declare a conflict. Conflicts are symmetric: declaring it on either side is enough.
    pub fn conflicts(mut self, component: ComponentId, reason: &str) -> Self {
        self.conflicts.push((component, reason.to_string()));
        self
    }

    pub fn property(mut self, property: Property<V>) -> Self {
        self.properties.push(property);
        self
    }
}

impl<V> fmt::Debug for ComponentSpec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("id", &self.id)
            .field("requires", &self.requires)
            .field("conflicts", &self.conflicts)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Runtime table of every component a model type knows about.
///
/// Built once and shared between models through an `Arc`.
pub struct Registry<V> {
    specs: HashMap<ComponentId, ComponentSpec<V>>,
    order: Vec<ComponentId>,
    property_names: AliasingSystem,
    /// Canonical property name -> (owning component, index in its spec).
    property_index: HashMap<String, (ComponentId, usize)>,
}

impl<V> fmt::Debug for Registry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("components", &self.order)
            .finish()
    }
}

impl<V> Registry<V> {
    pub fn builder() -> RegistryBuilder<V> {
        RegistryBuilder { specs: vec![] }
    }

    pub fn spec(&self, id: ComponentId) -> EndynResult<&ComponentSpec<V>> {
        self.specs
            .get(&id)
            .ok_or_else(|| EndynError::Error(format!("Component {} is not registered", id)))
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.specs.contains_key(&id)
    }

    /// Registered components, in registration order.
    pub fn components(&self) -> &[ComponentId] {
        &self.order
    }

    /// Reason of the declared conflict between two components, if any.
    pub fn conflict(&self, a: ComponentId, b: ComponentId) -> Option<&str> {
        let lookup = |x: ComponentId, y: ComponentId| {
            self.specs.get(&x).and_then(|spec| {
                spec.conflicts
                    .iter()
                    .find(|(other, _)| *other == y)
                    .map(|(_, reason)| reason.as_str())
            })
        };
        lookup(a, b).or_else(|| lookup(b, a))
    }

    /// Resolve a property name or alias.
    pub fn property(&self, name: &str) -> EndynResult<(ComponentId, &Property<V>)> {
        let canonical = self.property_names.standardize(name)?;
        let (component, index) = self.property_index[canonical];
        Ok((component, &self.specs[&component].properties[index]))
    }

    pub fn property_names(&self) -> &AliasingSystem {
        &self.property_names
    }
}

pub struct RegistryBuilder<V> {
    specs: Vec<ComponentSpec<V>>,
}

impl<V> RegistryBuilder<V> {
    pub fn component(mut self, spec: ComponentSpec<V>) -> Self {
        self.specs.push(spec);
        self
    }

    /// Validate the catalogue and build the registry.
    ///
    /// Fails on duplicated components, relations to unregistered components
    /// and ambiguous property names.
    pub fn build(self) -> EndynResult<Registry<V>> {
        let mut specs = HashMap::new();
        let mut order = vec![];
        for spec in self.specs {
            if specs.contains_key(&spec.id) {
                return Err(EndynError::Error(format!(
                    "Component {} is registered twice",
                    spec.id
                )));
            }
            order.push(spec.id);
            specs.insert(spec.id, spec);
        }

        for spec in specs.values() {
            let related = spec
                .requires
                .iter()
                .chain(spec.conflicts.iter().map(|(c, _)| c))
                .chain(spec.properties.iter().flat_map(|p| p.depends.iter()));
            for other in related {
                if !specs.contains_key(other) {
                    return Err(EndynError::Error(format!(
                        "Component {} refers to unregistered component {}",
                        spec.id, other
                    )));
                }
            }
        }

        let mut entries = vec![];
        let mut property_index = HashMap::new();
        for id in &order {
            for (index, property) in specs[id].properties.iter().enumerate() {
                entries.push((property.name, property.aliases.clone()));
                property_index.insert(property.name.to_string(), (*id, index));
            }
        }
        let property_names = AliasingSystem::new("properties", entries)?;

        Ok(Registry {
            specs,
            order,
            property_names,
            property_index,
        })
    }
}
