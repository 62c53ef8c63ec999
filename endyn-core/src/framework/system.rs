//! The live aggregate: a model value together with the set of components it holds.

use super::blueprint::{Blueprint, Brought, CheckFailure};
use super::component::{ComponentId, Registry};
use super::property::PropertyValue;
use crate::errors::{EndynError, EndynResult};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A blueprint waiting in a batch.
struct Pending<V> {
    blueprint: Box<dyn Blueprint<V>>,
}

impl<V> Pending<V> {
    fn component(&self) -> ComponentId {
        self.blueprint.component()
    }
}

/// An implied sub-blueprint, resolved once every embedded blueprint is known.
struct PendingImplied<V> {
    component: ComponentId,
    blueprint: Option<Box<dyn Blueprint<V>>>,
    implied_by: &'static str,
}

/// A model value `V` assembled from blueprints.
///
/// The set of components held is always consistent: no unmet requirement,
/// no declared conflict and no component provided twice.
/// Every update is atomic: a failing batch leaves the system untouched.
#[derive(Clone)]
pub struct System<V> {
    value: V,
    registry: Arc<Registry<V>>,
    /// Components in expansion order, with the name of the blueprint that provided them.
    components: Vec<(ComponentId, &'static str)>,
}

impl<V: fmt::Debug> fmt::Debug for System<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("components", &self.components)
            .field("value", &self.value)
            .finish()
    }
}

impl<V> fmt::Display for System<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model with {} components", self.components.len())?;
        for (component, blueprint) in &self.components {
            write!(f, "\n  - {} (from {})", component, blueprint)?;
        }
        Ok(())
    }
}

impl<V: Clone> System<V> {
    pub fn new(value: V, registry: Arc<Registry<V>>) -> Self {
        Self {
            value,
            registry,
            components: vec![],
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn registry(&self) -> &Arc<Registry<V>> {
        &self.registry
    }

    pub fn has_component(&self, component: ComponentId) -> bool {
        self.components.iter().any(|(c, _)| *c == component)
    }

    /// Name of the blueprint that provided a component.
    pub fn blueprint_of(&self, component: ComponentId) -> Option<&'static str> {
        self.components
            .iter()
            .find(|(c, _)| *c == component)
            .map(|(_, b)| *b)
    }

    pub fn components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.iter().map(|(c, _)| *c)
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Add a single blueprint (and everything it brings).
    pub fn add(&mut self, blueprint: impl Blueprint<V> + 'static) -> EndynResult<()> {
        self.add_all(vec![Box::new(blueprint)])
    }

    /// Add a batch of blueprints atomically.
    ///
    /// Either every blueprint of the batch (and every sub-blueprint they bring)
    /// is expanded into the model, or none is and the model is left unchanged.
    pub fn add_all(&mut self, blueprints: Vec<Box<dyn Blueprint<V>>>) -> EndynResult<()> {
        // Collect the forest of embedded blueprints, then resolve implied ones.
        let mut batch: Vec<Pending<V>> = vec![];
        let mut implied: VecDeque<PendingImplied<V>> = VecDeque::new();
        for blueprint in blueprints {
            self.flatten(blueprint, &mut batch, &mut implied)?;
        }

        let mut not_implied: HashMap<ComponentId, &'static str> = HashMap::new();
        while let Some(entry) = implied.pop_front() {
            let present = self.has_component(entry.component)
                || batch.iter().any(|p| p.component() == entry.component);
            if present {
                continue;
            }
            match entry.blueprint {
                Some(blueprint) => self.flatten(blueprint, &mut batch, &mut implied)?,
                None => {
                    not_implied
                        .entry(entry.component)
                        .or_insert(entry.implied_by);
                }
            }
        }

        let available: Vec<(ComponentId, &'static str)> = self
            .components
            .iter()
            .copied()
            .chain(batch.iter().map(|p| (p.component(), p.blueprint.name())))
            .collect();

        self.check_conflicts(&batch, &available)?;
        self.check_requirements(&batch, &available, &not_implied)?;

        for pending in &batch {
            pending
                .blueprint
                .early_check()
                .map_err(|failure| early_error(pending, failure))?;
        }

        let order = self.expansion_order(&batch)?;

        // Late checks and expansions run on a candidate copy,
        // which only replaces the model once the whole batch succeeded.
        let mut candidate = self.value.clone();
        for &index in &order {
            let pending = &batch[index];
            pending
                .blueprint
                .late_check(&candidate)
                .map_err(|failure| late_error(pending, failure))?;
            pending.blueprint.expand(&mut candidate);
        }

        self.value = candidate;
        for index in order {
            let blueprint = &batch[index].blueprint;
            debug!(
                component = %blueprint.component(),
                blueprint = blueprint.name(),
                "Expanded blueprint"
            );
            self.components
                .push((blueprint.component(), blueprint.name()));
        }
        Ok(())
    }

    fn flatten(
        &self,
        blueprint: Box<dyn Blueprint<V>>,
        batch: &mut Vec<Pending<V>>,
        implied: &mut VecDeque<PendingImplied<V>>,
    ) -> EndynResult<()> {
        let component = blueprint.component();
        self.registry.spec(component)?;

        let existing = self
            .blueprint_of(component)
            .or_else(|| {
                batch
                    .iter()
                    .find(|p| p.component() == component)
                    .map(|p| p.blueprint.name())
            });
        if let Some(existing) = existing {
            return Err(EndynError::ComponentAlreadyPresent {
                component: component.to_string(),
                existing: existing.to_string(),
                blueprint: blueprint.name().to_string(),
            });
        }

        let name = blueprint.name();
        let brought = blueprint.brought();
        batch.push(Pending { blueprint });
        for sub in brought {
            match sub {
                Brought::Embedded(sub) => self.flatten(sub, batch, implied)?,
                Brought::Implied {
                    component,
                    blueprint,
                } => implied.push_back(PendingImplied {
                    component,
                    blueprint,
                    implied_by: name,
                }),
            }
        }
        Ok(())
    }

    fn check_conflicts(
        &self,
        batch: &[Pending<V>],
        available: &[(ComponentId, &'static str)],
    ) -> EndynResult<()> {
        for pending in batch {
            let component = pending.component();
            for &(other, other_blueprint) in available {
                if other == component {
                    continue;
                }
                if let Some(reason) = self.registry.conflict(component, other) {
                    return Err(EndynError::ConflictingComponents {
                        component: component.to_string(),
                        blueprint: pending.blueprint.name().to_string(),
                        other: other.to_string(),
                        other_blueprint: other_blueprint.to_string(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn requirements(&self, pending: &Pending<V>) -> EndynResult<Vec<ComponentId>> {
        let mut requires = self.registry.spec(pending.component())?.requires.clone();
        requires.extend(pending.blueprint.requires());
        Ok(requires)
    }

    fn check_requirements(
        &self,
        batch: &[Pending<V>],
        available: &[(ComponentId, &'static str)],
        not_implied: &HashMap<ComponentId, &'static str>,
    ) -> EndynResult<()> {
        for pending in batch {
            for required in self.requirements(pending)? {
                if available.iter().any(|(c, _)| *c == required) {
                    continue;
                }
                let blueprint = pending.blueprint.name().to_string();
                return Err(match not_implied.get(&required) {
                    Some(implied_by) => EndynError::MissingImpliedComponent {
                        blueprint,
                        required: required.to_string(),
                        implied_by: implied_by.to_string(),
                    },
                    None => EndynError::MissingRequiredComponent {
                        blueprint,
                        required: required.to_string(),
                    },
                });
            }
        }
        Ok(())
    }

    /// Order the batch so that every blueprint expands after the ones it depends on.
    ///
    /// Among blueprints with no ordering constraint the batch order is kept.
    fn expansion_order(&self, batch: &[Pending<V>]) -> EndynResult<Vec<usize>> {
        let mut graph: Graph<usize, ()> = Graph::new();
        let nodes: Vec<NodeIndex> = (0..batch.len()).map(|i| graph.add_node(i)).collect();
        for (index, pending) in batch.iter().enumerate() {
            for required in self.requirements(pending)? {
                if let Some(provider) = batch.iter().position(|p| p.component() == required) {
                    graph.add_edge(nodes[provider], nodes[index], ());
                }
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(EndynError::Error(
                "Circular requirements between the blueprints of the batch".to_string(),
            ));
        }

        let mut in_degree: Vec<usize> = nodes
            .iter()
            .map(|n| graph.neighbors_directed(*n, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut order = Vec::with_capacity(batch.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            for next in graph.neighbors_directed(nodes[index], Direction::Outgoing) {
                let next = graph[next];
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        Ok(order)
    }

    fn check_property(&self, name: &str) -> EndynResult<&super::property::Property<V>> {
        let (component, property) = self.registry.property(name)?;
        for needed in std::iter::once(&component).chain(property.depends.iter()) {
            if !self.has_component(*needed) {
                return Err(EndynError::MissingComponent {
                    property: property.name.to_string(),
                    component: needed.to_string(),
                });
            }
        }
        Ok(property)
    }

    /// Read a property by name or alias. The value returned is a copy.
    pub fn get(&self, name: &str) -> EndynResult<PropertyValue> {
        let property = self.check_property(name)?;
        (property.getter)(&self.value).ok_or_else(|| {
            EndynError::Error(format!("Property {} is unavailable", property.name))
        })
    }

    /// Write a property by name or alias.
    ///
    /// The new value is validated against the same invariants as the blueprint that
    /// provided it. On failure the model keeps its previous value.
    pub fn set(&mut self, name: &str, value: PropertyValue) -> EndynResult<()> {
        let property = self.check_property(name)?;
        let writer = property
            .writer
            .clone()
            .ok_or_else(|| EndynError::ReadOnlyProperty {
                property: property.name.to_string(),
            })?;
        let property_name = property.name;
        (writer.check)(&self.value, &value).map_err(|failure| EndynError::Write {
            property: property_name.to_string(),
            message: format!("{}: {}", failure.field, failure.message),
        })?;
        (writer.write)(&mut self.value, value);
        Ok(())
    }

    /// Write a single entry of a vector property, through the same checks as [`System::set`].
    pub fn set_at(&mut self, name: &str, index: usize, entry: f64) -> EndynResult<()> {
        let value = self.get(name)?;
        let mut vector = value.into_vector().ok_or_else(|| EndynError::Write {
            property: name.to_string(),
            message: "only vector properties can be written entry by entry".to_string(),
        })?;
        if index >= vector.len() {
            return Err(EndynError::Write {
                property: name.to_string(),
                message: format!("index {} out of bounds for length {}", index, vector.len()),
            });
        }
        vector[index] = entry;
        self.set(name, PropertyValue::Vector(vector))
    }
}

fn early_error<V>(pending: &Pending<V>, failure: CheckFailure) -> EndynError {
    EndynError::EarlyCheck {
        component: pending.component().to_string(),
        blueprint: pending.blueprint.name().to_string(),
        field: failure.field,
        message: failure.message,
    }
}

fn late_error<V>(pending: &Pending<V>, failure: CheckFailure) -> EndynError {
    EndynError::LateCheck {
        component: pending.component().to_string(),
        blueprint: pending.blueprint.name().to_string(),
        field: failure.field,
        message: failure.message,
    }
}
