use crate::blueprints::{default_model, BoxedBlueprint, Foodweb};
use crate::registry::registry;
use endyn_core::errors::{EndynError, EndynResult};
use endyn_core::framework::{Blueprint, ComponentId, PropertyValue, System};
use endyn_core::params::ModelParameters;
use endyn_core::simulate::{simulate, InitialState, SimulationConfig, Solution};
use endyn_core::FloatValue;
use ndarray::{Array1, Array2};
use std::fmt;

/// An ecological model under construction.
///
/// Blueprints are added one at a time or in batches; every addition is atomic. Properties
/// are read and written by name or alias, e.g. `"M"` for `"body_mass"`.
#[derive(Debug, Clone)]
pub struct Model {
    system: System<ModelParameters>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            system: System::new(ModelParameters::new(), registry()),
        }
    }
}

impl Model {
    /// An empty model.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blueprints(blueprints: Vec<BoxedBlueprint>) -> EndynResult<Self> {
        let mut model = Self::new();
        model.add_all(blueprints)?;
        Ok(model)
    }

    /// A complete model over the food web, see [`default_model`].
    pub fn default_for(foodweb: Foodweb) -> EndynResult<Self> {
        Self::from_blueprints(default_model(foodweb))
    }

    pub fn add(&mut self, blueprint: impl Blueprint<ModelParameters> + 'static) -> EndynResult<()> {
        self.system.add(blueprint)
    }

    pub fn add_all(&mut self, blueprints: Vec<BoxedBlueprint>) -> EndynResult<()> {
        self.system.add_all(blueprints)
    }

    /// Consuming version of [`Model::add`].
    pub fn with(mut self, blueprint: impl Blueprint<ModelParameters> + 'static) -> EndynResult<Self> {
        self.add(blueprint)?;
        Ok(self)
    }

    pub fn has_component(&self, component: ComponentId) -> bool {
        self.system.has_component(component)
    }

    pub fn components(&self) -> Vec<ComponentId> {
        self.system.components().collect()
    }

    pub fn blueprint_of(&self, component: ComponentId) -> Option<&'static str> {
        self.system.blueprint_of(component)
    }

    pub fn n_components(&self) -> usize {
        self.system.n_components()
    }

    pub fn get(&self, property: &str) -> EndynResult<PropertyValue> {
        self.system.get(property)
    }

    pub fn set(&mut self, property: &str, value: impl Into<PropertyValue>) -> EndynResult<()> {
        self.system.set(property, value.into())
    }

    pub fn set_at(&mut self, property: &str, index: usize, value: FloatValue) -> EndynResult<()> {
        self.system.set_at(property, index, value)
    }

    /// Read a vector property.
    pub fn vector(&self, property: &str) -> EndynResult<Array1<FloatValue>> {
        let value = self.get(property)?;
        let kind = value.kind();
        value.into_vector().ok_or_else(|| EndynError::Argument {
            context: property.to_string(),
            message: format!("not a vector but a {}", kind),
        })
    }

    /// Read a matrix property.
    pub fn matrix(&self, property: &str) -> EndynResult<Array2<FloatValue>> {
        let value = self.get(property)?;
        let kind = value.kind();
        value.into_matrix().ok_or_else(|| EndynError::Argument {
            context: property.to_string(),
            message: format!("not a matrix but a {}", kind),
        })
    }

    pub fn parameters(&self) -> &ModelParameters {
        self.system.value()
    }

    pub fn into_parameters(self) -> ModelParameters {
        self.system.into_value()
    }

    pub fn richness(&self) -> usize {
        self.parameters().richness()
    }

    pub fn species_names(&self) -> &[String] {
        self.parameters().species_names()
    }

    pub fn simulate(&self, initial: &InitialState, config: &SimulationConfig) -> EndynResult<Solution> {
        simulate(self.parameters(), initial, config)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.system, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprints::{BodyMass, Species};
    use crate::ids;
    use ndarray::array;

    #[test]
    fn display_lists_provenance() {
        let model = Model::new()
            .with(Foodweb::matrix(array![[false, false], [true, false]]))
            .unwrap()
            .with(BodyMass::flat(2.0))
            .unwrap();
        assert_eq!(
            model.to_string(),
            "Model with 3 components\n  - Species (from Species)\n  - Foodweb (from Foodweb::Matrix)\n  - BodyMass (from BodyMass::Flat)"
        );
    }

    #[test]
    fn reads_are_copies() {
        let mut model = Model::new();
        model.add(Species::names(["a", "b"])).unwrap();
        model.add(BodyMass::flat(2.0)).unwrap();
        let mut masses = model.vector("M").unwrap();
        masses[0] = 10.0;
        assert_eq!(model.vector("body_mass").unwrap(), array![2.0, 2.0]);
        assert_eq!(model.components(), vec![ids::SPECIES, ids::BODY_MASS]);
        assert!(matches!(model.matrix("M"), Err(EndynError::Argument { .. })));
    }

    #[test]
    fn missing_components_and_read_only_properties() {
        let mut model = Model::new();
        model.add(Species::count(2)).unwrap();
        assert_eq!(
            model.get("body_mass").unwrap_err(),
            EndynError::MissingComponent {
                property: "body_mass".to_string(),
                component: "BodyMass".to_string(),
            }
        );
        assert_eq!(
            model.set("S", 3usize).unwrap_err(),
            EndynError::ReadOnlyProperty {
                property: "richness".to_string(),
            }
        );
        assert_eq!(model.get("S").unwrap(), PropertyValue::Size(2));
    }
}
